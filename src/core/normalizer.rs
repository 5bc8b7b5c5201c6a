use crate::domain::model::{Deployment, DeploymentMode};
use crate::utils::error::{Result, RootfixError};
use regex::Regex;
use std::sync::LazyLock;

static REPEATED_SLASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/{2,}").unwrap());

const TEMPLATE_OPENERS: [&str; 5] = ["{{", "{%", "${", "<%", "<?"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub value: String,
    /// `../` segments dropped while recovering the corpus-relative path.
    pub parent_segments: usize,
    /// The `../` chain climbs above the corpus root from the document's location.
    pub escapes_root: bool,
}

impl Normalized {
    fn unchanged(reference: &str) -> Self {
        Self {
            value: reference.to_string(),
            parent_segments: 0,
            escapes_root: false,
        }
    }
}

/// Re-roots internal references for one deployment.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    deployment: Deployment,
}

impl PathNormalizer {
    pub fn new(deployment: Deployment) -> Self {
        Self { deployment }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Normalize an internal reference into its canonical form.
    ///
    /// The path is always re-derived from the corpus root: leading `./`, `../`
    /// and `/` segments are dropped, then any number of copies of the hosted
    /// prefix, and the remainder is placed under the active root. Query and
    /// fragment are carried over verbatim. Applying this to its own output
    /// returns the same value.
    ///
    /// `document_depth` only feeds the `escapes_root` diagnostic.
    pub fn normalize(&self, reference: &str, document_depth: usize) -> Result<Normalized> {
        if reference.is_empty() {
            return Ok(Normalized::unchanged(reference));
        }

        let split = reference.find(['?', '#']).unwrap_or(reference.len());
        let (path, suffix) = reference.split_at(split);
        if path.is_empty() {
            return Ok(Normalized::unchanged(reference));
        }
        check_path(reference, path)?;

        let hosted = self.deployment.hosted_base.relative();
        let hosted_dir = hosted.trim_end_matches('/');

        let mut rest = path;
        let mut parent_segments = 0;
        loop {
            if let Some(r) = rest.strip_prefix("./") {
                rest = r;
            } else if let Some(r) = rest.strip_prefix("../") {
                parent_segments += 1;
                rest = r;
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
            } else if rest == "." {
                rest = "";
            } else if rest == ".." {
                parent_segments += 1;
                rest = "";
            } else if let Some(r) = rest.strip_prefix(hosted) {
                rest = r;
            } else if rest == hosted_dir {
                rest = "";
            } else {
                break;
            }
        }

        let rest = REPEATED_SLASH_RE.replace_all(rest, "/");
        let root = match self.deployment.mode {
            DeploymentMode::Local => "/",
            DeploymentMode::Hosted => self.deployment.hosted_base.as_str(),
        };

        Ok(Normalized {
            value: format!("{}{}{}", root, rest, suffix),
            parent_segments,
            escapes_root: parent_segments > document_depth,
        })
    }
}

fn check_path(reference: &str, path: &str) -> Result<()> {
    let malformed = |reason: &str| RootfixError::MalformedReference {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };

    if TEMPLATE_OPENERS.iter().any(|t| path.contains(t)) {
        return Err(malformed("template placeholder"));
    }
    if path.contains('\\') {
        return Err(malformed("backslash path separator"));
    }
    if path.contains(['\'', '`', '+']) {
        return Err(malformed("script expression fragment"));
    }
    if path.chars().any(|c| c.is_control() || matches!(c, '<' | '>' | '"')) {
        return Err(malformed("characters not allowed in a URL path"));
    }
    if path.trim() != path {
        return Err(malformed("leading or trailing whitespace"));
    }
    Ok(())
}
