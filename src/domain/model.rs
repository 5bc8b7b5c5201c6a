use crate::utils::error::{Result, RootfixError};
use crate::utils::validation::validate_url_path;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

/// Which deployment root the corpus is being rewritten for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum DeploymentMode {
    Local,
    Hosted,
}

/// A validated hosted sub-path such as `/app/`. Always starts and ends with `/`
/// and has at least one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct HostedBase(String);

impl HostedBase {
    pub fn parse(raw: &str) -> Result<Self> {
        validate_url_path("hosted_base", raw)?;

        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(RootfixError::InvalidConfigValueError {
                field: "hosted_base".to_string(),
                value: raw.to_string(),
                reason: "Hosted base must name a sub-path, '/' is the local root".to_string(),
            });
        }
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(RootfixError::InvalidConfigValueError {
                field: "hosted_base".to_string(),
                value: raw.to_string(),
                reason: "Hosted base cannot contain '.' or '..' segments".to_string(),
            });
        }

        Ok(Self(format!("/{}/", segments.join("/"))))
    }

    /// `/app/`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `app/`, the form that appears after leading slashes are stripped.
    pub fn relative(&self) -> &str {
        &self.0[1..]
    }
}

impl From<HostedBase> for String {
    fn from(base: HostedBase) -> Self {
        base.0
    }
}

impl std::fmt::Display for HostedBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The active mode together with the configured hosted root. The hosted root is
/// needed in both modes: local runs still strip a previously applied prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub mode: DeploymentMode,
    pub hosted_base: HostedBase,
}

impl Deployment {
    pub fn new(mode: DeploymentMode, hosted_base: HostedBase) -> Self {
        Self { mode, hosted_base }
    }

    pub fn local(hosted_base: HostedBase) -> Self {
        Self::new(DeploymentMode::Local, hosted_base)
    }

    pub fn hosted(hosted_base: HostedBase) -> Self {
        Self::new(DeploymentMode::Hosted, hosted_base)
    }

    /// Effective root for the active mode.
    pub fn root(&self) -> &str {
        match self.mode {
            DeploymentMode::Local => "/",
            DeploymentMode::Hosted => self.hosted_base.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    External,
    Anchor,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Link,
    ScriptSrc,
    ImageSrc,
    StyleUrl,
    AnchorHref,
    OnclickHref,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Link => "link",
            ReferenceKind::ScriptSrc => "script-src",
            ReferenceKind::ImageSrc => "image-src",
            ReferenceKind::StyleUrl => "style-url",
            ReferenceKind::AnchorHref => "anchor-href",
            ReferenceKind::OnclickHref => "onclick-href",
        }
    }
}

/// One reference found while scanning a document. Lives only for the
/// duration of a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    pub raw: &'a str,
    pub kind: ReferenceKind,
    pub category: Category,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KindCounts {
    pub link: usize,
    pub script_src: usize,
    pub image_src: usize,
    pub style_url: usize,
    pub anchor_href: usize,
    pub onclick_href: usize,
}

impl KindCounts {
    pub fn bump(&mut self, kind: ReferenceKind) {
        let slot = match kind {
            ReferenceKind::Link => &mut self.link,
            ReferenceKind::ScriptSrc => &mut self.script_src,
            ReferenceKind::ImageSrc => &mut self.image_src,
            ReferenceKind::StyleUrl => &mut self.style_url,
            ReferenceKind::AnchorHref => &mut self.anchor_href,
            ReferenceKind::OnclickHref => &mut self.onclick_href,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.link
            + self.script_src
            + self.image_src
            + self.style_url
            + self.anchor_href
            + self.onclick_href
    }
}

impl AddAssign<&KindCounts> for KindCounts {
    fn add_assign(&mut self, other: &KindCounts) {
        self.link += other.link;
        self.script_src += other.script_src;
        self.image_src += other.image_src;
        self.style_url += other.style_url;
        self.anchor_href += other.anchor_href;
        self.onclick_href += other.onclick_href;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub references_fixed: KindCounts,
    pub snippets_inserted: usize,
    pub snippets_replaced: usize,
    pub base_tags_removed: usize,
    pub legacy_blocks_removed: usize,
    pub blank_targets_secured: usize,
    pub parent_segments_stripped: usize,
    pub root_escapes: usize,
}

impl Counters {
    pub fn is_empty(&self) -> bool {
        *self == Counters::default()
    }
}

impl AddAssign<&Counters> for Counters {
    fn add_assign(&mut self, other: &Counters) {
        self.references_fixed += &other.references_fixed;
        self.snippets_inserted += other.snippets_inserted;
        self.snippets_replaced += other.snippets_replaced;
        self.base_tags_removed += other.base_tags_removed;
        self.legacy_blocks_removed += other.legacy_blocks_removed;
        self.blank_targets_secured += other.blank_targets_secured;
        self.parent_segments_stripped += other.parent_segments_stripped;
        self.root_escapes += other.root_escapes;
    }
}

/// A reference that was left untouched because it could not be normalized
/// with confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedReference {
    pub kind: ReferenceKind,
    pub value: String,
    pub reason: String,
}

/// A document in the corpus, addressed both relative to the corpus root and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DocumentRef {
    pub relative: PathBuf,
    pub absolute: PathBuf,
}

impl DocumentRef {
    pub fn new(root: &Path, relative: impl Into<PathBuf>) -> Self {
        let relative = relative.into();
        let absolute = root.join(&relative);
        Self { relative, absolute }
    }

    /// Number of directories between the corpus root and the document.
    pub fn depth(&self) -> usize {
        self.relative.components().count().saturating_sub(1)
    }

    /// Stylesheets get their `url(...)` references rewritten and nothing else.
    pub fn is_stylesheet(&self) -> bool {
        self.relative
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("css"))
            .unwrap_or(false)
    }

    /// Sibling backup file: `index.html` -> `index.html.bak`.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .absolute
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".bak");
        self.absolute.with_file_name(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchStatus {
    Patched,
    WouldPatch,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformResult {
    pub document: PathBuf,
    pub status: PatchStatus,
    pub changed: bool,
    pub counters: Counters,
    pub flagged: Vec<FlaggedReference>,
    pub backup_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevertStatus {
    Reverted,
    WouldRevert,
    AlreadyOriginal,
    NoBackup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Operation {
    Patch,
    Revert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum DocumentOutcome {
    Patch(TransformResult),
    Revert {
        document: PathBuf,
        status: RevertStatus,
    },
}
