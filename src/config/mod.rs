#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::storage::LocalDocumentStore;
use crate::core::injector::{DEFAULT_LEGACY_MARKERS, DEFAULT_MARKER};
use crate::core::orchestrator::BatchOptions;
use crate::core::rewriter::{RewriteOptions, Rewriter};
use crate::core::scanner::ScanOptions;
use crate::domain::model::{Deployment, DeploymentMode, HostedBase, Operation};
use crate::utils::error::{Result, RootfixError};
use crate::utils::validation::{
    validate_identifier, validate_non_empty_list, validate_path, validate_positive_number,
    Validate,
};
use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_EXTENSIONS: [&str; 3] = ["html", "htm", "css"];
pub const DEFAULT_EXCLUDED_DIRS: [&str; 8] = [
    ".git",
    "node_modules",
    "dist",
    ".vite",
    ".cache",
    "coverage",
    ".github",
    "target",
];

/// Everything a run needs, resolved from defaults, the TOML file and flags.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub operation: Operation,
    pub dry_run: bool,
    pub root: PathBuf,
    pub mode: DeploymentMode,
    pub hosted_base: Option<String>,
    pub extensions: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub marker: String,
    pub legacy_markers: Vec<String>,
    pub secure_blank_targets: bool,
    pub rewrite_onclick: bool,
    pub jobs: usize,
    pub report_json: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            operation: Operation::Patch,
            dry_run: false,
            root: PathBuf::from("."),
            mode: DeploymentMode::Hosted,
            hosted_base: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            marker: DEFAULT_MARKER.to_string(),
            legacy_markers: DEFAULT_LEGACY_MARKERS.iter().map(|s| s.to_string()).collect(),
            secure_blank_targets: true,
            rewrite_onclick: true,
            jobs: 1,
            report_json: None,
            log_file: None,
        }
    }
}

impl RunConfig {
    pub fn hosted_base(&self) -> Result<HostedBase> {
        match self.hosted_base.as_deref() {
            Some(raw) => HostedBase::parse(raw),
            None => Err(RootfixError::ConfigError {
                message: "a hosted base is required (--hosted-base or [deployment] hosted_base)"
                    .to_string(),
            }),
        }
    }

    pub fn deployment(&self) -> Result<Deployment> {
        Ok(Deployment::new(self.mode, self.hosted_base()?))
    }

    pub fn rewriter(&self) -> Result<Rewriter> {
        let options = RewriteOptions {
            scan: ScanOptions {
                rewrite_onclick: self.rewrite_onclick,
            },
            secure_blank_targets: self.secure_blank_targets,
        };
        Rewriter::new(self.deployment()?, &self.marker, &self.legacy_markers, options)
    }

    pub fn store(&self) -> LocalDocumentStore {
        LocalDocumentStore::new(&self.root, &self.extensions, &self.exclude_dirs)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            operation: self.operation,
            dry_run: self.dry_run,
            jobs: self.jobs,
        }
    }

    /// Add legacy snippet identities, keeping the list free of duplicates.
    pub fn add_legacy_markers(&mut self, markers: impl IntoIterator<Item = String>) {
        for marker in markers {
            let marker = marker.trim().to_string();
            if !marker.is_empty() && !self.legacy_markers.contains(&marker) {
                self.legacy_markers.push(marker);
            }
        }
    }

    /// Add excluded directory names, keeping the list free of duplicates.
    pub fn exclude(&mut self, names: impl IntoIterator<Item = String>) {
        for name in names {
            let name = name.trim().trim_matches('/').to_string();
            if !name.is_empty() && !self.exclude_dirs.contains(&name) {
                self.exclude_dirs.push(name);
            }
        }
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        validate_path("root", &self.root.to_string_lossy())?;
        self.hosted_base()?;
        validate_non_empty_list("extensions", &self.extensions)?;
        validate_positive_number("jobs", self.jobs, 1)?;
        validate_identifier("snippet.marker", &self.marker)?;
        for legacy in &self.legacy_markers {
            validate_identifier("snippet.legacy_markers", legacy)?;
        }
        if let Some(path) = &self.report_json {
            validate_path("report.json", &path.to_string_lossy())?;
        }
        if let Some(path) = &self.log_file {
            validate_path("report.log", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_needs_hosted_base() {
        let config = RunConfig::default();
        assert!(config.validate().is_err());

        let config = RunConfig {
            hosted_base: Some("app".to_string()),
            ..RunConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.deployment().unwrap().root(), "/app/");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let base = RunConfig {
            hosted_base: Some("/app/".to_string()),
            ..RunConfig::default()
        };
        assert!(RunConfig { jobs: 0, ..base.clone() }.validate().is_err());
        assert!(RunConfig { extensions: vec![], ..base.clone() }.validate().is_err());
        assert!(RunConfig { marker: "bad marker".to_string(), ..base.clone() }.validate().is_err());
        assert!(RunConfig { hosted_base: Some("/".to_string()), ..base }.validate().is_err());
    }

    #[test]
    fn test_default_config_removes_previous_snippet_generation() {
        let config = RunConfig {
            hosted_base: Some("/asefweb/".to_string()),
            ..RunConfig::default()
        };
        let html = "<html>\n<head>\n<!-- ASEF_BASE_FIX START -->\n<script>\n(function(){ var b = document.createElement('base'); b.href = '/asefweb/'; document.head.prepend(b); })();\n</script>\n<!-- ASEF_BASE_FIX END -->\n<title>t</title>\n</head>\n</html>\n";
        let out = config.rewriter().unwrap().rewrite(html, 0);
        assert!(!out.text.contains("ASEF_BASE_FIX"));
        assert_eq!(out.counters.legacy_blocks_removed, 1);
        assert_eq!(out.text.matches("<!-- ROOTFIX_BASE START -->").count(), 1);
        assert!(out.text.contains("<title>t</title>"));
    }

    #[test]
    fn test_exclude_deduplicates() {
        let mut config = RunConfig::default();
        let before = config.exclude_dirs.len();
        config.exclude(vec!["vendor/".to_string(), ".git".to_string(), "".to_string()]);
        assert_eq!(config.exclude_dirs.len(), before + 1);
        assert!(config.exclude_dirs.contains(&"vendor".to_string()));
    }
}
