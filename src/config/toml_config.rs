use crate::config::RunConfig;
use crate::domain::model::DeploymentMode;
use crate::utils::error::{Result, RootfixError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub corpus: Option<CorpusConfig>,
    pub deployment: Option<DeploymentConfig>,
    pub snippet: Option<SnippetConfig>,
    pub rewrite: Option<RewriteConfig>,
    pub report: Option<ReportConfig>,
    pub run: Option<RunSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub root: Option<PathBuf>,
    pub extensions: Option<Vec<String>>,
    /// Added to the built-in exclusions.
    pub exclude_dirs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub mode: Option<DeploymentMode>,
    pub hosted_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetConfig {
    pub marker: Option<String>,
    /// Added to the built-in legacy identities.
    pub legacy_markers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    pub secure_blank_targets: Option<bool>,
    pub rewrite_onclick: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub json: Option<PathBuf>,
    pub log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    pub jobs: Option<usize>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| RootfixError::ConfigParseError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| RootfixError::ConfigParseError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${HOSTED_BASE})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// Layer the file's settings over `config`; unset keys keep their current value.
    pub fn apply_to(&self, config: &mut RunConfig) {
        if let Some(corpus) = &self.corpus {
            if let Some(root) = &corpus.root {
                config.root = root.clone();
            }
            if let Some(extensions) = &corpus.extensions {
                config.extensions = extensions.clone();
            }
            if let Some(excluded) = &corpus.exclude_dirs {
                config.exclude(excluded.iter().cloned());
            }
        }
        if let Some(deployment) = &self.deployment {
            if let Some(mode) = deployment.mode {
                config.mode = mode;
            }
            if let Some(base) = &deployment.hosted_base {
                config.hosted_base = Some(base.clone());
            }
        }
        if let Some(snippet) = &self.snippet {
            if let Some(marker) = &snippet.marker {
                config.marker = marker.clone();
            }
            if let Some(legacy) = &snippet.legacy_markers {
                config.add_legacy_markers(legacy.iter().cloned());
            }
        }
        if let Some(rewrite) = &self.rewrite {
            if let Some(secure) = rewrite.secure_blank_targets {
                config.secure_blank_targets = secure;
            }
            if let Some(onclick) = rewrite.rewrite_onclick {
                config.rewrite_onclick = onclick;
            }
        }
        if let Some(report) = &self.report {
            if report.json.is_some() {
                config.report_json = report.json.clone();
            }
            if report.log.is_some() {
                config.log_file = report.log.clone();
            }
        }
        if let Some(jobs) = self.run.as_ref().and_then(|r| r.jobs) {
            config.jobs = jobs;
        }
    }
}
