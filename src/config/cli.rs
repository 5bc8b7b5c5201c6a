use crate::config::toml_config::TomlConfig;
use crate::config::RunConfig;
use crate::domain::model::{DeploymentMode, Operation};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "rootfix")]
#[command(about = "Rewrite document references for a local root or a hosted sub-path")]
pub struct CliConfig {
    #[arg(value_enum, default_value_t = Operation::Patch)]
    pub operation: Operation,

    #[arg(long, help = "Corpus root directory")]
    pub root: Option<PathBuf>,

    #[arg(long, help = "Hosted sub-path, e.g. /app/")]
    pub hosted_base: Option<String>,

    #[arg(long, value_enum)]
    pub mode: Option<DeploymentMode>,

    #[arg(long, help = "Compute the report without touching any file")]
    pub dry_run: bool,

    #[arg(short, long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, value_delimiter = ',', help = "Extra directory names to skip")]
    pub exclude: Vec<String>,

    #[arg(long, value_delimiter = ',', help = "Document extensions (default html,htm,css)")]
    pub extensions: Vec<String>,

    #[arg(long, help = "Documents processed concurrently")]
    pub jobs: Option<usize>,

    #[arg(long, help = "Write the report as JSON to this path")]
    pub report_json: Option<PathBuf>,

    #[arg(long, help = "Append a run summary to this log file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, help = "Leave target=\"_blank\" links without rel=noopener")]
    pub no_secure_links: bool,

    #[arg(long, help = "Leave onclick location assignments untouched")]
    pub no_onclick: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// Defaults, then the TOML file if one was given, then explicit flags.
    pub fn resolve(&self) -> Result<RunConfig> {
        let mut config = RunConfig::default();
        if let Some(path) = &self.config {
            TomlConfig::from_file(path)?.apply_to(&mut config);
        }
        self.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_to(&self, config: &mut RunConfig) {
        config.operation = self.operation;
        config.dry_run = self.dry_run;
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(base) = &self.hosted_base {
            config.hosted_base = Some(base.clone());
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if !self.extensions.is_empty() {
            config.extensions = self.extensions.clone();
        }
        config.exclude(self.exclude.iter().cloned());
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if self.report_json.is_some() {
            config.report_json = self.report_json.clone();
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file.clone();
        }
        if self.no_secure_links {
            config.secure_blank_targets = false;
        }
        if self.no_onclick {
            config.rewrite_onclick = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_parse() {
        let cli = CliConfig::parse_from([
            "rootfix",
            "revert",
            "--root",
            "site",
            "--hosted-base",
            "/app/",
            "--mode",
            "local",
            "--dry-run",
            "--exclude",
            "vendor,tmp",
            "--jobs",
            "4",
        ]);
        assert_eq!(cli.operation, Operation::Revert);
        assert_eq!(cli.mode, Some(DeploymentMode::Local));
        assert_eq!(cli.exclude, vec!["vendor".to_string(), "tmp".to_string()]);
        assert_eq!(cli.log_format, LogFormat::Text);

        let config = cli.resolve().unwrap();
        assert_eq!(config.root, PathBuf::from("site"));
        assert!(config.dry_run);
        assert_eq!(config.jobs, 4);
        assert!(config.exclude_dirs.contains(&"tmp".to_string()));
    }

    #[test]
    fn test_operation_defaults_to_patch() {
        let cli = CliConfig::parse_from(["rootfix", "--hosted-base", "docs"]);
        assert_eq!(cli.operation, Operation::Patch);
        let config = cli.resolve().unwrap();
        assert_eq!(config.mode, DeploymentMode::Hosted);
        assert!(config.secure_blank_targets);
    }

    #[test]
    fn test_flags_override_toml() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"[deployment]\nmode = \"local\"\nhosted_base = \"/from-file/\"\n\n[run]\njobs = 8\n",
        )
        .unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let cli = CliConfig::parse_from([
            "rootfix",
            "--config",
            path.as_str(),
            "--hosted-base",
            "/from-flag/",
            "--no-secure-links",
        ]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.hosted_base.as_deref(), Some("/from-flag/"));
        assert_eq!(config.mode, DeploymentMode::Local);
        assert_eq!(config.jobs, 8);
        assert!(!config.secure_blank_targets);
    }

    #[test]
    fn test_missing_hosted_base_fails_validation() {
        let cli = CliConfig::parse_from(["rootfix"]);
        let err = cli.resolve().unwrap_err();
        assert!(err.is_fatal());
    }
}
