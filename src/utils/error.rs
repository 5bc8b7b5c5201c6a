use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RootfixError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create backup {path}: {source}")]
    BackupFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corpus root {root} is not usable: {reason}")]
    CorpusUnavailable { root: PathBuf, reason: String },

    #[error("Malformed reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {message}")]
    ConfigParseError { message: String },

    #[error("Worker task failed: {message}")]
    TaskFailure { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RootfixError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RootfixError::MalformedReference { .. } => ErrorSeverity::Low,
            RootfixError::ReadFailure { .. }
            | RootfixError::WriteFailure { .. }
            | RootfixError::BackupFailure { .. }
            | RootfixError::TaskFailure { .. } => ErrorSeverity::Medium,
            RootfixError::ConfigError { .. }
            | RootfixError::InvalidConfigValueError { .. }
            | RootfixError::ConfigParseError { .. }
            | RootfixError::SerializationError(_) => ErrorSeverity::High,
            RootfixError::IoError(_) | RootfixError::CorpusUnavailable { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    /// True for errors that end the whole run rather than a single document.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RootfixError::CorpusUnavailable { .. }
                | RootfixError::ConfigError { .. }
                | RootfixError::InvalidConfigValueError { .. }
                | RootfixError::ConfigParseError { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RootfixError::ReadFailure { .. } => "Check file permissions and encoding (UTF-8 expected)",
            RootfixError::WriteFailure { .. } | RootfixError::BackupFailure { .. } => {
                "Check that the document and its directory are writable"
            }
            RootfixError::CorpusUnavailable { .. } => {
                "Pass an existing, readable directory with --root"
            }
            RootfixError::MalformedReference { .. } => {
                "Fix the reference by hand; it was left untouched"
            }
            RootfixError::ConfigError { .. }
            | RootfixError::InvalidConfigValueError { .. }
            | RootfixError::ConfigParseError { .. } => {
                "Review the command-line flags and the TOML configuration file"
            }
            RootfixError::SerializationError(_) => "Report a bug with the failing document",
            RootfixError::TaskFailure { .. } => "Re-run with --jobs 1 to isolate the document",
            RootfixError::IoError(_) => "Check the filesystem and retry",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RootfixError::CorpusUnavailable { root, .. } => {
                format!("Cannot open the document folder {}", root.display())
            }
            RootfixError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    /// Short machine-friendly label used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RootfixError::ReadFailure { .. } => "read-failure",
            RootfixError::WriteFailure { .. } => "write-failure",
            RootfixError::BackupFailure { .. } => "backup-failure",
            RootfixError::MalformedReference { .. } => "malformed-reference",
            RootfixError::CorpusUnavailable { .. } => "corpus-unavailable",
            RootfixError::TaskFailure { .. } => "task-failure",
            RootfixError::SerializationError(_) => "serialization",
            RootfixError::IoError(_) => "io",
            RootfixError::ConfigError { .. }
            | RootfixError::InvalidConfigValueError { .. }
            | RootfixError::ConfigParseError { .. } => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, RootfixError>;
