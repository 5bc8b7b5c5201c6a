use crate::domain::model::{
    Counters, DeploymentMode, DocumentOutcome, FlaggedReference, Operation, PatchStatus,
    RevertStatus,
};
use crate::utils::error::RootfixError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    pub path: PathBuf,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDocument {
    pub path: PathBuf,
    pub references: Vec<FlaggedReference>,
}

/// Aggregated outcome of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub operation: Operation,
    pub mode: DeploymentMode,
    pub root: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub documents_scanned: usize,
    pub totals: Counters,
    pub changed: Vec<PathBuf>,
    pub unchanged: usize,
    pub reverted: Vec<PathBuf>,
    pub no_backup: Vec<PathBuf>,
    pub unresolved: Vec<UnresolvedDocument>,
    pub failed: Vec<FailedDocument>,
}

impl Report {
    pub fn new(operation: Operation, mode: DeploymentMode, root: &str, dry_run: bool) -> Self {
        Self {
            operation,
            mode,
            root: root.to_string(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            documents_scanned: 0,
            totals: Counters::default(),
            changed: Vec::new(),
            unchanged: 0,
            reverted: Vec::new(),
            no_backup: Vec::new(),
            unresolved: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: DocumentOutcome) {
        self.documents_scanned += 1;
        match outcome {
            DocumentOutcome::Patch(result) => {
                self.totals += &result.counters;
                match result.status {
                    PatchStatus::Patched | PatchStatus::WouldPatch => {
                        self.changed.push(result.document.clone())
                    }
                    PatchStatus::Unchanged => self.unchanged += 1,
                }
                if !result.flagged.is_empty() {
                    self.unresolved.push(UnresolvedDocument {
                        path: result.document,
                        references: result.flagged,
                    });
                }
            }
            DocumentOutcome::Revert { document, status } => match status {
                RevertStatus::Reverted | RevertStatus::WouldRevert => self.reverted.push(document),
                RevertStatus::AlreadyOriginal => self.unchanged += 1,
                RevertStatus::NoBackup => self.no_backup.push(document),
            },
        }
    }

    pub fn record_failure(&mut self, path: &Path, error: &RootfixError) {
        self.documents_scanned += 1;
        self.failed.push(FailedDocument {
            path: path.to_path_buf(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    pub fn finish(&mut self) {
        self.changed.sort();
        self.reverted.sort();
        self.no_backup.sort();
        self.unresolved.sort_by(|a, b| a.path.cmp(&b.path));
        self.failed.sort_by(|a, b| a.path.cmp(&b.path));
        self.finished_at = Some(Utc::now());
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
