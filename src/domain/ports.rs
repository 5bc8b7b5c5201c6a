use crate::domain::model::{DocumentOutcome, DocumentRef};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Access to the document corpus and the sibling backups.
pub trait DocumentStore: Send + Sync + 'static {
    /// All documents in the corpus, sorted by relative path. Failing to list
    /// the corpus root is the only error fatal to a run.
    fn list_documents(&self) -> impl std::future::Future<Output = Result<Vec<DocumentRef>>> + Send;

    fn read(&self, doc: &DocumentRef) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Replace the document content. A failed write must leave the previous
    /// content in place.
    fn write(
        &self,
        doc: &DocumentRef,
        content: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Create the backup only if none exists yet, as one atomic step.
    /// Returns the backup path when it was created, `None` when one was already there.
    fn create_backup(
        &self,
        doc: &DocumentRef,
        original: &str,
    ) -> impl std::future::Future<Output = Result<Option<PathBuf>>> + Send;

    fn read_backup(
        &self,
        doc: &DocumentRef,
    ) -> impl std::future::Future<Output = Result<Option<String>>> + Send;
}

/// One unit of per-document work driven by the orchestrator.
#[async_trait]
pub trait DocumentJob: Send + Sync {
    async fn run(&self, doc: &DocumentRef) -> Result<DocumentOutcome>;
}
