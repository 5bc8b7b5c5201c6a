use crate::core::rewriter::Rewriter;
use crate::domain::model::{DocumentOutcome, DocumentRef, PatchStatus, RevertStatus, TransformResult};
use crate::domain::ports::{DocumentJob, DocumentStore};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Applies the rewrite to one document and owns its backup discipline.
pub struct DocumentTransaction<S: DocumentStore> {
    store: Arc<S>,
    rewriter: Arc<Rewriter>,
}

impl<S: DocumentStore> DocumentTransaction<S> {
    pub fn new(store: Arc<S>, rewriter: Arc<Rewriter>) -> Self {
        Self { store, rewriter }
    }

    /// Rewrite one document. The content is read in full before anything is
    /// written; the backup holds the content from before the first run that
    /// changed the document and is never replaced afterwards.
    pub async fn apply(&self, doc: &DocumentRef, dry_run: bool) -> Result<TransformResult> {
        let original = self.store.read(doc).await?;
        let rewritten = self.rewriter.rewrite_document(doc, &original);

        let mut result = TransformResult {
            document: doc.relative.clone(),
            status: PatchStatus::Unchanged,
            changed: false,
            counters: rewritten.counters,
            flagged: rewritten.flagged,
            backup_path: None,
        };

        if rewritten.text == original {
            tracing::debug!("Unchanged: {}", doc.relative.display());
            return Ok(result);
        }

        result.changed = true;
        if dry_run {
            tracing::debug!("Would patch: {}", doc.relative.display());
            result.status = PatchStatus::WouldPatch;
            return Ok(result);
        }

        result.backup_path = self.store.create_backup(doc, &original).await?;
        self.store.write(doc, &rewritten.text).await?;
        result.status = PatchStatus::Patched;

        tracing::debug!(
            "Patched: {} ({} references fixed)",
            doc.relative.display(),
            result.counters.references_fixed.total()
        );
        Ok(result)
    }

    /// Restore the document from its backup. A missing backup is a status, not an error.
    pub async fn revert(&self, doc: &DocumentRef, dry_run: bool) -> Result<RevertStatus> {
        let Some(backup) = self.store.read_backup(doc).await? else {
            tracing::debug!("No backup for {}", doc.relative.display());
            return Ok(RevertStatus::NoBackup);
        };

        // An unreadable document is still restored from its backup.
        if let Ok(current) = self.store.read(doc).await {
            if current == backup {
                return Ok(RevertStatus::AlreadyOriginal);
            }
        }

        if dry_run {
            return Ok(RevertStatus::WouldRevert);
        }

        self.store.write(doc, &backup).await?;
        tracing::debug!("Reverted: {}", doc.relative.display());
        Ok(RevertStatus::Reverted)
    }
}

pub struct PatchJob<S: DocumentStore> {
    transaction: Arc<DocumentTransaction<S>>,
    dry_run: bool,
}

impl<S: DocumentStore> PatchJob<S> {
    pub fn new(transaction: Arc<DocumentTransaction<S>>, dry_run: bool) -> Self {
        Self {
            transaction,
            dry_run,
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentJob for PatchJob<S> {
    async fn run(&self, doc: &DocumentRef) -> Result<DocumentOutcome> {
        let result = self.transaction.apply(doc, self.dry_run).await?;
        Ok(DocumentOutcome::Patch(result))
    }
}

pub struct RevertJob<S: DocumentStore> {
    transaction: Arc<DocumentTransaction<S>>,
    dry_run: bool,
}

impl<S: DocumentStore> RevertJob<S> {
    pub fn new(transaction: Arc<DocumentTransaction<S>>, dry_run: bool) -> Self {
        Self {
            transaction,
            dry_run,
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentJob for RevertJob<S> {
    async fn run(&self, doc: &DocumentRef) -> Result<DocumentOutcome> {
        let status = self.transaction.revert(doc, self.dry_run).await?;
        Ok(DocumentOutcome::Revert {
            document: doc.relative.clone(),
            status,
        })
    }
}
