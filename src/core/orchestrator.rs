use crate::core::rewriter::Rewriter;
use crate::core::transaction::{DocumentTransaction, PatchJob, RevertJob};
use crate::domain::model::{DocumentOutcome, DocumentRef, Operation};
use crate::domain::ports::{DocumentJob, DocumentStore};
use crate::domain::report::Report;
use crate::utils::error::{Result, RootfixError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub operation: Operation,
    pub dry_run: bool,
    pub jobs: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            operation: Operation::Patch,
            dry_run: false,
            jobs: 1,
        }
    }
}

/// Drives one transaction per document and folds the outcomes into a [`Report`].
pub struct BatchOrchestrator<S: DocumentStore> {
    store: Arc<S>,
    rewriter: Arc<Rewriter>,
    options: BatchOptions,
}

impl<S: DocumentStore> BatchOrchestrator<S> {
    pub fn new(store: S, rewriter: Rewriter, options: BatchOptions) -> Self {
        Self {
            store: Arc::new(store),
            rewriter: Arc::new(rewriter),
            options,
        }
    }

    pub async fn run(&self) -> Result<Report> {
        let deployment = self.rewriter.deployment();
        let mut report = Report::new(
            self.options.operation,
            deployment.mode,
            deployment.root(),
            self.options.dry_run,
        );

        let documents = self.store.list_documents().await?;
        tracing::info!(
            "Found {} documents ({:?}, root {}{})",
            documents.len(),
            self.options.operation,
            deployment.root(),
            if self.options.dry_run { ", dry run" } else { "" }
        );

        let transaction = Arc::new(DocumentTransaction::new(
            self.store.clone(),
            self.rewriter.clone(),
        ));
        let job: Arc<dyn DocumentJob> = match self.options.operation {
            Operation::Patch => Arc::new(PatchJob::new(transaction, self.options.dry_run)),
            Operation::Revert => Arc::new(RevertJob::new(transaction, self.options.dry_run)),
        };

        if self.options.jobs <= 1 {
            for doc in documents {
                let outcome = job.run(&doc).await;
                absorb(&mut report, &doc, outcome);
            }
        } else {
            // Workers only hand back outcomes; the report is merged here, in corpus order.
            let semaphore = Arc::new(Semaphore::new(self.options.jobs));
            let handles: Vec<(DocumentRef, JoinHandle<Result<DocumentOutcome>>)> = documents
                .into_iter()
                .map(|doc| {
                    let job = job.clone();
                    let semaphore = semaphore.clone();
                    let task_doc = doc.clone();
                    let handle = tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await.map_err(|e| {
                            RootfixError::TaskFailure {
                                message: e.to_string(),
                            }
                        })?;
                        job.run(&task_doc).await
                    });
                    (doc, handle)
                })
                .collect();

            for (doc, handle) in handles {
                let outcome = handle.await.unwrap_or_else(|e| {
                    Err(RootfixError::TaskFailure {
                        message: e.to_string(),
                    })
                });
                absorb(&mut report, &doc, outcome);
            }
        }

        report.finish();
        tracing::info!(
            "Done: {} scanned, {} changed, {} reverted, {} failed",
            report.documents_scanned,
            report.changed.len(),
            report.reverted.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

fn absorb(report: &mut Report, doc: &DocumentRef, outcome: Result<DocumentOutcome>) {
    match outcome {
        Ok(outcome) => report.record(outcome),
        Err(e) => {
            tracing::warn!("⚠️ Skipping {}: {}", doc.relative.display(), e);
            report.record_failure(&doc.relative, &e);
        }
    }
}
