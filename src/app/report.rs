use crate::domain::model::Operation;
use crate::domain::report::Report;
use crate::utils::error::{Result, RootfixError};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Multi-line, human readable summary of a run.
pub fn render_summary(report: &Report) -> String {
    let mut out = String::new();
    let verb = match (report.operation, report.dry_run) {
        (Operation::Patch, false) => "Patched",
        (Operation::Patch, true) => "Would patch",
        (Operation::Revert, false) => "Reverted",
        (Operation::Revert, true) => "Would revert",
    };
    let _ = writeln!(
        out,
        "{:?} run for root {} ({} documents scanned)",
        report.mode, report.root, report.documents_scanned
    );

    match report.operation {
        Operation::Patch => {
            let _ = writeln!(out, "{}: {}", verb, report.changed.len());
            for path in &report.changed {
                let _ = writeln!(out, "  {}", path.display());
            }
            let _ = writeln!(out, "Unchanged: {}", report.unchanged);

            let fixed = &report.totals.references_fixed;
            let _ = writeln!(
                out,
                "References fixed: {} (link {}, script {}, image {}, style {}, anchor {}, onclick {})",
                fixed.total(),
                fixed.link,
                fixed.script_src,
                fixed.image_src,
                fixed.style_url,
                fixed.anchor_href,
                fixed.onclick_href
            );
            let totals = &report.totals;
            let _ = writeln!(
                out,
                "Snippets: {} inserted, {} replaced; base tags removed: {}; legacy blocks removed: {}",
                totals.snippets_inserted,
                totals.snippets_replaced,
                totals.base_tags_removed,
                totals.legacy_blocks_removed
            );
            if totals.blank_targets_secured > 0 {
                let _ = writeln!(out, "Blank-target links secured: {}", totals.blank_targets_secured);
            }
            if totals.parent_segments_stripped > 0 {
                let _ = writeln!(
                    out,
                    "Parent segments stripped: {} ({} escaping the corpus root)",
                    totals.parent_segments_stripped, totals.root_escapes
                );
            }
            for unresolved in &report.unresolved {
                let _ = writeln!(out, "Unresolved in {}:", unresolved.path.display());
                for flagged in &unresolved.references {
                    let _ = writeln!(
                        out,
                        "  [{}] {} ({})",
                        flagged.kind.as_str(),
                        flagged.value,
                        flagged.reason
                    );
                }
            }
        }
        Operation::Revert => {
            let _ = writeln!(out, "{}: {}", verb, report.reverted.len());
            for path in &report.reverted {
                let _ = writeln!(out, "  {}", path.display());
            }
            let _ = writeln!(out, "Already original: {}", report.unchanged);
            let _ = writeln!(out, "Without backup: {}", report.no_backup.len());
        }
    }

    if report.has_failures() {
        let _ = writeln!(out, "Failed: {}", report.failed.len());
        for failed in &report.failed {
            let _ = writeln!(
                out,
                "  {} [{}] {}",
                failed.path.display(),
                failed.kind,
                failed.message
            );
        }
    }
    out
}

pub async fn write_json(report: &Report, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)
        .await
        .map_err(|source| RootfixError::WriteFailure {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!("📁 Report saved to: {}", path.display());
    Ok(())
}

/// Append a timestamped entry to a plain-text log, creating it on first use.
pub async fn append_log(report: &Report, path: &Path) -> Result<()> {
    let timestamp: DateTime<Local> = report.finished_at.unwrap_or(report.started_at).into();
    let entry = format!(
        "=== {} {:?}{} ===\n{}\n",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        report.operation,
        if report.dry_run { " (dry run)" } else { "" },
        render_summary(report)
    );

    let write_failure = |source: std::io::Error| RootfixError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(write_failure)?;
    file.write_all(entry.as_bytes()).await.map_err(write_failure)?;
    file.flush().await.map_err(write_failure)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        Counters, DeploymentMode, DocumentOutcome, FlaggedReference, PatchStatus, ReferenceKind,
        RevertStatus, TransformResult,
    };
    use crate::utils::error::RootfixError;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn patch_report() -> Report {
        let mut report = Report::new(Operation::Patch, DeploymentMode::Hosted, "/app/", false);
        let mut counters = Counters::default();
        counters.references_fixed.bump(ReferenceKind::Link);
        counters.references_fixed.bump(ReferenceKind::ImageSrc);
        counters.snippets_inserted = 1;
        report.record(DocumentOutcome::Patch(TransformResult {
            document: PathBuf::from("index.html"),
            status: PatchStatus::Patched,
            changed: true,
            counters,
            flagged: vec![FlaggedReference {
                kind: ReferenceKind::ScriptSrc,
                value: "{{ bundle }}".to_string(),
                reason: "template placeholder".to_string(),
            }],
            backup_path: Some(PathBuf::from("index.html.bak")),
        }));
        report.record_failure(
            &PathBuf::from("broken.html"),
            &RootfixError::ReadFailure {
                path: PathBuf::from("broken.html"),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "not UTF-8"),
            },
        );
        report.finish();
        report
    }

    #[test]
    fn test_patch_summary_lists_changes_and_failures() {
        let summary = render_summary(&patch_report());
        assert!(summary.contains("Hosted run for root /app/ (2 documents scanned)"));
        assert!(summary.contains("Patched: 1\n  index.html"));
        assert!(summary.contains("References fixed: 2 (link 1, script 0, image 1"));
        assert!(summary.contains("Snippets: 1 inserted, 0 replaced"));
        assert!(summary.contains("[script-src] {{ bundle }} (template placeholder)"));
        assert!(summary.contains("Failed: 1\n  broken.html [read-failure]"));
    }

    #[test]
    fn test_revert_summary() {
        let mut report = Report::new(Operation::Revert, DeploymentMode::Local, "/", true);
        report.record(DocumentOutcome::Revert {
            document: PathBuf::from("a.html"),
            status: RevertStatus::WouldRevert,
        });
        report.record(DocumentOutcome::Revert {
            document: PathBuf::from("b.html"),
            status: RevertStatus::NoBackup,
        });
        report.finish();

        let summary = render_summary(&report);
        assert!(summary.contains("Would revert: 1\n  a.html"));
        assert!(summary.contains("Without backup: 1"));
        assert!(!summary.contains("Failed"));
    }

    #[tokio::test]
    async fn test_unwritable_report_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("no-such-dir").join("report.json");
        let err = write_json(&patch_report(), &missing).await.unwrap_err();
        assert!(matches!(err, RootfixError::WriteFailure { .. }));

        let err = append_log(&patch_report(), dir.path()).await.unwrap_err();
        assert!(matches!(err, RootfixError::WriteFailure { .. }));
    }

    #[tokio::test]
    async fn test_json_report_and_log_file() {
        let dir = TempDir::new().unwrap();
        let report = patch_report();

        let json_path = dir.path().join("report.json");
        write_json(&report, &json_path).await.unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["operation"], "patch");
        assert_eq!(value["mode"], "hosted");
        assert_eq!(value["changed"][0], "index.html");
        assert_eq!(value["totals"]["references_fixed"]["image-src"], 1);
        assert_eq!(value["failed"][0]["kind"], "read-failure");

        let log_path = dir.path().join("rootfix.log");
        append_log(&report, &log_path).await.unwrap();
        append_log(&report, &log_path).await.unwrap();
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(log.matches("=== ").count(), 2);
        assert!(log.contains("Patch ==="));
    }
}
