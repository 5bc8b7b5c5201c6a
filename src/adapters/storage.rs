use crate::domain::model::DocumentRef;
use crate::domain::ports::DocumentStore;
use crate::utils::error::{Result, RootfixError};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Corpus on the local filesystem with `.bak` siblings as backups.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
    extensions: Vec<String>,
    excluded_dirs: HashSet<String>,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String], excluded_dirs: &[String]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            excluded_dirs: excluded_dirs.iter().cloned().collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    fn is_excluded(&self, dir_name: &str) -> bool {
        self.excluded_dirs.contains(dir_name)
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.rootfix-tmp", name))
}

impl DocumentStore for LocalDocumentStore {
    async fn list_documents(&self) -> Result<Vec<DocumentRef>> {
        let unavailable = |reason: String| RootfixError::CorpusUnavailable {
            root: self.root.clone(),
            reason,
        };

        let meta = fs::metadata(&self.root)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !meta.is_dir() {
            return Err(unavailable("not a directory".to_string()));
        }
        // An unreadable root is fatal; below it an unreadable directory is only skipped.
        let root_entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let mut documents = Vec::new();
        let mut pending: Vec<PathBuf> = Vec::new();
        let mut next = Some((PathBuf::new(), root_entries));
        loop {
            let (relative_dir, mut entries) = match next.take() {
                Some(listing) => listing,
                None => {
                    let Some(relative_dir) = pending.pop() else {
                        break;
                    };
                    let dir = self.root.join(&relative_dir);
                    match fs::read_dir(&dir).await {
                        Ok(entries) => (relative_dir, entries),
                        Err(e) => {
                            tracing::warn!("⚠️ Cannot list {}: {}", dir.display(), e);
                            continue;
                        }
                    }
                }
            };
            let dir = self.root.join(&relative_dir);

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("⚠️ Error while listing {}: {}", dir.display(), e);
                        break;
                    }
                };
                let name = entry.file_name().to_string_lossy().into_owned();
                let relative = relative_dir.join(&name);
                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!("⚠️ Cannot stat {}: {}", relative.display(), e);
                        continue;
                    }
                };

                if file_type.is_dir() {
                    if self.is_excluded(&name) {
                        tracing::debug!("Excluding directory {}", relative.display());
                    } else {
                        pending.push(relative);
                    }
                } else if file_type.is_file() && self.is_document(&relative) {
                    documents.push(DocumentRef::new(&self.root, relative));
                }
            }
        }

        documents.sort();
        Ok(documents)
    }

    async fn read(&self, doc: &DocumentRef) -> Result<String> {
        let read_failure = |source: std::io::Error| RootfixError::ReadFailure {
            path: doc.relative.clone(),
            source,
        };
        let bytes = fs::read(&doc.absolute).await.map_err(read_failure)?;
        String::from_utf8(bytes)
            .map_err(|e| read_failure(std::io::Error::new(ErrorKind::InvalidData, e)))
    }

    async fn write(&self, doc: &DocumentRef, content: &str) -> Result<()> {
        let write_failure = |source: std::io::Error| RootfixError::WriteFailure {
            path: doc.relative.clone(),
            source,
        };

        // Write beside the target and rename over it so a failure leaves the old content.
        let tmp = temp_path(&doc.absolute);
        if let Err(e) = fs::write(&tmp, content.as_bytes()).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_failure(e));
        }
        if let Ok(meta) = fs::metadata(&doc.absolute).await {
            let _ = fs::set_permissions(&tmp, meta.permissions()).await;
        }
        if let Err(e) = fs::rename(&tmp, &doc.absolute).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_failure(e));
        }
        Ok(())
    }

    async fn create_backup(&self, doc: &DocumentRef, original: &str) -> Result<Option<PathBuf>> {
        let path = doc.backup_path();
        let backup_failure = |source: std::io::Error| RootfixError::BackupFailure {
            path: path.clone(),
            source,
        };

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(backup_failure(e)),
        };

        let written = async {
            file.write_all(original.as_bytes()).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(backup_failure(e));
        }

        tracing::debug!("Backup created: {}", path.display());
        Ok(Some(path))
    }

    async fn read_backup(&self, doc: &DocumentRef) -> Result<Option<String>> {
        let path = doc.backup_path();
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(RootfixError::ReadFailure { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LocalDocumentStore {
        LocalDocumentStore::new(
            dir.path(),
            &["html".to_string(), "htm".to_string()],
            &["node_modules".to_string(), ".git".to_string()],
        )
    }

    #[tokio::test]
    async fn test_lists_documents_and_skips_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("pages/team")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>x</p>").unwrap();
        std::fs::write(dir.path().join("index.html.bak"), "<p>x</p>").unwrap();
        std::fs::write(dir.path().join("pages/team/about.HTM"), "<p>x</p>").unwrap();
        std::fs::write(dir.path().join("pages/style.css"), "a{}").unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/readme.html"), "<p>x</p>").unwrap();

        let docs = store(&dir).list_documents().await.unwrap();
        let relative: Vec<PathBuf> = docs.iter().map(|d| d.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![PathBuf::from("index.html"), PathBuf::from("pages/team/about.HTM")]
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = LocalDocumentStore::new(dir.path().join("nope"), &["html".to_string()], &[]);
        let err = missing.list_documents().await.unwrap_err();
        assert!(matches!(err, RootfixError::CorpusUnavailable { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_backup_is_created_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "v1").unwrap();
        let s = store(&dir);
        let doc = DocumentRef::new(dir.path(), "index.html");

        let first = s.create_backup(&doc, "v1").await.unwrap();
        assert_eq!(first, Some(dir.path().join("index.html.bak")));
        let second = s.create_backup(&doc, "v2").await.unwrap();
        assert_eq!(second, None);
        assert_eq!(s.read_backup(&doc).await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_write_replaces_content_without_leftovers() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "old").unwrap();
        let s = store(&dir);
        let doc = DocumentRef::new(dir.path(), "index.html");

        s.write(&doc, "new").await.unwrap();
        assert_eq!(s.read(&doc).await.unwrap(), "new");
        assert!(!dir.path().join(".index.html.rootfix-tmp").exists());
    }

    #[tokio::test]
    async fn test_non_utf8_document_is_a_read_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("latin1.html"), [0x3c, 0x70, 0xe9, 0x3e]).unwrap();
        let doc = DocumentRef::new(dir.path(), "latin1.html");
        let err = store(&dir).read(&doc).await.unwrap_err();
        assert!(matches!(err, RootfixError::ReadFailure { .. }));
    }
}
