use std::io;
use std::path::PathBuf;

use async_trait::async_trait;

use super::{StorageBackend, StorageError};

pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // Older records carried file:// references; accept both forms.
    fn reference_path(reference: &str) -> &str {
        reference.strip_prefix("file://").unwrap_or(reference)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn store(&self, id: &str, bytes: &[u8]) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!("{id}-{}.zip", chrono::Utc::now().timestamp_millis());
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        log::debug!("stored archive at {}", path.display());
        Ok(path.to_string_lossy().into_owned())
    }

    async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(Self::reference_path(reference)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, reference: &str) {
        if let Err(e) = tokio::fs::remove_file(Self::reference_path(reference)).await {
            log::warn!("could not delete archive {reference}: {e}");
        } else {
            log::debug!("deleted archive {reference}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_fetch_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let reference = storage.store("tool-1", b"zip bytes").await.unwrap();
        assert!(reference.ends_with(".zip"));
        assert_eq!(
            storage.fetch(&reference).await.unwrap().as_deref(),
            Some(b"zip bytes".as_slice())
        );

        storage.delete(&reference).await;
        assert!(storage.fetch(&reference).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_accepts_file_url_references() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let reference = storage.store("tool-1", b"data").await.unwrap();
        let url = format!("file://{reference}");
        assert!(storage.fetch(&url).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_references_are_absent_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("apps"));
        assert!(storage.fetch("/nope/missing.zip").await.unwrap().is_none());
        // Deleting something that is not there must not panic or surface
        storage.delete("/nope/missing.zip").await;
    }
}
