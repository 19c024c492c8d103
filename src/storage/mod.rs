//! Archive blob storage behind a capability trait.
//!
//! Two implementations: local disk for development and single-box deploys,
//! a remote HTTP blob store for hosted deploys. Which one runs is decided
//! once at startup from configuration; a reference string is only ever
//! meaningful to the backend that produced it.

mod blob;
mod local;

pub use blob::BlobStorage;
pub use local::LocalStorage;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage i/o failure")]
    Io(#[from] std::io::Error),
    #[error("blob request failed")]
    Http(#[from] reqwest::Error),
    #[error("blob store responded with status {0}")]
    UnexpectedStatus(u16),
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persists the bytes and returns the reference to fetch them back.
    async fn store(&self, id: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// `Ok(None)` when the reference does not resolve to a blob; errors are
    /// reserved for backend faults.
    async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Best-effort removal. Failures are logged and swallowed: an orphaned
    /// blob is a cleanup concern, not a correctness one.
    async fn delete(&self, reference: &str);
}
