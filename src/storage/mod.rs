// Submodules for local file system storage and S3 storage
pub mod local;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use crate::error::StorageError;
pub use local::FileSystemStorage;
pub use s3::S3Storage;

/// Shared handle to a blob storage. Source and destination may point at the same instance.
pub type StorageHandle = Arc<dyn Storage>;

// Async blob storage capability
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `content` at `path`, replacing any existing blob.
    async fn put(&self, path: &str, content: Bytes) -> Result<(), StorageError>;

    /// Read the blob stored at `path`.
    async fn get(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Remove the blob at `path`. Removing a missing blob is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Public URL of `path`, for storages served over HTTP.
    fn url(&self, path: &str) -> Option<String>;

    /// Backend type identifier this storage was built from.
    fn kind(&self) -> &'static str;
}
