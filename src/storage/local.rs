use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{fs, io::AsyncWriteExt};

use super::{Storage, StorageError, StorageHandle};
use crate::{config::ConfigMap, error::InitError, utils::join_path};

// Local filesystem storage
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    location: PathBuf,        // Root directory holding every blob
    base_url: Option<String>, // Set for `http+fs`
}

impl FileSystemStorage {
    /// Creates a storage rooted at `location`, creating the directory if needed.
    pub async fn new(location: impl AsRef<Path>, base_url: Option<String>) -> Result<Self, InitError> {
        let location = location.as_ref();
        let kind = if base_url.is_some() { "http+fs" } else { "fs" };

        fs::create_dir_all(location)
            .await
            .map_err(|e| InitError::backend(kind, format!("cannot create {}: {}", location.display(), e)))?;

        tracing::info!("File system storage rooted at {}", location.display());

        Ok(Self {
            location: location.to_path_buf(),
            base_url,
        })
    }

    /// Builds from a `storage.*` section; `location` is the root, `path` is accepted as an alias.
    pub async fn from_params(params: &ConfigMap, base_url: Option<String>) -> Result<Self, InitError> {
        let kind = if base_url.is_some() { "http+fs" } else { "fs" };
        let location = params
            .get("location")
            .or_else(|| params.get("path"))
            .filter(|l| !l.is_empty())
            .ok_or_else(|| InitError::backend(kind, "missing location"))?;

        Self::new(location, base_url).await
    }

    /// Returns the full path of a blob relative to the root directory
    fn full_path(&self, path: &str) -> PathBuf {
        self.location.join(path.trim_start_matches('/'))
    }
}

pub async fn build(params: ConfigMap) -> Result<StorageHandle, InitError> {
    let storage = FileSystemStorage::from_params(&params, None).await?;
    Ok(Arc::new(storage))
}

pub async fn build_http(params: ConfigMap) -> Result<StorageHandle, InitError> {
    let base_url = params
        .get("base_url")
        .filter(|u| !u.is_empty())
        .cloned()
        .ok_or_else(|| InitError::backend("http+fs", "missing base_url"))?;
    let storage = FileSystemStorage::from_params(&params, Some(base_url)).await?;
    Ok(Arc::new(storage))
}

#[async_trait]
impl Storage for FileSystemStorage {
    async fn put(&self, path: &str, content: Bytes) -> Result<(), StorageError> {
        let full_path = self.full_path(path);

        // Ensure parent directories exist
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&content).await?;
        file.flush().await?;

        tracing::debug!("Saved file at {:?}", full_path);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let full_path = self.full_path(path);

        match fs::read(&full_path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.full_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.full_path(path)).await?)
    }

    fn url(&self, path: &str) -> Option<String> {
        self.base_url.as_deref().map(|base| join_path(base, path))
    }

    fn kind(&self) -> &'static str {
        if self.base_url.is_some() { "http+fs" } else { "fs" }
    }
}
