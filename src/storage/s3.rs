use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_credential_types::Credentials;
use aws_sdk_s3::{Client, primitives::ByteStream};
use aws_types::region::Region;
use bytes::Bytes;
use tracing::info;
use validator::Validate;

use crate::{
    config::ConfigMap,
    error::InitError,
    storage::{Storage, StorageError, StorageHandle},
    utils::join_path,
};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Parameters of an `s3` / `http+s3` section.
#[derive(Debug, Clone, Default, Validate)]
pub struct S3Params {
    #[validate(length(min = 1, message = "bucket_name is required"))]
    pub bucket_name: String,
    #[validate(length(min = 1))]
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    #[validate(url)]
    pub endpoint: Option<String>,
    pub location: String,
    #[validate(url)]
    pub base_url: Option<String>,
}

impl S3Params {
    pub fn from_map(params: &ConfigMap) -> Self {
        let non_empty = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();

        Self {
            bucket_name: non_empty("bucket_name").unwrap_or_default(),
            region: non_empty("region").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key_id: non_empty("access_key_id"),
            secret_access_key: non_empty("secret_access_key"),
            endpoint: non_empty("endpoint"),
            location: non_empty("location").unwrap_or_default(),
            base_url: non_empty("base_url"),
        }
    }
}

// AWS S3 Storage backend
#[derive(Clone)]
pub struct S3Storage {
    client: Client,           // AWS S3 client
    bucket: String,           // S3 bucket name
    location: String,         // Key prefix inside the bucket
    base_url: Option<String>, // Set for `http+s3`
}

impl S3Storage {
    /// Build the S3 client. No request is sent until the storage is used.
    pub async fn new(params: S3Params) -> Result<Self, InitError> {
        let kind = if params.base_url.is_some() { "http+s3" } else { "s3" };
        params.validate().map_err(|e| InitError::backend(kind, e))?;

        let region_provider = RegionProviderChain::first_try(Region::new(params.region.clone()))
            .or_default_provider()
            .or_else(Region::new(DEFAULT_REGION));

        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);

        match (&params.access_key_id, &params.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(access_key, secret_key, None, None, "pixelgate");
                aws_config_builder = aws_config_builder.credentials_provider(credentials);
            }
            (None, None) => {}
            _ => {
                return Err(InitError::backend(
                    kind,
                    "access_key_id and secret_access_key must be set together",
                ));
            }
        }

        // Custom endpoint (e.g., for MinIO)
        if let Some(endpoint) = &params.endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(params.endpoint.is_some()) // Required for MinIO
                .build(),
        );

        info!("S3 storage using bucket {} in {}", params.bucket_name, params.region);

        Ok(Self {
            client,
            bucket: params.bucket_name,
            location: params.location,
            base_url: params.base_url,
        })
    }

    fn key(&self, path: &str) -> String {
        join_path(&self.location, path)
    }
}

pub async fn build(params: ConfigMap) -> Result<StorageHandle, InitError> {
    let mut params = S3Params::from_map(&params);
    params.base_url = None;
    Ok(Arc::new(S3Storage::new(params).await?))
}

pub async fn build_http(params: ConfigMap) -> Result<StorageHandle, InitError> {
    let params = S3Params::from_map(&params);
    if params.base_url.is_none() {
        return Err(InitError::backend("http+s3", "missing base_url"));
    }
    Ok(Arc::new(S3Storage::new(params).await?))
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(&self, path: &str, content: Bytes) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| StorageError::UploadError(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let key = self.key(path);
        tracing::debug!("S3 GET key = {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("S3 GET {} failed: {}", key, e);
                StorageError::NotFound(path.to_string())
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::IoError(std::io::Error::other(e.to_string())))?;

        Ok(data.into_bytes())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .send()
            .await
            .map_err(|e| StorageError::DeleteError(e.to_string()))?;

        info!("File deleted from s3: {}", path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::IoError(std::io::Error::other(e.to_string()))),
        }
    }

    fn url(&self, path: &str) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|base| join_path(base, &self.key(path)))
    }

    fn kind(&self) -> &'static str {
        if self.base_url.is_some() { "http+s3" } else { "s3" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn params_default_region_and_skip_empty_values() {
        let params = S3Params::from_map(&map(&[("bucket_name", "images"), ("endpoint", "")]));

        assert_eq!(params.bucket_name, "images");
        assert_eq!(params.region, DEFAULT_REGION);
        assert_eq!(params.endpoint, None);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn params_require_bucket() {
        let params = S3Params::from_map(&ConfigMap::new());
        assert!(params.validate().is_err());
    }

    #[test]
    fn params_reject_malformed_endpoint() {
        let params = S3Params::from_map(&map(&[("bucket_name", "images"), ("endpoint", "not a url")]));
        assert!(params.validate().is_err());
    }

    #[tokio::test]
    async fn build_without_bucket_fails() {
        let err = build(map(&[("region", "eu-west-1")])).await.err().unwrap();
        assert!(matches!(err, InitError::BackendConstruction { ref backend, .. } if backend == "s3"));
    }

    #[tokio::test]
    async fn build_rejects_half_credentials() {
        let err = build(map(&[("bucket_name", "images"), ("access_key_id", "AKIA")]))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("secret_access_key"));
    }

    #[tokio::test]
    async fn http_variant_requires_base_url() {
        let err = build_http(map(&[("bucket_name", "images")])).await.err().unwrap();
        assert!(matches!(err, InitError::BackendConstruction { ref backend, .. } if backend == "http+s3"));
    }

    #[tokio::test]
    async fn http_variant_builds_public_urls() {
        let storage = build_http(map(&[
            ("bucket_name", "images"),
            ("access_key_id", "minioadmin"),
            ("secret_access_key", "minioadmin"),
            ("endpoint", "http://127.0.0.1:9000"),
            ("location", "cache"),
            ("base_url", "https://cdn.example.com"),
        ]))
        .await
        .unwrap();

        assert_eq!(storage.kind(), "http+s3");
        assert_eq!(
            storage.url("a/b.png").as_deref(),
            Some("https://cdn.example.com/cache/a/b.png")
        );
    }
}
