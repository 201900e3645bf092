use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;

use super::{KvStore, KvStoreError, KvStoreHandle};
use crate::{config::ConfigMap, error::InitError};

pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// In-process store backed by a bounded Moka cache. Contents do not survive a restart.
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, Bytes>,
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        tracing::info!("In-process kvstore holding up to {} entries", max_entries);
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    pub fn from_params(params: &ConfigMap) -> Result<Self, InitError> {
        let max_entries = match params.get("max_entries").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| InitError::backend("cache", format!("invalid max_entries {:?}: {}", raw, e)))?,
            None => DEFAULT_MAX_ENTRIES,
        };

        Ok(Self::new(max_entries))
    }
}

pub async fn build(params: ConfigMap) -> Result<KvStoreHandle, InitError> {
    Ok(Arc::new(MemoryStore::from_params(&params)?))
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvStoreError> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), KvStoreError> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvStoreError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "cache"
    }
}
