//! Key-value store capability
//!
//! Metadata and lookup cache shared by request handlers. Keys arrive already
//! namespaced with the configured prefix (see `AppState::kv_key`).

pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use crate::error::KvStoreError;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

pub type KvStoreHandle = Arc<dyn KvStore>;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvStoreError>;

    async fn set(&self, key: &str, value: Bytes) -> Result<(), KvStoreError>;

    async fn delete(&self, key: &str) -> Result<(), KvStoreError>;

    /// Backend type identifier this store was built from.
    fn kind(&self) -> &'static str;
}
