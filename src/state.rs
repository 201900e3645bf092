use serde::Serialize;

use crate::{
    engine::Engine,
    error::InitError,
    kvstore::KvStoreHandle,
    reporting::ErrorReporter,
    storage::StorageHandle,
};

pub const DEFAULT_SHARD_WIDTH: usize = 2;
pub const DEFAULT_SHARD_DEPTH: usize = 2;

/// How cache keys are split into nested path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shard {
    pub width: usize,
    pub depth: usize,
}

impl Default for Shard {
    fn default() -> Self {
        Self {
            width: DEFAULT_SHARD_WIDTH,
            depth: DEFAULT_SHARD_DEPTH,
        }
    }
}

/// Fully wired application, shared read-only across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub source_storage: StorageHandle,

    /// Same instance as `source_storage` when no usable destination is configured.
    pub dest_storage: StorageHandle,

    pub kv_store: KvStoreHandle,

    /// Prepended to every kv-store key.
    pub key_prefix: String,

    pub shard: Shard,
    pub secret_key: String,
    pub reporter: ErrorReporter,
    pub enable_upload: bool,
    pub enable_delete: bool,
}

impl AppState {
    pub fn kv_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Whether derived images are written back to the storage they are read from.
    pub fn shares_storage(&self) -> bool {
        std::sync::Arc::ptr_eq(&self.source_storage, &self.dest_storage)
    }
}

/// Write target of the initializer pipeline. Fields fill in as steps succeed.
#[derive(Default)]
pub struct AppStateBuilder {
    pub engine: Option<Engine>,
    pub source_storage: Option<StorageHandle>,
    pub dest_storage: Option<StorageHandle>,
    pub kv_store: Option<KvStoreHandle>,
    pub key_prefix: String,
    pub shard: Option<Shard>,
    pub secret_key: String,
    pub reporter: Option<ErrorReporter>,
    pub enable_upload: bool,
    pub enable_delete: bool,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Result<AppState, InitError> {
        Ok(AppState {
            engine: self.engine.ok_or(InitError::IncompleteState("engine"))?,
            source_storage: self
                .source_storage
                .ok_or(InitError::IncompleteState("source storage"))?,
            dest_storage: self
                .dest_storage
                .ok_or(InitError::IncompleteState("destination storage"))?,
            kv_store: self.kv_store.ok_or(InitError::IncompleteState("kvstore"))?,
            key_prefix: self.key_prefix,
            shard: self.shard.ok_or(InitError::IncompleteState("shard policy"))?,
            secret_key: self.secret_key,
            reporter: self
                .reporter
                .ok_or(InitError::IncompleteState("error reporter"))?,
            enable_upload: self.enable_upload,
            enable_delete: self.enable_delete,
        })
    }
}
