use serde::{Deserialize, Serialize};

use crate::state::Shard;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub source_storage: &'static str,
    pub dest_storage: &'static str,
    pub shared_storage: bool,
    pub kv_store: &'static str,
    pub key_prefix: String,
    pub shard: Shard,
    pub format: String,
    pub quality: i64,
    pub enable_upload: bool,
    pub enable_delete: bool,
    pub error_reporting: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}
