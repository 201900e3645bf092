use axum::{Json, extract::State};

use crate::{
    models::{HealthResponse, StatusResponse},
    state::AppState,
};

/// Liveness check. Reaching it means initialization succeeded.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

/// Summary of the backends and options selected at startup.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let engine = &state.engine;

    Json(StatusResponse {
        source_storage: state.source_storage.kind(),
        dest_storage: state.dest_storage.kind(),
        shared_storage: state.shares_storage(),
        kv_store: state.kv_store.kind(),
        key_prefix: state.key_prefix.clone(),
        shard: state.shard,
        format: engine.format().unwrap_or(engine.default_format()).to_string(),
        quality: engine.quality(),
        enable_upload: state.enable_upload,
        enable_delete: state.enable_delete,
        error_reporting: state.reporter.is_enabled(),
    })
}
