//! Startup configuration and backend selection for the pixelgate image service.
//!
//! [`initialize`] reads a [`Config`], resolves the configured key-value store
//! and blob storages through their registries, and returns a fully wired
//! [`AppState`], or the error of the first initializer that failed.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod initializers;
pub mod kvstore;
pub mod models;
pub mod registry;
pub mod reporting;
pub mod state;
pub mod storage;
pub mod utils;

pub use config::{Config, ConfigMap};
pub use error::{InitError, PipelineError};
pub use initializers::{Pipeline, Registries, initialize};
pub use state::{AppState, Shard};
