use thiserror::Error;

/// Errors raised while turning configuration into a wired application.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("{registry} backend type {type_id:?} is not registered")]
    UnregisteredBackendType {
        registry: &'static str,
        type_id: String,
    },

    #[error("{registry} backend type {type_id:?} is already registered")]
    DuplicateBackendType {
        registry: &'static str,
        type_id: String,
    },

    #[error("configuration under {namespace:?} is not a flat string map: {reason}")]
    ConfigurationProjection { namespace: String, reason: String },

    #[error("failed to construct {backend} backend: {reason}")]
    BackendConstruction { backend: String, reason: String },

    #[error("failed to construct error reporting client: {0}")]
    ReportingClientConstruction(String),

    #[error("application state is missing {0}")]
    IncompleteState(&'static str),

    #[error("failed to load configuration: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),
}

impl InitError {
    /// Shorthand used by backend factories to report a construction failure.
    pub fn backend(backend: impl Into<String>, reason: impl ToString) -> Self {
        InitError::BackendConstruction {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure of one initializer; remaining steps were not executed.
#[derive(Debug, Error)]
#[error("{step} initializer failed: {source}")]
pub struct PipelineError {
    pub step: &'static str,
    #[source]
    pub source: InitError,
}

// Blob storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Io Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Upload Error: {0}")]
    UploadError(String),

    #[error("Delete Error: {0}")]
    DeleteError(String),
}

// Key-value store errors
#[derive(Debug, Error)]
pub enum KvStoreError {
    #[error("Redis Error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Backend Error: {0}")]
    Backend(String),
}
