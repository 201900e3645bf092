//! Initializer pipeline
//!
//! Startup runs a fixed list of steps in order. Each step reads its own
//! configuration section and fills part of an [`AppStateBuilder`]. The first
//! failing step stops the pipeline; its error is returned unchanged together
//! with the step name, and the partly filled builder is never turned into an
//! [`AppState`].

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    config::Config,
    engine::Engine,
    error::{InitError, PipelineError},
    registry::{self, KvStoreRegistry, StorageRegistry},
    reporting::ErrorReporter,
    state::{AppState, AppStateBuilder, DEFAULT_SHARD_DEPTH, DEFAULT_SHARD_WIDTH, Shard},
    storage::StorageHandle,
};

/// Registries consulted by the steps that select backends.
pub struct Registries {
    pub kv_stores: KvStoreRegistry,
    pub storages: StorageRegistry,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            kv_stores: registry::kv_stores(),
            storages: registry::storages(),
        }
    }
}

/// Read-only inputs shared by every step.
pub struct InitContext<'a> {
    pub config: &'a Config,
    pub registries: &'a Registries,
}

#[async_trait]
pub trait Initializer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn initialize(&self, ctx: &InitContext<'_>, state: &mut AppStateBuilder) -> Result<(), InitError>;
}

/// Selects the key-value store named by `kvstore.type`.
pub struct KvStoreInitializer;

#[async_trait]
impl Initializer for KvStoreInitializer {
    fn name(&self) -> &'static str {
        "kvstore"
    }

    async fn initialize(&self, ctx: &InitContext<'_>, state: &mut AppStateBuilder) -> Result<(), InitError> {
        let type_id = ctx.config.get_string("kvstore.type");
        let factory = ctx.registries.kv_stores.resolve(&type_id)?;

        let params = ctx.config.get_string_map("kvstore")?;
        let prefix = params.get("prefix").cloned().unwrap_or_default();

        let store = factory(params).await?;
        info!("Using {} kvstore with prefix {:?}", type_id, prefix);

        state.key_prefix = prefix;
        state.kv_store = Some(store);
        Ok(())
    }
}

/// Selects the source and destination blob storages.
///
/// The destination falls back to the source instance whenever `storage.dst`
/// cannot be built, including when it is absent. Single-storage deployments
/// rely on this.
pub struct StorageInitializer;

impl StorageInitializer {
    async fn storage_from_config(ctx: &InitContext<'_>, key: &str) -> Result<StorageHandle, InitError> {
        let namespace = format!("storage.{}", key);
        let type_id = ctx.config.get_string(&format!("{}.type", namespace));

        let factory = ctx.registries.storages.resolve(&type_id)?;
        let params = ctx.config.get_string_map(&namespace)?;

        factory(params).await
    }
}

#[async_trait]
impl Initializer for StorageInitializer {
    fn name(&self) -> &'static str {
        "storage"
    }

    async fn initialize(&self, ctx: &InitContext<'_>, state: &mut AppStateBuilder) -> Result<(), InitError> {
        let source = Self::storage_from_config(ctx, "src").await?;
        info!("Using {} source storage", source.kind());

        let dest = match Self::storage_from_config(ctx, "dst").await {
            Ok(dest) => {
                info!("Using {} destination storage", dest.kind());
                dest
            }
            Err(e) => {
                if ctx.config.contains("storage.dst") {
                    warn!("Destination storage unavailable ({}), writing to source storage", e);
                } else {
                    info!("No destination storage configured, writing to source storage");
                }
                source.clone()
            }
        };

        state.source_storage = Some(source);
        state.dest_storage = Some(dest);
        Ok(())
    }
}

/// Reads `shard.width` and `shard.depth`; zero, negative or absent values use the defaults.
pub struct ShardInitializer;

fn shard_dimension(config: &Config, key: &str, default: usize) -> usize {
    match config.get_int(key) {
        0 => default,
        v if v < 0 => {
            warn!("{} is negative ({}), using {}", key, v, default);
            default
        }
        v => usize::try_from(v).unwrap_or(default),
    }
}

#[async_trait]
impl Initializer for ShardInitializer {
    fn name(&self) -> &'static str {
        "shard"
    }

    async fn initialize(&self, ctx: &InitContext<'_>, state: &mut AppStateBuilder) -> Result<(), InitError> {
        let shard = Shard {
            width: shard_dimension(ctx.config, "shard.width", DEFAULT_SHARD_WIDTH),
            depth: shard_dimension(ctx.config, "shard.depth", DEFAULT_SHARD_DEPTH),
        };
        info!("Shard policy width={} depth={}", shard.width, shard.depth);

        state.shard = Some(shard);
        Ok(())
    }
}

/// Builds the image engine and reads the secret key and feature flags.
/// Never fails: invalid values degrade to defaults inside [`Engine::new`].
pub struct BasicInitializer;

#[async_trait]
impl Initializer for BasicInitializer {
    fn name(&self) -> &'static str {
        "options"
    }

    async fn initialize(&self, ctx: &InitContext<'_>, state: &mut AppStateBuilder) -> Result<(), InitError> {
        let config = ctx.config;
        let engine = Engine::new(&config.get_string("options.format"), config.get_int("options.quality"));

        state.secret_key = config.get_string("secret_key");
        state.enable_upload = config.get_bool("options.enable_upload");
        state.enable_delete = config.get_bool("options.enable_delete");

        if state.secret_key.is_empty() {
            warn!("secret_key is empty, request signatures cannot be checked");
        }
        info!(
            "Engine format={} quality={} upload={} delete={}",
            engine.format().unwrap_or(engine.default_format()),
            engine.quality(),
            state.enable_upload,
            state.enable_delete
        );

        state.engine = Some(engine);
        Ok(())
    }
}

/// Builds the error-reporting client from `sentry.dsn` and `sentry.tags`.
pub struct SentryInitializer;

#[async_trait]
impl Initializer for SentryInitializer {
    fn name(&self) -> &'static str {
        "sentry"
    }

    async fn initialize(&self, ctx: &InitContext<'_>, state: &mut AppStateBuilder) -> Result<(), InitError> {
        let tags = ctx.config.get_string_map("sentry.tags")?;
        let reporter = ErrorReporter::new(&ctx.config.get_string("sentry.dsn"), tags)?;

        if reporter.is_enabled() {
            info!("Error reporting enabled");
        }

        state.reporter = Some(reporter);
        Ok(())
    }
}

/// Steps in execution order. The kv-store step comes first so later steps may rely on it.
pub fn default_initializers() -> Vec<Box<dyn Initializer>> {
    vec![
        Box::new(KvStoreInitializer),
        Box::new(StorageInitializer),
        Box::new(ShardInitializer),
        Box::new(BasicInitializer),
        Box::new(SentryInitializer),
    ]
}

pub struct Pipeline {
    registries: Registries,
    steps: Vec<Box<dyn Initializer>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Registries::default())
    }
}

impl Pipeline {
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            steps: default_initializers(),
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step against `state`, stopping at the first failure.
    ///
    /// On error `state` holds whatever earlier steps wrote and must not be served.
    pub async fn run(&self, config: &Config, state: &mut AppStateBuilder) -> Result<(), PipelineError> {
        let ctx = InitContext {
            config,
            registries: &self.registries,
        };

        for step in &self.steps {
            step.initialize(&ctx, state)
                .await
                .map_err(|source| PipelineError {
                    step: step.name(),
                    source,
                })?;
        }

        Ok(())
    }

    pub async fn initialize(&self, config: &Config) -> Result<AppState, PipelineError> {
        let mut state = AppStateBuilder::new();
        self.run(config, &mut state).await?;

        let state = state.build().map_err(|source| PipelineError {
            step: "finalize",
            source,
        })?;
        info!("Initialization complete");
        Ok(state)
    }
}

/// Build the application from `config` using the built-in backends.
pub async fn initialize(config: &Config) -> Result<AppState, PipelineError> {
    Pipeline::default().initialize(config).await
}
