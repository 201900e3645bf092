//! Parameter registries
//!
//! Maps a backend type identifier (the `type` key of a configuration section)
//! to the factory that builds that backend from the section's flat string map.
//! Registries are filled before the pipeline is built and only read afterwards.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{
    config::ConfigMap,
    error::InitError,
    kvstore::{self, KvStoreHandle},
    storage::{self, StorageHandle},
};

/// Builds a backend from its configuration section.
pub type Factory<T> = Arc<dyn Fn(ConfigMap) -> BoxFuture<'static, Result<T, InitError>> + Send + Sync>;

pub type KvStoreRegistry = Registry<KvStoreHandle>;
pub type StorageRegistry = Registry<StorageHandle>;

/// Lookup table from backend type identifier to factory.
pub struct Registry<T> {
    name: &'static str,
    factories: HashMap<String, Factory<T>>,
}

impl<T> Registry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            factories: HashMap::new(),
        }
    }

    /// Register a factory under `type_id`.
    ///
    /// Identifiers are unique: registering one twice fails with
    /// [`InitError::DuplicateBackendType`] and leaves the first factory in place.
    pub fn register<F, Fut>(&mut self, type_id: impl Into<String>, factory: F) -> Result<(), InitError>
    where
        F: Fn(ConfigMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, InitError>> + Send + 'static,
    {
        let type_id = type_id.into();
        if self.factories.contains_key(&type_id) {
            return Err(InitError::DuplicateBackendType {
                registry: self.name,
                type_id,
            });
        }
        self.factories.insert(type_id, wrap(factory));
        Ok(())
    }

    /// Look up the factory for `type_id`. There is no default backend.
    pub fn resolve(&self, type_id: &str) -> Result<&Factory<T>, InitError> {
        self.factories
            .get(type_id)
            .ok_or_else(|| InitError::UnregisteredBackendType {
                registry: self.name,
                type_id: type_id.to_string(),
            })
    }

    /// Registered identifiers, sorted.
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    // Built-in tables are assembled from distinct literals.
    fn with<F, Fut>(mut self, type_id: &'static str, factory: F) -> Self
    where
        F: Fn(ConfigMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, InitError>> + Send + 'static,
    {
        self.factories.insert(type_id.to_string(), wrap(factory));
        self
    }
}

fn wrap<T, F, Fut>(factory: F) -> Factory<T>
where
    F: Fn(ConfigMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, InitError>> + Send + 'static,
{
    Arc::new(move |params| Box::pin(factory(params)))
}

/// Key-value stores shipped with the service: `redis` and the in-process `cache`.
pub fn kv_stores() -> KvStoreRegistry {
    Registry::new("kvstore")
        .with("redis", kvstore::redis::build)
        .with("cache", kvstore::memory::build)
}

/// Blob storages shipped with the service.
pub fn storages() -> StorageRegistry {
    Registry::new("storage")
        .with("http+s3", storage::s3::build_http)
        .with("s3", storage::s3::build)
        .with("http+fs", storage::local::build_http)
        .with("fs", storage::local::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_identifiers_resolve() {
        let kv = kv_stores();
        for id in ["redis", "cache"] {
            assert!(kv.resolve(id).is_ok(), "{id} should be registered");
        }

        let storages = storages();
        assert_eq!(storages.type_ids(), vec!["fs", "http+fs", "http+s3", "s3"]);
        for id in storages.type_ids() {
            assert!(storages.resolve(id).is_ok());
        }
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let err = kv_stores().resolve("memcached").err().unwrap();

        match err {
            InitError::UnregisteredBackendType { registry, type_id } => {
                assert_eq!(registry, "kvstore");
                assert_eq!(type_id, "memcached");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lookup_is_exact() {
        let storages = storages();
        assert!(storages.resolve("FS").is_err());
        assert!(storages.resolve("http").is_err());
        assert!(storages.resolve("").is_err());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry: Registry<u32> = Registry::new("numbers");
        registry.register("one", |_| async { Ok(1) }).unwrap();

        let err = registry.register("one", |_| async { Ok(2) }).unwrap_err();
        assert!(matches!(err, InitError::DuplicateBackendType { registry: "numbers", .. }));
    }

    #[tokio::test]
    async fn factories_receive_their_section() {
        let mut registry: Registry<String> = Registry::new("echo");
        registry
            .register("echo", |params: ConfigMap| async move {
                params
                    .get("value")
                    .cloned()
                    .ok_or_else(|| InitError::backend("echo", "missing value"))
            })
            .unwrap();

        let factory = registry.resolve("echo").unwrap();
        let params = ConfigMap::from([("value".to_string(), "hello".to_string())]);

        assert_eq!(factory(params).await.unwrap(), "hello");
        assert!(factory(ConfigMap::new()).await.is_err());
    }
}
