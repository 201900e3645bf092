use std::collections::HashMap;
use std::env;
use std::path::Path;

use dotenvy::dotenv;
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{error::InitError, utils::{parse_flag, scalar_to_string}};

/// Environment variable naming the TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "PIXELGATE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "pixelgate.toml";
pub const ENV_PREFIX: &str = "PIXELGATE_";

/// Flat string-keyed view of one configuration section, as handed to backend factories.
pub type ConfigMap = HashMap<String, String>;

/// Configuration tree addressed by dotted keys such as `storage.src.type`.
///
/// Missing keys read as the zero value of the requested type.
#[derive(Debug, Clone, Default)]
pub struct Config {
    root: Value,
}

impl Config {
    /// Load configuration from `.env`, the TOML file and `PIXELGATE_*` environment variables.
    pub fn load() -> Result<Self, InitError> {
        // Load environment variables from `.env` file (if it exists)
        dotenv().ok();

        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path), env::vars())
    }

    /// Merge the TOML file at `path` (skipped when missing) with prefixed variables from `vars`.
    ///
    /// Variables override the file. `PIXELGATE_STORAGE__SRC__TYPE=fs` sets `storage.src.type`.
    /// Values stay the exact strings given, so `PIXELGATE_SECRET_KEY=0123` keeps its leading zero;
    /// the typed getters parse them on read.
    pub fn load_from(
        path: &Path,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, InitError> {
        let mut figment = Figment::new();

        if path.exists() {
            info!("Loading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        } else {
            warn!("Configuration file {} not found, using environment only", path.display());
        }

        figment = figment.merge(Serialized::defaults(env_overrides(ENV_PREFIX, vars)));

        Self::from_figment(figment)
    }

    /// Extract a configuration tree from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, InitError> {
        let root: Value = figment
            .extract()
            .map_err(|e| InitError::ConfigLoad(Box::new(e)))?;
        Ok(Self { root })
    }

    /// Parse a TOML document directly.
    pub fn from_toml_str(document: &str) -> Result<Self, InitError> {
        Self::from_figment(Figment::from(Toml::string(document)))
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.root, |node, segment| node.as_object()?.get(segment))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some_and(|v| !v.is_null())
    }

    pub fn get_string(&self, key: &str) -> String {
        self.lookup(key)
            .and_then(scalar_to_string)
            .unwrap_or_default()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        match self.lookup(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Bool(b)) => i64::from(*b),
            _ => 0,
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        match self.lookup(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => parse_flag(s),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        }
    }

    /// Project the section at `namespace` into a flat map of strings.
    ///
    /// A missing section is an empty map. Nested tables or arrays cannot be
    /// flattened and fail with [`InitError::ConfigurationProjection`].
    pub fn get_string_map(&self, namespace: &str) -> Result<ConfigMap, InitError> {
        let table = match self.lookup(namespace) {
            None | Some(Value::Null) => return Ok(ConfigMap::new()),
            Some(Value::Object(table)) => table,
            Some(_) => {
                return Err(InitError::ConfigurationProjection {
                    namespace: namespace.to_string(),
                    reason: "expected a table".to_string(),
                });
            }
        };

        let mut map = ConfigMap::with_capacity(table.len());
        for (key, value) in table {
            if value.is_null() {
                continue;
            }
            let rendered =
                scalar_to_string(value).ok_or_else(|| InitError::ConfigurationProjection {
                    namespace: namespace.to_string(),
                    reason: format!("key {:?} holds a nested value", key),
                })?;
            map.insert(key.clone(), rendered);
        }

        Ok(map)
    }
}

/// Nest prefixed variables into a table of strings, splitting names on `__`.
fn env_overrides(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Value {
    let mut root = Map::new();

    for (name, value) in vars {
        if name == CONFIG_PATH_ENV {
            continue;
        }
        let Some(key) = name.strip_prefix(prefix) else {
            continue;
        };
        let segments: Vec<String> = key
            .split("__")
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();
        insert_path(&mut root, &segments, value);
    }

    Value::Object(root)
}

fn insert_path(table: &mut Map<String, Value>, segments: &[String], value: String) {
    match segments {
        [] => {}
        [leaf] => {
            table.insert(leaf.clone(), Value::String(value));
        }
        [head, rest @ ..] => {
            let entry = table
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            // A scalar set earlier at this level gives way to the nested table
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Config {
        Config::from_value(json!({
            "kvstore": {"type": "redis", "port": 6379, "prefix": "img:", "cluster": false},
            "options": {"quality": "80", "enable_upload": "yes", "enable_delete": 0},
            "storage": {"src": {"type": "fs", "nested": {"a": 1}}},
            "secret_key": "s3cr3t"
        }))
    }

    #[test]
    fn typed_getters_coerce_scalars() {
        let config = sample();

        assert_eq!(config.get_string("kvstore.type"), "redis");
        assert_eq!(config.get_string("kvstore.port"), "6379");
        assert_eq!(config.get_int("kvstore.port"), 6379);
        assert_eq!(config.get_int("options.quality"), 80);
        assert!(config.get_bool("options.enable_upload"));
        assert!(!config.get_bool("options.enable_delete"));
        assert_eq!(config.get_string("secret_key"), "s3cr3t");
    }

    #[test]
    fn missing_keys_read_as_zero_values() {
        let config = sample();

        assert_eq!(config.get_string("storage.dst.type"), "");
        assert_eq!(config.get_int("shard.width"), 0);
        assert!(!config.get_bool("nope"));
        assert!(!config.contains("storage.dst"));
        assert!(config.contains("storage.src"));
    }

    #[test]
    fn string_map_flattens_scalars() {
        let map = sample().get_string_map("kvstore").unwrap();

        assert_eq!(map.len(), 4);
        assert_eq!(map["type"], "redis");
        assert_eq!(map["port"], "6379");
        assert_eq!(map["prefix"], "img:");
        assert_eq!(map["cluster"], "false");
    }

    #[test]
    fn string_map_of_missing_section_is_empty() {
        assert!(sample().get_string_map("sentry.tags").unwrap().is_empty());
    }

    #[test]
    fn string_map_rejects_nested_values() {
        let err = sample().get_string_map("storage.src").unwrap_err();

        match err {
            InitError::ConfigurationProjection { namespace, reason } => {
                assert_eq!(namespace, "storage.src");
                assert!(reason.contains("nested"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn string_map_rejects_scalar_namespace() {
        let err = sample().get_string_map("secret_key").unwrap_err();
        assert!(matches!(err, InitError::ConfigurationProjection { .. }));
    }

    #[test]
    fn toml_documents_are_parsed() {
        let config = Config::from_toml_str(
            r#"
            secret_key = "abc"

            [shard]
            width = 3

            [storage.src]
            type = "fs"
            location = "/var/images"
            "#,
        )
        .unwrap();

        assert_eq!(config.get_int("shard.width"), 3);
        assert_eq!(config.get_string("storage.src.location"), "/var/images");
        assert_eq!(config.get_string("secret_key"), "abc");
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn environment_overrides_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixelgate.toml");
        std::fs::write(
            &path,
            "secret_key = \"from-file\"\n[kvstore]\ntype = \"redis\"\nport = 6379\n",
        )
        .unwrap();

        let config = Config::load_from(
            &path,
            vars(&[
                ("PIXELGATE_KVSTORE__TYPE", "cache"),
                ("PIXELGATE_SHARD__WIDTH", "3"),
                ("PIXELGATE_OPTIONS__ENABLE_UPLOAD", "true"),
                ("OTHER_SHARD__DEPTH", "9"),
            ]),
        )
        .unwrap();

        assert_eq!(config.get_string("kvstore.type"), "cache");
        assert_eq!(config.get_int("kvstore.port"), 6379);
        assert_eq!(config.get_string("secret_key"), "from-file");
        assert_eq!(config.get_int("shard.width"), 3);
        assert_eq!(config.get_int("shard.depth"), 0);
        assert!(config.get_bool("options.enable_upload"));
        assert!(!config.contains("config"));
    }

    #[test]
    fn environment_strings_are_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(
            &dir.path().join("missing.toml"),
            vars(&[
                ("PIXELGATE_SECRET_KEY", "0123"),
                ("PIXELGATE_KVSTORE__PASSWORD", "1e5"),
                ("PIXELGATE_CONFIG", "/etc/pixelgate.toml"),
            ]),
        )
        .unwrap();

        assert_eq!(config.get_string("secret_key"), "0123");
        assert_eq!(config.get_string_map("kvstore").unwrap()["password"], "1e5");
        assert!(!config.contains("config"));
    }

    #[test]
    fn malformed_toml_is_a_load_error() {
        let err = Config::from_toml_str("[storage\ntype = ").unwrap_err();
        assert!(matches!(err, InitError::ConfigLoad(_)));
    }
}
