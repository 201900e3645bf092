//! Redis-backed key-value store
//!
//! The connection is established and verified with `PING` at construction,
//! bounded by `connect_timeout`, so an unreachable server fails startup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{
    AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo,
    aio::MultiplexedConnection,
};
use tokio::time::timeout;
use validator::Validate;

use super::{KvStore, KvStoreError, KvStoreHandle};
use crate::{config::ConfigMap, error::InitError};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u32 = 6379;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Validate)]
pub struct RedisParams {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u32,
    pub password: Option<String>,
    pub db: u32,
    #[validate(range(min = 1))]
    pub connect_timeout_secs: u64,
}

impl RedisParams {
    pub fn from_map(params: &ConfigMap) -> Result<Self, InitError> {
        let value = |key: &str| params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let parsed = Self {
            host: value("host").unwrap_or(DEFAULT_HOST).to_string(),
            port: parse_number(value("port"), "port", DEFAULT_PORT)?,
            password: value("password").map(str::to_string),
            db: parse_number(value("db"), "db", 0)?,
            connect_timeout_secs: parse_number(
                value("connect_timeout"),
                "connect_timeout",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        };

        parsed.validate().map_err(|e| InitError::backend("redis", e))?;
        Ok(parsed)
    }

    /// Connection settings for the client. The password is passed as-is, never through a URL.
    pub fn connection_info(&self) -> Result<ConnectionInfo, InitError> {
        let port = u16::try_from(self.port)
            .map_err(|_| InitError::backend("redis", format!("invalid port {}", self.port)))?;

        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), port),
            redis: RedisConnectionInfo {
                db: i64::from(self.db),
                password: self.password.clone(),
                ..Default::default()
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(raw: Option<&str>, key: &str, default: T) -> Result<T, InitError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|e| InitError::backend("redis", format!("invalid {} {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(params: &RedisParams) -> Result<Self, InitError> {
        tracing::info!("Connecting to redis at {}:{} (db {})", params.host, params.port, params.db);

        let client = Client::open(params.connection_info()?).map_err(|e| InitError::backend("redis", e))?;

        // Connect and PING share one deadline
        let handshake = async {
            let mut conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| InitError::backend("redis", e))?;

            let pong: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| InitError::backend("redis", format!("ping failed: {}", e)))?;

            if pong != "PONG" {
                return Err(InitError::backend("redis", format!("unexpected ping reply {:?}", pong)));
            }
            Ok(conn)
        };

        let conn = timeout(Duration::from_secs(params.connect_timeout_secs), handshake)
            .await
            .map_err(|_| {
                InitError::backend(
                    "redis",
                    format!(
                        "no reply from {}:{} within {}s",
                        params.host, params.port, params.connect_timeout_secs
                    ),
                )
            })??;

        tracing::info!("Redis connection established");
        Ok(Self { conn })
    }
}

pub async fn build(params: ConfigMap) -> Result<KvStoreHandle, InitError> {
    let params = RedisParams::from_map(&params)?;
    Ok(Arc::new(RedisStore::connect(&params).await?))
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvStoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), KvStoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value.as_ref()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvStoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}
