use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use matchday_core::{StoreError, StructuredStore};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tracing::{debug, info};

/// Redis-backed structured store.
///
/// Uses a `ConnectionManager` so dropped connections are re-established
/// transparently; every command is bounded by `command_timeout`.
#[derive(Clone)]
pub struct RedisStructuredStore {
    conn_manager: ConnectionManager,
    command_timeout: Duration,
    /// Connection URL with credentials redacted.
    redis_url: String,
}

impl fmt::Debug for RedisStructuredStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStructuredStore")
            .field("redis_url", &self.redis_url)
            .field("command_timeout", &self.command_timeout)
            .field("conn_manager", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStructuredStore {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(redis_url: &str, command_timeout: Duration) -> Result<Self, StoreError> {
        let display_url = redact_url(redis_url);
        info!(url = %display_url, "connecting to structured store");
        let client = redis::Client::open(redis_url).map_err(connection_error)?;
        let conn_manager = tokio::time::timeout(command_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Connection {
                reason: format!("connect timed out after {:?}", command_timeout),
            })?
            .map_err(connection_error)?;

        let store = Self {
            conn_manager,
            command_timeout,
            redis_url: display_url,
        };
        store.ping().await?;
        info!("structured store connected");
        Ok(store)
    }

    async fn bounded<T, F>(&self, command: &str, key: &str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StoreError::Command {
                command: command.to_string(),
                key: key.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(StoreError::Timeout {
                command: command.to_string(),
                key: key.to_string(),
            }),
        }
    }
}

/// `redis_url` with any userinfo replaced by `***`.
pub fn redact_url(redis_url: &str) -> String {
    let Some((scheme, rest)) = redis_url.split_once("://") else {
        return redis_url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => redis_url.to_string(),
    }
}

fn connection_error(err: RedisError) -> StoreError {
    StoreError::Connection {
        reason: err.to_string(),
    }
}

#[async_trait]
impl StructuredStore for RedisStructuredStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn_manager.clone();
        let value = self
            .bounded("GET", key, conn.get::<_, Option<String>>(key))
            .await?;
        debug!(key = %key, hit = value.is_some(), "store GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();
        self.bounded("SET", key, conn.set::<_, _, ()>(key, value))
            .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn_manager.clone();
        let label = keys.join(" ");
        self.bounded("DEL", &label, conn.del::<_, u64>(keys)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();
        let pong: String = self
            .bounded("PING", "", redis::cmd("PING").query_async(&mut conn))
            .await?;
        debug!(reply = %pong, "store PING");
        Ok(())
    }
}
