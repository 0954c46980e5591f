//! Redis backend.
//!
//! Maps the backend contract onto single Redis commands so every
//! operation stays atomic without multi-key transactions:
//!
//! - lists → `RPUSH` / `LPOP count` / `LLEN`
//! - counters → `INCR`
//! - plain values → `GET` / `SET`
//! - lock primitives → `SET NX PX` plus compare-and-expire /
//!   compare-and-delete Lua scripts (GET alone then EXPIRE/DEL would
//!   race against another worker taking over an expired lock)

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use super::traits::{Backend, BackendError};

const EXTEND_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
"#;

const UNLOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    /// Connect to Redis.
    ///
    /// Uses a bounded backoff so a bad URL fails within seconds instead
    /// of hanging a request worker; after startup, individual operations
    /// fail fast and reconnection is left to the connection manager.
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = Client::open(url).map_err(unavailable)?;

        let mut delay = Duration::from_millis(200);
        let mut attempt = 0;
        let connection = loop {
            match ConnectionManager::new(client.clone()).await {
                Ok(connection) => break connection,
                Err(e) => {
                    attempt += 1;
                    if attempt >= 5 {
                        return Err(unavailable(e));
                    }
                    warn!(attempt, error = %e, "redis connect failed, retrying");
                    sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(2));
                }
            }
        };

        Ok(Self { connection })
    }

    /// Get a clone of the connection manager (for health probes).
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn unavailable(e: redis::RedisError) -> BackendError {
    BackendError::Unavailable(e.to_string())
}

/// PX argument; Redis rejects a zero expiry.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl Backend for RedisBackend {
    async fn push(&self, queue_key: &str, payload: Vec<u8>) -> Result<(), BackendError> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.rpush(queue_key, payload).await.map_err(unavailable)?;
        Ok(())
    }

    async fn pop_batch(&self, queue_key: &str, max: usize) -> Result<Vec<Vec<u8>>, BackendError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection.clone();
        let popped: Option<Vec<Vec<u8>>> = redis::cmd("LPOP")
            .arg(queue_key)
            .arg(max as i64)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(popped.unwrap_or_default())
    }

    async fn size(&self, queue_key: &str) -> Result<u64, BackendError> {
        let mut conn = self.connection.clone();
        let len: u64 = conn.llen(queue_key).await.map_err(unavailable)?;
        Ok(len)
    }

    async fn increment(&self, counter_key: &str) -> Result<u64, BackendError> {
        let mut conn = self.connection.clone();
        let value: u64 = conn.incr(counter_key, 1i64).await.map_err(unavailable)?;
        Ok(value)
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(unavailable)?;
        Ok(value)
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(key, value).await.map_err(unavailable)?;
        Ok(())
    }

    async fn set_if_not_exists(
        &self,
        lock_key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let mut conn = self.connection.clone();
        let stored: Option<String> = redis::cmd("SET")
            .arg(lock_key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(stored.is_some())
    }

    async fn extend_if_value(
        &self,
        lock_key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let mut conn = self.connection.clone();
        let extended: i32 = Script::new(EXTEND_SCRIPT)
            .key(lock_key)
            .arg(token)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(extended == 1)
    }

    async fn delete_if_value(&self, lock_key: &str, token: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection.clone();
        let deleted: i32 = Script::new(UNLOCK_SCRIPT)
            .key(lock_key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(deleted == 1)
    }
}
