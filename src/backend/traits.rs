use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Minimal key-based storage abstraction shared by all workers.
///
/// Every operation is atomic with respect to other clients of the same
/// store; that atomicity is what the queue and lock build their
/// correctness on. Any operation may fail with
/// [`BackendError::Unavailable`]; callers must not assume partial
/// success.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Append one payload to the tail of a list.
    async fn push(&self, queue_key: &str, payload: Vec<u8>) -> Result<(), BackendError>;

    /// Pop up to `max` payloads from the head of a list, FIFO.
    ///
    /// Pop-and-remove happens in one atomic step: a worker that crashes
    /// after a successful pop loses the popped payloads (at-most-once).
    async fn pop_batch(&self, queue_key: &str, max: usize) -> Result<Vec<Vec<u8>>, BackendError>;

    /// Current length of a list.
    async fn size(&self, queue_key: &str) -> Result<u64, BackendError>;

    /// Atomically increment a counter, returning the new value.
    /// A missing counter starts at zero.
    async fn increment(&self, counter_key: &str) -> Result<u64, BackendError>;

    /// Read a plain value.
    async fn get_value(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Write a plain value.
    async fn set_value(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Store `token` under `lock_key` with a TTL, only if the key does
    /// not already hold an unexpired value. Returns whether the value
    /// was stored.
    async fn set_if_not_exists(
        &self,
        lock_key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError>;

    /// Reset the TTL of `lock_key`, only while it still holds `token`.
    async fn extend_if_value(
        &self,
        lock_key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError>;

    /// Delete `lock_key`, only while it still holds `token`. Returns
    /// whether a deletion happened.
    async fn delete_if_value(&self, lock_key: &str, token: &str) -> Result<bool, BackendError>;
}
