//! Distributed mutual exclusion for queue draining.
//!
//! Built on the backend's atomic compare-and-set primitives, scoped to
//! one named queue. The token is unique per holder; only the holder
//! whose token matches the stored value may extend or release the lock.
//! TTL expiry is the sole recovery path for a crashed holder.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{Backend, BackendError};
use crate::config::TrackQueueConfig;

pub struct QueueLock {
    backend: Arc<dyn Backend>,
    key: String,
    ttl: Duration,
    token: String,
    held: bool,
}

impl QueueLock {
    pub fn new(backend: Arc<dyn Backend>, key: String, ttl: Duration) -> Self {
        Self {
            backend,
            key,
            ttl,
            token: Uuid::new_v4().to_string(),
            held: false,
        }
    }

    /// Lock for the queue described by the configuration.
    pub fn for_queue(backend: Arc<dyn Backend>, config: &TrackQueueConfig) -> Self {
        Self::new(
            backend,
            format!("{}lock", config.key_prefix),
            config.lock_ttl(),
        )
    }

    /// Single non-blocking acquisition attempt.
    ///
    /// No retry or wait inside this call: workers probe continuously as
    /// a side effect of normal traffic. `Ok(false)` means another worker
    /// holds the lock; expected, not an error.
    pub async fn acquire(&mut self) -> Result<bool, BackendError> {
        let acquired = self
            .backend
            .set_if_not_exists(&self.key, &self.token, self.ttl)
            .await?;
        self.held = acquired;

        if acquired {
            debug!(key = %self.key, token = %self.token, "lock acquired");
            crate::metrics::record_lock("acquired");
        } else {
            debug!(key = %self.key, "lock contended, another worker is draining");
            crate::metrics::record_lock("contended");
        }
        Ok(acquired)
    }

    /// Re-arm the TTL while the stored token still matches.
    ///
    /// `Ok(false)` means the lock expired and was taken over; the holder
    /// must stop treating the queue as its own.
    pub async fn extend(&mut self) -> Result<bool, BackendError> {
        if !self.held {
            return Ok(false);
        }
        let extended = self
            .backend
            .extend_if_value(&self.key, &self.token, self.ttl)
            .await?;
        if !extended {
            warn!(key = %self.key, "lock expired mid-drain and moved to another holder");
            self.held = false;
        }
        Ok(extended)
    }

    /// Best-effort release.
    ///
    /// `Ok(false)` after expiry means ownership legitimately moved on:
    /// deletion was refused on token mismatch, which is correct
    /// behavior, not an error.
    pub async fn unlock(&mut self) -> Result<bool, BackendError> {
        if !self.held {
            return Ok(false);
        }
        self.held = false;
        let removed = self
            .backend
            .delete_if_value(&self.key, &self.token)
            .await?;
        debug!(key = %self.key, removed, "lock released");
        Ok(removed)
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn lock_with(backend: &Arc<InMemoryBackend>, ttl: Duration) -> QueueLock {
        let backend: Arc<dyn Backend> = backend.clone();
        QueueLock::new(backend, "trackq:lock".to_string(), ttl)
    }

    #[tokio::test]
    async fn test_acquire_and_unlock() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut lock = lock_with(&backend, Duration::from_secs(10));

        assert!(lock.acquire().await.unwrap());
        assert!(lock.is_held());
        assert!(lock.unlock().await.unwrap());
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_second_holder_is_refused() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut first = lock_with(&backend, Duration::from_secs(10));
        let mut second = lock_with(&backend, Duration::from_secs(10));

        assert!(first.acquire().await.unwrap());
        assert!(!second.acquire().await.unwrap());
        assert!(!second.is_held());

        first.unlock().await.unwrap();
        assert!(second.acquire().await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_acquirable_by_new_token() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut first = lock_with(&backend, Duration::from_millis(20));
        let mut second = lock_with(&backend, Duration::from_secs(10));

        assert!(first.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(second.acquire().await.unwrap());
        // The first holder's extension attempt reports the takeover
        assert!(!first.extend().await.unwrap());
        assert!(!first.is_held());
    }

    #[tokio::test]
    async fn test_stale_unlock_does_not_remove_new_holder() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut first = lock_with(&backend, Duration::from_millis(20));
        let mut second = lock_with(&backend, Duration::from_secs(10));

        assert!(first.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(second.acquire().await.unwrap());

        // Stale release is refused on token mismatch
        assert!(!first.unlock().await.unwrap());
        assert!(second.extend().await.unwrap());
    }

    #[tokio::test]
    async fn test_extend_keeps_lock_alive() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut lock = lock_with(&backend, Duration::from_millis(100));
        let mut rival = lock_with(&backend, Duration::from_millis(100));

        assert!(lock.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(lock.extend().await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!rival.acquire().await.unwrap());
        lock.unlock().await.unwrap();
    }
}
