//! Configuration for the tracking queue.
//!
//! # Example
//!
//! ```
//! use track_queue::TrackQueueConfig;
//!
//! // Minimal config (uses defaults)
//! let config = TrackQueueConfig::default();
//! assert!(config.queue_enabled);
//! assert_eq!(config.drain_threshold, 25);
//!
//! // Full config
//! let config = TrackQueueConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     drain_threshold: 50,
//!     forced_drain_interval_ms: 10_000,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the tracking queue.
///
/// All fields have sensible defaults. Without a `redis_url` the backend
/// falls back to a single-process in-memory store, which is only suitable
/// for tests and development.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackQueueConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Prefix applied to every backend key, enabling namespacing when
    /// sharing a store with other applications
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Global queueing switch; when off, the handler processes every
    /// request set synchronously and never touches the backend
    #[serde(default = "default_queue_enabled")]
    pub queue_enabled: bool,

    /// Queue length at which a drain should be triggered
    #[serde(default = "default_drain_threshold")]
    pub drain_threshold: u64,

    /// Force a drain after this long since the last successful drain,
    /// even if the queue is below the threshold
    #[serde(default = "default_forced_drain_interval_ms")]
    pub forced_drain_interval_ms: u64,

    /// Lock TTL; must exceed the worst-case drain duration
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Batches popped per drain round
    #[serde(default = "default_drain_batch_size")]
    pub drain_batch_size: usize,

    /// Cap on batches consumed in one drain pass, bounding how long a
    /// single worker monopolizes the lock
    #[serde(default = "default_max_batches_per_drain")]
    pub max_batches_per_drain: usize,

    /// Allow the handler to drain inline after answering a request
    #[serde(default = "default_process_during_request")]
    pub process_during_request: bool,

    /// Process synchronously when the enqueue fails. Off by default: the
    /// accepted tradeoff is losing the hit rather than adding backend
    /// latency to the request path
    #[serde(default)]
    pub sync_fallback_on_error: bool,
}

fn default_key_prefix() -> String {
    "trackq:".to_string()
}
fn default_queue_enabled() -> bool {
    true
}
fn default_drain_threshold() -> u64 {
    25
}
fn default_forced_drain_interval_ms() -> u64 {
    30_000
}
fn default_lock_ttl_secs() -> u64 {
    120
}
fn default_drain_batch_size() -> usize {
    25
}
fn default_max_batches_per_drain() -> usize {
    500
}
fn default_process_during_request() -> bool {
    true
}

impl Default for TrackQueueConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_key_prefix(),
            queue_enabled: default_queue_enabled(),
            drain_threshold: default_drain_threshold(),
            forced_drain_interval_ms: default_forced_drain_interval_ms(),
            lock_ttl_secs: default_lock_ttl_secs(),
            drain_batch_size: default_drain_batch_size(),
            max_batches_per_drain: default_max_batches_per_drain(),
            process_during_request: default_process_during_request(),
            sync_fallback_on_error: false,
        }
    }
}

impl TrackQueueConfig {
    /// Forced-drain interval as a [`Duration`].
    #[must_use]
    pub fn forced_drain_interval(&self) -> Duration {
        Duration::from_millis(self.forced_drain_interval_ms)
    }

    /// Lock TTL as a [`Duration`].
    #[must_use]
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackQueueConfig::default();
        assert!(config.redis_url.is_none());
        assert!(config.queue_enabled);
        assert!(config.process_during_request);
        assert!(!config.sync_fallback_on_error);
        assert_eq!(config.key_prefix, "trackq:");
        assert_eq!(config.lock_ttl(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: TrackQueueConfig = serde_json::from_str(
            r#"{"redis_url": "redis://cache:6379", "drain_threshold": 3}"#,
        )
        .unwrap();

        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.drain_threshold, 3);
        // Untouched fields keep their defaults
        assert_eq!(config.max_batches_per_drain, 500);
        assert_eq!(config.forced_drain_interval(), Duration::from_millis(30_000));
    }
}
