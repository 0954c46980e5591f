//! Storage backends for the shared queue and lock state.
//!
//! The [`Backend`] trait is the only coordination surface between
//! workers: queue contents, sequence counters, the last-drain marker,
//! and the drain lock all live behind it. [`RedisBackend`] is the
//! production implementation; [`InMemoryBackend`] covers tests and
//! development.

pub mod memory;
pub mod redis;
pub mod traits;

pub use self::memory::InMemoryBackend;
pub use self::redis::RedisBackend;
pub use self::traits::{Backend, BackendError};

use std::sync::Arc;

use tracing::info;

use crate::config::TrackQueueConfig;

/// Build the backend described by the configuration: Redis when a URL is
/// configured, in-memory otherwise.
pub async fn connect(config: &TrackQueueConfig) -> Result<Arc<dyn Backend>, BackendError> {
    match config.redis_url {
        Some(ref url) => {
            let backend = RedisBackend::connect(url).await?;
            info!(url = %url, "connected to redis backend");
            Ok(Arc::new(backend))
        }
        None => {
            info!("no redis url configured, using in-memory backend");
            Ok(Arc::new(InMemoryBackend::new()))
        }
    }
}
