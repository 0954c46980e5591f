// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Logical FIFO of request sets, decoupled from transport.
//!
//! The queue owns the drain-trigger policy: drain when the backlog
//! reaches [`drain_threshold`](crate::TrackQueueConfig::drain_threshold)
//! batches, or when the forced-drain interval has elapsed since the last
//! successful drain. The dual trigger prevents both unbounded growth
//! under sustained load and indefinite staleness under low or bursty
//! load.
//!
//! Queue length and the last-drain marker are shared mutable state
//! across workers, so both live in the backend and are re-read at every
//! decision point, never cached.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::backend::{Backend, BackendError};
use crate::config::TrackQueueConfig;
use crate::request_set::{epoch_millis, QueuedBatch, RequestSet};

#[derive(Error, Debug)]
pub enum QueueError {
    /// Enqueue serialization or push failed. The tracking response is
    /// sent regardless; the hit may be lost, an accepted tradeoff for
    /// availability.
    #[error("failed to enqueue request set: {0}")]
    Write(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Shared FIFO of tracking request sets.
///
/// Cheap to clone: every worker constructs its own instance wired to the
/// same backend key namespace.
#[derive(Clone)]
pub struct Queue {
    backend: Arc<dyn Backend>,
    enabled: bool,
    drain_threshold: u64,
    forced_drain_interval: Duration,
    list_key: String,
    seq_key: String,
    drained_key: String,
}

impl Queue {
    pub fn new(backend: Arc<dyn Backend>, config: &TrackQueueConfig) -> Self {
        Self {
            backend,
            enabled: config.queue_enabled,
            drain_threshold: config.drain_threshold,
            forced_drain_interval: config.forced_drain_interval(),
            list_key: format!("{}batches", config.key_prefix),
            seq_key: format!("{}seq", config.key_prefix),
            drained_key: format!("{}last-drain", config.key_prefix),
        }
    }

    /// Global queueing switch; when off, the handler bypasses the queue
    /// entirely and processes synchronously.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Serialize a request set into one [`QueuedBatch`] and push it.
    ///
    /// Returns the number of raw requests logged, for response metadata.
    pub async fn add_request_set(&self, request_set: &RequestSet) -> Result<usize, QueueError> {
        let seq = self
            .backend
            .increment(&self.seq_key)
            .await
            .map_err(|e| QueueError::Write(e.to_string()))?;

        let batch = QueuedBatch::new(seq, request_set.clone());
        let payload = batch.encode().map_err(|e| QueueError::Write(e.to_string()))?;
        let payload_bytes = payload.len();

        self.backend
            .push(&self.list_key, payload)
            .await
            .map_err(|e| QueueError::Write(e.to_string()))?;

        debug!(seq, requests = request_set.len(), payload_bytes, "request set enqueued");
        crate::metrics::record_enqueue("success");
        crate::metrics::record_enqueued_requests(request_set.len());
        Ok(request_set.len())
    }

    /// Current number of queued batches.
    pub async fn size(&self) -> Result<u64, QueueError> {
        Ok(self.backend.size(&self.list_key).await?)
    }

    /// Whether a drain should be triggered now.
    ///
    /// True iff the backlog has reached the threshold (equality counts)
    /// or the forced-drain interval has elapsed since the last
    /// successful drain. The marker is lazily initialised on the first
    /// check so a fresh queue is not instantly considered stale.
    pub async fn should_process(&self) -> Result<bool, QueueError> {
        let size = self.size().await?;
        crate::metrics::set_queue_size(size);
        if size >= self.drain_threshold {
            return Ok(true);
        }

        let now = epoch_millis();
        match self.backend.get_value(&self.drained_key).await? {
            Some(raw) => {
                // A corrupt marker reads as "just drained"; the next
                // mark_drained overwrites it
                let last = raw.parse::<i64>().unwrap_or(now);
                let elapsed = now.saturating_sub(last);
                Ok(elapsed >= self.forced_drain_interval.as_millis() as i64)
            }
            None => {
                self.backend
                    .set_value(&self.drained_key, &now.to_string())
                    .await?;
                Ok(false)
            }
        }
    }

    /// Pop up to `max` encoded [`QueuedBatch`] envelopes, FIFO.
    ///
    /// Processor-only: decoding (and the reporting of undecodable
    /// payloads) is the processor's job.
    pub async fn pop_batches(&self, max: usize) -> Result<Vec<Vec<u8>>, QueueError> {
        Ok(self.backend.pop_batch(&self.list_key, max).await?)
    }

    /// Record a successful drain, re-arming the forced-drain interval
    /// for every worker.
    pub async fn mark_drained(&self) -> Result<(), QueueError> {
        self.backend
            .set_value(&self.drained_key, &epoch_millis().to_string())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::request_set::TrackingRequest;
    use std::collections::HashMap;

    fn config(threshold: u64, interval_ms: u64) -> TrackQueueConfig {
        TrackQueueConfig {
            drain_threshold: threshold,
            forced_drain_interval_ms: interval_ms,
            ..Default::default()
        }
    }

    fn queue(config: &TrackQueueConfig) -> Queue {
        Queue::new(Arc::new(InMemoryBackend::new()), config)
    }

    fn request_set(n: usize) -> RequestSet {
        RequestSet::new(
            (0..n)
                .map(|i| {
                    let mut params = HashMap::new();
                    params.insert("url".to_string(), format!("/page-{i}"));
                    TrackingRequest::new(params)
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_enqueue_grows_size_by_one_batch() {
        let queue = queue(&config(100, 60_000));
        assert_eq!(queue.size().await.unwrap(), 0);

        for expected in 1..=4u64 {
            let logged = queue.add_request_set(&request_set(3)).await.unwrap();
            assert_eq!(logged, 3);
            assert_eq!(queue.size().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_should_process_threshold_boundary() {
        let queue = queue(&config(3, 60_000));

        queue.add_request_set(&request_set(1)).await.unwrap();
        assert!(!queue.should_process().await.unwrap());
        queue.add_request_set(&request_set(1)).await.unwrap();
        assert!(!queue.should_process().await.unwrap());

        // Size exactly equal to the threshold triggers
        queue.add_request_set(&request_set(1)).await.unwrap();
        assert!(queue.should_process().await.unwrap());
    }

    #[tokio::test]
    async fn test_should_process_forced_drain_interval() {
        let queue = queue(&config(100, 30));

        queue.add_request_set(&request_set(1)).await.unwrap();

        // First check arms the marker instead of reporting stale
        assert!(!queue.should_process().await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(queue.should_process().await.unwrap());

        // A drain re-arms the interval
        queue.mark_drained().await.unwrap();
        assert!(!queue.should_process().await.unwrap());
    }

    #[tokio::test]
    async fn test_pop_batches_fifo_order() {
        let queue = queue(&config(100, 60_000));
        for n in 1..=3 {
            queue.add_request_set(&request_set(n)).await.unwrap();
        }

        let payloads = queue.pop_batches(10).await.unwrap();
        assert_eq!(payloads.len(), 3);

        let seqs: Vec<u64> = payloads
            .iter()
            .map(|p| QueuedBatch::decode(p).unwrap().seq)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(queue.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_queue_reports_disabled() {
        let config = TrackQueueConfig {
            queue_enabled: false,
            ..Default::default()
        };
        assert!(!queue(&config).is_enabled());
    }
}
