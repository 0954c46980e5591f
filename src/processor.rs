// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch draining.
//!
//! The [`Processor`] turns queued envelopes into persisted analytics
//! records: acquire the queue lock, pop rounds of batches, decode each
//! back into a request set, hand it to the tracking sink, extend the
//! lock between rounds, and always release the lock at the end.
//!
//! # Lifecycle
//!
//! ```text
//! Idle → LockAcquired → Draining → (Completed | Failed) → Idle
//! ```
//!
//! Per-batch failures (an undecodable envelope or a sink rejection)
//! are collected as [`BatchFailure`] values in the [`DrainReport`] and
//! never abort the remaining batches: one poisoned batch must not block
//! the whole queue. Only a backend failure aborts the drain, fast.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backend::BackendError;
use crate::lock::QueueLock;
use crate::queue::{Queue, QueueError};
use crate::request_set::QueuedBatch;
use crate::sink::TrackingSink;
use crate::config::TrackQueueConfig;

/// Drain state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Not draining
    Idle,
    /// Lock held, drain not yet started
    LockAcquired,
    /// Popping and processing batches
    Draining,
    /// Last drain finished, report available
    Completed,
    /// Last drain aborted on a backend failure
    Failed,
}

impl std::fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::LockAcquired => write!(f, "LockAcquired"),
            Self::Draining => write!(f, "Draining"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// One batch that could not be processed during a drain.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Insertion sequence number; `None` when the envelope itself could
    /// not be decoded
    pub seq: Option<u64>,
    pub error: String,
}

/// Explicit per-drain outcome, returned to the caller instead of being
/// buried in log calls: the caller decides whether to log, retry later,
/// or alert.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Envelopes consumed from the queue (including failed ones)
    pub batches_drained: usize,
    /// Raw requests the sink persisted
    pub requests_tracked: usize,
    /// Raw requests the sink rejected individually
    pub requests_failed: usize,
    /// Batches that failed to decode or were rejected as a whole
    pub failures: Vec<BatchFailure>,
    /// Whether the drain stopped at the batch cap with work remaining
    pub hit_batch_cap: bool,
}

impl DrainReport {
    /// True when every consumed batch was processed cleanly.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.requests_failed == 0
    }
}

/// Drains one shared queue while holding its lock.
///
/// Constructed per drain attempt; workers never share an instance.
pub struct Processor {
    queue: Queue,
    lock: QueueLock,
    sink: Arc<dyn TrackingSink>,
    drain_batch_size: usize,
    max_batches_per_drain: usize,
    state: ProcessorState,
}

impl Processor {
    pub fn new(
        queue: Queue,
        lock: QueueLock,
        sink: Arc<dyn TrackingSink>,
        config: &TrackQueueConfig,
    ) -> Self {
        Self {
            queue,
            lock,
            sink,
            // A zero pop size would spin forever; treat it as 1
            drain_batch_size: config.drain_batch_size.max(1),
            max_batches_per_drain: config.max_batches_per_drain,
            state: ProcessorState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Try to become the draining worker for this queue.
    ///
    /// `Ok(false)` means another worker is already draining; the caller
    /// simply skips processing this cycle: draining is opportunistic,
    /// not guaranteed per request.
    pub async fn acquire_lock(&mut self) -> Result<bool, BackendError> {
        let acquired = self.lock.acquire().await?;
        if acquired {
            self.state = ProcessorState::LockAcquired;
        }
        Ok(acquired)
    }

    /// Drain the queue until it is empty or the batch cap is hit.
    ///
    /// Must only be called after [`acquire_lock`](Self::acquire_lock)
    /// returned true. A backend failure aborts the drain fast; the
    /// caller is still expected to [`unlock`](Self::unlock).
    pub async fn process(&mut self) -> Result<DrainReport, QueueError> {
        if !self.lock.is_held() {
            warn!("drain requested without holding the queue lock, skipping");
            return Ok(DrainReport::default());
        }

        self.state = ProcessorState::Draining;
        let started = Instant::now();
        let mut report = DrainReport::default();

        match self.drain(&mut report).await {
            Ok(()) => {
                self.state = ProcessorState::Completed;
                if let Err(e) = self.queue.mark_drained().await {
                    // The next forced-drain fires early; nothing is lost
                    warn!(error = %e, "failed to record drain marker");
                }
                info!(
                    batches = report.batches_drained,
                    tracked = report.requests_tracked,
                    failed_requests = report.requests_failed,
                    failed_batches = report.failures.len(),
                    hit_cap = report.hit_batch_cap,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "queue drain complete"
                );
                crate::metrics::record_drain("completed");
                crate::metrics::record_drained_batches(report.batches_drained);
                crate::metrics::record_drain_duration(started.elapsed());
                Ok(report)
            }
            Err(e) => {
                self.state = ProcessorState::Failed;
                crate::metrics::record_drain("failed");
                Err(e)
            }
        }
    }

    async fn drain(&mut self, report: &mut DrainReport) -> Result<(), QueueError> {
        while report.batches_drained < self.max_batches_per_drain {
            if self.queue.size().await? == 0 {
                return Ok(());
            }

            let remaining = self.max_batches_per_drain - report.batches_drained;
            let payloads = self
                .queue
                .pop_batches(self.drain_batch_size.min(remaining))
                .await?;
            if payloads.is_empty() {
                // Another consumer raced us to the tail
                return Ok(());
            }

            debug!(popped = payloads.len(), "processing drain round");
            for payload in payloads {
                self.process_payload(payload, report).await;
            }

            // Keep-alive: re-arm the TTL so a long drain is not
            // preempted mid-batch by a worker seeing an expired lock
            if !self.lock.extend().await? {
                warn!("queue lock lost mid-drain, stopping this pass");
                return Ok(());
            }
        }

        report.hit_batch_cap = true;
        debug!(
            cap = self.max_batches_per_drain,
            "drain stopped at batch cap, leaving the rest for the next holder"
        );
        Ok(())
    }

    async fn process_payload(&self, payload: Vec<u8>, report: &mut DrainReport) {
        report.batches_drained += 1;

        let batch = match QueuedBatch::decode(&payload) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "dropping undecodable queued batch");
                crate::metrics::record_batch_failure();
                report.failures.push(BatchFailure {
                    seq: None,
                    error: format!("decode: {e}"),
                });
                return;
            }
        };

        match self.sink.process(&batch.request_set).await {
            Ok(sink_report) => {
                report.requests_tracked += sink_report.tracked;
                report.requests_failed += sink_report.failed;
            }
            Err(e) => {
                warn!(seq = batch.seq, error = %e, "tracking sink rejected batch");
                crate::metrics::record_batch_failure();
                report.failures.push(BatchFailure {
                    seq: Some(batch.seq),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Release the lock. Invoked on every exit path, success or failure;
    /// a refusal after expiry is not an error.
    pub async fn unlock(&mut self) -> Result<bool, BackendError> {
        let released = self.lock.unlock().await;
        self.state = ProcessorState::Idle;
        released
    }
}
