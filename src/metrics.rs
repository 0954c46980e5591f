// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the tracking queue.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the
//! embedding daemon is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `track_queue_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record an enqueue attempt ("success" / "error")
pub fn record_enqueue(status: &str) {
    counter!(
        "track_queue_enqueue_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record how many raw requests one enqueue carried
pub fn record_enqueued_requests(count: usize) {
    counter!("track_queue_enqueued_requests_total").increment(count as u64);
}

/// Set the observed queue backlog, in batches
pub fn set_queue_size(size: u64) {
    gauge!("track_queue_batches").set(size as f64);
}

/// Record a drain pass ("completed" / "failed")
pub fn record_drain(status: &str) {
    counter!(
        "track_queue_drains_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record batches consumed by one drain pass
pub fn record_drained_batches(count: usize) {
    counter!("track_queue_drained_batches_total").increment(count as u64);
}

/// Record one poisoned batch (undecodable or rejected by the sink)
pub fn record_batch_failure() {
    counter!("track_queue_batch_failures_total").increment(1);
}

/// Record a lock attempt ("acquired" / "contended")
pub fn record_lock(outcome: &str) {
    counter!(
        "track_queue_lock_attempts_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record drain wall time
pub fn record_drain_duration(duration: Duration) {
    histogram!("track_queue_drain_seconds").record(duration.as_secs_f64());
}
