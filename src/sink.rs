//! Tracking engine boundary.
//!
//! The queue core treats the analytics domain logic as an opaque,
//! possibly-slow, possibly-failing sink: hand it a [`RequestSet`], get
//! back per-request success/failure tallies.

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::request_set::RequestSet;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("tracking engine rejected the request set: {0}")]
    Rejected(String),
}

/// Per-request outcome tallies for one processed request set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkReport {
    /// Requests persisted as visit/action/goal records
    pub tracked: usize,
    /// Requests the engine rejected individually
    pub failed: usize,
}

impl SinkReport {
    /// Report with every request tracked.
    #[must_use]
    pub fn all_tracked(count: usize) -> Self {
        Self {
            tracked: count,
            failed: 0,
        }
    }
}

/// The persistence side of tracking: converts raw requests into durable
/// analytics records.
#[async_trait]
pub trait TrackingSink: Send + Sync {
    /// Persist one request set. An `Err` rejects the set as a whole;
    /// partial rejections are reported through [`SinkReport::failed`].
    async fn process(&self, request_set: &RequestSet) -> Result<SinkReport, SinkError>;
}

/// Sink that records every request set it is handed.
///
/// Used by tests and the demo; also handy as a stand-in while wiring the
/// real engine.
pub struct MemorySink {
    processed: Mutex<Vec<RequestSet>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            processed: Mutex::new(Vec::new()),
        }
    }

    /// Number of request sets processed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processed.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processed.lock().is_empty()
    }

    /// Total raw requests across all processed sets.
    #[must_use]
    pub fn total_requests(&self) -> usize {
        self.processed.lock().iter().map(RequestSet::len).sum()
    }

    /// Snapshot of the processed request sets, in processing order.
    #[must_use]
    pub fn request_sets(&self) -> Vec<RequestSet> {
        self.processed.lock().clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackingSink for MemorySink {
    async fn process(&self, request_set: &RequestSet) -> Result<SinkReport, SinkError> {
        let tracked = request_set.len();
        self.processed.lock().push(request_set.clone());
        Ok(SinkReport::all_tracked(tracked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_set::TrackingRequest;
    use std::collections::HashMap;

    fn request_set(urls: &[&str]) -> RequestSet {
        RequestSet::new(
            urls.iter()
                .map(|url| {
                    let mut params = HashMap::new();
                    params.insert("url".to_string(), (*url).to_string());
                    TrackingRequest::new(params)
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_memory_sink_tallies() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        let report = sink.process(&request_set(&["/a", "/b"])).await.unwrap();
        assert_eq!(report, SinkReport { tracked: 2, failed: 0 });

        sink.process(&request_set(&["/c"])).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.total_requests(), 3);
        assert_eq!(sink.request_sets()[0].len(), 2);
    }
}
