//! Per-request orchestration.
//!
//! One [`Handler::handle`] call per inbound tracking request:
//!
//! 1. enqueue the request set (or process it synchronously when
//!    queueing is disabled),
//! 2. send the acknowledgment before any draining, so
//!    client-perceived latency never depends on queue depth,
//! 3. opportunistically drain the queue behind the shared lock,
//!    swallowing drain errors into logs: the client has already been
//!    answered.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::config::TrackQueueConfig;
use crate::lock::QueueLock;
use crate::processor::Processor;
use crate::queue::Queue;
use crate::request_set::RequestSet;
use crate::sink::TrackingSink;

/// Acknowledgment sent to the client for a well-formed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingAck {
    /// Raw requests accepted for tracking
    pub logged_requests: usize,
    /// Whether the hits went through the queue (false on the
    /// synchronous path)
    pub queued: bool,
}

/// Where the acknowledgment goes. Implemented by the embedding HTTP
/// layer; sending must not depend on queue state.
pub trait ResponseChannel: Send {
    fn send(&mut self, ack: TrackingAck);
}

/// Per-request orchestrator shared by all requests of one worker.
pub struct Handler {
    backend: Arc<dyn Backend>,
    queue: Queue,
    sink: Arc<dyn TrackingSink>,
    config: TrackQueueConfig,
}

impl Handler {
    pub fn new(
        backend: Arc<dyn Backend>,
        sink: Arc<dyn TrackingSink>,
        config: TrackQueueConfig,
    ) -> Self {
        let queue = Queue::new(backend.clone(), &config);
        Self {
            backend,
            queue,
            sink,
            config,
        }
    }

    /// The queue this handler enqueues into.
    #[must_use]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Handle one validated request set end to end.
    ///
    /// The request set is owned by the handler until it is handed to
    /// the queue; after this call its data lives only in the queued
    /// envelope (or in the sink, on the synchronous path).
    pub async fn handle<R: ResponseChannel>(&self, request_set: RequestSet, response: &mut R) {
        let (logged_requests, queued) = self.track_or_enqueue(&request_set).await;

        response.send(TrackingAck {
            logged_requests,
            queued,
        });

        if queued && self.config.process_during_request {
            self.drain_if_needed().await;
        }
    }

    async fn track_or_enqueue(&self, request_set: &RequestSet) -> (usize, bool) {
        if !self.queue.is_enabled() {
            return (self.track_synchronously(request_set).await, false);
        }

        match self.queue.add_request_set(request_set).await {
            Ok(logged) => (logged, true),
            Err(e) => {
                crate::metrics::record_enqueue("error");
                if self.config.sync_fallback_on_error {
                    warn!(error = %e, "enqueue failed, falling back to synchronous tracking");
                    (self.track_synchronously(request_set).await, false)
                } else {
                    // The hit is dropped; the client is still acknowledged
                    warn!(error = %e, requests = request_set.len(), "enqueue failed, hit dropped");
                    (0, false)
                }
            }
        }
    }

    async fn track_synchronously(&self, request_set: &RequestSet) -> usize {
        match self.sink.process(request_set).await {
            Ok(report) => {
                debug!(tracked = report.tracked, failed = report.failed, "tracked synchronously");
                report.tracked
            }
            Err(e) => {
                warn!(error = %e, "synchronous tracking failed");
                0
            }
        }
    }

    /// Opportunistic drain: probe the trigger policy, then try to become
    /// the draining worker. Nothing here reaches the client.
    async fn drain_if_needed(&self) {
        let should = match self.queue.should_process().await {
            Ok(should) => should,
            Err(e) => {
                warn!(error = %e, "drain-trigger check failed");
                return;
            }
        };
        if !should {
            return;
        }

        let lock = QueueLock::for_queue(self.backend.clone(), &self.config);
        let mut processor = Processor::new(self.queue.clone(), lock, self.sink.clone(), &self.config);

        match processor.acquire_lock().await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!(error = %e, "lock acquisition failed");
                return;
            }
        }

        if let Err(e) = processor.process().await {
            warn!(error = %e, "queue drain failed");
        }
        if let Err(e) = processor.unlock().await {
            warn!(error = %e, "lock release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::request_set::TrackingRequest;
    use crate::sink::MemorySink;
    use std::collections::HashMap;

    struct RecordingChannel {
        acks: Vec<TrackingAck>,
    }

    impl RecordingChannel {
        fn new() -> Self {
            Self { acks: Vec::new() }
        }
    }

    impl ResponseChannel for RecordingChannel {
        fn send(&mut self, ack: TrackingAck) {
            self.acks.push(ack);
        }
    }

    fn request_set(n: usize) -> RequestSet {
        RequestSet::new(
            (0..n)
                .map(|i| {
                    let mut params = HashMap::new();
                    params.insert("url".to_string(), format!("/p{i}"));
                    TrackingRequest::new(params)
                })
                .collect(),
        )
    }

    fn handler(sink: &Arc<MemorySink>, config: TrackQueueConfig) -> Handler {
        Handler::new(Arc::new(InMemoryBackend::new()), sink.clone(), config)
    }

    #[tokio::test]
    async fn test_disabled_queue_tracks_synchronously() {
        let sink = Arc::new(MemorySink::new());
        let handler = handler(
            &sink,
            TrackQueueConfig {
                queue_enabled: false,
                ..Default::default()
            },
        );
        let mut response = RecordingChannel::new();

        handler.handle(request_set(2), &mut response).await;

        assert_eq!(
            response.acks,
            vec![TrackingAck {
                logged_requests: 2,
                queued: false
            }]
        );
        // The sink got the set directly, the queue was never touched
        assert_eq!(sink.len(), 1);
        assert_eq!(handler.queue().size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enabled_queue_defers_tracking() {
        let sink = Arc::new(MemorySink::new());
        let handler = handler(
            &sink,
            TrackQueueConfig {
                drain_threshold: 100,
                process_during_request: false,
                ..Default::default()
            },
        );
        let mut response = RecordingChannel::new();

        handler.handle(request_set(3), &mut response).await;

        assert_eq!(
            response.acks,
            vec![TrackingAck {
                logged_requests: 3,
                queued: true
            }]
        );
        assert!(sink.is_empty());
        assert_eq!(handler.queue().size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_threshold_triggers_inline_drain() {
        let sink = Arc::new(MemorySink::new());
        let handler = handler(
            &sink,
            TrackQueueConfig {
                drain_threshold: 3,
                ..Default::default()
            },
        );

        for _ in 0..3 {
            let mut response = RecordingChannel::new();
            handler.handle(request_set(1), &mut response).await;
        }

        assert_eq!(handler.queue().size().await.unwrap(), 0);
        assert_eq!(sink.len(), 3);
    }
}
