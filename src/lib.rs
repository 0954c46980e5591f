//! # Track Queue
//!
//! A shared-store ingestion queue for high-volume analytics tracking
//! hits: acknowledge the client immediately, defer the expensive work
//! (parsing, deduplication, persistence) to a drain shared across many
//! stateless request workers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Handler                             │
//! │  • One call per inbound tracking request                    │
//! │  • Queue-vs-synchronous decision                            │
//! │  • Acknowledgment always sent before any draining           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Queue                              │
//! │  • Serializes request sets into sequenced envelopes         │
//! │  • Dual drain trigger: backlog threshold OR staleness       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               (opportunistic drain, behind QueueLock)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Processor                            │
//! │  • Pops batches FIFO, bounded by a per-pass cap             │
//! │  • Per-batch failure isolation into a DrainReport           │
//! │  • Extends the lock between rounds, always unlocks          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TrackingSink (collaborator)                 │
//! │  • Persists visit/action/goal records                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All coordination (queue contents, sequence numbers, the drain lock)
//! goes through the [`Backend`] store (Redis in production, in-memory
//! for tests). There are no in-process singletons: every worker wires
//! its own `Queue`/`QueueLock`/`Processor` to the same key namespace,
//! and correctness derives from the store's atomic primitives.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use track_queue::{backend, Handler, MemorySink, RequestSet, ResponseChannel,
//!                   TrackingAck, TrackingRequest, TrackQueueConfig};
//!
//! struct StdoutChannel;
//! impl ResponseChannel for StdoutChannel {
//!     fn send(&mut self, ack: TrackingAck) {
//!         println!("tracked {} request(s)", ack.logged_requests);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TrackQueueConfig {
//!         redis_url: Some("redis://localhost:6379".into()),
//!         drain_threshold: 25,
//!         ..Default::default()
//!     };
//!
//!     let backend = backend::connect(&config).await?;
//!     let sink = Arc::new(MemorySink::new()); // your tracking engine here
//!     let handler = Handler::new(backend, sink, config);
//!
//!     let hits = RequestSet::new(vec![TrackingRequest::new(Default::default())]);
//!     handler.handle(hits, &mut StdoutChannel).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`handler`]: per-request orchestration
//! - [`queue`]: the shared FIFO and its drain-trigger policy
//! - [`lock`]: distributed mutual exclusion with an expiring token
//! - [`processor`]: the batch-draining state machine
//! - [`backend`]: storage backends (Redis, in-memory)
//! - [`sink`]: the tracking-engine boundary
//! - [`config`]: configuration
//! - [`metrics`]: instrumentation facade

pub mod backend;
pub mod config;
pub mod handler;
pub mod lock;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod request_set;
pub mod sink;

pub use backend::{Backend, BackendError, InMemoryBackend, RedisBackend};
pub use config::TrackQueueConfig;
pub use handler::{Handler, ResponseChannel, TrackingAck};
pub use lock::QueueLock;
pub use processor::{BatchFailure, DrainReport, Processor, ProcessorState};
pub use queue::{Queue, QueueError};
pub use request_set::{QueuedBatch, RequestSet, TrackingRequest};
pub use sink::{MemorySink, SinkError, SinkReport, TrackingSink};
