// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic track-queue usage example.
//!
//! Demonstrates:
//! 1. Building a handler on the in-memory backend
//! 2. Feeding tracking hits through it
//! 3. Watching the threshold trigger an inline drain
//! 4. Displaying metrics (OTEL-compatible)
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```
//!
//! Point `redis_url` at a real Redis to run the same flow against a
//! shared store.

use std::collections::HashMap;
use std::sync::Arc;

use metrics_util::debugging::{DebuggingRecorder, Snapshotter};
use track_queue::{
    backend, Handler, MemorySink, RequestSet, ResponseChannel, TrackingAck, TrackingRequest,
    TrackQueueConfig,
};

struct StdoutChannel;

impl ResponseChannel for StdoutChannel {
    fn send(&mut self, ack: TrackingAck) {
        println!(
            "→ acknowledged: {} request(s), queued={}",
            ack.logged_requests, ack.queued
        );
    }
}

fn pageview(url: &str) -> RequestSet {
    let mut params = HashMap::new();
    params.insert("idsite".to_string(), "1".to_string());
    params.insert("url".to_string(), url.to_string());
    params.insert("action_name".to_string(), url.trim_matches('/').to_string());

    RequestSet::new(vec![TrackingRequest::new(params).with_client(
        Some("203.0.113.7".parse().unwrap()),
        Some("Mozilla/5.0 (demo)".to_string()),
    )])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures all metrics for inspection)
    let recorder = DebuggingRecorder::new();
    let snapshotter: Snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    // Simple logging (no filter for simplicity)
    tracing_subscriber::fmt().with_target(false).init();

    let config = TrackQueueConfig {
        redis_url: None, // in-memory backend; set a redis:// URL for a shared store
        drain_threshold: 3,
        ..Default::default()
    };

    let backend = backend::connect(&config).await?;
    let sink = Arc::new(MemorySink::new());
    let handler = Handler::new(backend, sink.clone(), config);

    println!("Enqueueing three pageviews (threshold is 3)...");
    for url in ["/home", "/pricing", "/signup"] {
        handler.handle(pageview(url), &mut StdoutChannel).await;
        println!(
            "  queue size now: {}",
            handler.queue().size().await?
        );
    }

    println!("\nDrained into the sink:");
    for set in sink.request_sets() {
        for request in set.requests() {
            println!("  tracked {}", request.params["url"]);
        }
    }

    println!("\nMetrics snapshot:");
    for (key, _, _, value) in snapshotter.snapshot().into_vec() {
        println!("  {} = {:?}", key.key().name(), value);
    }

    Ok(())
}
