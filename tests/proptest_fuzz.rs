//! Property-based tests for queue resilience.
//!
//! Uses proptest to throw arbitrary payloads and pop patterns at the
//! queue protocol and verify it never panics and never reorders.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;

use track_queue::{Backend, InMemoryBackend, QueuedBatch};

proptest! {
    /// Decoding arbitrary bytes must return a clean error, never panic.
    #[test]
    fn decode_never_panics(payload in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = QueuedBatch::decode(&payload);
    }

    /// Whatever the interleaving of pushes and pop sizes, payloads come
    /// back in push order with nothing lost or duplicated.
    #[test]
    fn pops_preserve_fifo_order(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..40),
        pop_sizes in prop::collection::vec(1usize..8, 1..60),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        rt.block_on(async {
            let backend = InMemoryBackend::new();
            for payload in &payloads {
                backend.push("q", payload.clone()).await.unwrap();
            }

            let mut popped = Vec::new();
            for size in pop_sizes {
                let batch = backend.pop_batch("q", size).await.unwrap();
                prop_assert!(batch.len() <= size);
                popped.extend(batch);
                if backend.size("q").await.unwrap() == 0 {
                    break;
                }
            }
            // Drain whatever the pop pattern left behind
            popped.extend(backend.pop_batch("q", payloads.len()).await.unwrap());

            prop_assert_eq!(popped, payloads);
            Ok(())
        })?;
    }
}
