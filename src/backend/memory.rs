use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{Backend, BackendError};

struct LockEntry {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
struct MemoryState {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    counters: HashMap<String, u64>,
    values: HashMap<String, String>,
    locks: HashMap<String, LockEntry>,
}

/// Single-process backend for tests and development.
///
/// One mutex guards all state, so every operation is atomic with respect
/// to other clones of the same backend, matching the contract the Redis
/// implementation gets from single commands.
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn push(&self, queue_key: &str, payload: Vec<u8>) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state
            .lists
            .entry(queue_key.to_string())
            .or_default()
            .push_back(payload);
        Ok(())
    }

    async fn pop_batch(&self, queue_key: &str, max: usize) -> Result<Vec<Vec<u8>>, BackendError> {
        let mut state = self.state.lock();
        let Some(list) = state.lists.get_mut(queue_key) else {
            return Ok(Vec::new());
        };
        let take = max.min(list.len());
        Ok(list.drain(..take).collect())
    }

    async fn size(&self, queue_key: &str) -> Result<u64, BackendError> {
        let state = self.state.lock();
        Ok(state.lists.get(queue_key).map_or(0, |l| l.len() as u64))
    }

    async fn increment(&self, counter_key: &str) -> Result<u64, BackendError> {
        let mut state = self.state.lock();
        let counter = state.counters.entry(counter_key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, BackendError> {
        let state = self.state.lock();
        Ok(state.values.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_if_not_exists(
        &self,
        lock_key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        match state.locks.get(lock_key) {
            Some(entry) if entry.expires_at > now => Ok(false),
            _ => {
                state.locks.insert(
                    lock_key.to_string(),
                    LockEntry {
                        token: token.to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn extend_if_value(
        &self,
        lock_key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        match state.locks.get_mut(lock_key) {
            Some(entry) if entry.expires_at > now && entry.token == token => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_value(&self, lock_key: &str, token: &str) -> Result<bool, BackendError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        match state.locks.get(lock_key) {
            Some(entry) if entry.expires_at > now && entry.token == token => {
                state.locks.remove(lock_key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
