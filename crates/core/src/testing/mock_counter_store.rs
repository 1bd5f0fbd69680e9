//! In-memory counter store that only offers get/set/compare-and-set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::counter::CounterStore;
use crate::ticket::QueueError;

/// Counter store relying on the default CAS-loop `increment`.
///
/// `fail_next_cas(n)` makes the next `n` compare-and-set calls lose the race
/// as if another process had written first.
#[derive(Default)]
pub struct MockCounterStore {
    values: Mutex<HashMap<String, u64>>,
    cas_failures: AtomicUsize,
}

impl MockCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` compare-and-set calls report contention.
    pub fn fail_next_cas(&self, n: usize) {
        self.cas_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl CounterStore for MockCounterStore {
    async fn get(&self, key: &str) -> Result<u64, QueueError> {
        Ok(self.values.lock().unwrap().get(key).copied().unwrap_or(0))
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), QueueError> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: u64,
        new: u64,
    ) -> Result<bool, QueueError> {
        let remaining = self.cas_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.cas_failures.store(remaining - 1, Ordering::SeqCst);
            }
            return Ok(false);
        }

        let mut values = self.values.lock().unwrap();
        let current = values.get(key).copied().unwrap_or(0);
        if current != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), new);
        Ok(true)
    }
}
