//! Key-value counter storage trait.

use async_trait::async_trait;

use crate::ticket::QueueError;

/// Attempts made by the default compare-and-swap increment before giving up.
pub const MAX_INCREMENT_ATTEMPTS: usize = 16;

/// Durable integer counters keyed by name.
///
/// Missing keys read as 0.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a counter.
    async fn get(&self, key: &str) -> Result<u64, QueueError>;

    /// Overwrite a counter.
    async fn set(&self, key: &str, value: u64) -> Result<(), QueueError>;

    /// Set `key` to `new` only if it currently holds `expected`.
    /// Returns false when the stored value differs.
    async fn compare_and_set(&self, key: &str, expected: u64, new: u64)
        -> Result<bool, QueueError>;

    /// Atomically increment and return the new value, persisted before returning.
    ///
    /// The default is an optimistic retry loop over `compare_and_set`; a
    /// contended attempt may burn a number but never hands out a duplicate.
    async fn increment(&self, key: &str) -> Result<u64, QueueError> {
        for attempt in 1..=MAX_INCREMENT_ATTEMPTS {
            let current = self.get(key).await?;
            let next = current + 1;
            if self.compare_and_set(key, current, next).await? {
                return Ok(next);
            }
            tracing::debug!("Counter {} contended (attempt {})", key, attempt);
        }
        Err(QueueError::Conflict(format!(
            "counter {} still contended after {} attempts",
            key, MAX_INCREMENT_ATTEMPTS
        )))
    }
}
