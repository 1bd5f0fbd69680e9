use std::sync::Arc;

use tracing::{debug, info};

use super::store::MAX_INCREMENT_ATTEMPTS;
use super::CounterStore;
use crate::ticket::{QueueError, TicketClass};

const NORMAL_KEY: &str = "normal_seq";
const PRIORITY_KEY: &str = "priority_seq";
const EPOCH_KEY: &str = "epoch";

/// Issues ticket numbers per class.
///
/// Numbers are unique within a class for the current epoch. A reset moves to
/// a new epoch and restarts both classes at 1.
#[derive(Clone)]
pub struct TicketCounter {
    store: Arc<dyn CounterStore>,
}

impl TicketCounter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    fn key(class: TicketClass) -> &'static str {
        match class {
            TicketClass::Normal => NORMAL_KEY,
            TicketClass::Priority => PRIORITY_KEY,
        }
    }

    /// Claim the next number for `class`.
    pub async fn next(&self, class: TicketClass) -> Result<u64, QueueError> {
        self.store.increment(Self::key(class)).await
    }

    /// Claim the next number for `class` together with the epoch it belongs to.
    ///
    /// The epoch is read on both sides of the increment. If a reset moved it in
    /// between, the number may belong to the old epoch and the claim starts
    /// over in the new one.
    pub async fn claim(&self, class: TicketClass) -> Result<(u64, u64), QueueError> {
        for attempt in 1..=MAX_INCREMENT_ATTEMPTS {
            let epoch = self.epoch().await?;
            let number = self.next(class).await?;
            let after = self.epoch().await?;
            if after == epoch {
                return Ok((epoch, number));
            }
            debug!(
                "Epoch moved from {} to {} during claim of {} number (attempt {})",
                epoch, after, class, attempt
            );
        }
        Err(QueueError::Conflict(format!(
            "epoch kept moving while claiming a {} number",
            class
        )))
    }

    /// Last number issued for `class` in the current epoch (0 if none).
    pub async fn current(&self, class: TicketClass) -> Result<u64, QueueError> {
        self.store.get(Self::key(class)).await
    }

    /// Number the next ticket of `class` will probably get.
    ///
    /// Display hint only: another desk may claim it first.
    pub async fn peek(&self, class: TicketClass) -> Result<u64, QueueError> {
        Ok(self.current(class).await? + 1)
    }

    /// Current numbering epoch.
    pub async fn epoch(&self) -> Result<u64, QueueError> {
        self.store.get(EPOCH_KEY).await
    }

    /// Start a new epoch and zero both class counters. Returns the new epoch.
    ///
    /// The epoch moves first: if zeroing fails halfway, numbers keep counting
    /// up in the new epoch and stay unique, and a retry finishes the job.
    pub async fn reset(&self) -> Result<u64, QueueError> {
        let epoch = self.store.increment(EPOCH_KEY).await?;
        for class in TicketClass::ALL {
            self.store.set(Self::key(class), 0).await?;
        }
        info!("Ticket counters reset, epoch {}", epoch);
        Ok(epoch)
    }
}
