use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AnnouncementEvent;

/// Envelope wrapping an announcement event with the time it was emitted
#[derive(Debug, Clone)]
pub struct AnnouncementEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AnnouncementEvent,
}

/// Handle for emitting announcement events
///
/// Cheaply cloneable. Events go through a bounded channel to the
/// `AnnouncementWriter`; emitting never fails the caller.
#[derive(Clone)]
pub struct AnnouncementHandle {
    tx: mpsc::Sender<AnnouncementEnvelope>,
}

impl AnnouncementHandle {
    /// Create a new announcement handle from a channel sender
    pub fn new(tx: mpsc::Sender<AnnouncementEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity if needed
    ///
    /// If the channel is closed the error is logged and swallowed.
    pub async fn emit(&self, event: AnnouncementEvent) {
        let envelope = AnnouncementEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit announcement: {}", e);
        }
    }

    /// Emit an event without waiting
    ///
    /// Returns false if the channel is full or closed; the event is dropped.
    pub fn try_emit(&self, event: AnnouncementEvent) -> bool {
        let envelope = AnnouncementEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Dropped announcement: {}", e);
                false
            }
        }
    }
}
