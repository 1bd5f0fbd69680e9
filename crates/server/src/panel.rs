//! Glue between the core and the public panel feed.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use frontdesk_core::{AnnouncementError, AnnouncementSink, QueueView};

use crate::api::queue::QueueResponse;
use crate::api::WsBroadcaster;

/// Interval between heartbeat messages on the WebSocket feed.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Announcement sink that logs and pushes the text to connected panels,
/// which do the speech synthesis.
pub struct PanelSink {
    broadcaster: WsBroadcaster,
}

impl PanelSink {
    pub fn new(broadcaster: WsBroadcaster) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl AnnouncementSink for PanelSink {
    async fn announce(&self, text: &str, locale: &str) -> Result<(), AnnouncementError> {
        info!(locale, "Announcement: {}", text);
        self.broadcaster.announcement(text, locale);
        Ok(())
    }
}

/// Push every snapshot the view publishes to WebSocket clients.
pub fn spawn_snapshot_forwarder(view: &QueueView, broadcaster: WsBroadcaster) -> JoinHandle<()> {
    let mut rx = view.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            broadcaster.queue_updated(QueueResponse::from(snapshot.as_ref()));
        }
        debug!("Queue view closed, snapshot forwarder stopping");
    })
}

/// Send a heartbeat to WebSocket clients every `interval`.
pub fn spawn_heartbeat(broadcaster: WsBroadcaster, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            broadcaster.heartbeat();
        }
    })
}
