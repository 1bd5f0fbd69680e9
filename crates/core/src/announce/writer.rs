use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AnnouncementEnvelope, AnnouncementHandle, AnnouncementSink, Locale};
use crate::metrics::ANNOUNCEMENTS;

/// Background task that renders announcement events and delivers them to a sink
pub struct AnnouncementWriter {
    rx: mpsc::Receiver<AnnouncementEnvelope>,
    sink: Arc<dyn AnnouncementSink>,
    locale: Locale,
}

impl AnnouncementWriter {
    /// Create a new announcement writer
    pub fn new(
        rx: mpsc::Receiver<AnnouncementEnvelope>,
        sink: Arc<dyn AnnouncementSink>,
        locale: Locale,
    ) -> Self {
        Self { rx, sink, locale }
    }

    /// Run the writer, consuming events until every handle is dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!("Announcement writer started ({})", self.locale);

        while let Some(envelope) = self.rx.recv().await {
            let text = envelope.event.render(self.locale);
            match self.sink.announce(&text, self.locale.tag()).await {
                Ok(()) => {
                    ANNOUNCEMENTS.with_label_values(&["delivered"]).inc();
                    tracing::debug!(
                        "Delivered {} for ticket {}",
                        envelope.event.event_type(),
                        envelope.event.ticket_id()
                    );
                }
                Err(e) => {
                    ANNOUNCEMENTS.with_label_values(&["failed"]).inc();
                    tracing::warn!("Failed to deliver announcement: {}", e);
                }
            }
        }

        tracing::info!("Announcement writer shutting down");
    }
}

/// Create a complete announcement system
///
/// Returns:
/// - `AnnouncementHandle` - for emitting events (clone this to share across tasks)
/// - `AnnouncementWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_announcement_system(
    sink: Arc<dyn AnnouncementSink>,
    locale: Locale,
    buffer_size: usize,
) -> (AnnouncementHandle, AnnouncementWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = AnnouncementHandle::new(tx);
    let writer = AnnouncementWriter::new(rx, sink, locale);
    (handle, writer)
}
