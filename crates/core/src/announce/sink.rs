use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnouncementError {
    #[error("Announcement sink unavailable: {0}")]
    Unavailable(String),
}

/// Consumer of rendered announcements (speech synthesis, panel, ...).
///
/// Fire-and-forget: the writer logs failures and moves on.
#[async_trait]
pub trait AnnouncementSink: Send + Sync {
    async fn announce(&self, text: &str, locale: &str) -> Result<(), AnnouncementError>;
}
