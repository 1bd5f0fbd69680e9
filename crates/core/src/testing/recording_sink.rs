//! Announcement sink that records what it was given.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::announce::{AnnouncementError, AnnouncementSink};

/// Records `(text, locale)` pairs; can be made to fail every call.
#[derive(Default)]
pub struct RecordingSink {
    announcements: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    should_fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Successfully delivered announcements, oldest first.
    pub fn announcements(&self) -> Vec<(String, String)> {
        self.announcements.lock().unwrap().clone()
    }

    /// Number of `announce` calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnnouncementSink for RecordingSink {
    async fn announce(&self, text: &str, locale: &str) -> Result<(), AnnouncementError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(AnnouncementError::Unavailable("speaker offline".to_string()));
        }
        self.announcements
            .lock()
            .unwrap()
            .push((text.to_string(), locale.to_string()));
        Ok(())
    }
}
