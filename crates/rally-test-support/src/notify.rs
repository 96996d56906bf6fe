//! Recording notification sink.

use std::sync::Mutex;

use async_trait::async_trait;
use rally_core::ids::CommunityId;
use rally_core::notify::NotificationSink;

/// A sink that keeps every announcement for later assertions.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    messages: Mutex<Vec<(CommunityId, String)>>,
}

impl RecordingNotificationSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything announced so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn messages(&self) -> Vec<(CommunityId, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn announce(&self, community: CommunityId, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((community, message.to_owned()));
    }
}
