//! Notification sink.

use async_trait::async_trait;
use tracing::info;

use crate::ids::CommunityId;

/// Fire-and-forget announcement channel. The engine never depends on
/// delivery, so there is no error to report.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Publish `message` to the community.
    async fn announce(&self, community: CommunityId, message: &str);
}

/// Sink that writes announcements to the log. Used when no front end is
/// attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn announce(&self, community: CommunityId, message: &str) {
        info!(%community, message, "announcement");
    }
}
