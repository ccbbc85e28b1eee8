//! Source poller: newest published video of the monitored channel.

use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::PlatformApi;
use crate::domain::{ChannelId, VideoId};
use crate::error::PollError;

/// Finds the newest transferable upload of a channel
pub struct SourcePoller {
    api: Arc<dyn PlatformApi>,
}

impl SourcePoller {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self { api }
    }

    /// Newest upload that has actually been published.
    ///
    /// Returns `Ok(None)` when the channel has no uploads or the newest item
    /// is a broadcast that has not started yet. Errors mean the platform
    /// could not be queried; callers must leave all state untouched.
    pub async fn latest_published_video(
        &self,
        channel: &ChannelId,
    ) -> Result<Option<VideoId>, PollError> {
        let Some(listing) = self.api.latest_upload(channel).await? else {
            debug!(%channel, api = self.api.name(), "Channel has no uploads");
            return Ok(None);
        };

        if listing.is_live_pending() {
            info!(video_id = %listing.video_id, "Skipping upcoming live event");
            return Ok(None);
        }

        Ok(Some(listing.video_id))
    }
}
