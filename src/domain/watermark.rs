//! The persisted marker of the last republished video.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::video::VideoId;

/// Last video that was successfully republished.
///
/// Exactly one exists at a time; it is overwritten on every successful
/// transfer and never deleted. On disk it keeps the `{video_id, timestamp}`
/// shape so existing `last_video.json` files stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub video_id: VideoId,

    /// Epoch milliseconds at which the transfer was committed
    #[serde(rename = "timestamp")]
    pub observed_at_epoch_millis: i64,
}

impl Watermark {
    pub fn new(video_id: VideoId, observed_at_epoch_millis: i64) -> Self {
        Self {
            video_id,
            observed_at_epoch_millis,
        }
    }

    /// Watermark stamped with the current time
    pub fn now(video_id: VideoId) -> Self {
        Self::new(video_id, Utc::now().timestamp_millis())
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.observed_at_epoch_millis).single()
    }
}
