//! Source video identity and channel listings.

use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a video on the source platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public watch URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VideoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of the monitored channel (always the canonical `UC…` form)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Resolve a channel identifier given either as a raw `UC…` id or as
    /// a `https://…/channel/UC…` URL.
    ///
    /// Handles (`@name`) and custom URLs need an API lookup and are not
    /// accepted here.
    pub fn parse(identifier: &str) -> Option<Self> {
        let identifier = identifier.trim();

        if identifier.starts_with("UC") && identifier.len() > 20 {
            return Some(Self(identifier.to_string()));
        }

        if identifier.starts_with("http") {
            let url = Url::parse(identifier).ok()?;
            let mut segments = url.path_segments()?;
            while let Some(segment) = segments.next() {
                if segment == "channel" {
                    let id: String = segments
                        .next()?
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                        .collect();
                    if id.starts_with("UC") && id.len() > 2 {
                        return Some(Self(id));
                    }
                    return None;
                }
            }
        }

        None
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live-stream metadata attached to a video, if it is (or was) a broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStreamingDetails {
    pub scheduled_start: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
}

impl LiveStreamingDetails {
    /// A broadcast that has not gone live yet
    pub fn is_upcoming(&self) -> bool {
        self.actual_start.is_none()
    }
}

/// Newest entry of a channel's uploads listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadListing {
    pub video_id: VideoId,

    /// Present only for live broadcasts
    pub live: Option<LiveStreamingDetails>,
}

impl UploadListing {
    /// A plain upload with no live-stream metadata
    pub fn uploaded(video_id: impl Into<VideoId>) -> Self {
        Self {
            video_id: video_id.into(),
            live: None,
        }
    }

    /// Scheduled or waiting broadcasts are not transferable yet
    pub fn is_live_pending(&self) -> bool {
        self.live.as_ref().map_or(false, LiveStreamingDetails::is_upcoming)
    }
}
