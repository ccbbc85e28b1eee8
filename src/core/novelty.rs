//! Novelty detection and the status surface derived from it.

use serde::Serialize;

use crate::domain::{VideoId, Watermark};

/// A candidate is novel iff it exists and differs from the watermark
pub fn is_novel(candidate: Option<&VideoId>, watermark: Option<&Watermark>) -> bool {
    match (candidate, watermark) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(candidate), Some(watermark)) => *candidate != watermark.video_id,
    }
}

/// Status exposed to a presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatus {
    pub has_new_video: bool,
    pub latest_video_id: Option<VideoId>,
    pub last_video_id: Option<VideoId>,
    pub message: String,
}

impl CheckStatus {
    /// Derive the status from a poll result and the current watermark
    pub fn derive(latest: Option<VideoId>, watermark: Option<&Watermark>) -> Self {
        let has_new_video = is_novel(latest.as_ref(), watermark);
        let message = match (&latest, has_new_video) {
            (None, _) => "No uploads found yet",
            (Some(_), true) => "New video detected!",
            (Some(_), false) => "No new video",
        };

        Self {
            has_new_video,
            latest_video_id: latest,
            last_video_id: watermark.map(|w| w.video_id.clone()),
            message: message.to_string(),
        }
    }

    /// Status when the platform could not be queried
    pub fn poll_failed(watermark: Option<&Watermark>, reason: &str) -> Self {
        Self {
            has_new_video: false,
            latest_video_id: None,
            last_video_id: watermark.map(|w| w.video_id.clone()),
            message: format!("Could not check for new videos: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watermark(id: &str) -> Watermark {
        Watermark::new(VideoId::from(id), 0)
    }

    #[test]
    fn test_is_novel_truth_table() {
        let abc = VideoId::from("abc123");
        let xyz = VideoId::from("xyz789");

        assert!(!is_novel(None, None));
        assert!(!is_novel(None, Some(&watermark("abc123"))));
        assert!(is_novel(Some(&abc), None));
        assert!(!is_novel(Some(&abc), Some(&watermark("abc123"))));
        assert!(is_novel(Some(&xyz), Some(&watermark("abc123"))));
    }

    #[test]
    fn test_status_messages() {
        let none = CheckStatus::derive(None, None);
        assert!(!none.has_new_video);
        assert_eq!(none.message, "No uploads found yet");

        let new = CheckStatus::derive(Some(VideoId::from("abc123")), None);
        assert!(new.has_new_video);
        assert_eq!(new.message, "New video detected!");

        let last = watermark("abc123");
        let same = CheckStatus::derive(Some(VideoId::from("abc123")), Some(&last));
        assert!(!same.has_new_video);
        assert_eq!(same.message, "No new video");
        assert_eq!(same.last_video_id, Some(VideoId::from("abc123")));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = CheckStatus::derive(Some(VideoId::from("abc123")), None);
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["hasNewVideo"], true);
        assert_eq!(json["latestVideoId"], "abc123");
        assert!(json["lastVideoId"].is_null());
    }
}
