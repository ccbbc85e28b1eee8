//! YouTube Data API v3 adapters.
//!
//! `YouTubeDataApi` answers "what is the newest upload of this channel" with an
//! API key. `YouTubeUploader` publishes a local file with an OAuth bearer token
//! using the resumable upload protocol (metadata POST, then one PUT of the bytes).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{PlatformApi, Uploader};
use crate::domain::{ChannelId, Credential, LiveStreamingDetails, UploadListing, UploadMetadata, VideoId};
use crate::error::{PollError, UploadError};

pub const DATA_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Generic `{ "items": [...] }` list response
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Option<PlaylistSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    live_streaming_details: Option<LiveStreamingWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingWire {
    scheduled_start_time: Option<DateTime<Utc>>,
    actual_start_time: Option<DateTime<Utc>>,
}

/// Google error envelope: `{ "error": { "message": ... } }`
#[derive(Debug, Deserialize)]
struct GoogleError {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

/// Response of the final upload request
#[derive(Debug, Deserialize)]
struct InsertedVideo {
    id: Option<String>,
}

/// Best human-readable message from an error body
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<GoogleError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status, body.trim()))
}

fn uploads_playlist(channels: ListResponse<ChannelItem>) -> Option<String> {
    channels
        .items
        .into_iter()
        .next()?
        .content_details?
        .related_playlists?
        .uploads
        .filter(|id| !id.is_empty())
}

fn newest_video(playlist: ListResponse<PlaylistItem>) -> Option<VideoId> {
    playlist
        .items
        .into_iter()
        .next()?
        .snippet?
        .resource_id?
        .video_id
        .filter(|id| !id.is_empty())
        .map(VideoId::from)
}

fn live_details(videos: ListResponse<VideoItem>) -> Option<LiveStreamingDetails> {
    let wire = videos.items.into_iter().next()?.live_streaming_details?;
    Some(LiveStreamingDetails {
        scheduled_start: wire.scheduled_start_time,
        actual_start: wire.actual_start_time,
    })
}

fn build_client(request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Read-only YouTube Data API client
pub struct YouTubeDataApi {
    /// API key for unauthenticated reads
    api_key: String,

    /// API root (overridable for tests)
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl YouTubeDataApi {
    pub fn new(api_key: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DATA_API_BASE.to_string(),
            client: build_client(request_timeout),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build API URL
    fn api_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), resource)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<T, PollError> {
        let response = self
            .client
            .get(self.api_url(resource))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| PollError::Network(format!("{} request failed: {}", resource, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PollError::Authorization(message),
                _ => PollError::Upstream(message),
            });
        }

        response
            .json()
            .await
            .map_err(|e| PollError::Upstream(format!("invalid {} response: {}", resource, e)))
    }
}

#[async_trait]
impl PlatformApi for YouTubeDataApi {
    fn name(&self) -> &str {
        "youtube-data-api"
    }

    async fn latest_upload(&self, channel: &ChannelId) -> Result<Option<UploadListing>, PollError> {
        let channels: ListResponse<ChannelItem> = self
            .get("channels", &[("part", "contentDetails"), ("id", channel.as_str())])
            .await?;
        if channels.items.is_empty() {
            warn!(%channel, "Channel not found");
            return Ok(None);
        }
        let Some(playlist_id) = uploads_playlist(channels) else {
            debug!(%channel, "Channel has no uploads playlist");
            return Ok(None);
        };

        let playlist: ListResponse<PlaylistItem> = self
            .get(
                "playlistItems",
                &[("part", "snippet"), ("playlistId", playlist_id.as_str()), ("maxResults", "1")],
            )
            .await?;
        let Some(video_id) = newest_video(playlist) else {
            return Ok(None);
        };

        let videos: ListResponse<VideoItem> = self
            .get(
                "videos",
                &[("part", "liveStreamingDetails"), ("id", video_id.as_str())],
            )
            .await?;

        Ok(Some(UploadListing {
            video_id,
            live: live_details(videos),
        }))
    }
}

/// Publishes videos to the authenticated account's channel
pub struct YouTubeUploader {
    /// Upload endpoint (overridable for tests)
    endpoint: String,

    /// HTTP client
    client: reqwest::Client,
}

impl YouTubeUploader {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            endpoint: UPLOAD_ENDPOINT.to_string(),
            client: build_client(request_timeout),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// JSON body describing the video
    fn resource_body(metadata: &UploadMetadata) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "categoryId": metadata.category_id,
            },
            "status": {
                "privacyStatus": metadata.visibility.as_str(),
            },
        })
    }

    /// Map a non-success response to the matching upload error
    async fn check(response: Response) -> Result<Response, UploadError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        Err(match status {
            StatusCode::UNAUTHORIZED => UploadError::CredentialRejected(message),
            _ => UploadError::Rejected(message),
        })
    }
}

#[async_trait]
impl Uploader for YouTubeUploader {
    fn name(&self) -> &str {
        "youtube-upload"
    }

    async fn upload(
        &self,
        credential: &Credential,
        file: &Path,
        metadata: &UploadMetadata,
    ) -> Result<String, UploadError> {
        let size_bytes = tokio::fs::metadata(file).await?.len();
        info!(
            file = %file.display(),
            size_bytes,
            title = %metadata.title,
            visibility = %metadata.visibility,
            "Starting resumable upload"
        );

        let session = self
            .client
            .post(&self.endpoint)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&credential.access_token)
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", size_bytes.to_string())
            .json(&Self::resource_body(metadata))
            .send()
            .await
            .map_err(|e| UploadError::Network(format!("failed to open upload session: {}", e)))?;
        let session = Self::check(session).await?;

        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| UploadError::Rejected("upload session has no location".to_string()))?;

        // Streamed from disk, videos can be larger than memory
        let media = tokio::fs::File::open(file).await?;
        let response = self
            .client
            .put(&location)
            .bearer_auth(&credential.access_token)
            .header(CONTENT_TYPE, "video/*")
            .header(CONTENT_LENGTH, size_bytes)
            .body(Body::from(media))
            .send()
            .await
            .map_err(|e| UploadError::Network(format!("failed to send video bytes: {}", e)))?;
        let response = Self::check(response).await?;

        let inserted: InsertedVideo = response
            .json()
            .await
            .map_err(|e| UploadError::Rejected(format!("invalid upload response: {}", e)))?;

        inserted
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| UploadError::Rejected("no video id returned".to_string()))
    }
}
