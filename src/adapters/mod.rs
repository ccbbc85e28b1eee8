//! Adapter interfaces for external systems.
//!
//! The core only talks to collaborators through these traits:
//! - `PlatformApi`: read-only queries against the source platform
//! - `Downloader`: fetches a video's media file to local disk
//! - `Uploader`: publishes a local file to the destination channel
//! - `CredentialSource`: hands out the destination bearer credential
//!
//! Concrete implementations are picked once at construction time.

pub mod credentials;
pub mod ffmpeg;
pub mod oauth;
#[cfg(test)]
mod stub_http;
pub mod youtube;
pub mod ytdlp;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{ChannelId, Credential, UploadListing, UploadMetadata, VideoId};
use crate::error::{DownloadError, PollError, UploadError};

pub use credentials::{RefreshingTokenFile, StaticCredentials, StoredTokens, TokenFile};
pub use ffmpeg::TrimmedDownloader;
pub use oauth::OAuthClient;
pub use youtube::{YouTubeDataApi, YouTubeUploader};
pub use ytdlp::YtDlpDownloader;

/// Read-only access to the source platform
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Newest entry of the channel's uploads listing, or None if it has none
    async fn latest_upload(&self, channel: &ChannelId) -> Result<Option<UploadListing>, PollError>;
}

/// Produces a playable local media file for a video
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Download the video and return the path of the finished file.
    ///
    /// Implementations must remove any partial file before returning an error.
    async fn download(&self, video_id: &VideoId) -> Result<PathBuf, DownloadError>;

    /// A complete file left over from an earlier attempt, if any
    async fn existing(&self, _video_id: &VideoId) -> Option<PathBuf> {
        None
    }

    /// Remove whatever an interrupted download left behind
    async fn discard(&self, _video_id: &VideoId) {}
}

/// Publishes a local file to the destination channel
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Upload the file and return the destination-assigned video id.
    ///
    /// Must not delete the local file.
    async fn upload(
        &self,
        credential: &Credential,
        file: &Path,
        metadata: &UploadMetadata,
    ) -> Result<String, UploadError>;
}

/// Supplies the destination account's bearer credential
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn current(&self) -> Result<Credential, UploadError>;
}
