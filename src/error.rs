//! Error taxonomy shared by the core and its collaborators.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{TransferPhase, VideoId};

/// Failure to query the source platform.
///
/// "No uploads" is not an error; the poller returns `None` for it.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Platform request failed: {0}")]
    Network(String),

    #[error("Platform rejected the API key: {0}")]
    Authorization(String),

    #[error("Unexpected platform response: {0}")]
    Upstream(String),
}

/// Failure to produce a local media file
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Download of {video_id} failed: {message}")]
    Tool { video_id: VideoId, message: String },

    #[error("Download of {video_id} timed out after {seconds}s")]
    Timeout { video_id: VideoId, seconds: u64 },

    #[error("Disk error while downloading: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to publish a local file to the destination
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No upload credential available: {0}")]
    MissingCredential(String),

    #[error("Upload credential is invalid or expired: {0}")]
    CredentialRejected(String),

    #[error("Destination rejected the upload: {0}")]
    Rejected(String),

    #[error("Upload request failed: {0}")]
    Network(String),

    #[error("Failed to read file for upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to persist the watermark
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Watermark file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watermark serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A transfer was requested while another one is still running
#[derive(Debug, Clone, Error)]
#[error("Transfer of {active} is already in progress ({phase})")]
pub struct ConcurrencyError {
    pub active: VideoId,
    pub phase: TransferPhase,
}

/// Terminal outcome of a failed transfer request
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    InProgress(#[from] ConcurrencyError),

    #[error("Download failed: {0}")]
    Download(#[source] DownloadError),

    #[error("Upload failed (local file kept at {}): {source}", .local_file.display())]
    Upload {
        #[source]
        source: UploadError,
        video_id: VideoId,
        local_file: PathBuf,
    },

    #[error("Transfer of {video_id} was cancelled before upload ({phase})")]
    Cancelled {
        video_id: VideoId,
        phase: TransferPhase,
    },
}

impl TransferError {
    /// Phase in which the failure happened (None if the attempt never started)
    pub fn phase(&self) -> Option<TransferPhase> {
        match self {
            Self::InProgress(_) => None,
            Self::Download(_) => Some(TransferPhase::Downloading),
            Self::Upload { .. } => Some(TransferPhase::Uploading),
            Self::Cancelled { phase, .. } => Some(*phase),
        }
    }

    /// Downloaded file left on disk for a retry that skips the download
    pub fn retained_file(&self) -> Option<&Path> {
        match self {
            Self::Upload { local_file, .. } => Some(local_file),
            _ => None,
        }
    }

    /// Command that uploads the retained file and records the video
    pub fn retry_command(&self) -> Option<String> {
        match self {
            Self::Upload {
                video_id,
                local_file,
                ..
            } => Some(format!(
                "vidrelay upload {} --video-id {}",
                local_file.display(),
                video_id
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_keeps_file() {
        let err = TransferError::Upload {
            source: UploadError::CredentialRejected("401".to_string()),
            video_id: VideoId::from("abc123"),
            local_file: PathBuf::from("downloads/abc123.mp4"),
        };

        assert_eq!(err.phase(), Some(TransferPhase::Uploading));
        assert_eq!(
            err.retained_file(),
            Some(Path::new("downloads/abc123.mp4"))
        );
        assert!(err.to_string().contains("downloads/abc123.mp4"));
        assert_eq!(
            err.retry_command().as_deref(),
            Some("vidrelay upload downloads/abc123.mp4 --video-id abc123")
        );
    }

    #[test]
    fn test_cancelled_reports_its_phase() {
        let err = TransferError::Cancelled {
            video_id: VideoId::from("abc123"),
            phase: TransferPhase::Downloaded,
        };

        assert_eq!(err.phase(), Some(TransferPhase::Downloaded));
        assert!(err.retained_file().is_none());
        assert!(err.retry_command().is_none());
        assert_eq!(
            err.to_string(),
            "Transfer of abc123 was cancelled before upload (downloaded)"
        );
    }

    #[test]
    fn test_concurrency_error_message() {
        let err: TransferError = ConcurrencyError {
            active: VideoId::from("v1"),
            phase: TransferPhase::Downloading,
        }
        .into();

        assert!(err.phase().is_none());
        assert!(err.retry_command().is_none());
        assert_eq!(
            err.to_string(),
            "Transfer of v1 is already in progress (downloading)"
        );
    }
}
