//! In-memory state of a single transfer.
//!
//! A TransferAttempt lives only as long as one download → upload → commit
//! sequence. It is never persisted; the watermark is the only durable state.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::video::VideoId;

/// Phase of a transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    /// Accepted, nothing started yet
    Pending,

    /// Fetching the media file from the source
    Downloading,

    /// Media file is on local disk
    Downloaded,

    /// Pushing the file to the destination channel
    Uploading,

    /// Uploaded and committed
    Completed,

    /// Stopped with an error (see `TransferAttempt::error`)
    Failed,
}

impl TransferPhase {
    /// Completed and Failed end an attempt
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Cancellation is honoured only before the upload begins
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Downloading | Self::Downloaded)
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why an attempt failed, and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Phase the attempt was in when it failed
    pub phase: TransferPhase,

    /// Human-readable message
    pub message: String,
}

/// One download → upload → commit sequence for a single video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAttempt {
    /// Unique identifier for this attempt (used in logs)
    pub id: Uuid,

    /// Source video being transferred
    pub video_id: VideoId,

    /// Current phase
    pub phase: TransferPhase,

    /// When the attempt was accepted
    pub started_at: DateTime<Utc>,

    /// When the attempt reached a terminal phase
    pub finished_at: Option<DateTime<Utc>>,

    /// Downloaded media file, once available
    pub local_file: Option<PathBuf>,

    /// Identifier assigned by the destination after upload
    pub uploaded_video_id: Option<String>,

    /// Failure details (only when phase is Failed)
    pub error: Option<ErrorInfo>,
}

impl TransferAttempt {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id,
            phase: TransferPhase::Pending,
            started_at: Utc::now(),
            finished_at: None,
            local_file: None,
            uploaded_video_id: None,
            error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.phase.is_terminal()
    }

    /// Move to a non-terminal phase
    pub fn advance(&mut self, phase: TransferPhase) {
        self.phase = phase;
    }

    pub fn complete(&mut self, uploaded_video_id: String) {
        self.phase = TransferPhase::Completed;
        self.uploaded_video_id = Some(uploaded_video_id);
        self.finished_at = Some(Utc::now());
    }

    /// Record a failure in the current phase
    pub fn fail(&mut self, message: String) {
        self.error = Some(ErrorInfo {
            phase: self.phase,
            message,
        });
        self.phase = TransferPhase::Failed;
        self.finished_at = Some(Utc::now());
    }
}
