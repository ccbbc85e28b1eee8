//! vidrelay - channel change detection and video transfer
//!
//! Watches a video channel for its newest upload, downloads it and
//! republishes it to the authenticated account's own channel, without ever
//! publishing the same video twice.
//!
//! # Architecture
//!
//! The system is built around a single durable watermark:
//! - The watermark records the last video that was republished
//! - A polled video is novel only if it differs from the watermark
//! - The watermark is written only after the destination confirmed the upload
//!
//! # Modules
//!
//! - `adapters`: External system integrations (YouTube API, yt-dlp, ffmpeg, OAuth)
//! - `core`: Change detection and transfer (WatermarkStore, SourcePoller, TransferOrchestrator, Relay)
//! - `domain`: Data structures (VideoId, Watermark, TransferAttempt, UploadMetadata)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Is there a new video?
//! vidrelay check
//!
//! # Transfer it if so
//! vidrelay run --visibility private
//!
//! # Retry an upload that failed after download
//! vidrelay upload downloads/abc123.mp4 --video-id abc123
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{CheckStatus, CycleOutcome, Relay, TransferOrchestrator, TransferOutcome, WatermarkStore};
pub use domain::{TransferAttempt, TransferPhase, VideoId, Watermark};
pub use error::{ConcurrencyError, DownloadError, PollError, StoreError, TransferError, UploadError};
