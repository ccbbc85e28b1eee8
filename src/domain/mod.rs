//! Domain types for vidrelay.
//!
//! This module contains the core data structures:
//! - Video: source identifiers and uploads listings
//! - Watermark: the persisted last-transferred marker
//! - Attempt: in-memory state of one transfer
//! - Upload: metadata and credentials for publishing

pub mod attempt;
pub mod upload;
pub mod video;
pub mod watermark;

// Re-export commonly used types
pub use attempt::{ErrorInfo, TransferAttempt, TransferPhase};
pub use upload::{Credential, UploadDefaults, UploadMetadata, Visibility};
pub use video::{ChannelId, LiveStreamingDetails, UploadListing, VideoId};
pub use watermark::Watermark;
