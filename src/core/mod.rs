//! Core change-detection and transfer logic.
//!
//! This module contains:
//! - WatermarkStore: durable record of the last republished video
//! - SourcePoller: newest published upload of the monitored channel
//! - Novelty: watermark comparison and the check status
//! - TransferOrchestrator: download → upload → commit for one video
//! - Relay: one poll-and-maybe-transfer cycle

pub mod novelty;
pub mod orchestrator;
pub mod poller;
pub mod relay;
pub mod watermark;

// Re-export commonly used types
pub use novelty::{is_novel, CheckStatus};
pub use orchestrator::{TransferObserver, TransferOrchestrator, TransferOutcome, UploadOverrides};
pub use poller::SourcePoller;
pub use relay::{check_status, CycleOutcome, Relay};
pub use watermark::WatermarkStore;
