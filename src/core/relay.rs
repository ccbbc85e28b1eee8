//! Relay cycle: poll the channel, compare against the watermark and
//! transfer the newest video if it has not been republished yet.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::{ChannelId, VideoId};
use crate::error::TransferError;

use super::novelty::{is_novel, CheckStatus};
use super::orchestrator::{TransferOrchestrator, TransferOutcome};
use super::poller::SourcePoller;
use super::watermark::WatermarkStore;

/// What one relay cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The platform could not be queried; nothing was changed
    PollFailed(String),

    /// The channel has nothing transferable yet
    NoUploads,

    /// The newest video matches the watermark
    UpToDate(VideoId),

    /// A new video was republished
    Transferred(TransferOutcome),
}

/// Poll once and compare against the watermark; never transfers or writes
pub async fn check_status(
    poller: &SourcePoller,
    channel: &ChannelId,
    store: &WatermarkStore,
) -> CheckStatus {
    let watermark = store.read().await;

    match poller.latest_published_video(channel).await {
        Ok(latest) => CheckStatus::derive(latest, watermark.as_ref()),
        Err(e) => {
            warn!(%channel, error = %e, "Poll failed");
            CheckStatus::poll_failed(watermark.as_ref(), &e.to_string())
        }
    }
}

/// One monitored channel wired to a transfer orchestrator
pub struct Relay {
    channel: ChannelId,
    poller: SourcePoller,
    orchestrator: Arc<TransferOrchestrator>,
}

impl Relay {
    pub fn new(
        channel: ChannelId,
        poller: SourcePoller,
        orchestrator: Arc<TransferOrchestrator>,
    ) -> Self {
        Self {
            channel,
            poller,
            orchestrator,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn orchestrator(&self) -> &Arc<TransferOrchestrator> {
        &self.orchestrator
    }

    /// Report whether a new video is waiting, without transferring it
    pub async fn check(&self) -> CheckStatus {
        check_status(&self.poller, &self.channel, self.orchestrator.store()).await
    }

    /// Run one poll and transfer the newest video if it is novel.
    ///
    /// A poll failure is not an error: the cycle reports it and leaves the
    /// watermark untouched so the next cycle can try again.
    #[instrument(skip(self), fields(channel = %self.channel))]
    pub async fn run_once(&self) -> Result<CycleOutcome, TransferError> {
        let latest = match self.poller.latest_published_video(&self.channel).await {
            Ok(Some(latest)) => latest,
            Ok(None) => {
                info!("No transferable upload on the channel");
                return Ok(CycleOutcome::NoUploads);
            }
            Err(e) => {
                warn!(error = %e, "Poll failed, skipping this cycle");
                return Ok(CycleOutcome::PollFailed(e.to_string()));
            }
        };

        let watermark = self.orchestrator.store().read().await;
        if !is_novel(Some(&latest), watermark.as_ref()) {
            info!(video_id = %latest, "Already transferred");
            return Ok(CycleOutcome::UpToDate(latest));
        }

        info!(video_id = %latest, "New video detected");
        let outcome = self.orchestrator.transfer(&latest).await?;
        Ok(CycleOutcome::Transferred(outcome))
    }
}
