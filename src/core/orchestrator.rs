//! Transfer orchestrator.
//!
//! Coordinates download, upload and watermark commit for one video at a
//! time, tracks the attempt's phase and reports every phase change to an
//! optional observer.
//!
//! Guarantees:
//! - download strictly precedes upload, which strictly precedes the commit
//! - the watermark is written only after the destination returned an id
//! - at most one attempt is active; a second request fails fast
//! - cancellation is honoured only before the upload starts

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{CredentialSource, Downloader, Uploader};
use crate::domain::{TransferAttempt, TransferPhase, UploadDefaults, VideoId, Watermark};
use crate::error::{ConcurrencyError, TransferError};

use super::watermark::WatermarkStore;

/// Receives a snapshot of the attempt at every phase boundary
pub trait TransferObserver: Send + Sync {
    fn on_phase(&self, attempt: &TransferAttempt);
}

/// Result of a successful transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Source video
    pub video_id: VideoId,

    /// Identifier assigned by the destination
    pub uploaded_video_id: String,

    /// False if the upload succeeded but the watermark write failed
    pub watermark_committed: bool,

    /// False if the local file could not be deleted after upload
    pub local_file_removed: bool,
}

/// Per-transfer overrides of the configured upload defaults
#[derive(Debug, Clone, Default)]
pub struct UploadOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// The single attempt slot guarded by the orchestrator
#[derive(Default)]
struct Slot {
    /// Active attempt, or the last finished one
    attempt: Option<TransferAttempt>,

    /// Cancellation flag of the active attempt (dropped once upload starts)
    cancel: Option<watch::Sender<bool>>,
}

/// Drives download → upload → commit for one video
pub struct TransferOrchestrator {
    downloader: Arc<dyn Downloader>,
    uploader: Arc<dyn Uploader>,
    credentials: Arc<dyn CredentialSource>,
    store: WatermarkStore,
    defaults: UploadDefaults,
    observer: Option<Arc<dyn TransferObserver>>,
    slot: Mutex<Slot>,
}

impl TransferOrchestrator {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        uploader: Arc<dyn Uploader>,
        credentials: Arc<dyn CredentialSource>,
        store: WatermarkStore,
        defaults: UploadDefaults,
    ) -> Self {
        Self {
            downloader,
            uploader,
            credentials,
            store,
            defaults,
            observer: None,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Report phase changes to an observer
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn store(&self) -> &WatermarkStore {
        &self.store
    }

    /// Snapshot of the active attempt, or of the last finished one
    pub fn current_attempt(&self) -> Option<TransferAttempt> {
        self.lock().attempt.clone()
    }

    /// Whether an attempt is in a non-terminal phase
    pub fn is_busy(&self) -> bool {
        self.lock()
            .attempt
            .as_ref()
            .map_or(false, TransferAttempt::is_active)
    }

    /// Abandon the active attempt if it has not started uploading.
    ///
    /// Returns false when there is nothing to cancel or the upload already
    /// began (uploads always run to completion or failure).
    pub fn cancel(&self) -> bool {
        let slot = self.lock();
        match (&slot.attempt, &slot.cancel) {
            (Some(attempt), Some(cancel)) if attempt.phase.is_cancellable() => {
                cancel.send_replace(true);
                info!(video_id = %attempt.video_id, phase = %attempt.phase, "Cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Transfer a video: download it, upload it, then commit the watermark
    #[instrument(skip(self), fields(video_id = %video_id))]
    pub async fn transfer(&self, video_id: &VideoId) -> Result<TransferOutcome, TransferError> {
        let cancel = self.begin(video_id)?;

        let result = match self.download_phase(video_id, &cancel).await {
            Ok(local_file) => {
                self.upload_phase(video_id, local_file, &cancel, UploadOverrides::default())
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if matches!(e, TransferError::Cancelled { .. }) {
                    self.downloader.discard(video_id).await;
                }
                Err(self.fail(e))
            }
        }
    }

    /// Upload an already downloaded file and commit, skipping the download.
    ///
    /// Used to retry after an upload failure left the file on disk.
    #[instrument(skip(self, overrides), fields(video_id = %video_id, file = %local_file.display()))]
    pub async fn transfer_file(
        &self,
        video_id: &VideoId,
        local_file: PathBuf,
        overrides: UploadOverrides,
    ) -> Result<TransferOutcome, TransferError> {
        let cancel = self.begin(video_id)?;

        self.update(|attempt| {
            attempt.local_file = Some(local_file.clone());
            attempt.advance(TransferPhase::Downloaded);
        });

        self.upload_phase(video_id, local_file, &cancel, overrides)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Claim the attempt slot or fail fast if it is taken
    fn begin(&self, video_id: &VideoId) -> Result<watch::Receiver<bool>, ConcurrencyError> {
        let (snapshot, receiver) = {
            let mut slot = self.lock();
            if let Some(active) = slot.attempt.as_ref().filter(|a| a.is_active()) {
                warn!(
                    requested = %video_id,
                    active = %active.video_id,
                    phase = %active.phase,
                    "Rejecting transfer, another one is in progress"
                );
                return Err(ConcurrencyError {
                    active: active.video_id.clone(),
                    phase: active.phase,
                });
            }

            let attempt = TransferAttempt::new(video_id.clone());
            let (sender, receiver) = watch::channel(false);
            slot.attempt = Some(attempt.clone());
            slot.cancel = Some(sender);
            (attempt, receiver)
        };

        info!(attempt_id = %snapshot.id, "Transfer started");
        self.notify(&snapshot);
        Ok(receiver)
    }

    async fn download_phase(
        &self,
        video_id: &VideoId,
        cancel: &watch::Receiver<bool>,
    ) -> Result<PathBuf, TransferError> {
        if *cancel.borrow() {
            return Err(self.cancelled(video_id));
        }

        if let Some(existing) = self.downloader.existing(video_id).await {
            info!(path = %existing.display(), "Reusing file downloaded by an earlier attempt");
            self.update(|attempt| {
                attempt.local_file = Some(existing.clone());
                attempt.advance(TransferPhase::Downloaded);
            });
            return Ok(existing);
        }

        self.update(|attempt| attempt.advance(TransferPhase::Downloading));

        let mut cancelled = cancel.clone();
        let result = tokio::select! {
            biased;
            Ok(_) = cancelled.wait_for(|requested| *requested) => None,
            result = self.downloader.download(video_id) => Some(result),
        };

        match result {
            Some(Ok(path)) => {
                info!(
                    downloader = self.downloader.name(),
                    path = %path.display(),
                    "Download complete"
                );
                self.update(|attempt| {
                    attempt.local_file = Some(path.clone());
                    attempt.advance(TransferPhase::Downloaded);
                });
                Ok(path)
            }
            Some(Err(e)) => Err(TransferError::Download(e)),
            None => Err(self.cancelled(video_id)),
        }
    }

    async fn upload_phase(
        &self,
        video_id: &VideoId,
        local_file: PathBuf,
        cancel: &watch::Receiver<bool>,
        overrides: UploadOverrides,
    ) -> Result<TransferOutcome, TransferError> {
        if !self.enter_upload(cancel) {
            return Err(self.cancelled(video_id));
        }

        let credential = match self.credentials.current().await {
            Ok(credential) => credential,
            Err(source) => {
                return Err(TransferError::Upload {
                    source,
                    video_id: video_id.clone(),
                    local_file,
                })
            }
        };

        let metadata = self
            .defaults
            .metadata_for(&local_file, overrides.title, overrides.description);
        info!(
            uploader = self.uploader.name(),
            title = %metadata.title,
            visibility = %metadata.visibility,
            "Uploading"
        );

        let uploaded_video_id = match self.uploader.upload(&credential, &local_file, &metadata).await {
            Ok(id) => id,
            Err(source) => {
                return Err(TransferError::Upload {
                    source,
                    video_id: video_id.clone(),
                    local_file,
                })
            }
        };

        Ok(self.commit(video_id, &local_file, uploaded_video_id).await)
    }

    /// Move to Uploading unless a cancellation got there first.
    ///
    /// Checked under the slot lock so `cancel()` cannot succeed afterwards.
    fn enter_upload(&self, cancel: &watch::Receiver<bool>) -> bool {
        let snapshot = {
            let mut slot = self.lock();
            if *cancel.borrow() {
                return false;
            }
            slot.cancel = None;
            match slot.attempt.as_mut() {
                Some(attempt) => {
                    attempt.advance(TransferPhase::Uploading);
                    attempt.clone()
                }
                None => return false,
            }
        };
        self.notify(&snapshot);
        true
    }

    /// Record the upload. Watermark and cleanup failures are only logged:
    /// the video is already published at this point.
    async fn commit(
        &self,
        video_id: &VideoId,
        local_file: &Path,
        uploaded_video_id: String,
    ) -> TransferOutcome {
        info!(%uploaded_video_id, "Upload confirmed, committing watermark");

        let watermark_committed = match self.store.write(&Watermark::now(video_id.clone())).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Uploaded but failed to write watermark, video may be transferred again");
                false
            }
        };

        let local_file_removed = match fs::remove_file(local_file).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %local_file.display(), error = %e, "Uploaded but failed to delete local file");
                false
            }
        };

        let snapshot = {
            let mut slot = self.lock();
            slot.cancel = None;
            slot.attempt.as_mut().map(|attempt| {
                attempt.complete(uploaded_video_id.clone());
                attempt.clone()
            })
        };
        if let Some(snapshot) = snapshot {
            self.notify(&snapshot);
        }

        info!(%uploaded_video_id, watermark_committed, local_file_removed, "Transfer completed");

        TransferOutcome {
            video_id: video_id.clone(),
            uploaded_video_id,
            watermark_committed,
            local_file_removed,
        }
    }

    /// Cancellation error carrying the phase the attempt stopped in
    fn cancelled(&self, video_id: &VideoId) -> TransferError {
        let phase = self
            .lock()
            .attempt
            .as_ref()
            .map_or(TransferPhase::Pending, |attempt| attempt.phase);
        TransferError::Cancelled {
            video_id: video_id.clone(),
            phase,
        }
    }

    /// Mark the active attempt failed and hand the error back
    fn fail(&self, error: TransferError) -> TransferError {
        let snapshot = {
            let mut slot = self.lock();
            slot.cancel = None;
            slot.attempt.as_mut().map(|attempt| {
                attempt.fail(error.to_string());
                attempt.clone()
            })
        };

        if let Some(snapshot) = snapshot {
            let failed_in = snapshot.error.as_ref().map(|e| e.phase);
            error!(attempt_id = %snapshot.id, phase = ?failed_in, error = %error, "Transfer failed");
            self.notify(&snapshot);
        }

        error
    }

    /// Apply a change to the active attempt and report it
    fn update(&self, change: impl FnOnce(&mut TransferAttempt)) {
        let snapshot = {
            let mut slot = self.lock();
            match slot.attempt.as_mut() {
                Some(attempt) => {
                    change(attempt);
                    attempt.clone()
                }
                None => return,
            }
        };
        self.notify(&snapshot);
    }

    fn notify(&self, attempt: &TransferAttempt) {
        debug!(attempt_id = %attempt.id, phase = %attempt.phase, "Phase changed");
        if let Some(observer) = &self.observer {
            observer.on_phase(attempt);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
