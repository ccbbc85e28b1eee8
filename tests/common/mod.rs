//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use vidrelay::adapters::{CredentialSource, Downloader, PlatformApi, StaticCredentials, Uploader};
use vidrelay::core::{TransferObserver, TransferOrchestrator, WatermarkStore};
use vidrelay::domain::{
    ChannelId, Credential, TransferAttempt, TransferPhase, UploadDefaults, UploadListing,
    UploadMetadata, VideoId, Visibility,
};
use vidrelay::error::{DownloadError, PollError, UploadError};

pub fn channel() -> ChannelId {
    ChannelId::parse("UCKsbPaQz7yZEKb9z2TXkxDg").unwrap()
}

pub fn private_defaults() -> UploadDefaults {
    UploadDefaults {
        visibility: Visibility::Private,
        ..UploadDefaults::default()
    }
}

/// Platform API returning whatever the test last set
#[derive(Default)]
pub struct FakeApi {
    listing: Mutex<Option<UploadListing>>,
    failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeApi {
    pub fn returning(listing: UploadListing) -> Self {
        let api = Self::default();
        api.set(Some(listing));
        api
    }

    pub fn set(&self, listing: Option<UploadListing>) {
        *self.listing.lock().unwrap() = listing;
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlatformApi for FakeApi {
    fn name(&self) -> &str {
        "fake-api"
    }

    async fn latest_upload(&self, _channel: &ChannelId) -> Result<Option<UploadListing>, PollError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PollError::Network("connection refused".to_string()));
        }
        Ok(self.listing.lock().unwrap().clone())
    }
}

/// Lets a test hold a collaborator mid-call
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Downloader writing `<dir>/<id>.mp4`
pub struct FakeDownloader {
    dir: PathBuf,
    failing: AtomicBool,
    gate: Option<Arc<Gate>>,
    pub calls: AtomicUsize,
    pub discarded: AtomicUsize,
}

impl FakeDownloader {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            failing: AtomicBool::new(false),
            gate: None,
            calls: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
        }
    }

    pub fn gated(dir: &Path, gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(dir)
        }
    }

    pub fn failing(dir: &Path) -> Self {
        let downloader = Self::new(dir);
        downloader.failing.store(true, Ordering::SeqCst);
        downloader
    }

    pub fn path_for(&self, video_id: &str) -> PathBuf {
        self.dir.join(format!("{}.mp4", video_id))
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    fn name(&self) -> &str {
        "fake-downloader"
    }

    async fn download(&self, video_id: &VideoId) -> Result<PathBuf, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = self.path_for(video_id.as_str());

        // partial output
        tokio::fs::write(&path, b"part").await?;

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            tokio::fs::remove_file(&path).await?;
            return Err(DownloadError::Tool {
                video_id: video_id.clone(),
                message: "HTTP Error 403: Forbidden".to_string(),
            });
        }

        tokio::fs::write(&path, b"complete media").await?;
        Ok(path)
    }

    async fn existing(&self, video_id: &VideoId) -> Option<PathBuf> {
        let path = self.path_for(video_id.as_str());
        let content = tokio::fs::read(&path).await.ok()?;
        (content == b"complete media").then_some(path)
    }

    async fn discard(&self, video_id: &VideoId) {
        self.discarded.fetch_add(1, Ordering::SeqCst);
        let _ = tokio::fs::remove_file(self.path_for(video_id.as_str())).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadBehaviour {
    Succeed,
    ExpiredCredential,
    NetworkDown,
}

/// Uploader recording every call
pub struct FakeUploader {
    behaviour: Mutex<UploadBehaviour>,
    gate: Option<Arc<Gate>>,
    pub uploads: Mutex<Vec<(PathBuf, UploadMetadata)>>,
}

impl FakeUploader {
    pub fn new(behaviour: UploadBehaviour) -> Self {
        Self {
            behaviour: Mutex::new(behaviour),
            gate: None,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(UploadBehaviour::Succeed)
        }
    }

    pub fn set(&self, behaviour: UploadBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    fn name(&self) -> &str {
        "fake-uploader"
    }

    async fn upload(
        &self,
        credential: &Credential,
        file: &Path,
        metadata: &UploadMetadata,
    ) -> Result<String, UploadError> {
        assert!(file.exists(), "uploader called without a local file");
        assert!(!credential.access_token.is_empty());

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let behaviour = *self.behaviour.lock().unwrap();
        match behaviour {
            UploadBehaviour::Succeed => {
                let mut uploads = self.uploads.lock().unwrap();
                uploads.push((file.to_path_buf(), metadata.clone()));
                Ok(format!("dest-{}", uploads.len()))
            }
            UploadBehaviour::ExpiredCredential => Err(UploadError::CredentialRejected(
                "Request had invalid authentication credentials".to_string(),
            )),
            UploadBehaviour::NetworkDown => {
                Err(UploadError::Network("connection reset by peer".to_string()))
            }
        }
    }
}

/// Records every phase the orchestrator reports
#[derive(Default)]
pub struct PhaseRecorder {
    pub phases: Mutex<Vec<TransferPhase>>,
}

impl PhaseRecorder {
    pub fn phases(&self) -> Vec<TransferPhase> {
        self.phases.lock().unwrap().clone()
    }
}

impl TransferObserver for PhaseRecorder {
    fn on_phase(&self, attempt: &TransferAttempt) {
        self.phases.lock().unwrap().push(attempt.phase);
    }
}

pub fn valid_credentials() -> Arc<dyn CredentialSource> {
    Arc::new(StaticCredentials::new(Credential::new("ya29.test")))
}

pub fn orchestrator(
    downloader: Arc<FakeDownloader>,
    uploader: Arc<FakeUploader>,
    store_path: &Path,
) -> TransferOrchestrator {
    TransferOrchestrator::new(
        downloader,
        uploader,
        valid_credentials(),
        WatermarkStore::new(store_path),
        private_defaults(),
    )
}
