//! Optional post-download trim.
//!
//! Wraps another downloader and cuts the first N seconds of the finished file
//! with ffmpeg. Only used when `download.trim_start_seconds` is configured.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::info;

use super::Downloader;
use crate::domain::VideoId;
use crate::error::DownloadError;

/// Downloader decorator that trims the start of every download
pub struct TrimmedDownloader {
    inner: Arc<dyn Downloader>,

    /// Path to the ffmpeg binary (default: "ffmpeg")
    ffmpeg_path: String,

    /// Seconds cut from the start
    skip_seconds: u64,

    /// Hard limit for one ffmpeg run
    trim_timeout: Duration,
}

impl TrimmedDownloader {
    pub fn new(inner: Arc<dyn Downloader>, skip_seconds: u64) -> Self {
        Self {
            inner,
            ffmpeg_path: "ffmpeg".to_string(),
            skip_seconds,
            trim_timeout: Duration::from_secs(1800),
        }
    }

    pub fn with_ffmpeg_path(mut self, ffmpeg_path: impl Into<String>) -> Self {
        self.ffmpeg_path = ffmpeg_path.into();
        self
    }

    pub fn with_timeout(mut self, trim_timeout: Duration) -> Self {
        self.trim_timeout = trim_timeout;
        self
    }

    /// The untrimmed file sits next to the output as `<stem>.raw.<ext>`
    fn raw_path(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = output
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "mp4".to_string());
        output.with_file_name(format!("{}.raw.{}", stem, ext))
    }

    async fn trim(&self, video_id: &VideoId, output: &Path) -> Result<(), DownloadError> {
        let raw = Self::raw_path(output);
        fs::rename(output, &raw).await?;

        let child = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-ss")
            .arg(self.skip_seconds.to_string())
            .arg("-i")
            .arg(&raw)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::Tool {
                video_id: video_id.clone(),
                message: format!("failed to spawn {}: {}", self.ffmpeg_path, e),
            })?;

        let result = timeout(self.trim_timeout, child.wait_with_output())
            .await
            .map_err(|_| DownloadError::Timeout {
                video_id: video_id.clone(),
                seconds: self.trim_timeout.as_secs(),
            })??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(DownloadError::Tool {
                video_id: video_id.clone(),
                message: format!("ffmpeg trim failed: {}", last_line(&stderr)),
            });
        }

        fs::remove_file(&raw).await?;
        Ok(())
    }
}

/// ffmpeg puts the useful part of an error on its last line
fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
}

#[async_trait]
impl Downloader for TrimmedDownloader {
    fn name(&self) -> &str {
        "ffmpeg-trim"
    }

    async fn download(&self, video_id: &VideoId) -> Result<PathBuf, DownloadError> {
        // A leftover output next to a raw file is a partial trim
        self.inner.discard(video_id).await;
        let output = self.inner.download(video_id).await?;

        info!(%video_id, seconds = self.skip_seconds, "Trimming start of download");
        if let Err(e) = self.trim(video_id, &output).await {
            self.inner.discard(video_id).await;
            let _ = fs::remove_file(Self::raw_path(&output)).await;
            let _ = fs::remove_file(&output).await;
            return Err(e);
        }

        Ok(output)
    }

    async fn existing(&self, video_id: &VideoId) -> Option<PathBuf> {
        let output = self.inner.existing(video_id).await?;
        // A raw file next to it means the trim never finished
        if fs::try_exists(Self::raw_path(&output)).await.unwrap_or(false) {
            return None;
        }
        Some(output)
    }

    async fn discard(&self, video_id: &VideoId) {
        self.inner.discard(video_id).await;
    }
}
