//! yt-dlp downloader.
//!
//! Shells out to the `yt-dlp` binary and writes `<download_dir>/<video_id>.mp4`.
//! yt-dlp keeps in-progress data in `<video_id>.*.part` files and only
//! produces the final name once the download and remux finished, so the
//! final file existing means it is complete.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::Downloader;
use crate::domain::VideoId;
use crate::error::DownloadError;

/// Prefer a progressive mp4, fall back to whatever is best
pub const DEFAULT_FORMAT: &str = "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/b";

/// Extension of the finished file
const OUTPUT_EXTENSION: &str = "mp4";

/// Downloader backed by the yt-dlp CLI
pub struct YtDlpDownloader {
    /// Path to the yt-dlp binary (default: "yt-dlp")
    binary_path: String,

    /// Directory receiving downloaded files
    download_dir: PathBuf,

    /// yt-dlp format selector
    format: String,

    /// Hard limit for one download
    download_timeout: Duration,
}

impl YtDlpDownloader {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: "yt-dlp".to_string(),
            download_dir: download_dir.into(),
            format: DEFAULT_FORMAT.to_string(),
            download_timeout: Duration::from_secs(3600),
        }
    }

    pub fn with_binary_path(mut self, binary_path: impl Into<String>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_timeout(mut self, download_timeout: Duration) -> Self {
        self.download_timeout = download_timeout;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Where the finished file for a video lands
    pub fn target_path(&self, video_id: &VideoId) -> PathBuf {
        self.download_dir
            .join(format!("{}.{}", video_id, OUTPUT_EXTENSION))
    }

    /// Command-line arguments for one download
    fn args(&self, video_id: &VideoId) -> Vec<String> {
        let template = self.download_dir.join(format!("{}.%(ext)s", video_id));
        vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "-f".to_string(),
            self.format.clone(),
            "--merge-output-format".to_string(),
            OUTPUT_EXTENSION.to_string(),
            "--remux-video".to_string(),
            OUTPUT_EXTENSION.to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            video_id.watch_url(),
        ]
    }

    async fn run(&self, video_id: &VideoId) -> Result<PathBuf, DownloadError> {
        fs::create_dir_all(&self.download_dir).await?;

        let child = Command::new(&self.binary_path)
            .args(self.args(video_id))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::Tool {
                video_id: video_id.clone(),
                message: format!("failed to spawn {}: {}", self.binary_path, e),
            })?;

        let output = timeout(self.download_timeout, child.wait_with_output())
            .await
            .map_err(|_| DownloadError::Timeout {
                video_id: video_id.clone(),
                seconds: self.download_timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(DownloadError::Tool {
                video_id: video_id.clone(),
                message: format!("yt-dlp exited with code {}: {}", exit_code, stderr.trim()),
            });
        }

        let path = self.target_path(video_id);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(DownloadError::Tool {
                video_id: video_id.clone(),
                message: format!("yt-dlp finished but {} was not produced", path.display()),
            });
        }

        Ok(path)
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn download(&self, video_id: &VideoId) -> Result<PathBuf, DownloadError> {
        info!(%video_id, dir = %self.download_dir.display(), "Downloading with yt-dlp");

        // yt-dlp would accept a stale final file as already downloaded
        self.discard(video_id).await;

        match self.run(video_id).await {
            Ok(path) => {
                debug!(%video_id, path = %path.display(), "yt-dlp download finished");
                Ok(path)
            }
            Err(e) => {
                self.discard(video_id).await;
                Err(e)
            }
        }
    }

    async fn existing(&self, video_id: &VideoId) -> Option<PathBuf> {
        let path = self.target_path(video_id);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    async fn discard(&self, video_id: &VideoId) {
        remove_with_prefix(&self.download_dir, &format!("{}.", video_id)).await;
    }
}

/// Delete every file in `dir` whose name starts with `prefix`
pub(crate) async fn remove_with_prefix(dir: &Path, prefix: &str) {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(prefix) {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed leftover download file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove leftover download file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_target_path() {
        let downloader = YtDlpDownloader::new("downloads");
        assert_eq!(
            downloader.target_path(&VideoId::from("abc123")),
            PathBuf::from("downloads/abc123.mp4")
        );
    }

    #[test]
    fn test_args_include_template_and_url() {
        let downloader = YtDlpDownloader::new("downloads").with_format("best");
        let args = downloader.args(&VideoId::from("abc123"));

        assert!(args.contains(&"best".to_string()));
        assert!(args.contains(&"downloads/abc123.%(ext)s".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.youtube.com/watch?v=abc123")
        );
    }

    #[tokio::test]
    async fn test_discard_removes_only_matching_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("abc123.mp4.part"), b"partial").unwrap();
        std::fs::write(temp.path().join("abc123.f137.mp4"), b"partial").unwrap();
        std::fs::write(temp.path().join("other.mp4"), b"keep").unwrap();

        let downloader = YtDlpDownloader::new(temp.path());
        downloader.discard(&VideoId::from("abc123")).await;

        assert!(!temp.path().join("abc123.mp4.part").exists());
        assert!(!temp.path().join("abc123.f137.mp4").exists());
        assert!(temp.path().join("other.mp4").exists());
    }

    #[tokio::test]
    async fn test_existing_requires_non_empty_final_file() {
        let temp = TempDir::new().unwrap();
        let downloader = YtDlpDownloader::new(temp.path());
        let video_id = VideoId::from("abc123");

        assert!(downloader.existing(&video_id).await.is_none());

        std::fs::write(temp.path().join("abc123.mp4"), b"").unwrap();
        assert!(downloader.existing(&video_id).await.is_none());

        std::fs::write(temp.path().join("abc123.mp4"), b"media").unwrap();
        assert_eq!(
            downloader.existing(&video_id).await,
            Some(temp.path().join("abc123.mp4"))
        );
    }

    #[tokio::test]
    async fn test_missing_binary_fails_cleanly() {
        let temp = TempDir::new().unwrap();
        let downloader = YtDlpDownloader::new(temp.path())
            .with_binary_path("/nonexistent/yt-dlp-binary");

        let result = downloader.download(&VideoId::from("abc123")).await;

        assert!(matches!(result, Err(DownloadError::Tool { .. })));
        assert!(!temp.path().join("abc123.mp4").exists());
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_files_are_cleared_before_download() {
        let temp = TempDir::new().unwrap();
        let downloads = temp.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        let target = downloads.join("abc123.mp4");

        // skips an existing final file like yt-dlp does
        let tool = fake_tool(
            temp.path(),
            "yt-dlp",
            &format!(
                "[ -e '{0}' ] || printf 'fresh media' > '{0}'",
                target.display()
            ),
        );
        std::fs::write(&target, b"").unwrap();
        std::fs::write(downloads.join("abc123.raw.mp4"), b"leftover").unwrap();

        let downloader = YtDlpDownloader::new(&downloads).with_binary_path(tool.to_string_lossy());
        let path = downloader.download(&VideoId::from("abc123")).await.unwrap();

        assert_eq!(path, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"fresh media");
        assert!(!downloads.join("abc123.raw.mp4").exists());
    }
}
