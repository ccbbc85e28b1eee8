//! Single-record watermark store with file-based persistence.
//!
//! The record is pretty-printed JSON (`{"video_id": ..., "timestamp": ...}`).
//! Writes go to a sibling temp file that is renamed over the record, so a
//! crash mid-write leaves either the old or the new watermark on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::domain::Watermark;
use crate::error::StoreError;

/// File-backed store for the last transferred video
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    /// Path to the watermark file
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the watermark file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the current watermark.
    ///
    /// A missing, unreadable or corrupted record reads as `None`: losing
    /// deduplication until the next successful write is preferable to
    /// blocking transfers.
    pub async fn read(&self) -> Option<Watermark> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No watermark yet");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read watermark, ignoring it");
                return None;
            }
        };

        match serde_json::from_str::<Watermark>(&content) {
            Ok(watermark) if !watermark.video_id.as_str().is_empty() => Some(watermark),
            Ok(_) => {
                warn!(path = %self.path.display(), "Watermark has an empty video id, ignoring it");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupted watermark, ignoring it");
                None
            }
        }
    }

    /// Replace the watermark
    pub async fn write(&self, watermark: &Watermark) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(watermark)?;
        let temp = self.temp_path();
        fs::write(&temp, json).await?;

        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(video_id = %watermark.video_id, path = %self.path.display(), "Watermark written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VideoId;
    use tempfile::TempDir;

    fn create_test_store() -> (WatermarkStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = WatermarkStore::new(temp.path().join("last_video.json"));
        (store, temp)
    }

    #[tokio::test]
    async fn test_missing_record_reads_as_none() {
        let (store, _temp) = create_test_store();
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (store, _temp) = create_test_store();
        let watermark = Watermark::new(VideoId::from("abc123"), 1_700_000_000_000);

        store.write(&watermark).await.unwrap();

        assert_eq!(store.read().await, Some(watermark));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let (store, _temp) = create_test_store();
        store
            .write(&Watermark::new(VideoId::from("first"), 1))
            .await
            .unwrap();
        store
            .write(&Watermark::new(VideoId::from("second"), 2))
            .await
            .unwrap();

        let watermark = store.read().await.unwrap();
        assert_eq!(watermark.video_id, VideoId::from("second"));
        assert_eq!(watermark.observed_at_epoch_millis, 2);
    }

    #[tokio::test]
    async fn test_corrupted_record_reads_as_none() {
        let (store, _temp) = create_test_store();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.read().await.is_none());

        std::fs::write(store.path(), r#"{"video_id": "", "timestamp": 1}"#).unwrap();
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let store = WatermarkStore::new(temp.path().join("state").join("last_video.json"));

        store
            .write(&Watermark::new(VideoId::from("abc123"), 1))
            .await
            .unwrap();

        assert!(store.path().exists());
    }
}
