//! Configuration for vidrelay.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (YOUTUBE_API_KEY, CHANNEL_IDENTIFIER,
//!    DOWNLOAD_FOLDER, GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, REDIRECT_URI,
//!    VIDRELAY_HOME)
//! 2. Config file (.vidrelay/config.yaml)
//! 3. Defaults (~/.vidrelay, ./downloads)
//!
//! Config file discovery:
//! - Searches the current directory and parents for .vidrelay/config.yaml
//! - `paths.home` is relative to the .vidrelay/ directory, other paths to
//!   the project root (the directory containing .vidrelay/)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::upload::{DEFAULT_CATEGORY_ID, DEFAULT_DESCRIPTION};
use crate::domain::{ChannelId, UploadDefaults, Visibility};

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/api/auth/callback";
const DEFAULT_DOWNLOAD_FOLDER: &str = "downloads";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_TRIM_TIMEOUT_SECS: u64 = 1800;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting '{field}' (set {env} or add it to .vidrelay/config.yaml)")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    #[error("Invalid channel identifier '{0}': expected a UC... channel id or a /channel/ URL")]
    InvalidChannel(String),

    #[error("Public uploads need confirmation: set upload.confirm_public or pass --confirm-public")]
    PublicNotConfirmed,

    #[error("Failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to determine home directory (set VIDRELAY_HOME)")]
    NoHome,
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub oauth: OAuthSection,
    #[serde(default)]
    pub upload: UploadSection,
    #[serde(default)]
    pub download: DownloadSection,
    #[serde(default)]
    pub poll: PollSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSection {
    pub api_key: Option<String>,
    /// Channel id or /channel/ URL
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    /// State directory (relative to .vidrelay/)
    pub home: Option<String>,
    /// Download directory (relative to the project root)
    pub downloads: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthSection {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSection {
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub confirm_public: bool,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadSection {
    pub yt_dlp: Option<String>,
    pub ffmpeg: Option<String>,
    pub format: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub trim_start_seconds: Option<u64>,
    pub trim_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollSection {
    pub interval_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

/// Validated source settings
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub api_key: String,
    pub channel: ChannelId,
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub visibility: Visibility,
    pub confirm_public: bool,
    pub description: String,
    pub category_id: String,
    /// Hard limit for one upload, both requests included
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub yt_dlp_path: String,
    pub ffmpeg_path: String,
    pub format: Option<String>,
    pub timeout: Duration,
    /// Trimming is off unless set
    pub trim_start_seconds: Option<u64>,
    pub trim_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub channel_identifier: Option<String>,
    /// State directory holding the watermark and token files
    pub home: PathBuf,
    pub download_dir: PathBuf,
    pub oauth: OAuthSettings,
    pub upload: UploadSettings,
    pub download: DownloadSettings,
    pub poll: PollSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load from the process environment and the current directory
    pub fn load() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_from(&cwd, |key| std::env::var(key).ok())
    }

    /// Load with an explicit start directory and environment lookup
    pub fn load_from(
        start_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let config_file = find_config_file(start_dir);
        let file = match config_file {
            Some(ref path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        let vidrelay_dir = config_file.as_deref().and_then(Path::parent);
        let project_root = vidrelay_dir.and_then(Path::parent).unwrap_or(start_dir);

        let home = if let Some(env_home) = env("VIDRELAY_HOME") {
            resolve_path(start_dir, &env_home)
        } else if let (Some(dir), Some(home)) = (vidrelay_dir, file.paths.home.as_deref()) {
            resolve_path(dir, home)
        } else {
            dirs::home_dir().ok_or(ConfigError::NoHome)?.join(".vidrelay")
        };

        let download_dir = if let Some(folder) = env("DOWNLOAD_FOLDER") {
            resolve_path(start_dir, &folder)
        } else if let Some(ref folder) = file.paths.downloads {
            resolve_path(project_root, folder)
        } else {
            start_dir.join(DEFAULT_DOWNLOAD_FOLDER)
        };

        let oauth = OAuthSettings {
            client_id: env("GOOGLE_CLIENT_ID").or(file.oauth.client_id),
            client_secret: env("GOOGLE_CLIENT_SECRET").or(file.oauth.client_secret),
            redirect_uri: env("REDIRECT_URI")
                .or(file.oauth.redirect_uri)
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        };

        let upload = UploadSettings {
            visibility: file.upload.visibility.unwrap_or_default(),
            confirm_public: file.upload.confirm_public,
            description: file
                .upload
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            category_id: file
                .upload
                .category_id
                .unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string()),
            timeout: Duration::from_secs(
                file.upload
                    .timeout_seconds
                    .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS),
            ),
        };

        let download = DownloadSettings {
            yt_dlp_path: file.download.yt_dlp.unwrap_or_else(|| "yt-dlp".to_string()),
            ffmpeg_path: file.download.ffmpeg.unwrap_or_else(|| "ffmpeg".to_string()),
            format: file.download.format,
            timeout: Duration::from_secs(
                file.download
                    .timeout_seconds
                    .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            ),
            trim_start_seconds: file.download.trim_start_seconds.filter(|s| *s > 0),
            trim_timeout: Duration::from_secs(
                file.download
                    .trim_timeout_seconds
                    .unwrap_or(DEFAULT_TRIM_TIMEOUT_SECS),
            ),
        };

        let poll = PollSettings {
            interval: Duration::from_secs(
                file.poll
                    .interval_seconds
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                    .max(1),
            ),
            request_timeout: Duration::from_secs(
                file.poll
                    .request_timeout_seconds
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        };

        Ok(Self {
            api_key: env("YOUTUBE_API_KEY").or(file.source.api_key),
            channel_identifier: env("CHANNEL_IDENTIFIER").or(file.source.channel),
            home,
            download_dir,
            oauth,
            upload,
            download,
            poll,
            config_file,
        })
    }

    /// Path of the watermark record ($VIDRELAY_HOME/last_video.json)
    pub fn watermark_path(&self) -> PathBuf {
        self.home.join("last_video.json")
    }

    /// Path of the OAuth token file ($VIDRELAY_HOME/token.json)
    pub fn token_path(&self) -> PathBuf {
        self.home.join("token.json")
    }

    /// API key and channel, required by anything that polls
    pub fn source(&self) -> Result<SourceSettings, ConfigError> {
        let api_key = self.api_key.clone().ok_or(ConfigError::Missing {
            field: "source.api_key",
            env: "YOUTUBE_API_KEY",
        })?;
        let identifier = self
            .channel_identifier
            .as_deref()
            .ok_or(ConfigError::Missing {
                field: "source.channel",
                env: "CHANNEL_IDENTIFIER",
            })?;
        let channel = ChannelId::parse(identifier)
            .ok_or_else(|| ConfigError::InvalidChannel(identifier.to_string()))?;

        Ok(SourceSettings { api_key, channel })
    }

    /// OAuth client id and secret, required only by the auth commands
    pub fn oauth_client(&self) -> Result<(&str, &str), ConfigError> {
        let id = self.oauth.client_id.as_deref().ok_or(ConfigError::Missing {
            field: "oauth.client_id",
            env: "GOOGLE_CLIENT_ID",
        })?;
        let secret = self
            .oauth
            .client_secret
            .as_deref()
            .ok_or(ConfigError::Missing {
                field: "oauth.client_secret",
                env: "GOOGLE_CLIENT_SECRET",
            })?;
        Ok((id, secret))
    }

    /// Upload defaults; public visibility must have been confirmed
    pub fn upload_defaults(&self) -> Result<UploadDefaults, ConfigError> {
        if self.upload.visibility == Visibility::Public && !self.upload.confirm_public {
            return Err(ConfigError::PublicNotConfirmed);
        }

        Ok(UploadDefaults {
            description: self.upload.description.clone(),
            visibility: self.upload.visibility,
            category_id: self.upload.category_id.clone(),
        })
    }
}

/// Find config file by searching the start directory and parents
fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(".vidrelay").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
