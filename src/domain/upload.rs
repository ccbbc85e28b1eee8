//! Upload metadata and the bearer credential used to publish.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Description used when none is supplied
pub const DEFAULT_DESCRIPTION: &str = "Uploaded via automation dashboard";

/// "People & Blogs"
pub const DEFAULT_CATEGORY_ID: &str = "22";

/// Privacy status of the republished video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "unlisted" => Ok(Self::Unlisted),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown visibility '{}'", other)),
        }
    }
}

/// Metadata sent along with an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub category_id: String,
}

/// Defaults applied to every upload unless overridden per transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDefaults {
    pub description: String,
    pub visibility: Visibility,
    pub category_id: String,
}

impl Default for UploadDefaults {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            visibility: Visibility::default(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
        }
    }
}

impl UploadDefaults {
    /// Build metadata for a file, falling back to the file stem as title
    pub fn metadata_for(
        &self,
        file: &Path,
        title: Option<String>,
        description: Option<String>,
    ) -> UploadMetadata {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_path(file));
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| self.description.clone());

        UploadMetadata {
            title,
            description,
            visibility: self.visibility,
            category_id: self.category_id.clone(),
        }
    }
}

/// File name without directory or extension
pub fn title_from_path(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "video".to_string())
}

/// Bearer credential for the destination account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }
}

// Tokens stay out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
