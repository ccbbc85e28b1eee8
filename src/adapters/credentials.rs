//! Credential sources for the upload call.
//!
//! The core never obtains or refreshes tokens itself; it asks a
//! `CredentialSource` for whatever is current and fails cleanly if nothing is.
//! `RefreshingTokenFile` renews an expired token with the stored refresh
//! token so unattended runs keep working past the access token's lifetime.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::oauth::OAuthClient;
use super::CredentialSource;
use crate::domain::Credential;
use crate::error::UploadError;

/// A token handed in directly (command line or environment)
pub struct StaticCredentials {
    credential: Option<Credential>,
}

impl StaticCredentials {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
        }
    }

    /// A source that always reports a missing credential
    pub fn none() -> Self {
        Self { credential: None }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn current(&self) -> Result<Credential, UploadError> {
        self.credential
            .clone()
            .filter(|c| !c.access_token.is_empty())
            .ok_or_else(|| UploadError::MissingCredential("no access token supplied".to_string()))
    }
}

/// Tokens as persisted by the `auth` commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When the access token stops being valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }

    pub fn credential(&self) -> Credential {
        Credential {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// JSON token file (`~/.vidrelay/token.json` by default)
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored tokens, None if the file does not exist
    pub async fn load(&self) -> anyhow::Result<Option<StoredTokens>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Persist tokens, creating the parent directory if needed
    pub async fn save(&self, tokens: &StoredTokens) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(tokens)?).await?;
        Ok(())
    }

    /// Stored tokens with a non-empty access token
    async fn usable(&self) -> Result<StoredTokens, UploadError> {
        let tokens = match self.load().await {
            Ok(Some(tokens)) => tokens,
            Ok(None) => {
                return Err(UploadError::MissingCredential(format!(
                    "no token file at {} (run `vidrelay auth url` first)",
                    self.path.display()
                )))
            }
            Err(e) => {
                return Err(UploadError::MissingCredential(format!(
                    "unreadable token file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if tokens.access_token.is_empty() {
            return Err(UploadError::MissingCredential(format!(
                "token file {} has no access token",
                self.path.display()
            )));
        }

        Ok(tokens)
    }
}

#[async_trait]
impl CredentialSource for TokenFile {
    async fn current(&self) -> Result<Credential, UploadError> {
        let tokens = self.usable().await?;
        if tokens.is_expired(Utc::now()) {
            return Err(UploadError::CredentialRejected(
                "access token expired (run `vidrelay auth refresh`)".to_string(),
            ));
        }

        Ok(tokens.credential())
    }
}

/// Refresh this long before the recorded expiry
const REFRESH_MARGIN_SECS: i64 = 60;

/// Token file that renews itself through the OAuth token endpoint
pub struct RefreshingTokenFile {
    file: TokenFile,
    client: OAuthClient,

    /// Serializes refreshes so concurrent callers don't both hit the endpoint
    refreshing: Mutex<()>,
}

impl RefreshingTokenFile {
    pub fn new(file: TokenFile, client: OAuthClient) -> Self {
        Self {
            file,
            client,
            refreshing: Mutex::new(()),
        }
    }
}

#[async_trait]
impl CredentialSource for RefreshingTokenFile {
    async fn current(&self) -> Result<Credential, UploadError> {
        let _guard = self.refreshing.lock().await;

        let tokens = self.file.usable().await?;
        if !tokens.is_expired(Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Ok(tokens.credential());
        }

        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            return Err(UploadError::CredentialRejected(
                "access token expired and no refresh token is stored (run `vidrelay auth url`)"
                    .to_string(),
            ));
        };

        info!(path = %self.file.path().display(), "Access token expired, refreshing");
        let fresh = self.client.refresh(refresh_token).await.map_err(|e| {
            UploadError::CredentialRejected(format!("token refresh failed: {:#}", e))
        })?;

        if let Err(e) = self.file.save(&fresh).await {
            warn!(path = %self.file.path().display(), error = %e, "Refreshed token could not be saved");
        }

        Ok(fresh.credential())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stub_http::{StubResponse, StubServer};
    use tempfile::TempDir;

    fn expired(refresh_token: Option<&str>) -> StoredTokens {
        StoredTokens {
            access_token: "ya29.old".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at: Some(Utc::now() - Duration::minutes(5)),
        }
    }

    #[tokio::test]
    async fn test_static_credentials() {
        let source = StaticCredentials::new(Credential::new("ya29.token"));
        assert_eq!(source.current().await.unwrap().access_token, "ya29.token");

        let empty = StaticCredentials::none();
        assert!(matches!(
            empty.current().await,
            Err(UploadError::MissingCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_token_file_missing() {
        let temp = TempDir::new().unwrap();
        let source = TokenFile::new(temp.path().join("token.json"));

        assert!(matches!(
            source.current().await,
            Err(UploadError::MissingCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_token_file_save_and_use() {
        let temp = TempDir::new().unwrap();
        let source = TokenFile::new(temp.path().join("nested").join("token.json"));

        source
            .save(&StoredTokens {
                access_token: "ya29.token".to_string(),
                refresh_token: Some("1//refresh".to_string()),
                expires_at: Some(Utc::now() + Duration::hours(1)),
            })
            .await
            .unwrap();

        let credential = source.current().await.unwrap();
        assert_eq!(credential.access_token, "ya29.token");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let temp = TempDir::new().unwrap();
        let source = TokenFile::new(temp.path().join("token.json"));
        source
            .save(&StoredTokens {
                access_token: "ya29.token".to_string(),
                refresh_token: None,
                expires_at: Some(Utc::now() - Duration::minutes(5)),
            })
            .await
            .unwrap();

        assert!(matches!(
            source.current().await,
            Err(UploadError::CredentialRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_saved() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        TokenFile::new(&path).save(&expired(Some("1//refresh"))).await.unwrap();

        let server = StubServer::bind().await;
        let endpoint = format!("{}/token", server.url);
        let requests = server.respond(vec![StubResponse::json(
            200,
            r#"{"access_token":"ya29.new","expires_in":3599,"token_type":"Bearer"}"#,
        )]);
        let client = OAuthClient::new("id", "secret", "http://localhost/cb")
            .with_token_endpoint(endpoint);
        let source = RefreshingTokenFile::new(TokenFile::new(&path), client);

        let credential = source.current().await.unwrap();
        assert_eq!(credential.access_token, "ya29.new");
        assert!(requests.lock().unwrap()[0].contains("grant_type=refresh_token"));

        // persisted, refresh token kept
        let saved = TokenFile::new(&path).load().await.unwrap().unwrap();
        assert_eq!(saved.access_token, "ya29.new");
        assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));
        assert!(!saved.is_expired(Utc::now()));

        // the fresh token is used without another request
        assert_eq!(source.current().await.unwrap().access_token, "ya29.new");
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_valid_token_is_not_refreshed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        TokenFile::new(&path)
            .save(&StoredTokens {
                access_token: "ya29.token".to_string(),
                refresh_token: Some("1//refresh".to_string()),
                expires_at: Some(Utc::now() + Duration::hours(1)),
            })
            .await
            .unwrap();

        let client = OAuthClient::new("id", "secret", "http://localhost/cb")
            .with_token_endpoint("http://127.0.0.1:9/token");
        let source = RefreshingTokenFile::new(TokenFile::new(&path), client);

        assert_eq!(source.current().await.unwrap().access_token, "ya29.token");
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        TokenFile::new(&path).save(&expired(None)).await.unwrap();

        let client = OAuthClient::new("id", "secret", "http://localhost/cb")
            .with_token_endpoint("http://127.0.0.1:9/token");
        let source = RefreshingTokenFile::new(TokenFile::new(&path), client);

        assert!(matches!(
            source.current().await,
            Err(UploadError::CredentialRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        TokenFile::new(&path).save(&expired(Some("1//revoked"))).await.unwrap();

        let server = StubServer::bind().await;
        let endpoint = format!("{}/token", server.url);
        server.respond(vec![StubResponse::json(
            400,
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        )]);
        let client = OAuthClient::new("id", "secret", "http://localhost/cb")
            .with_token_endpoint(endpoint);
        let source = RefreshingTokenFile::new(TokenFile::new(&path), client);

        match source.current().await {
            Err(UploadError::CredentialRejected(message)) => assert!(message.contains("invalid_grant")),
            other => panic!("expected a rejected credential, got {other:?}"),
        }
        // old tokens left in place
        let saved = TokenFile::new(&path).load().await.unwrap().unwrap();
        assert_eq!(saved.access_token, "ya29.old");
    }
}
