//! Google OAuth helper for the upload scope.
//!
//! Builds the consent URL and trades an authorization code (or a refresh
//! token) for tokens. Used by the `auth` CLI commands and by
//! `RefreshingTokenFile` when a stored access token has expired.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use reqwest::Url;
use serde::Deserialize;

use super::credentials::StoredTokens;

pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Token endpoint error body
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// OAuth client for the installed-app / web flow
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_endpoint: String,
    client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Consent URL asking for offline access so a refresh token is issued
    pub fn authorization_url(&self) -> Result<Url> {
        Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", UPLOAD_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .context("Failed to build authorization URL")
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<StoredTokens> {
        self.request_tokens(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Get a fresh access token; the refresh token is kept if none is returned
    pub async fn refresh(&self, refresh_token: &str) -> Result<StoredTokens> {
        let mut tokens = self
            .request_tokens(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    async fn request_tokens(&self, grant: &[(&str, &str)]) -> Result<StoredTokens> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .context("Failed to reach the token endpoint")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read token endpoint response")?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(description) => format!("{}: {}", e.error, description),
                    None => e.error,
                })
                .unwrap_or(body);
            anyhow::bail!("Token request failed ({}): {}", status, message);
        }

        let tokens: TokenResponse =
            serde_json::from_str(&body).context("Failed to parse token response")?;
        Ok(into_stored(tokens))
    }
}

fn into_stored(tokens: TokenResponse) -> StoredTokens {
    StoredTokens {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: tokens
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs)),
    }
}
