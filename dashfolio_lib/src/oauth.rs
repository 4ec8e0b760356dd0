//! Google OAuth2 refresh-token grant.
//!
//! The resulting access token authorizes both the Sheets read and the
//! XOAUTH2 SMTP login.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::retry::Retryable;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Token request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Token endpoint returned {status}: {error}")]
    Rejected { status: u16, error: String },
}

impl Retryable for OAuthError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => !e.is_decode(),
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// OAuth client credentials plus the long-lived refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Outcome of a refresh grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
    /// The refresh token to keep using. Google may rotate it.
    pub refresh_token: String,
}

impl TokenGrant {
    pub fn rotated(&self, previous: &str) -> bool {
        self.refresh_token != previous
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct OAuthClient {
    token_url: String,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new() -> Result<Self, OAuthError> {
        Self::with_token_url("https://oauth2.googleapis.com/token")
    }

    /// Creates a client posting to a custom token endpoint. Used for testing.
    pub fn with_token_url(token_url: &str) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            token_url: token_url.to_string(),
            http,
        })
    }

    /// Exchanges the refresh token for a fresh access token.
    pub async fn refresh(&self, creds: &OAuthCredentials) -> Result<TokenGrant, OAuthError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("refresh_token", creds.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let error = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(e) => match e.error_description {
                    Some(desc) => format!("{} ({})", e.error, desc),
                    None => e.error,
                },
                Err(_) => body.chars().take(200).collect(),
            };
            return Err(OAuthError::Rejected {
                status: status.as_u16(),
                error,
            });
        }

        let token: TokenResponse = resp.json().await?;
        tracing::debug!("Obtained access token valid for {}s", token.expires_in);
        Ok(TokenGrant {
            access_token: token.access_token,
            expires_in: token.expires_in,
            refresh_token: token
                .refresh_token
                .unwrap_or_else(|| creds.refresh_token.clone()),
        })
    }
}
