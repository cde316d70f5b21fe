pub mod client;
pub mod storage;
pub mod token;

pub use client::OAuth2Client;
pub use storage::CredentialStorage;
pub use token::{
    CredentialError, CredentialRecord, CredentialState, SharedCredential, TokenManager,
    TokenRefresher, ValidCredential,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OAuth2 credential errors
#[derive(Error, Debug)]
pub enum OAuth2Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Token refresh timed out after {0:?}")]
    RefreshTimeout(std::time::Duration),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// Token endpoint response, for both the initial exchange and refreshes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "bearer_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn bearer_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Minimal bearer response, mostly useful for tests and manual imports
    pub fn bearer(access_token: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: bearer_token_type(),
            expires_in,
            scope: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}
