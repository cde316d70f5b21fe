use crate::oauth2::{OAuth2Error, OAuth2Result, TokenResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Lifetime assumed when the provider does not report `expires_in`
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Default bound on a single refresh round trip
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity provider refresh contract
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> OAuth2Result<TokenResponse>;
}

/// Failure detail recorded when a refresh attempt fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialError {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Observable lifecycle state of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Valid,
    Expired,
    RefreshInFlight,
    Error,
}

impl std::fmt::Display for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialState::Valid => write!(f, "valid"),
            CredentialState::Expired => write!(f, "expired"),
            CredentialState::RefreshInFlight => write!(f, "refreshing"),
            CredentialState::Error => write!(f, "error"),
        }
    }
}

/// Access/refresh token pair with its expiry.
///
/// Once `error` is set the record is terminal: it is never refreshed again and
/// has to be replaced by a fresh authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub error: Option<CredentialError>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl CredentialRecord {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: default_token_type(),
            expires_at,
            scopes: Vec::new(),
            error: None,
        }
    }

    /// Build a record from an authorization-code exchange response
    pub fn from_response(response: &TokenResponse) -> OAuth2Result<Self> {
        let mut record = Self::new(
            response.access_token.clone(),
            response.refresh_token.clone(),
            Utc::now(),
        );
        record.apply_refresh(response, Utc::now())?;
        Ok(record)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True when the token is expired or will be within `margin`
    pub fn needs_refresh_at(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        now + margin >= self.expires_at
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> CredentialState {
        if self.error.is_some() {
            CredentialState::Error
        } else if self.is_expired_at(now) {
            CredentialState::Expired
        } else {
            CredentialState::Valid
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Apply a successful refresh. The refresh token is only replaced when
    /// the provider rotated it.
    ///
    /// Fails without touching the record when `expires_in` does not fit a
    /// timestamp.
    pub fn apply_refresh(&mut self, response: &TokenResponse, now: DateTime<Utc>) -> OAuth2Result<()> {
        let ttl = response.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let expires_at = i64::try_from(ttl)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                OAuth2Error::TokenRefreshFailed(format!("expires_in out of range: {}", ttl))
            })?;

        self.access_token = response.access_token.clone();
        self.token_type = response.token_type.clone();

        if let Some(refresh_token) = &response.refresh_token {
            self.refresh_token = Some(refresh_token.clone());
        }

        self.expires_at = expires_at;

        if let Some(scope) = &response.scope {
            self.scopes = scope.split_whitespace().map(|s| s.to_string()).collect();
        }

        self.error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.error = Some(CredentialError {
            reason: reason.into(),
            failed_at: Utc::now(),
        });
    }

    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// A credential that was valid when handed out by [`TokenManager::ensure_valid`]
#[derive(Debug, Clone)]
pub struct ValidCredential {
    access_token: String,
    token_type: String,
    expires_at: DateTime<Utc>,
}

impl ValidCredential {
    pub(crate) fn from_record(record: &CredentialRecord) -> Self {
        Self {
            access_token: record.access_token.clone(),
            token_type: record.token_type.clone(),
            expires_at: record.expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Handle to one credential record.
///
/// Clones share the same record. The inner mutex is held for the whole
/// refresh round trip, so callers racing on an expired record wait for the
/// first refresh instead of issuing their own.
#[derive(Debug, Clone)]
pub struct SharedCredential {
    record: Arc<Mutex<CredentialRecord>>,
    refreshing: Arc<AtomicBool>,
}

impl SharedCredential {
    pub fn new(record: CredentialRecord) -> Self {
        Self {
            record: Arc::new(Mutex::new(record)),
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Copy of the current record, e.g. for persisting after a refresh
    pub async fn snapshot(&self) -> CredentialRecord {
        self.record.lock().await.clone()
    }

    /// Replace the record with a freshly authorized one
    pub async fn replace(&self, record: CredentialRecord) {
        *self.record.lock().await = record;
    }

    pub async fn state(&self) -> CredentialState {
        if self.refreshing.load(Ordering::Acquire) {
            return CredentialState::RefreshInFlight;
        }
        self.record.lock().await.state_at(Utc::now())
    }
}

/// Clears the in-flight flag however the refresh ends
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Credential lifecycle manager.
///
/// Expiry is checked lazily on use; there is no background refresh.
#[derive(Clone)]
pub struct TokenManager {
    refresher: Arc<dyn TokenRefresher>,
    refresh_timeout: Duration,
    refresh_margin: chrono::Duration,
}

impl TokenManager {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            refresher,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refresh_margin: chrono::Duration::zero(),
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Refresh this long before the actual expiry. Zero by default.
    pub fn with_refresh_margin(mut self, margin: chrono::Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Return a credential that is valid right now, refreshing it first if
    /// it has expired.
    ///
    /// Makes no network call while the token is still valid. A failed refresh
    /// leaves the record in the error state and is not retried.
    pub async fn ensure_valid(&self, credential: &SharedCredential) -> OAuth2Result<ValidCredential> {
        let mut record = credential.record.lock().await;

        if let Some(error) = &record.error {
            return Err(OAuth2Error::TokenRefreshFailed(format!(
                "credential unusable since {}: {}",
                error.failed_at.to_rfc3339(),
                error.reason
            )));
        }

        if !record.needs_refresh_at(Utc::now(), self.refresh_margin) {
            return Ok(ValidCredential::from_record(&record));
        }

        let refresh_token = match record.refresh_token.clone() {
            Some(token) if !token.is_empty() => token,
            _ => {
                let reason = "access token expired and no refresh token is available";
                tracing::error!("{}", reason);
                record.mark_failed(reason);
                return Err(OAuth2Error::TokenRefreshFailed(reason.to_string()));
            }
        };

        let _in_flight = RefreshGuard::start(&credential.refreshing);
        tracing::info!(
            "Access token expired at {}, refreshing",
            record.expires_at.to_rfc3339()
        );

        let result = match tokio::time::timeout(
            self.refresh_timeout,
            self.refresher.refresh(&refresh_token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(OAuth2Error::RefreshTimeout(self.refresh_timeout)),
        };

        match result {
            Ok(response) => {
                let now = Utc::now();
                if let Err(e) = record.apply_refresh(&response, now) {
                    tracing::error!("Rejected refresh response: {}", e);
                    record.mark_failed(e.to_string());
                    return Err(e);
                }

                if record.is_expired_at(now) {
                    let reason = "identity provider returned an already expired token";
                    tracing::error!("{}", reason);
                    record.mark_failed(reason);
                    return Err(OAuth2Error::TokenRefreshFailed(reason.to_string()));
                }

                tracing::info!(
                    "Access token refreshed, valid until {}",
                    record.expires_at.to_rfc3339()
                );
                Ok(ValidCredential::from_record(&record))
            }
            Err(e) => {
                tracing::error!("Failed to refresh access token: {}", e);
                record.mark_failed(e.to_string());
                Err(OAuth2Error::TokenRefreshFailed(e.to_string()))
            }
        }
    }
}
