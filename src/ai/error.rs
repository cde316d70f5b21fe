//! AI-specific error types and handling

use thiserror::Error;

/// Result type for AI operations
pub type AIResult<T> = Result<T, AIError>;

/// Error types for draft generation
#[derive(Error, Debug, Clone)]
pub enum AIError {
    #[error("AI provider is unavailable: {message}")]
    ProviderUnavailable { message: String },

    #[error("Authentication failed: {provider}")]
    AuthenticationFailure { provider: String },

    #[error("Rate limit exceeded for provider: {provider}, retry after: {retry_after:?}")]
    RateLimitExceeded {
        provider: String,
        retry_after: Option<std::time::Duration>,
    },

    #[error("Content was filtered by AI provider: {reason}")]
    ContentFiltered { reason: String },

    #[error("Invalid response from AI provider: {details}")]
    InvalidResponse { details: String },

    #[error("Could not find a subject/body JSON object in the draft: {details}")]
    DraftParseFailed { details: String },

    #[error("AI configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("AI provider timeout after {timeout:?}")]
    Timeout { timeout: std::time::Duration },
}

impl AIError {
    /// Create a provider unavailable error
    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        AIError::ProviderUnavailable {
            message: message.into(),
        }
    }

    /// Create an authentication failure error
    pub fn auth_failure(provider: impl Into<String>) -> Self {
        AIError::AuthenticationFailure {
            provider: provider.into(),
        }
    }

    /// Create a rate limit exceeded error
    pub fn rate_limit(provider: impl Into<String>, retry_after: Option<std::time::Duration>) -> Self {
        AIError::RateLimitExceeded {
            provider: provider.into(),
            retry_after,
        }
    }

    /// Create a content filtered error
    pub fn content_filtered(reason: impl Into<String>) -> Self {
        AIError::ContentFiltered {
            reason: reason.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(details: impl Into<String>) -> Self {
        AIError::InvalidResponse {
            details: details.into(),
        }
    }

    /// Create a draft parse error
    pub fn draft_parse_failed(details: impl Into<String>) -> Self {
        AIError::DraftParseFailed {
            details: details.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        AIError::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network_error(message: impl Into<String>) -> Self {
        AIError::NetworkError {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout: std::time::Duration) -> Self {
        AIError::Timeout { timeout }
    }
}

impl From<reqwest::Error> for AIError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AIError::timeout(std::time::Duration::from_secs(30))
        } else if err.is_connect() {
            AIError::provider_unavailable(err.to_string())
        } else {
            AIError::network_error(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AIError {
    fn from(err: serde_json::Error) -> Self {
        AIError::invalid_response(format!("JSON parsing error: {}", err))
    }
}
