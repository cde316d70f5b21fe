pub mod client;
pub mod message;

pub use client::{SmtpClient, SmtpConfig};
pub use message::{MessageBuilder, Sender};

use crate::oauth2::ValidCredential;
use async_trait::async_trait;
use lettre::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SMTP-related errors
#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Message rejected by relay: {0}")]
    Rejected(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Message formatting error: {0}")]
    MessageFormatError(String),

    #[error("Address parse error: {0}")]
    AddressParseError(#[from] lettre::address::AddressError),

    #[error("Message build error: {0}")]
    MessageBuildError(#[from] lettre::error::Error),
}

pub type SmtpResult<T> = Result<T, SmtpError>;

/// Outbound mail relay. One call delivers one message.
#[async_trait]
pub trait MailRelay: Send + Sync {
    async fn deliver(&self, credential: &ValidCredential, message: Message) -> SmtpResult<()>;
}

/// SMTP authentication methods
#[derive(Debug, Clone)]
pub enum SmtpAuth {
    /// XOAUTH2 using the access token handed to each delivery
    OAuth2 { username: String },
    /// Plain username/password, e.g. a Gmail app password
    Plain { username: String, password: String },
}

impl SmtpAuth {
    pub fn username(&self) -> &str {
        match self {
            SmtpAuth::OAuth2 { username } | SmtpAuth::Plain { username, .. } => username,
        }
    }

    pub fn uses_bearer_token(&self) -> bool {
        matches!(self, SmtpAuth::OAuth2 { .. })
    }
}

/// SMTP connection security
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// No encryption (not recommended)
    None,
    /// STARTTLS upgrade, required
    #[default]
    StartTls,
    /// Implicit TLS from the first byte
    Tls,
}
