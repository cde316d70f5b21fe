use crate::smtp::{SmtpError, SmtpResult};
use lettre::{
    message::{header::ContentType, Mailbox},
    Address, Message,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Originating mailbox identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub address: String,
    pub display_name: Option<String>,
}

impl Sender {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.display_name = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
        self
    }

    /// Resolve to a lettre mailbox, `"Name" <address>` when a name is set
    pub fn to_mailbox(&self) -> SmtpResult<Mailbox> {
        let address = Address::from_str(self.address.trim())?;
        Ok(Mailbox::new(self.display_name.clone(), address))
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "\"{}\" <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Builder for a single-recipient HTML message
pub struct MessageBuilder {
    from: Option<Mailbox>,
    to: Option<Mailbox>,
    subject: String,
    body_html: String,
}

impl MessageBuilder {
    /// Create a new message builder
    pub fn new() -> Self {
        Self {
            from: None,
            to: None,
            subject: String::new(),
            body_html: String::new(),
        }
    }

    /// Set the sender
    pub fn from(mut self, from: Mailbox) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the only recipient; recipients never see each other
    pub fn to(mut self, to: Mailbox) -> Self {
        self.to = Some(to);
        self
    }

    /// Set the recipient from a string
    pub fn to_str(mut self, to: &str) -> SmtpResult<Self> {
        self.to = Some(parse_mailbox(to)?);
        Ok(self)
    }

    /// Set the subject
    pub fn subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the HTML body, sent as-is
    pub fn body_html<S: Into<String>>(mut self, body: S) -> Self {
        self.body_html = body.into();
        self
    }

    /// Build the message
    pub fn build(self) -> SmtpResult<Message> {
        let from = self
            .from
            .ok_or_else(|| SmtpError::MessageFormatError("From address is required".to_string()))?;

        let to = self
            .to
            .ok_or_else(|| SmtpError::MessageFormatError("A recipient is required".to_string()))?;

        if self.subject.is_empty() {
            return Err(SmtpError::MessageFormatError(
                "Subject is required".to_string(),
            ));
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject)
            .date_now()
            .header(ContentType::TEXT_HTML)
            .body(self.body_html)
            .map_err(SmtpError::MessageBuildError)
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an email address to Mailbox
pub fn parse_mailbox(address: &str) -> SmtpResult<Mailbox> {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return Err(SmtpError::InvalidAddress("Empty address".to_string()));
    }

    // Handle "Name <email@domain.com>" format
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed.find('>') {
            if end <= start {
                return Err(SmtpError::InvalidAddress(trimmed.to_string()));
            }
            let name = trimmed[..start].trim().trim_matches('"');
            let email = &trimmed[start + 1..end];

            let addr = Address::from_str(email)?;
            if name.is_empty() {
                return Ok(Mailbox::new(None, addr));
            } else {
                return Ok(Mailbox::new(Some(name.to_string()), addr));
            }
        }
    }

    let addr = Address::from_str(trimmed)?;
    Ok(Mailbox::new(None, addr))
}
