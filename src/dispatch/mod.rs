//! Bulk dispatch: one message, many individually addressed deliveries.
//!
//! [`BulkSender::send_bulk`] is the entry point. It validates the request up
//! front, makes sure the credential is usable, fans the message out through
//! the [`DispatchEngine`] and reports a single [`DispatchOutcome`].

pub mod engine;
pub mod outcome;
pub mod recipients;
pub mod service;

pub use engine::{DispatchEngine, DEFAULT_ATTEMPT_TIMEOUT};
pub use outcome::{
    AttemptOutcome, DeliveryAttempt, DeliveryErrorKind, DeliveryFailure, DispatchOutcome,
    DispatchStatus,
};
pub use recipients::RecipientList;
pub use service::BulkSender;

use crate::oauth2::OAuth2Error;
use crate::smtp::Sender;
use lettre::message::Mailbox;
use thiserror::Error;

/// Most recipients a single dispatch may address
pub const DEFAULT_MAX_RECIPIENTS: usize = 300;

/// Errors that abort a dispatch before any delivery is attempted
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Too many recipients: {count} exceeds the limit of {max}")]
    RecipientLimitExceeded { count: usize, max: usize },

    #[error("No recipients given")]
    NoRecipients,

    #[error("Message {0} is required")]
    MissingField(&'static str),

    #[error("Invalid sender address {address}: {reason}")]
    InvalidSender { address: String, reason: String },

    #[error("Credential refresh failed: {0}")]
    CredentialRefreshFailed(#[source] OAuth2Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// A validated request: non-empty subject and body, a parseable sender and
/// between one and `max_recipients` recipients.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    sender: Sender,
    from: Mailbox,
    subject: String,
    body: String,
    recipients: RecipientList,
}

impl DispatchRequest {
    pub fn new(
        sender: Sender,
        subject: impl Into<String>,
        body: impl Into<String>,
        recipients: RecipientList,
        max_recipients: usize,
    ) -> DispatchResult<Self> {
        let subject = subject.into();
        let body = body.into();

        if subject.trim().is_empty() {
            return Err(DispatchError::MissingField("subject"));
        }
        if body.trim().is_empty() {
            return Err(DispatchError::MissingField("body"));
        }
        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }
        recipients.enforce_limit(max_recipients)?;

        let from = sender.to_mailbox().map_err(|e| DispatchError::InvalidSender {
            address: sender.address.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            sender,
            from,
            subject,
            body,
            recipients,
        })
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn from_mailbox(&self) -> &Mailbox {
        &self.from
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn recipients(&self) -> &RecipientList {
        &self.recipients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Sender {
        Sender::new("ops@example.com")
    }

    #[test]
    fn test_request_requires_subject_and_body() {
        let recipients = RecipientList::parse("a@x.com");

        let err = DispatchRequest::new(sender(), " ", "<p>hi</p>", recipients.clone(), 300)
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingField("subject")));

        let err = DispatchRequest::new(sender(), "Hi", "", recipients, 300).unwrap_err();
        assert!(matches!(err, DispatchError::MissingField("body")));
    }

    #[test]
    fn test_request_requires_recipients() {
        let err = DispatchRequest::new(sender(), "Hi", "<p>hi</p>", RecipientList::parse(" ,; "), 300)
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoRecipients));
    }

    #[test]
    fn test_request_rejects_bad_sender() {
        let err = DispatchRequest::new(
            Sender::new("not-an-address"),
            "Hi",
            "<p>hi</p>",
            RecipientList::parse("a@x.com"),
            300,
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidSender { .. }));
    }

    #[test]
    fn test_request_limit_boundary() {
        let at_limit: RecipientList = (0..300).map(|i| format!("user{i}@x.com")).collect();
        assert!(DispatchRequest::new(sender(), "Hi", "<p>hi</p>", at_limit, 300).is_ok());

        let over_limit: RecipientList = (0..301).map(|i| format!("user{i}@x.com")).collect();
        let err = DispatchRequest::new(sender(), "Hi", "<p>hi</p>", over_limit, 300).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::RecipientLimitExceeded { count: 301, max: 300 }
        ));
    }
}
