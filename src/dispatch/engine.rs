use crate::dispatch::{DeliveryAttempt, DeliveryErrorKind, DispatchOutcome, DispatchRequest, DEFAULT_MAX_RECIPIENTS};
use crate::oauth2::ValidCredential;
use crate::smtp::{MailRelay, MessageBuilder, SmtpError};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default bound on one delivery attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fans one message out to every recipient and joins the results.
///
/// Attempts are independent: a failure never cancels the others, nothing is
/// retried, and every attempt is bounded by a timeout so the join finishes.
#[derive(Clone)]
pub struct DispatchEngine {
    relay: Arc<dyn MailRelay>,
    attempt_timeout: Duration,
    max_concurrency: usize,
}

impl DispatchEngine {
    pub fn new(relay: Arc<dyn MailRelay>) -> Self {
        Self {
            relay,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_concurrency: DEFAULT_MAX_RECIPIENTS,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Cap on attempts in flight at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Deliver the request to every recipient. Waits for all attempts to settle.
    pub async fn dispatch(
        &self,
        credential: &ValidCredential,
        request: &DispatchRequest,
    ) -> DispatchOutcome {
        let batch_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(
            "Dispatch {} started: {} recipients from {}",
            batch_id,
            request.recipients().len(),
            request.sender()
        );

        let pending: Vec<_> = request
            .recipients()
            .iter()
            .map(|recipient| self.attempt(credential, request, recipient))
            .collect();
        let attempts: Vec<DeliveryAttempt> = stream::iter(pending)
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let outcome = DispatchOutcome::from_attempts(attempts);
        tracing::info!(
            "Dispatch {} finished in {:?}: {}",
            batch_id,
            started.elapsed(),
            outcome.summary()
        );
        outcome
    }

    async fn attempt(
        &self,
        credential: &ValidCredential,
        request: &DispatchRequest,
        recipient: &str,
    ) -> DeliveryAttempt {
        let builder = match MessageBuilder::new()
            .from(request.from_mailbox().clone())
            .to_str(recipient)
        {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", recipient, e);
                return DeliveryAttempt::failed(
                    recipient,
                    DeliveryErrorKind::InvalidAddress(e.to_string()),
                );
            }
        };

        let message = match builder
            .subject(request.subject())
            .body_html(request.body())
            .build()
        {
            Ok(message) => message,
            Err(e) => {
                return DeliveryAttempt::failed(recipient, DeliveryErrorKind::Transport(e.to_string()))
            }
        };

        match tokio::time::timeout(self.attempt_timeout, self.relay.deliver(credential, message)).await {
            Ok(Ok(())) => {
                tracing::debug!("Delivered to {}", recipient);
                DeliveryAttempt::delivered(recipient)
            }
            Ok(Err(e)) => {
                tracing::warn!("Delivery to {} failed: {}", recipient, e);
                let reason = match e {
                    SmtpError::Rejected(message) => DeliveryErrorKind::Rejected(message),
                    SmtpError::InvalidAddress(message) => DeliveryErrorKind::InvalidAddress(message),
                    SmtpError::AddressParseError(e) => DeliveryErrorKind::InvalidAddress(e.to_string()),
                    other => DeliveryErrorKind::Transport(other.to_string()),
                };
                DeliveryAttempt::failed(recipient, reason)
            }
            Err(_) => {
                tracing::warn!(
                    "Delivery to {} timed out after {:?}",
                    recipient,
                    self.attempt_timeout
                );
                DeliveryAttempt::failed(recipient, DeliveryErrorKind::Timeout(self.attempt_timeout))
            }
        }
    }
}
