use crate::dispatch::{
    DispatchEngine, DispatchError, DispatchOutcome, DispatchRequest, DispatchResult,
    RecipientList, DEFAULT_MAX_RECIPIENTS,
};
use crate::oauth2::{SharedCredential, TokenManager};
use crate::smtp::Sender;

/// Caller-facing bulk send: pre-flight checks, credential, fan-out.
#[derive(Clone)]
pub struct BulkSender {
    token_manager: TokenManager,
    engine: DispatchEngine,
    max_recipients: usize,
}

impl BulkSender {
    pub fn new(token_manager: TokenManager, engine: DispatchEngine) -> Self {
        Self {
            token_manager,
            engine,
            max_recipients: DEFAULT_MAX_RECIPIENTS,
        }
    }

    pub fn with_max_recipients(mut self, max_recipients: usize) -> Self {
        self.max_recipients = max_recipients;
        self
    }

    pub fn max_recipients(&self) -> usize {
        self.max_recipients
    }

    /// Parse recipients and validate the payload without touching the network
    pub fn prepare(
        &self,
        sender: Sender,
        subject: &str,
        body: &str,
        recipients_text: &str,
    ) -> DispatchResult<DispatchRequest> {
        let recipients = RecipientList::parse(recipients_text);
        tracing::debug!("Parsed {} recipients", recipients.len());
        DispatchRequest::new(sender, subject, body, recipients, self.max_recipients)
    }

    /// Send one message to every recipient in `recipients_text`.
    ///
    /// Validation and credential errors abort before any delivery. Once
    /// deliveries start, per-recipient failures are reported in the outcome.
    pub async fn send_bulk(
        &self,
        credential: &SharedCredential,
        sender: Sender,
        subject: &str,
        body: &str,
        recipients_text: &str,
    ) -> DispatchResult<DispatchOutcome> {
        let request = self.prepare(sender, subject, body, recipients_text)?;
        self.send_request(credential, &request).await
    }

    /// Dispatch an already validated request
    pub async fn send_request(
        &self,
        credential: &SharedCredential,
        request: &DispatchRequest,
    ) -> DispatchResult<DispatchOutcome> {
        // Refresh strictly before the first delivery
        let valid = self
            .token_manager
            .ensure_valid(credential)
            .await
            .map_err(|e| {
                tracing::error!("Dispatch aborted, credential unusable: {}", e);
                DispatchError::CredentialRefreshFailed(e)
            })?;

        Ok(self.engine.dispatch(&valid, request).await)
    }
}
