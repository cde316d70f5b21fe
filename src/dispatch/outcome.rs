use std::time::Duration;
use thiserror::Error;

/// Why a single delivery failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("rejected by relay: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A failed delivery for one recipient
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("delivery to {recipient} failed: {reason}")]
pub struct DeliveryFailure {
    pub recipient: String,
    pub reason: DeliveryErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Delivered,
    Failed(DeliveryErrorKind),
}

/// One settled per-recipient send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub recipient: String,
    pub outcome: AttemptOutcome,
}

impl DeliveryAttempt {
    pub fn delivered(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            outcome: AttemptOutcome::Delivered,
        }
    }

    pub fn failed(recipient: impl Into<String>, reason: DeliveryErrorKind) -> Self {
        Self {
            recipient: recipient.into(),
            outcome: AttemptOutcome::Failed(reason),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Delivered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    AllDelivered,
    Partial,
    AllFailed,
}

/// Aggregated result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub attempted: usize,
    pub delivered_count: usize,
    /// Failures in recipient order
    pub failures: Vec<DeliveryFailure>,
}

impl DispatchOutcome {
    /// Reduce settled attempts into one outcome
    pub fn from_attempts<I>(attempts: I) -> Self
    where
        I: IntoIterator<Item = DeliveryAttempt>,
    {
        let mut attempted = 0;
        let mut delivered_count = 0;
        let mut failures = Vec::new();

        for attempt in attempts {
            attempted += 1;
            match attempt.outcome {
                AttemptOutcome::Delivered => delivered_count += 1,
                AttemptOutcome::Failed(reason) => failures.push(DeliveryFailure {
                    recipient: attempt.recipient,
                    reason,
                }),
            }
        }

        Self {
            attempted,
            delivered_count,
            failures,
        }
    }

    pub fn status(&self) -> DispatchStatus {
        if self.failures.is_empty() {
            DispatchStatus::AllDelivered
        } else if self.delivered_count == 0 {
            DispatchStatus::AllFailed
        } else {
            DispatchStatus::Partial
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == DispatchStatus::AllDelivered
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// Representative failure for short reports
    pub fn first_failure(&self) -> Option<&DeliveryFailure> {
        self.failures.first()
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        match self.status() {
            DispatchStatus::AllDelivered => {
                format!("{} messages delivered", self.delivered_count)
            }
            DispatchStatus::Partial => format!(
                "{} of {} messages delivered, {} failed (first: {})",
                self.delivered_count,
                self.attempted,
                self.failed_count(),
                self.failures[0]
            ),
            DispatchStatus::AllFailed => format!(
                "All {} deliveries failed (first: {})",
                self.attempted, self.failures[0]
            ),
        }
    }
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay_error() -> DeliveryErrorKind {
        DeliveryErrorKind::Rejected("550 mailbox unavailable".to_string())
    }

    #[test]
    fn test_all_delivered() {
        let outcome = DispatchOutcome::from_attempts(vec![
            DeliveryAttempt::delivered("a@x.com"),
            DeliveryAttempt::delivered("b@x.com"),
        ]);

        assert_eq!(outcome.status(), DispatchStatus::AllDelivered);
        assert_eq!(outcome.delivered_count, 2);
        assert!(outcome.is_success());
        assert_eq!(outcome.summary(), "2 messages delivered");
    }

    #[test]
    fn test_partial_failure_keeps_delivered_count() {
        let outcome = DispatchOutcome::from_attempts(vec![
            DeliveryAttempt::delivered("a@x.com"),
            DeliveryAttempt::delivered("b@x.com"),
            DeliveryAttempt::failed("c@x.com", relay_error()),
            DeliveryAttempt::delivered("d@x.com"),
            DeliveryAttempt::delivered("e@x.com"),
        ]);

        assert_eq!(outcome.status(), DispatchStatus::Partial);
        assert!(!outcome.is_success());
        assert_eq!(outcome.attempted, 5);
        assert_eq!(outcome.delivered_count, 4);
        assert_eq!(
            outcome.failures,
            vec![DeliveryFailure {
                recipient: "c@x.com".to_string(),
                reason: relay_error(),
            }]
        );
        assert!(outcome.summary().starts_with("4 of 5 messages delivered, 1 failed"));
    }

    #[test]
    fn test_all_failed() {
        let outcome = DispatchOutcome::from_attempts(vec![
            DeliveryAttempt::failed("a@x.com", DeliveryErrorKind::Timeout(Duration::from_secs(30))),
            DeliveryAttempt::failed("b@x.com", relay_error()),
        ]);

        assert_eq!(outcome.status(), DispatchStatus::AllFailed);
        assert_eq!(outcome.delivered_count, 0);
        assert_eq!(outcome.first_failure().unwrap().recipient, "a@x.com");
        assert!(outcome.summary().contains("timed out after 30s"));
    }
}
