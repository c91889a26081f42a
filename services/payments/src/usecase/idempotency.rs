use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::repository::IdempotencyRepository;
use crate::domain::types::{IdempotencyKey, StoredRequest};
use crate::error::PaymentsServiceError;

/// What the gate decided for an incoming key.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// The key was already executed; replay this response.
    Replay(serde_json::Value),
    /// First time this key is seen; run the handler.
    Proceed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// A concurrent execution with the same key recorded first.
    LostRace,
    Failed,
}

/// Deduplicates payment submissions by idempotency key.
///
/// Only successful executions are recorded. Two concurrent first-time
/// submissions of one key can both pass [`check`](Self::check); the unique
/// index lets only one of them record, but both handlers have already run.
pub struct IdempotencyGate<R: IdempotencyRepository> {
    repo: R,
}

impl<R: IdempotencyRepository> IdempotencyGate<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lookup failures are returned to the caller; the handler must not run.
    pub async fn check(&self, key: &IdempotencyKey) -> Result<GateDecision, PaymentsServiceError> {
        match self.repo.find_by_key(key.as_str()).await? {
            Some(stored) => {
                info!(idempotency_key = %key, "replaying recorded response");
                Ok(GateDecision::Replay(stored.response))
            }
            None => Ok(GateDecision::Proceed),
        }
    }

    /// Record the response of a successful execution. Never fails the request.
    pub async fn record(&self, key: &IdempotencyKey, response: serde_json::Value) -> RecordOutcome {
        let stored = StoredRequest {
            idempotency_key: key.as_str().to_owned(),
            response,
            created_at: Utc::now(),
        };
        match self.repo.insert(&stored).await {
            Ok(()) => RecordOutcome::Recorded,
            Err(PaymentsServiceError::DuplicateKey) => {
                warn!(
                    idempotency_key = %key,
                    "idempotency key recorded concurrently, keeping the first response"
                );
                RecordOutcome::LostRace
            }
            Err(e) => {
                error!(
                    idempotency_key = %key,
                    error = %format!("{:#}", anyhow::Error::new(e)),
                    "failed to record idempotent response"
                );
                RecordOutcome::Failed
            }
        }
    }
}
