#![allow(async_fn_in_trait)]

//! Ports used by the idempotency gate and the event delivery component return
//! `Send` futures: both run behind generic middleware or in spawned tasks.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use paygate_core::pagination::PageRequest;

use crate::domain::types::{
    DomainEvent, Payment, Quote, QuoteRequest, Recipient, StoredEvent, StoredRequest,
};
use crate::error::{PaymentsServiceError, TransportError};

/// Store of recorded responses, keyed by idempotency key.
pub trait IdempotencyRepository: Send + Sync {
    fn find_by_key(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<StoredRequest>, PaymentsServiceError>> + Send;

    /// Fails with `DuplicateKey` if the key is already recorded.
    fn insert(
        &self,
        request: &StoredRequest,
    ) -> impl Future<Output = Result<(), PaymentsServiceError>> + Send;
}

/// Durable fallback for events the transport could not take.
pub trait EventStore: Send + Sync {
    fn insert(
        &self,
        event: &StoredEvent,
    ) -> impl Future<Output = Result<(), PaymentsServiceError>> + Send;

    /// Unprocessed events ordered by `created_at` ascending, ties broken by id.
    fn find_unprocessed(
        &self,
    ) -> impl Future<Output = Result<Vec<StoredEvent>, PaymentsServiceError>> + Send;

    fn mark_processed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), PaymentsServiceError>> + Send;

    /// All stored events, oldest first.
    fn list(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<StoredEvent>, PaymentsServiceError>> + Send;
}

/// Message broker connection factory.
pub trait Transport: Send + Sync {
    type Channel: Channel;

    fn connect(&self) -> impl Future<Output = Result<Self::Channel, TransportError>> + Send;
}

/// Open delivery channel on a connected transport.
pub trait Channel: Send {
    /// Declare `queue` as durable, creating it if needed.
    fn assert_queue(
        &mut self,
        queue: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Publish `payload` to `queue` with persistent delivery.
    fn send_to_queue(
        &mut self,
        queue: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Publishes domain events for downstream consumers.
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, queue: &str, event: &DomainEvent) -> Result<(), PaymentsServiceError>;
}

impl<P: EventPublisher> EventPublisher for Arc<P> {
    async fn publish(&self, queue: &str, event: &DomainEvent) -> Result<(), PaymentsServiceError> {
        (**self).publish(queue, event).await
    }
}

/// Repository for recorded payments.
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentsServiceError>;

    /// Newest first.
    async fn list(&self, page: PageRequest) -> Result<Vec<Payment>, PaymentsServiceError>;

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, PaymentsServiceError>;
}

/// Third-party money-transfer provider.
pub trait PayoutProvider: Send + Sync {
    /// Verifies the provider profile is reachable before any quote is requested.
    async fn fetch_account_details(&self) -> Result<serde_json::Value, PaymentsServiceError>;

    /// Payout recipients that accept `currency`.
    async fn fetch_recipients(&self, currency: &str)
    -> Result<Vec<Recipient>, PaymentsServiceError>;

    async fn create_quote(&self, request: &QuoteRequest) -> Result<Quote, PaymentsServiceError>;
}
