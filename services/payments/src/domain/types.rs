use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event name for a recorded payment.
pub const PAYMENT_CREATED: &str = "payment.created";

/// Queue that carries payment events unless overridden by configuration.
pub const DEFAULT_PAYMENT_EVENTS_QUEUE: &str = "payment_events";

/// Header carrying the client-supplied idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Caller-supplied token identifying one logical payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Returns `None` for an absent or blank key.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.filter(|k| !k.trim().is_empty())
            .map(|k| Self(k.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response recorded for the first successful execution of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRequest {
    pub idempotency_key: String,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fallback record for an event published while the transport was down.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub id: Uuid,
    pub queue: String,
    /// Event name, e.g. `payment.created`.
    pub kind: String,
    /// Serialized `DomainEvent`, replayed byte-for-byte on redelivery.
    pub message: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

impl StoredEvent {
    pub fn pending(queue: &str, event: &DomainEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::now_v7(),
            queue: queue.to_owned(),
            kind: event.name().to_owned(),
            message: serde_json::to_value(event)?,
            created_at: Utc::now(),
            processed: false,
            processed_at: None,
        })
    }
}

/// Domain events emitted by this service.
///
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum DomainEvent {
    #[serde(rename = "payment.created")]
    PaymentCreated(PaymentEventData),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PaymentCreated(_) => PAYMENT_CREATED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventData {
    pub payment_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub customer_id: String,
    pub recipient_id: String,
    pub wise_payment_id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Processing,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// A payment recorded after the provider issued a quote.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub customer_id: String,
    pub recipient_id: String,
    /// Provider quote id.
    pub wise_payment_id: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn created_event(&self) -> DomainEvent {
        DomainEvent::PaymentCreated(PaymentEventData {
            payment_id: self.payment_id,
            amount: self.amount,
            currency: self.currency.clone(),
            customer_id: self.customer_id.clone(),
            recipient_id: self.recipient_id.clone(),
            wise_payment_id: self.wise_payment_id.clone(),
            status: self.status,
        })
    }
}

/// Body returned for an accepted payment and replayed for retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
}

/// Payout recipient account registered with the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: i64,
}

/// Currency quote issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub source_currency: String,
    pub target_currency: String,
    pub source_amount: Decimal,
    pub target_account: i64,
}
