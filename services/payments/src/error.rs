use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Payments service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum PaymentsServiceError {
    #[error("Idempotency key required")]
    MissingIdempotencyKey,
    #[error("{0}")]
    InvalidPaymentRequest(String),
    #[error("duplicate idempotency key")]
    DuplicateKey,
    #[error("Payment not found")]
    PaymentNotFound,
    #[error("store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
    #[error("Payment processing failed")]
    Provider(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl PaymentsServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingIdempotencyKey => "MISSING_IDEMPOTENCY_KEY",
            Self::InvalidPaymentRequest(_) => "INVALID_PAYMENT_REQUEST",
            Self::DuplicateKey => "DUPLICATE_KEY",
            Self::PaymentNotFound => "PAYMENT_NOT_FOUND",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Provider(_) => "PROVIDER",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn store(context: &'static str) -> impl FnOnce(sea_orm::DbErr) -> Self {
        move |e| Self::StoreUnavailable(anyhow::Error::new(e).context(context))
    }
}

impl IntoResponse for PaymentsServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingIdempotencyKey | Self::InvalidPaymentRequest(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateKey => StatusCode::CONFLICT,
            Self::PaymentNotFound => StatusCode::NOT_FOUND,
            Self::StoreUnavailable(_) | Self::Provider(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // 4xx are expected client errors and already show up in the TraceLayer span.
        match &self {
            Self::StoreUnavailable(e) | Self::Provider(e) | Self::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), kind = self.kind(), "request failed");
            }
            _ => {}
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Failures talking to the message transport. Never leaves the event delivery component.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport connect failed")]
    Connect(#[source] anyhow::Error),
    #[error("queue {queue} could not be asserted")]
    AssertQueue {
        queue: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("send to queue {queue} failed")]
    Send {
        queue: String,
        #[source]
        source: anyhow::Error,
    },
}
