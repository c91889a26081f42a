use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use paygate_core::pagination::PageRequest;

use crate::domain::types::{IdempotencyKey, Payment, PaymentResponse, PaymentStatus};
use crate::error::PaymentsServiceError;
use crate::state::AppState;
use crate::usecase::payment::{
    CreatePaymentInput, CreatePaymentUseCase, GetPaymentUseCase, ListPaymentsUseCase,
};

// ── POST /api/payments ───────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub customer_id: String,
}

/// Runs behind the idempotency gate, which supplies the key extension.
pub async fn create_payment(
    Extension(key): Extension<IdempotencyKey>,
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), PaymentsServiceError> {
    tracing::debug!(idempotency_key = %key, "creating payment");
    let usecase = CreatePaymentUseCase {
        provider: state.wise.clone(),
        payments: state.payment_repo(),
        publisher: state.event_publisher(),
        queue: state.delivery.queue().to_owned(),
        target_currency: state.payout_target_currency.clone(),
    };
    let response = usecase
        .execute(CreatePaymentInput {
            amount: body.amount,
            currency: body.currency,
            customer_id: body.customer_id,
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

// ── GET /api/payments ────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub customer_id: String,
    pub recipient_id: String,
    pub wise_payment_id: String,
    pub status: PaymentStatus,
    #[serde(serialize_with = "paygate_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Payment> for PaymentView {
    fn from(p: Payment) -> Self {
        Self {
            payment_id: p.payment_id,
            amount: p.amount,
            currency: p.currency,
            customer_id: p.customer_id,
            recipient_id: p.recipient_id,
            wise_payment_id: p.wise_payment_id,
            status: p.status,
            created_at: p.created_at,
        }
    }
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Vec<PaymentView>>, PaymentsServiceError> {
    let usecase = ListPaymentsUseCase {
        repo: state.payment_repo(),
    };
    let payments = usecase.execute(page).await?;
    Ok(Json(payments.into_iter().map(PaymentView::from).collect()))
}

// ── GET /api/payments/{id} ───────────────────────────────────────────────────

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentView>, PaymentsServiceError> {
    let usecase = GetPaymentUseCase {
        repo: state.payment_repo(),
    };
    let payment = usecase.execute(payment_id).await?;
    Ok(Json(payment.into()))
}
