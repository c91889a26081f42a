use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::infra::broker::RedisTransport;
use crate::infra::db::{DbEventStore, DbIdempotencyRepository, DbPaymentRepository};
use crate::infra::wise::WiseClient;
use crate::usecase::delivery::EventDelivery;
use crate::usecase::idempotency::IdempotencyGate;

pub type PaymentEventDelivery = EventDelivery<RedisTransport, DbEventStore>;

pub type PaymentIdempotencyGate = IdempotencyGate<DbIdempotencyRepository>;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub delivery: Arc<PaymentEventDelivery>,
    pub gate: Arc<PaymentIdempotencyGate>,
    pub wise: WiseClient,
    /// Currency payouts are quoted into (e.g. "INR").
    pub payout_target_currency: String,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        delivery: Arc<PaymentEventDelivery>,
        wise: WiseClient,
        payout_target_currency: String,
    ) -> Self {
        let gate = Arc::new(IdempotencyGate::new(DbIdempotencyRepository { db: db.clone() }));
        Self {
            db,
            delivery,
            gate,
            wise,
            payout_target_currency,
        }
    }

    pub fn payment_repo(&self) -> DbPaymentRepository {
        DbPaymentRepository {
            db: self.db.clone(),
        }
    }

    pub fn idempotency_gate(&self) -> Arc<PaymentIdempotencyGate> {
        Arc::clone(&self.gate)
    }

    pub fn event_publisher(&self) -> Arc<PaymentEventDelivery> {
        Arc::clone(&self.delivery)
    }
}
