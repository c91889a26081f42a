use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use uuid::Uuid;

use paygate_core::pagination::PageRequest;
use paygate_payments_schema::{payments, stored_events, stored_requests};

use crate::domain::repository::{EventStore, IdempotencyRepository, PaymentRepository};
use crate::domain::types::{Payment, PaymentStatus, StoredEvent, StoredRequest};
use crate::error::PaymentsServiceError;

// ── Idempotency repository ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbIdempotencyRepository {
    pub db: DatabaseConnection,
}

impl IdempotencyRepository for DbIdempotencyRepository {
    async fn find_by_key(&self, key: &str) -> Result<Option<StoredRequest>, PaymentsServiceError> {
        let model = stored_requests::Entity::find()
            .filter(stored_requests::Column::IdempotencyKey.eq(key))
            .one(&self.db)
            .await
            .map_err(PaymentsServiceError::store("find stored request by key"))?;
        Ok(model.map(|m| StoredRequest {
            idempotency_key: m.idempotency_key,
            response: m.response,
            created_at: m.created_at,
        }))
    }

    async fn insert(&self, request: &StoredRequest) -> Result<(), PaymentsServiceError> {
        let result = stored_requests::ActiveModel {
            id: Set(Uuid::new_v4()),
            idempotency_key: Set(request.idempotency_key.clone()),
            response: Set(request.response.clone()),
            created_at: Set(request.created_at),
        }
        .insert(&self.db)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(PaymentsServiceError::DuplicateKey),
            Err(e) => Err(PaymentsServiceError::store("insert stored request")(e)),
        }
    }
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

// ── Event store ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEventStore {
    pub db: DatabaseConnection,
}

impl EventStore for DbEventStore {
    async fn insert(&self, event: &StoredEvent) -> Result<(), PaymentsServiceError> {
        stored_events::ActiveModel {
            id: Set(event.id),
            queue: Set(event.queue.clone()),
            kind: Set(event.kind.clone()),
            message: Set(event.message.clone()),
            created_at: Set(event.created_at),
            processed: Set(event.processed),
            processed_at: Set(event.processed_at),
        }
        .insert(&self.db)
        .await
        .map_err(PaymentsServiceError::store("insert stored event"))?;
        Ok(())
    }

    async fn find_unprocessed(&self) -> Result<Vec<StoredEvent>, PaymentsServiceError> {
        let models = stored_events::Entity::find()
            .filter(stored_events::Column::Processed.eq(false))
            .order_by_asc(stored_events::Column::CreatedAt)
            .order_by_asc(stored_events::Column::Id)
            .all(&self.db)
            .await
            .map_err(PaymentsServiceError::store("find unprocessed events"))?;
        Ok(models.into_iter().map(event_from_model).collect())
    }

    async fn mark_processed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), PaymentsServiceError> {
        stored_events::ActiveModel {
            id: Set(id),
            processed: Set(true),
            processed_at: Set(Some(processed_at)),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(PaymentsServiceError::store("mark event processed"))?;
        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<StoredEvent>, PaymentsServiceError> {
        let models = stored_events::Entity::find()
            .order_by_asc(stored_events::Column::CreatedAt)
            .order_by_asc(stored_events::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(PaymentsServiceError::store("list stored events"))?;
        Ok(models.into_iter().map(event_from_model).collect())
    }
}

fn event_from_model(model: stored_events::Model) -> StoredEvent {
    StoredEvent {
        id: model.id,
        queue: model.queue,
        kind: model.kind,
        message: model.message,
        created_at: model.created_at,
        processed: model.processed,
        processed_at: model.processed_at,
    }
}

// ── Payment repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbPaymentRepository {
    pub db: DatabaseConnection,
}

impl PaymentRepository for DbPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentsServiceError> {
        payments::ActiveModel {
            payment_id: Set(payment.payment_id),
            amount: Set(payment.amount),
            currency: Set(payment.currency.clone()),
            customer_id: Set(payment.customer_id.clone()),
            recipient_id: Set(payment.recipient_id.clone()),
            wise_payment_id: Set(payment.wise_payment_id.clone()),
            status: Set(payment.status.as_str().to_owned()),
            created_at: Set(payment.created_at),
        }
        .insert(&self.db)
        .await
        .map_err(PaymentsServiceError::store("insert payment"))?;
        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<Payment>, PaymentsServiceError> {
        let models = payments::Entity::find()
            .order_by_desc(payments::Column::CreatedAt)
            .order_by_desc(payments::Column::PaymentId)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(PaymentsServiceError::store("list payments"))?;
        models.into_iter().map(payment_from_model).collect()
    }

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, PaymentsServiceError> {
        let model = payments::Entity::find_by_id(payment_id)
            .one(&self.db)
            .await
            .map_err(PaymentsServiceError::store("find payment by id"))?;
        model.map(payment_from_model).transpose()
    }
}

fn payment_from_model(model: payments::Model) -> Result<Payment, PaymentsServiceError> {
    let status = model
        .status
        .parse::<PaymentStatus>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("payment {} has a corrupt status", model.payment_id))?;
    Ok(Payment {
        payment_id: model.payment_id,
        amount: model.amount,
        currency: model.currency,
        customer_id: model.customer_id,
        recipient_id: model.recipient_id,
        wise_payment_id: model.wise_payment_id,
        status,
        created_at: model.created_at,
    })
}
