use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;
use uuid::Uuid;

use paygate_core::pagination::PageRequest;

use crate::domain::types::{DomainEvent, StoredEvent};
use crate::error::PaymentsServiceError;
use crate::state::AppState;
use crate::usecase::events::ListStoredEventsUseCase;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEventView {
    pub id: Uuid,
    pub queue: String,
    pub kind: String,
    pub message: serde_json::Value,
    pub processed: bool,
    #[serde(serialize_with = "paygate_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(serialize_with = "paygate_core::serde::to_rfc3339_ms_opt")]
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<StoredEvent> for StoredEventView {
    fn from(e: StoredEvent) -> Self {
        Self {
            id: e.id,
            queue: e.queue,
            kind: e.kind,
            message: e.message,
            processed: e.processed,
            created_at: e.created_at,
            processed_at: e.processed_at,
        }
    }
}

/// `GET /api/events`: every fallback event, oldest first.
pub async fn list_stored_events(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Vec<StoredEventView>>, PaymentsServiceError> {
    let usecase = ListStoredEventsUseCase {
        store: state.delivery.store(),
    };
    let events = usecase.execute(page).await?;
    Ok(Json(events.into_iter().map(StoredEventView::from).collect()))
}

/// `GET /api/events/recent`: payment events queued in memory while disconnected.
pub async fn recent_events(State(state): State<AppState>) -> Json<Vec<DomainEvent>> {
    Json(state.delivery.recent_events())
}
