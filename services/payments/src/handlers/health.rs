use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

/// Liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness: the record store must answer a ping. A disconnected transport
/// is reported but does not fail readiness since events fall back to the store.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let transport = if state.delivery.is_connected().await {
        "connected"
    } else {
        "disconnected"
    };
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "database": "up", "transport": transport })),
        ),
        Err(e) => {
            warn!(error = %e, "database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "database": "down", "transport": transport })),
            )
        }
    }
}
