use axum::{Router, middleware, routing::get, routing::post};
use tower_http::cors::CorsLayer;

use paygate_core::telemetry::{propagate_request_id_layer, request_id_layer, trace_layer};

use crate::handlers::{
    events::{list_stored_events, recent_events},
    health::{healthz, readyz},
    payment::{create_payment, get_payment, list_payments},
};
use crate::infra::db::DbIdempotencyRepository;
use crate::middleware::enforce_idempotency;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let idempotency = middleware::from_fn_with_state(
        state.idempotency_gate(),
        enforce_idempotency::<DbIdempotencyRepository>,
    );

    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Payments
        .route("/api/payments", post(create_payment).layer(idempotency))
        .route("/api/payments", get(list_payments))
        .route("/api/payments/{payment_id}", get(get_payment))
        // Events
        .route("/api/events", get(list_stored_events))
        .route("/api/events/recent", get(recent_events))
        .layer(propagate_request_id_layer())
        .layer(trace_layer())
        .layer(request_id_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
