use std::sync::Arc;

use anyhow::Context as _;
use axum::Json;
use axum::body::{Body, HttpBody as _, to_bytes};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::domain::repository::IdempotencyRepository;
use crate::domain::types::{IDEMPOTENCY_KEY_HEADER, IdempotencyKey};
use crate::error::PaymentsServiceError;
use crate::usecase::idempotency::{GateDecision, IdempotencyGate};

/// Largest handler response that is buffered for recording.
pub const MAX_RECORDED_BODY_BYTES: usize = 1024 * 1024;

/// Idempotency gate for side-effecting routes.
///
/// - no `idempotency-key` header: 400, the handler is not called
/// - recorded key: 200 with the recorded body, the handler is not called
/// - new key: the key is added as an `Extension<IdempotencyKey>`, the handler
///   runs, and a 2xx JSON response is recorded before it is returned; streamed
///   or oversized bodies pass through unrecorded
pub async fn enforce_idempotency<R>(
    State(gate): State<Arc<IdempotencyGate<R>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, PaymentsServiceError>
where
    R: IdempotencyRepository + 'static,
{
    let header = request
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    let key = IdempotencyKey::parse(header).ok_or(PaymentsServiceError::MissingIdempotencyKey)?;

    if let GateDecision::Replay(recorded) = gate.check(&key).await? {
        return Ok((StatusCode::OK, Json(recorded)).into_response());
    }

    request.extensions_mut().insert(key.clone());
    let response = next.run(request).await;
    if !response.status().is_success() {
        return Ok(response);
    }
    let recordable = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_RECORDED_BODY_BYTES as u64);
    if !recordable {
        warn!(idempotency_key = %key, "handler response is streamed or too large, not recorded");
        return Ok(response);
    }

    let (mut parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_RECORDED_BODY_BYTES)
        .await
        .context("buffer handler response")?;
    let value = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(idempotency_key = %key, error = %e, "handler response is not JSON, not recorded");
            return Ok(Response::from_parts(parts, Body::from(bytes)));
        }
    };

    // Replays serialize the recorded value; the first response uses the same bytes.
    let canonical = serde_json::to_vec(&value).context("serialize recorded response")?;
    gate.record(&key, value).await;
    parts.headers.remove(CONTENT_LENGTH);
    Ok(Response::from_parts(parts, Body::from(canonical)))
}
