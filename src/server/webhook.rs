//! Webhook endpoint handlers.
//!
//! Accepts Bitbucket webhook deliveries, checks the shared key, and hands the
//! raw payload to the dispatcher on a detached task before answering. Parsing
//! and all Bitbucket calls happen after the response is sent, so Bitbucket only
//! ever sees 200 or 401 from this endpoint.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::effects::Platform;
use crate::webhooks::verify_shared_key;

/// Header carrying the Bitbucket event key, e.g. `pullrequest:fulfilled`.
const HEADER_EVENT_KEY: &str = "x-event-key";

/// Errors returned to the webhook caller.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The `key` query parameter is missing or wrong.
    #[error("invalid shared key")]
    InvalidKey,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::InvalidKey => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
        }
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Query: `key=<shared secret>`; when repeated, the first value counts
/// - Header `X-Event-Key`: the event type; absent is treated as "not a merge"
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 200 OK with `{}`: key accepted, event handling started
/// - 401 Unauthorized: missing or wrong key
pub async fn webhook_handler<P: Platform>(
    State(app_state): State<AppState<P>>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    // Authenticate before looking at anything else
    if !verify_shared_key(shared_key_param(&query), app_state.shared_key()) {
        warn!("Rejected webhook with invalid shared key");
        return Err(WebhookError::InvalidKey);
    }

    let event_key = event_key(&headers);
    debug!(event_key = %event_key, bytes = body.len(), "Received webhook");

    app_state.dispatcher().spawn(event_key, body);

    Ok(Json(json!({})))
}

/// Reachability probe for `GET /cascading-merge`.
pub async fn probe_handler() -> StatusCode {
    StatusCode::OK
}

/// Returns the first `key` query parameter.
fn shared_key_param(query: &[(String, String)]) -> Option<&str> {
    query
        .iter()
        .find(|(name, _)| name == "key")
        .map(|(_, value)| value.as_str())
}

/// Reads `X-Event-Key`; missing or non-UTF-8 values become the empty string.
fn event_key(headers: &HeaderMap) -> String {
    headers
        .get(HEADER_EVENT_KEY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
