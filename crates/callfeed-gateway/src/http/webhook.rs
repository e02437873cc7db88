//! PBX webhook ingress — POST (or GET) /webhook/call.
//!
//! Accepts a JSON object or form-encoded body and/or query parameters
//! describing one call notification. The call is normalized, stored in
//! history and pushed to live stream subscribers before the response is
//! sent; pushing never waits on a subscriber.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use callfeed_core::{CallfeedError, RawCall};
use serde_json::{json, Map, Value};
use tracing::warn;

use super::{api_error, ApiError};
use crate::app::AppState;
use crate::auth::verify_ingest;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Returns 200 + event id on success, 401 when a configured secret does not
/// match, 400 when the body is unreadable or no phone number can be derived.
///
/// With a secret configured the credential is checked first; an unreadable
/// body then simply contributes no body `secret`.
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let parsed = parse_body(&headers, &body);
    let raw = RawCall::collect(parsed.as_ref().ok().and_then(Option::as_ref), &query);

    if let Some(secret) = state.ingest_secret() {
        verify_ingest(
            secret,
            &headers,
            &body,
            raw.secret.as_deref(),
            query.get("secret").map(String::as_str),
        )
        .map_err(|reason| {
            warn!(reason = %reason, "webhook authentication failed");
            api_error(&CallfeedError::AuthFailed(reason))
        })?;
    }

    if let Err(e) = parsed {
        warn!(error = %e, "rejected webhook body");
        return Err(api_error(&e));
    }

    let event = state.calls.ingest(&raw).map_err(|e| {
        warn!(error = %e, phone = ?raw.phone, "webhook rejected");
        api_error(&e)
    })?;

    Ok(Json(json!({"ok": true, "id": event.id})))
}

/// Empty body is fine (query-only webhooks). A form-encoded body is read as
/// text fields; anything else must be a JSON object.
fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Option<Map<String, Value>>, CallfeedError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
    if is_form {
        let fields: HashMap<String, String> = serde_urlencoded::from_bytes(body)
            .map_err(|e| CallfeedError::InvalidPayload(e.to_string()))?;
        return Ok(Some(
            fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
        ));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(CallfeedError::InvalidPayload(
            "body must be a JSON object".to_string(),
        )),
        Err(e) => Err(CallfeedError::InvalidPayload(e.to_string())),
    }
}
