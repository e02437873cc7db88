pub mod calls;
pub mod health;
pub mod stream;
pub mod webhook;

use axum::{http::StatusCode, Json};
use callfeed_core::CallfeedError;
use serde_json::{json, Value};

pub type ApiError = (StatusCode, Json<Value>);

/// Map a core error to its HTTP status and `{"error", "code"}` body.
pub fn api_error(err: &CallfeedError) -> ApiError {
    let status = match err {
        CallfeedError::PhoneMissing | CallfeedError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        CallfeedError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
        CallfeedError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({"error": err.to_string(), "code": err.code()})),
    )
}

pub fn unauthorized() -> ApiError {
    api_error(&CallfeedError::AuthFailed(
        "set 'Authorization: Bearer <token>' or ?access_token=".to_string(),
    ))
}
