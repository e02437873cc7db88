//! Read endpoints — GET /api/calls/last and GET /api/calls?limit=N.
//!
//! Auth: `Authorization: Bearer <token>` or `?access_token=` when
//! `auth.token` is configured.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use callfeed_directory::enrich_calls;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{unauthorized, ApiError};
use crate::app::AppState;
use crate::auth::read_allowed;

#[derive(Deserialize)]
pub struct LogQuery {
    /// Kept as text so a non-numeric value falls back to the default limit
    /// instead of failing the request. Numeric values are clamped.
    pub limit: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub access_token: Option<String>,
}

/// GET /api/calls/last — the most recent call, or `{"call": null}`.
pub async fn last_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    if !read_allowed(state.read_token(), &headers, query.access_token.as_deref()) {
        return Err(unauthorized());
    }
    let last = state.calls.last();
    Ok(Json(json!({ "call": last.as_deref() })))
}

/// GET /api/calls — newest-first history with caller names resolved.
pub async fn log_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LogQuery>,
) -> Result<Json<Value>, ApiError> {
    if !read_allowed(state.read_token(), &headers, query.access_token.as_deref()) {
        return Err(unauthorized());
    }

    let requested = query.limit.as_deref().and_then(|l| l.trim().parse::<i64>().ok());
    let limit = state.config.clamp_limit(requested);
    let recent = state.calls.recent(limit);
    let calls = enrich_calls(state.directory.as_ref(), &recent).await;

    Ok(Json(json!({ "calls": calls })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{build_router, tests::*};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use callfeed_core::{CallfeedConfig, DirectoryEntry, RawCall};
    use callfeed_directory::{error::DirectoryError, DirectoryLookup, NoDirectory, SqliteDirectory};
    use std::collections::HashMap;
    use tower::ServiceExt;

    struct DownDirectory;

    #[async_trait]
    impl DirectoryLookup for DownDirectory {
        fn name(&self) -> &str {
            "down"
        }
        async fn lookup_names(
            &self,
            _: &[String],
        ) -> callfeed_directory::error::Result<HashMap<String, DirectoryEntry>> {
            Err(DirectoryError::Unavailable("connection refused".into()))
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn ingest(state: &AppState, phone: &str, status: &str, name: Option<&str>) {
        state
            .calls
            .ingest(&RawCall {
                phone: Some(phone.into()),
                status: Some(status.into()),
                caller_name: name.map(String::from),
                ..Default::default()
            })
            .unwrap();
    }

    fn ids(json: &Value) -> Vec<u64> {
        json["calls"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_u64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn log_limit_three_returns_newest_first() {
        let state = open_state();
        for status in ["ringing", "answered", "missed", "rejected", "ringing"] {
            ingest(&state, "5550100", status, None);
        }
        let response = build_router(state)
            .oneshot(get("/api/calls?limit=3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(ids(&json), vec![5, 4, 3]);
        assert_eq!(json["calls"][1]["status"], "rejected");
    }

    #[tokio::test]
    async fn limit_is_clamped_and_defaulted() {
        let state = open_state();
        for _ in 0..3 {
            ingest(&state, "5550100", "ringing", None);
        }
        let router = build_router(state);
        for (uri, expected) in [
            ("/api/calls?limit=0", 1),
            ("/api/calls?limit=-4", 1),
            ("/api/calls?limit=2", 2),
            ("/api/calls?limit=abc", 3),
            ("/api/calls?limit=99999", 3),
            ("/api/calls", 3),
        ] {
            let json = json_body(router.clone().oneshot(get(uri)).await.unwrap()).await;
            assert_eq!(ids(&json).len(), expected, "{uri}");
        }
    }

    #[tokio::test]
    async fn failing_directory_still_serves_history() {
        let state = state_with(CallfeedConfig::default(), Arc::new(DownDirectory));
        ingest(&state, "111", "ringing", Some("Stored Ada"));
        ingest(&state, "222", "missed", None);

        let response = build_router(state).oneshot(get("/api/calls")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["calls"][0]["callerName"], Value::Null);
        assert_eq!(json["calls"][1]["callerName"], "Stored Ada");
    }

    #[tokio::test]
    async fn directory_fills_missing_names() {
        let directory = SqliteDirectory::open_in_memory().unwrap();
        directory.upsert_contact("222", "Grace", Some("p-9")).unwrap();
        directory.upsert_contact("111", "Directory Ada", None).unwrap();
        let state = state_with(CallfeedConfig::default(), Arc::new(directory));
        ingest(&state, "111", "ringing", Some("Stored Ada"));
        ingest(&state, "+222", "ringing", None);

        let json = json_body(
            build_router(state)
                .oneshot(get("/api/calls"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(json["calls"][0]["callerName"], "Grace");
        assert_eq!(json["calls"][0]["personId"], "p-9");
        assert_eq!(json["calls"][0]["fromDirectory"], true);
        assert_eq!(json["calls"][1]["callerName"], "Stored Ada");
        assert_eq!(json["calls"][1]["fromDirectory"], false);
    }

    #[tokio::test]
    async fn last_is_null_then_latest() {
        let state = open_state();
        let router = build_router(state.clone());

        let json = json_body(router.clone().oneshot(get("/api/calls/last")).await.unwrap()).await;
        assert!(json["call"].is_null());

        ingest(&state, "111", "ringing", None);
        ingest(&state, "222", "answered", None);
        let json = json_body(router.oneshot(get("/api/calls/last")).await.unwrap()).await;
        assert_eq!(json["call"]["id"], 2);
        assert_eq!(json["call"]["status"], "answered");
    }

    #[tokio::test]
    async fn read_token_is_enforced() {
        let mut config = CallfeedConfig::default();
        config.auth.token = Some("t0k".into());
        let router = build_router(state_with(config, Arc::new(NoDirectory)));

        for uri in ["/api/calls", "/api/calls/last"] {
            let response = router.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = router
            .clone()
            .oneshot(get("/api/calls/last?access_token=t0k"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/calls")
                    .header("authorization", "Bearer t0k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
