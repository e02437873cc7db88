use axum::{routing::get, Router};
use callfeed_core::CallfeedConfig;
use callfeed_directory::DirectoryLookup;
use callfeed_hub::CallLog;
use std::sync::{Arc, Once};
use tracing::warn;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CallfeedConfig,
    pub calls: CallLog,
    pub directory: Arc<dyn DirectoryLookup>,
    open_ingest_warning: Once,
}

impl AppState {
    pub fn new(config: CallfeedConfig, directory: Arc<dyn DirectoryLookup>) -> Self {
        let calls = CallLog::from_config(&config);
        Self {
            config,
            calls,
            directory,
            open_ingest_warning: Once::new(),
        }
    }

    /// The configured webhook secret, or `None` in open-ingestion mode.
    /// Open mode is announced once per process.
    pub fn ingest_secret(&self) -> Option<&str> {
        let secret = self.config.ingest.secret.as_deref().filter(|s| !s.is_empty());
        if secret.is_none() {
            self.open_ingest_warning.call_once(|| {
                warn!("no ingest.secret configured; accepting unauthenticated webhooks");
            });
        }
        secret
    }

    pub fn read_token(&self) -> Option<&str> {
        self.config.auth.token.as_deref().filter(|s| !s.is_empty())
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/webhook/call",
            get(crate::http::webhook::webhook_handler).post(crate::http::webhook::webhook_handler),
        )
        .route("/api/calls", get(crate::http::calls::log_handler))
        .route("/api/calls/last", get(crate::http::calls::last_handler))
        .route("/api/calls/stream", get(crate::http::stream::stream_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
