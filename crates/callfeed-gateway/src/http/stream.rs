//! Live call stream — GET /api/calls/stream (Server-Sent Events).
//!
//! Frame sequence: a `retry:` hint, the latest known call (if any), then
//! every newly ingested call as `event: call` with the call id as the SSE
//! id, interleaved with `: ping` comments while idle.
//!
//! A reconnecting client's `Last-Event-ID` is not used for gap-filling; it
//! gets the latest call and live traffic only, and must re-read
//! `/api/calls` to catch up.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
};
use callfeed_hub::SessionFrame;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use super::calls::TokenQuery;
use super::{unauthorized, ApiError};
use crate::app::AppState;
use crate::auth::read_allowed;

pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if !read_allowed(state.read_token(), &headers, query.access_token.as_deref()) {
        return Err(unauthorized());
    }

    if let Some(last_seen) = headers.get("last-event-id").and_then(|v| v.to_str().ok()) {
        debug!(last_seen, "stream reconnect; replaying latest call only");
    }

    let session = state.calls.open_session();
    let frames = session.into_stream();

    let stream = async_stream::stream! {
        futures_util::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            if let Some(event) = render(frame) {
                yield Ok(event);
            }
        }
    };

    Ok(Sse::new(stream))
}

/// SSE encoding of a session frame. Serialization failures drop the frame.
fn render(frame: SessionFrame) -> Option<Event> {
    match frame {
        SessionFrame::Retry(delay) => Some(Event::default().retry(delay)),
        SessionFrame::Heartbeat => Some(Event::default().comment("ping")),
        SessionFrame::Call(call) => match Event::default()
            .id(call.id.to_string())
            .event("call")
            .json_data(&*call)
        {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(id = call.id, error = %e, "failed to serialize call frame");
                None
            }
        },
    }
}
