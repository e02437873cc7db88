use std::sync::{Arc, Mutex, MutexGuard};

use callfeed_core::{CallEvent, CallfeedConfig, RawCall, Result};
use tracing::{debug, info};

use crate::broadcast::BroadcastHub;
use crate::history::HistoryRing;
use crate::normalize::Normalizer;
use crate::session::{SessionConfig, SubscriptionSession};

struct LogState {
    history: HistoryRing,
    last: Option<Arc<CallEvent>>,
}

/// The call-event service: one instance per process, shared by handle.
///
/// Ingestion runs id allocation, history append, `last` update and hub
/// publish under one lock, so publish order always equals id order and a
/// new session can register without racing an in-flight event.
pub struct CallLog {
    normalizer: Normalizer,
    state: Mutex<LogState>,
    hub: Arc<BroadcastHub>,
    session: SessionConfig,
}

impl CallLog {
    pub fn new(capacity: usize, buffer: usize, session: SessionConfig) -> Self {
        Self {
            normalizer: Normalizer::new(),
            state: Mutex::new(LogState {
                history: HistoryRing::new(capacity),
                last: None,
            }),
            hub: Arc::new(BroadcastHub::new(buffer)),
            session,
        }
    }

    pub fn from_config(config: &CallfeedConfig) -> Self {
        Self::new(
            config.history.capacity,
            config.stream.buffer,
            SessionConfig::from(config),
        )
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        // Nothing under this lock can leave the state half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Normalize, store and broadcast one webhook call.
    ///
    /// On `PhoneMissing` nothing is stored and no id is consumed.
    pub fn ingest(&self, raw: &RawCall) -> Result<Arc<CallEvent>> {
        let mut state = self.lock();
        let event = Arc::new(self.normalizer.normalize(raw)?);

        state.history.push(Arc::clone(&event));
        state.last = Some(Arc::clone(&event));
        let report = self.hub.publish(&event);
        drop(state);

        info!(
            id = event.id,
            status = %event.status,
            delivered = report.delivered,
            "call ingested"
        );
        if report.skipped > 0 || report.removed > 0 {
            debug!(id = event.id, skipped = report.skipped, removed = report.removed, "partial fanout");
        }
        Ok(event)
    }

    pub fn last(&self) -> Option<Arc<CallEvent>> {
        self.lock().last.clone()
    }

    /// Newest-first slice of history; `limit` is clamped by the caller.
    pub fn recent(&self, limit: usize) -> Vec<Arc<CallEvent>> {
        self.lock().history.recent(limit)
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn capacity(&self) -> usize {
        self.lock().history.capacity()
    }

    /// Register a new subscriber and hand back its session, seeded with the
    /// current `last` event. No event can slip between the two.
    pub fn open_session(&self) -> SubscriptionSession {
        let state = self.lock();
        let subscription = self.hub.register();
        let replay = state.last.clone();
        drop(state);
        SubscriptionSession::start(subscription, replay, self.hub.shutdown_token(), self.session)
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Close every live session.
    pub fn shutdown(&self) {
        self.hub.shutdown();
    }
}
