//! One subscriber's live connection lifecycle.
//!
//! `Opening -> Live -> Closed`, never backwards. The session owns its hub
//! registration and its heartbeat timer; both are released together on the
//! first termination trigger (client gone, hub unregister, server shutdown,
//! or the session being dropped) and never again after that.

use std::sync::Arc;
use std::time::Duration;

use callfeed_core::config::{HEARTBEAT_INTERVAL_SECS, RETRY_HINT_MS};
use callfeed_core::{CallEvent, CallfeedConfig};
use futures_util::Stream;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::broadcast::{Subscription, SubscriberId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Live,
    Closed,
}

/// Transport-neutral frames; the gateway renders them as SSE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFrame {
    /// Reconnect delay hint, always the first frame.
    Retry(Duration),
    Call(Arc<CallEvent>),
    /// Inert keep-alive for idle connections.
    Heartbeat,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub heartbeat: Duration,
    pub retry: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            retry: Duration::from_millis(RETRY_HINT_MS),
        }
    }
}

impl From<&CallfeedConfig> for SessionConfig {
    fn from(config: &CallfeedConfig) -> Self {
        Self {
            heartbeat: Duration::from_secs(config.stream.heartbeat_secs.max(1)),
            retry: Duration::from_millis(config.stream.retry_ms),
        }
    }
}

enum Wake {
    Shutdown,
    Call(Option<Arc<CallEvent>>),
    Heartbeat,
}

pub struct SubscriptionSession {
    state: SessionState,
    subscription: Subscription,
    heartbeat: Option<Interval>,
    shutdown: CancellationToken,
    retry: Option<Duration>,
    replay: Option<Arc<CallEvent>>,
}

impl SubscriptionSession {
    /// Start a session on an already-made registration. `replay` is the
    /// single last-known event sent before live traffic.
    pub fn start(
        subscription: Subscription,
        replay: Option<Arc<CallEvent>>,
        shutdown: CancellationToken,
        config: SessionConfig,
    ) -> Self {
        // The first tick lands one full period from now, not immediately.
        let mut heartbeat = interval_at(Instant::now() + config.heartbeat, config.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            state: SessionState::Opening,
            subscription,
            heartbeat: Some(heartbeat),
            shutdown,
            retry: Some(config.retry),
            replay,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.subscription.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Next frame to write, or `None` once the session is closed.
    pub async fn next_frame(&mut self) -> Option<SessionFrame> {
        match self.state {
            SessionState::Closed => return None,
            SessionState::Opening => {
                if let Some(retry) = self.retry.take() {
                    return Some(SessionFrame::Retry(retry));
                }
                self.state = SessionState::Live;
                debug!(subscriber = self.id(), "session live");
                if let Some(last) = self.replay.take() {
                    return Some(SessionFrame::Call(last));
                }
            }
            SessionState::Live => {}
        }

        let wake = {
            let heartbeat = self.heartbeat.as_mut()?;
            // Order matters: shutdown beats queued events, and queued events
            // (or the end-of-queue signal after an unregister) beat a
            // heartbeat that happens to be due at the same time.
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Wake::Shutdown,
                event = self.subscription.recv() => Wake::Call(event),
                _ = heartbeat.tick() => Wake::Heartbeat,
            }
        };

        match wake {
            Wake::Call(Some(event)) => Some(SessionFrame::Call(event)),
            Wake::Call(None) => {
                self.close("unregistered");
                None
            }
            Wake::Shutdown => {
                self.close("server shutdown");
                None
            }
            Wake::Heartbeat => Some(SessionFrame::Heartbeat),
        }
    }

    /// Tear down: cancel the heartbeat and leave the hub. Runs at most once;
    /// returns `false` if the session was already closed.
    pub fn close(&mut self, reason: &str) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        self.heartbeat = None;
        self.replay = None;
        self.subscription.cancel();
        info!(subscriber = self.id(), reason, "session closed");
        true
    }

    /// Frames as a stream. Dropping the stream closes the session.
    pub fn into_stream(self) -> impl Stream<Item = SessionFrame> + Send {
        futures_util::stream::unfold(self, |mut session| async move {
            let frame = session.next_frame().await?;
            Some((frame, session))
        })
    }
}

impl Drop for SubscriptionSession {
    fn drop(&mut self) {
        self.close("client disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use callfeed_core::CallStatus;
    use chrono::{TimeZone, Utc};
    use futures_util::StreamExt;

    fn event(id: u64) -> Arc<CallEvent> {
        Arc::new(CallEvent {
            id,
            phone: "123".into(),
            digits: "123".into(),
            extension: None,
            source: None,
            received_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            status: CallStatus::Ringing,
            note: None,
            caller_name: None,
            person_id: None,
        })
    }

    fn open(
        hub: &Arc<BroadcastHub>,
        replay: Option<Arc<CallEvent>>,
        config: SessionConfig,
    ) -> SubscriptionSession {
        SubscriptionSession::start(hub.register(), replay, hub.shutdown_token(), config)
    }

    fn config() -> SessionConfig {
        SessionConfig {
            heartbeat: Duration::from_secs(25),
            retry: Duration::from_millis(4000),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opening_sends_retry_then_replay_then_goes_live() {
        let hub = Arc::new(BroadcastHub::new(8));
        let mut session = open(&hub, Some(event(7)), config());
        assert_eq!(session.state(), SessionState::Opening);

        assert_eq!(
            session.next_frame().await,
            Some(SessionFrame::Retry(Duration::from_millis(4000)))
        );
        assert_eq!(session.next_frame().await, Some(SessionFrame::Call(event(7))));
        assert_eq!(session.state(), SessionState::Live);

        hub.publish(&event(8));
        let Some(SessionFrame::Call(ev)) = session.next_frame().await else {
            panic!("expected live call frame");
        };
        assert_eq!(ev.id, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn no_replay_without_last_call() {
        let hub = Arc::new(BroadcastHub::new(8));
        let mut session = open(&hub, None, config());
        assert!(matches!(session.next_frame().await, Some(SessionFrame::Retry(_))));

        hub.publish(&event(1));
        assert_eq!(session.next_frame().await, Some(SessionFrame::Call(event(1))));
        assert_eq!(session.state(), SessionState::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_fires_on_period_when_idle() {
        let hub = Arc::new(BroadcastHub::new(8));
        let mut session = open(&hub, None, config());
        session.next_frame().await;

        let started = Instant::now();
        assert_eq!(session.next_frame().await, Some(SessionFrame::Heartbeat));
        assert!(started.elapsed() >= Duration::from_secs(25));
        assert_eq!(session.next_frame().await, Some(SessionFrame::Heartbeat));
        assert!(started.elapsed() >= Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_double_unregister_then_no_heartbeat() {
        let hub = Arc::new(BroadcastHub::new(8));
        let mut session = open(&hub, None, config());
        session.next_frame().await;
        let id = session.id();

        let (a, b) = tokio::join!(
            tokio::spawn({
                let hub = Arc::clone(&hub);
                async move { hub.unregister(id) }
            }),
            tokio::spawn({
                let hub = Arc::clone(&hub);
                async move { hub.unregister(id) }
            }),
        );
        let removed = [a.unwrap(), b.unwrap()];
        assert_eq!(removed.iter().filter(|r| **r).count(), 1);

        // Well past the heartbeat period: the session must end, not tick.
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(session.next_frame().await, None);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.next_frame().await, None);
        assert!(!session.close("again"));
    }

    #[tokio::test(start_paused = true)]
    async fn events_queued_before_unregister_are_still_delivered() {
        let hub = Arc::new(BroadcastHub::new(8));
        let mut session = open(&hub, None, config());
        session.next_frame().await;

        hub.publish(&event(1));
        hub.publish(&event(2));
        hub.unregister(session.id());

        assert_eq!(session.next_frame().await, Some(SessionFrame::Call(event(1))));
        assert_eq!(session.next_frame().await, Some(SessionFrame::Call(event(2))));
        assert_eq!(session.next_frame().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn server_shutdown_closes_session() {
        let hub = Arc::new(BroadcastHub::new(8));
        let mut session = open(&hub, None, config());
        session.next_frame().await;

        hub.shutdown();
        assert_eq!(session.next_frame().await, None);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stream_unregisters() {
        let hub = Arc::new(BroadcastHub::new(8));
        let mut stream = Box::pin(open(&hub, None, config()).into_stream());
        assert!(matches!(stream.next().await, Some(SessionFrame::Retry(_))));
        assert_eq!(hub.subscriber_count(), 1);

        drop(stream);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_close_is_idempotent() {
        let hub = Arc::new(BroadcastHub::new(8));
        let mut session = open(&hub, None, config());
        assert!(session.close("test"));
        assert!(!session.close("test"));
        assert_eq!(session.next_frame().await, None);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
