//! Call-event broadcast engine: normalization, bounded history, live fanout
//! and per-subscriber stream sessions.

pub mod broadcast;
pub mod history;
pub mod log;
pub mod normalize;
pub mod session;

pub use broadcast::{BroadcastHub, PublishReport, Subscription, SubscriberId};
pub use history::HistoryRing;
pub use log::CallLog;
pub use normalize::Normalizer;
pub use session::{SessionConfig, SessionFrame, SessionState, SubscriptionSession};
