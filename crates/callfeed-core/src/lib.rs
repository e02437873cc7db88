pub mod config;
pub mod error;
pub mod types;

pub use config::CallfeedConfig;
pub use error::{CallfeedError, Result};
pub use types::{CallEvent, CallStatus, DirectoryEntry, EnrichedCall, RawCall};
