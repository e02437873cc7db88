use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8088;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Capacity of the in-memory call history (MAX_HISTORY).
pub const MAX_HISTORY: usize = 500;
pub const DEFAULT_LOG_LIMIT: usize = 100;
pub const HEARTBEAT_INTERVAL_SECS: u64 = 25; // keep-alive comment cadence
pub const RETRY_HINT_MS: u64 = 4_000; // EventSource reconnect delay
pub const SUBSCRIBER_BUFFER: usize = 64; // per-subscriber queued frames
/// Digits kept from a caller-supplied phone number.
pub const MAX_PHONE_DIGITS: usize = 20;

/// Top-level config (callfeed.toml + CALLFEED_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallfeedConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Guards the read and stream endpoints. No token means open reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: Option<String>,
}

/// Shared secret expected on incoming webhooks.
///
/// Leaving it unset runs ingestion unauthenticated; the gateway logs a
/// warning the first time that happens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_log_limit")]
    pub default_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_HISTORY,
            default_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: HEARTBEAT_INTERVAL_SECS,
            retry_ms: RETRY_HINT_MS,
            buffer: SUBSCRIBER_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// SQLite file holding the contacts table. Unset disables enrichment.
    pub path: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_capacity() -> usize {
    MAX_HISTORY
}
fn default_log_limit() -> usize {
    DEFAULT_LOG_LIMIT
}
fn default_heartbeat_secs() -> u64 {
    HEARTBEAT_INTERVAL_SECS
}
fn default_retry_ms() -> u64 {
    RETRY_HINT_MS
}
fn default_buffer() -> usize {
    SUBSCRIBER_BUFFER
}

impl CallfeedConfig {
    /// Load config from a TOML file with CALLFEED_* env var overrides.
    ///
    /// Uses the explicit path when given, else ~/.callfeed/callfeed.toml.
    /// A missing file is not an error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CallfeedConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CALLFEED_").split("_"))
            .extract()
            .map_err(|e| crate::error::CallfeedError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Clamp a requested history read size to `[1, capacity]`.
    pub fn clamp_limit(&self, requested: Option<i64>) -> usize {
        let capacity = self.history.capacity.max(1);
        match requested {
            Some(n) if n < 1 => 1,
            Some(n) => usize::try_from(n).map_or(capacity, |n| n.min(capacity)),
            None => self.history.default_limit.clamp(1, capacity),
        }
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.callfeed/callfeed.toml", home)
}
