use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state reported by the PBX for a single call notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    #[default]
    Ringing,
    Answered,
    Missed,
    Rejected,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ringing => "ringing",
            CallStatus::Answered => "answered",
            CallStatus::Missed => "missed",
            CallStatus::Rejected => "rejected",
        }
    }

    /// Lenient parse used on the ingestion path: unknown or absent values
    /// become `Ringing` so a malformed upstream status never blocks a call.
    pub fn from_webhook(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ringing" => Ok(CallStatus::Ringing),
            "answered" => Ok(CallStatus::Answered),
            "missed" | "no_answer" | "noanswer" => Ok(CallStatus::Missed),
            "rejected" => Ok(CallStatus::Rejected),
            other => Err(format!("unknown call status: {other}")),
        }
    }
}

/// One normalized inbound call occurrence. Never mutated after creation;
/// a status change on the same call arrives as a new event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEvent {
    /// Process-wide sequence number; doubles as the SSE event id.
    pub id: u64,
    /// Display form: `digits`, optionally prefixed with `+`.
    pub phone: String,
    /// Digits only, at most 20 characters. Join key for directory lookups.
    pub digits: String,
    pub extension: Option<String>,
    pub source: Option<String>,
    pub received_at: DateTime<Utc>,
    pub status: CallStatus,
    pub note: Option<String>,
    pub caller_name: Option<String>,
    pub person_id: Option<String>,
}

/// A history row with the caller identity resolved for display.
///
/// Stored `callerName`/`personId` win; the directory fills the gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedCall {
    #[serde(flatten)]
    pub call: CallEvent,
    /// True when the name or person id shown came from the directory.
    pub from_directory: bool,
}

/// A contact known to the directory, keyed externally by phone digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub person_id: Option<String>,
}

/// Webhook fields as received, before normalization.
///
/// Every field is raw text; PBXs disagree on field names and on whether
/// numbers are sent as JSON strings or numbers, so collection is lenient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCall {
    pub phone: Option<String>,
    pub status: Option<String>,
    pub note: Option<String>,
    pub extension: Option<String>,
    pub source: Option<String>,
    pub caller_name: Option<String>,
    pub person_id: Option<String>,
    pub secret: Option<String>,
}

const PHONE_KEYS: &[&str] = &["phone", "caller", "from", "number", "caller_id", "callerid"];
const CALLER_NAME_KEYS: &[&str] = &["caller_name", "callerName", "name"];
const PERSON_ID_KEYS: &[&str] = &["person_id", "personId"];
const STATUS_KEYS: &[&str] = &["status"];
const NOTE_KEYS: &[&str] = &["note"];
const EXTENSION_KEYS: &[&str] = &["extension"];
const SOURCE_KEYS: &[&str] = &["source"];
const SECRET_KEYS: &[&str] = &["secret"];

impl RawCall {
    /// Collect fields from an optional JSON object body and the query string.
    /// Body values take precedence over query values for the same key.
    pub fn collect(body: Option<&Map<String, Value>>, query: &HashMap<String, String>) -> Self {
        let pick = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|key| {
                body.and_then(|b| b.get(*key))
                    .and_then(value_text)
                    .or_else(|| query.get(*key).cloned())
                    .filter(|v| !v.trim().is_empty())
            })
        };

        Self {
            phone: pick(PHONE_KEYS),
            status: pick(STATUS_KEYS),
            note: pick(NOTE_KEYS),
            extension: pick(EXTENSION_KEYS),
            source: pick(SOURCE_KEYS),
            caller_name: pick(CALLER_NAME_KEYS),
            person_id: pick(PERSON_ID_KEYS),
            secret: pick(SECRET_KEYS),
        }
    }
}

/// Strings pass through, numbers are rendered; anything else is ignored.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
