use std::sync::atomic::{AtomicU64, Ordering};

use callfeed_core::config::MAX_PHONE_DIGITS;
use callfeed_core::{CallEvent, CallStatus, CallfeedError, RawCall, Result};
use chrono::{DateTime, Utc};

/// Turns raw webhook fields into `CallEvent`s and owns the id sequence.
///
/// Ids start at 1 and are only allocated for payloads that pass
/// validation, so accepted events form a gap-free sequence.
pub struct Normalizer {
    next_id: AtomicU64,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Validate `raw`, then allocate the next id and build the event.
    /// Apart from the id and timestamp, the event is a pure function of `raw`.
    pub fn normalize(&self, raw: &RawCall) -> Result<CallEvent> {
        let (phone, digits) = required_phone(raw)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(build_event(id, Utc::now(), phone, digits, raw))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn required_phone(raw: &RawCall) -> Result<(String, String)> {
    let (phone, digits) = normalize_phone(raw.phone.as_deref().unwrap_or_default());
    if digits.is_empty() {
        return Err(CallfeedError::PhoneMissing);
    }
    Ok((phone, digits))
}

fn build_event(
    id: u64,
    received_at: DateTime<Utc>,
    phone: String,
    digits: String,
    raw: &RawCall,
) -> CallEvent {
    CallEvent {
        id,
        phone,
        digits,
        extension: clean_text(raw.extension.as_deref()),
        source: clean_text(raw.source.as_deref()),
        received_at,
        status: CallStatus::from_webhook(raw.status.as_deref()),
        note: clean_text(raw.note.as_deref()),
        caller_name: clean_text(raw.caller_name.as_deref()),
        person_id: clean_text(raw.person_id.as_deref()),
    }
}

/// Returns `(display, digits)`.
///
/// `digits` keeps decimal digits only, capped at 20. `display` is `digits`
/// with a leading `+` when the trimmed input had one, or empty when no
/// digits survived.
pub fn normalize_phone(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    let digits: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(MAX_PHONE_DIGITS)
        .collect();

    if digits.is_empty() {
        return (String::new(), digits);
    }
    let display = if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits.clone()
    };
    (display, digits)
}

/// Trim; blank becomes `None`. No length cap.
fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
