use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use callfeed_core::{CallEvent, DirectoryEntry, EnrichedCall};
use tracing::warn;

use crate::lookup::DirectoryLookup;

/// Attach caller names to a history slice.
///
/// Values stored on the event at ingestion win over directory results. A
/// failing directory degrades to the stored values only.
pub async fn enrich_calls(
    directory: &dyn DirectoryLookup,
    calls: &[Arc<CallEvent>],
) -> Vec<EnrichedCall> {
    let digits: Vec<String> = calls
        .iter()
        .filter(|c| !c.digits.is_empty())
        .map(|c| c.digits.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let names = match directory.lookup_names(&digits).await {
        Ok(names) => names,
        Err(e) => {
            warn!(directory = directory.name(), error = %e, "directory lookup failed; serving unresolved names");
            HashMap::new()
        }
    };

    calls.iter().map(|call| merge(call, names.get(&call.digits))).collect()
}

fn merge(call: &CallEvent, entry: Option<&DirectoryEntry>) -> EnrichedCall {
    let mut resolved = call.clone();
    let mut from_directory = false;

    if let Some(entry) = entry {
        if resolved.caller_name.is_none() {
            resolved.caller_name = Some(entry.name.clone());
            from_directory = true;
        }
        if resolved.person_id.is_none() && entry.person_id.is_some() {
            resolved.person_id = entry.person_id.clone();
            from_directory = true;
        }
    }

    EnrichedCall {
        call: resolved,
        from_directory,
    }
}
