//! Per-field reducers.
//!
//! Replace-style fields and `append_unique` are idempotent under replay; `append_with_cap`
//! is not, which is why tool results go through the synchronizer ledger.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::message::Message;

/// Cap for `state_logs`.
pub const STATE_LOG_CAP: usize = 300;
/// Cap for `search_history` and `contact_history`.
pub const HISTORY_CAP: usize = 100;
/// Cap for the processed tool message ledger.
pub const PROCESSED_KEYS_CAP: usize = 2000;

/// Appends `new` to `current` and keeps only the newest `cap` entries.
pub fn append_with_cap<T: Clone>(current: &mut Vec<T>, new: &[T], cap: usize) {
    current.extend_from_slice(new);
    if current.len() > cap {
        let excess = current.len() - cap;
        current.drain(..excess);
    }
}

/// Appends values not already present (first occurrence wins), then keeps the newest `cap`.
pub fn append_unique(current: &mut Vec<String>, new: &[String], cap: usize) {
    let mut seen: HashSet<String> = current.iter().cloned().collect();
    for value in new {
        if seen.insert(value.clone()) {
            current.push(value.clone());
        }
    }
    if current.len() > cap {
        let excess = current.len() - cap;
        current.drain(..excess);
    }
}

/// Non-empty-overwrite merge: incoming non-null values overwrite; strings are trimmed and
/// blank strings are ignored. A null or blank never erases an existing value.
pub fn merge_non_empty(
    current: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    let mut merged = current.clone();
    for (key, value) in new {
        match value {
            Value::Null => {}
            Value::String(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    merged.insert(key.clone(), Value::String(trimmed.to_string()));
                }
            }
            other => {
                merged.insert(key.clone(), other.clone());
            }
        }
    }
    merged
}

/// Appends messages; an agent message whose id matches an existing agent message replaces
/// it in place.
pub fn merge_messages(current: &mut Vec<Message>, new: &[Message]) {
    for message in new {
        if let Message::Agent { id: Some(id), .. } = message {
            let existing = current.iter().position(
                |m| matches!(m, Message::Agent { id: Some(existing), .. } if existing == id),
            );
            if let Some(pos) = existing {
                current[pos] = message.clone();
                continue;
            }
        }
        current.push(message.clone());
    }
}
