//! Read-only helpers over the message transcript.

use serde_json::{Map, Value};

use crate::filters::safe_int;
use crate::message::Message;
use crate::state::{ContactProfile, VehicleCandidate};
use crate::tools::CREATE_EXECUTIVE_CALL_REQUEST;

/// Maximum candidates recovered from the transcript when state holds none.
pub const MAX_RECOVERED_CANDIDATES: usize = 8;

const PROFILE_FIELDS: [&str; 3] = ["customer_name", "phone_number", "preferred_call_time"];

/// Text of the most recent human message, or `""`.
pub fn latest_human_text(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.is_human())
        .map(Message::content)
        .unwrap_or("")
}

pub fn count_human_messages(messages: &[Message]) -> usize {
    messages.iter().filter(|m| m.is_human()).count()
}

/// Whether a tool result named `tool_name` appears after the latest human message.
pub fn has_tool_result_in_current_turn(messages: &[Message], tool_name: &str) -> bool {
    for message in messages.iter().rev() {
        match message {
            Message::Human { .. } => return false,
            Message::Tool { name, .. } if name.trim() == tool_name => return true,
            _ => {}
        }
    }
    false
}

/// Parses a tool payload; `None` unless it is a JSON object.
pub fn parse_payload(content: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn complete_profile(map: &Map<String, Value>) -> Option<ContactProfile> {
    let values: Vec<String> = PROFILE_FIELDS.iter().map(|k| text_field(map, k)).collect();
    if values.iter().any(String::is_empty) {
        return None;
    }
    Some(
        PROFILE_FIELDS
            .iter()
            .zip(values)
            .map(|(k, v)| (k.to_string(), Value::String(v)))
            .collect(),
    )
}

/// Recovers a complete contact profile from the transcript.
///
/// Looks first at the newest `create_executive_call_request` call arguments, then at the
/// newest successful tool payload carrying all three fields.
pub fn extract_last_contact_profile(messages: &[Message]) -> Option<ContactProfile> {
    let from_calls = messages.iter().rev().find_map(|message| {
        message
            .tool_calls()
            .iter()
            .rev()
            .filter(|call| call.name == CREATE_EXECUTIVE_CALL_REQUEST)
            .find_map(|call| complete_profile(&call.args))
    });
    if from_calls.is_some() {
        return from_calls;
    }

    messages.iter().rev().find_map(|message| match message {
        Message::Tool { content, .. } => parse_payload(content)
            .filter(|payload| payload.get("ok").and_then(Value::as_bool) == Some(true))
            .and_then(|payload| complete_profile(&payload)),
        _ => None,
    })
}

/// Recovers candidates from the newest search payload that yields at least one.
pub fn extract_recent_vehicle_candidates(
    messages: &[Message],
    max_items: usize,
) -> Vec<VehicleCandidate> {
    for message in messages.iter().rev() {
        let Message::Tool { content, .. } = message else {
            continue;
        };
        let Some(payload) = parse_payload(content) else {
            continue;
        };
        let Some(rows) = payload.get("vehicles").and_then(Value::as_array) else {
            continue;
        };
        let candidates: Vec<VehicleCandidate> = rows
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|row| {
                let id = row.get("id").and_then(Value::as_i64)?;
                Some(VehicleCandidate {
                    id,
                    make: text_field(row, "make"),
                    model: text_field(row, "model"),
                    year: row.get("year").and_then(safe_int),
                    mileage_km: None,
                    price_usd: None,
                    country_of_origin: String::new(),
                })
            })
            .take(max_items)
            .collect();
        if !candidates.is_empty() {
            return candidates;
        }
    }
    Vec::new()
}

fn fold_accents(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

fn normalized_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(fold_accents)
        .collect::<String>()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ids of candidates whose make and model tokens all appear in `text`.
///
/// Matching is case- and accent-insensitive; candidate order is preserved.
pub fn match_vehicle_candidates(text: &str, candidates: &[VehicleCandidate]) -> Vec<i64> {
    let words = normalized_tokens(text);
    if words.is_empty() {
        return Vec::new();
    }
    candidates
        .iter()
        .filter(|candidate| {
            let wanted = normalized_tokens(&format!("{} {}", candidate.make, candidate.model));
            !wanted.is_empty() && wanted.iter().all(|token| words.contains(token))
        })
        .map(|candidate| candidate.id)
        .collect()
}

/// Last `max_messages` messages, starting on a human message.
///
/// When the window holds no human message it is widened back to the latest one, so an
/// agent tool-call batch is never separated from the request that caused it.
pub fn trim_history(messages: &[Message], max_messages: usize) -> Vec<Message> {
    let window_start = messages.len().saturating_sub(max_messages);
    let start = messages[window_start..]
        .iter()
        .position(Message::is_human)
        .map(|offset| window_start + offset)
        .or_else(|| messages[..window_start].iter().rposition(Message::is_human))
        .unwrap_or(window_start);
    messages[start..].to_vec()
}
