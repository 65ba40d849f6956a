//! Folds unseen tool results into durable state exactly once.
//!
//! Every node that reads state runs [`sync_tool_results`] first and works on
//! `state.with_patch(&sync_patch)`. Keys are recorded in `processed_tool_message_keys`
//! whether or not the payload was understood, so a replayed transcript never double-counts.
//! The ledger is capped; `tool_scan_watermark` keeps messages whose keys aged out from
//! being scanned again.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::filters::{compact_vehicle_candidates, safe_int, sanitize_filters, MAX_CANDIDATES};
use crate::message::Message;
use crate::state::{ContactProfile, ContactRequest, ConversationState, SearchEvent, StatePatch};
use crate::transcript::parse_payload;

/// Ledger key for a tool message: its call id, or its position in the transcript.
pub fn tool_message_key(call_id: Option<&str>, index: usize) -> String {
    match call_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => format!("tool_msg_{index}"),
    }
}

fn text(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Builds the patch that absorbs every tool message not yet in the ledger.
pub fn sync_tool_results(state: &ConversationState) -> StatePatch {
    let processed: HashSet<&str> = state
        .processed_tool_message_keys
        .iter()
        .map(String::as_str)
        .collect();
    let mut seen_now: HashSet<String> = HashSet::new();
    let mut patch = StatePatch::new();

    let scanned = state.tool_scan_watermark;
    for (index, message) in state.messages.iter().enumerate().skip(scanned) {
        let Message::Tool {
            call_id,
            name,
            content,
        } = message
        else {
            continue;
        };
        let key = tool_message_key(call_id.as_deref(), index);
        if processed.contains(key.as_str()) || !seen_now.insert(key.clone()) {
            continue;
        }
        patch.processed_tool_message_keys.push(key.clone());

        let Some(payload) = parse_payload(content) else {
            tracing::debug!(key = %key, tool = %name, "tool payload is not a JSON object");
            patch
                .state_logs
                .push(format!("{name} skipped: unparseable payload key={key}"));
            continue;
        };

        fold_payload(&mut patch, &key, &payload);
    }
    if state.messages.len() > scanned {
        patch.tool_scan_watermark = Some(state.messages.len());
    }

    if !patch.is_empty() {
        tracing::debug!(
            keys = patch.processed_tool_message_keys.len(),
            searches = patch.search_history.len(),
            contacts = patch.contact_history.len(),
            "tool results synchronized"
        );
    }
    patch
}

fn fold_payload(patch: &mut StatePatch, key: &str, payload: &Map<String, Value>) {
    if let Some(rows) = payload.get("vehicles").and_then(Value::as_array) {
        let candidates = compact_vehicle_candidates(rows, MAX_CANDIDATES);
        let filters_used = payload
            .get("filters_used")
            .and_then(Value::as_object)
            .map(sanitize_filters)
            .unwrap_or_default();
        if !filters_used.is_empty() {
            patch.active_search_filters = Some(filters_used.clone());
        }
        let count = payload
            .get("count")
            .and_then(safe_int)
            .filter(|c| *c > 0)
            .unwrap_or(candidates.len() as i64);
        let filters_json = serde_json::to_string(&filters_used).unwrap_or_default();
        patch.search_history.push(SearchEvent {
            tool_message_key: key.to_string(),
            filters_used,
            count,
            vehicle_ids: candidates.iter().map(|c| c.id).collect(),
        });
        patch.last_vehicle_candidates = Some(candidates);
        patch.state_logs.push(format!(
            "search_used_vehicles processed: count={count} filters={filters_json}"
        ));
        return;
    }

    if payload.get("found").and_then(Value::as_bool) == Some(true) {
        if let Some(id) = payload
            .get("vehicle")
            .and_then(Value::as_object)
            .and_then(|vehicle| vehicle.get("id"))
            .and_then(Value::as_i64)
        {
            patch.selected_vehicle_id = Some(id);
            patch.state_logs.push(format!(
                "get_vehicle_details processed: selected_vehicle_id={id}"
            ));
        }
        return;
    }

    if payload.get("ok").and_then(Value::as_bool) == Some(true) {
        let Some(request_id) = payload.get("request_id").and_then(Value::as_i64) else {
            return;
        };
        let vehicle_id = payload.get("vehicle_id").and_then(safe_int);
        if vehicle_id.is_some() {
            patch.selected_vehicle_id = vehicle_id;
        }
        let request = ContactRequest {
            request_id,
            vehicle_id,
            customer_name: text(payload, "customer_name"),
            phone_number: text(payload, "phone_number"),
            preferred_call_time: text(payload, "preferred_call_time"),
            created: payload
                .get("created")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        };
        let profile: ContactProfile = [
            ("customer_name", &request.customer_name),
            ("phone_number", &request.phone_number),
            ("preferred_call_time", &request.preferred_call_time),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
        .collect();
        let profile_patch = StatePatch {
            known_contact_profile: Some(profile),
            ..Default::default()
        };
        let taken = std::mem::take(patch);
        *patch = taken.merge(profile_patch);

        patch.state_logs.push(format!(
            "create_executive_call_request processed: request_id={request_id} vehicle_id={}",
            vehicle_id.map(|v| v.to_string()).unwrap_or_else(|| "None".into())
        ));
        patch.contact_history.push(request.clone());
        patch.last_contact_request = Some(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::reducers::PROCESSED_KEYS_CAP;
    use serde_json::json;

    fn search_and_contact_state() -> ConversationState {
        ConversationState {
            messages: vec![
                Message::human("busco autos"),
                Message::tool(
                    Some("call_1".into()),
                    "search_used_vehicles",
                    json!({
                        "count": 2,
                        "filters_used": {"country_id": 5, "mileage_km_max": 100000, "bogus": 1},
                        "vehicles": [
                            {"id": 42, "make": "Volkswagen", "model": "Tiguan", "year": 2024},
                            {"id": 43, "make": "Audi", "model": "A4", "year": 2021},
                        ],
                    })
                    .to_string(),
                ),
                Message::tool(
                    Some("call_2".into()),
                    "create_executive_call_request",
                    json!({
                        "ok": true,
                        "request_id": 8,
                        "vehicle_id": 42,
                        "customer_name": "Roger",
                        "phone_number": "+56941425034",
                        "preferred_call_time": "tarde",
                    })
                    .to_string(),
                ),
            ],
            ..Default::default()
        }
    }

    /// **Scenario**: Search and contact payloads update filters, selection, profile and history.
    #[test]
    fn folds_search_and_contact_payloads() {
        let state = search_and_contact_state();
        let patch = sync_tool_results(&state);
        let next = state.with_patch(&patch);

        assert_eq!(
            serde_json::to_value(&next.active_search_filters).unwrap(),
            json!({"country_id": 5, "mileage_km_max": 100000})
        );
        assert_eq!(next.selected_vehicle_id, Some(42));
        assert_eq!(next.known_contact_profile["customer_name"], json!("Roger"));
        assert_eq!(next.known_contact_profile["phone_number"], json!("+56941425034"));
        assert_eq!(next.search_history.len(), 1);
        assert_eq!(next.search_history[0].count, 2);
        assert_eq!(next.contact_history.len(), 1);
        assert_eq!(next.last_contact_request.as_ref().map(|r| r.request_id), Some(8));
        assert!(next.last_contact_request.unwrap().created);
        assert_eq!(next.processed_tool_message_keys, vec!["call_1", "call_2"]);
    }

    /// **Scenario**: Running the synchronizer again over the same transcript changes nothing.
    #[test]
    fn second_pass_is_a_no_op() {
        let state = search_and_contact_state();
        let once = state.with_patch(&sync_tool_results(&state));
        let replay = sync_tool_results(&once);
        assert!(replay.is_empty());
        assert_eq!(once.with_patch(&replay), once);
    }

    /// **Scenario**: Malformed payloads are marked processed without other updates.
    #[test]
    fn malformed_payload_is_marked_processed() {
        let state = ConversationState {
            messages: vec![Message::tool(None, "search_used_vehicles", "not json")],
            ..Default::default()
        };
        let patch = sync_tool_results(&state);
        assert_eq!(patch.processed_tool_message_keys, vec!["tool_msg_0"]);
        assert!(patch.active_search_filters.is_none());
        assert!(patch.search_history.is_empty());
    }

    #[test]
    fn vehicle_details_select_vehicle() {
        let state = ConversationState {
            messages: vec![Message::tool(
                Some("d1".into()),
                "get_vehicle_details",
                json!({"found": true, "vehicle": {"id": 17}}).to_string(),
            )],
            ..Default::default()
        };
        assert_eq!(sync_tool_results(&state).selected_vehicle_id, Some(17));
    }

    /// **Scenario**: A later blank phone never erases the stored phone number.
    #[test]
    fn blank_profile_fields_never_erase() {
        let mut state = search_and_contact_state();
        state = state.with_patch(&sync_tool_results(&state));
        state.messages.push(Message::tool(
            Some("call_3".into()),
            "create_executive_call_request",
            json!({"ok": true, "request_id": 9, "customer_name": "Roger A.", "phone_number": ""})
                .to_string(),
        ));
        let next = state.with_patch(&sync_tool_results(&state));
        assert_eq!(next.known_contact_profile["customer_name"], json!("Roger A."));
        assert_eq!(next.known_contact_profile["phone_number"], json!("+56941425034"));
        assert_eq!(next.contact_history.len(), 2);
    }

    /// **Scenario**: An empty filters_used keeps the previously active filters.
    #[test]
    fn empty_filters_used_keeps_active_filters() {
        let state = ConversationState {
            messages: vec![Message::tool(
                Some("s".into()),
                "search_used_vehicles",
                json!({"filters_used": {}, "vehicles": []}).to_string(),
            )],
            ..Default::default()
        };
        let patch = sync_tool_results(&state);
        assert!(patch.active_search_filters.is_none());
        assert_eq!(patch.search_history[0].count, 0);
    }

    /// **Scenario**: Once more tool messages exist than the ledger holds, a later pass
    /// still folds none of them again and the newest search stays active.
    #[test]
    fn evicted_ledger_keys_are_not_folded_again() {
        let messages: Vec<Message> = (0..=PROCESSED_KEYS_CAP)
            .map(|i| {
                Message::tool(
                    Some(format!("c{i}")),
                    "search_used_vehicles",
                    json!({"count": 1, "filters_used": {"year_min": 1000 + i}, "vehicles": []})
                        .to_string(),
                )
            })
            .collect();
        let state = ConversationState {
            messages,
            ..Default::default()
        };

        let once = state.with_patch(&sync_tool_results(&state));
        assert_eq!(once.processed_tool_message_keys.len(), PROCESSED_KEYS_CAP);
        assert_eq!(once.tool_scan_watermark, PROCESSED_KEYS_CAP + 1);
        let newest = json!({"year_min": 1000 + PROCESSED_KEYS_CAP});
        assert_eq!(serde_json::to_value(&once.active_search_filters).unwrap(), newest);

        let replay = sync_tool_results(&once);
        assert!(replay.is_empty());
        let twice = once.with_patch(&replay);
        assert_eq!(serde_json::to_value(&twice.active_search_filters).unwrap(), newest);
        assert_eq!(twice.search_history, once.search_history);
        assert_eq!(
            twice.processed_tool_message_keys.last().map(String::as_str),
            Some("c2000")
        );
    }
}
