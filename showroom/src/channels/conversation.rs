use crate::state::{ConversationState, StatePatch};

use super::reducers::{
    append_unique, append_with_cap, merge_messages, merge_non_empty, HISTORY_CAP,
    PROCESSED_KEYS_CAP, STATE_LOG_CAP,
};
use super::StateUpdater;

/// Applies a [`StatePatch`] to a [`ConversationState`] field by field.
///
/// Order is fixed: messages, routing scalars, counters, filters and candidates, contact
/// fields, ledger, logs and histories, runtime directive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationUpdater;

impl StateUpdater<ConversationState, StatePatch> for ConversationUpdater {
    fn apply_update(&self, current: &mut ConversationState, update: &StatePatch) {
        merge_messages(&mut current.messages, &update.messages);

        if let Some(route) = update.route {
            current.route = Some(route);
        }
        if let Some(flow) = update.active_flow {
            current.active_flow = Some(flow);
        }
        if let Some(language) = &update.conversation_language {
            current.conversation_language = Some(language.clone());
        }

        if let Some(turns) = update.quote_agent_turns {
            current.quote_agent_turns = turns;
        }
        if let Some(count) = update.quote_agent_human_count {
            current.quote_agent_human_count = count;
        }
        if let Some(turns) = update.contact_agent_turns {
            current.contact_agent_turns = turns;
        }
        if let Some(count) = update.contact_agent_human_count {
            current.contact_agent_human_count = count;
        }

        if let Some(filters) = &update.active_search_filters {
            current.active_search_filters = filters.clone();
        }
        if let Some(candidates) = &update.last_vehicle_candidates {
            current.last_vehicle_candidates = candidates.clone();
        }
        if let Some(vehicle_id) = update.selected_vehicle_id {
            current.selected_vehicle_id = Some(vehicle_id);
        }
        if let Some(request) = &update.last_contact_request {
            current.last_contact_request = Some(request.clone());
        }
        if let Some(profile) = &update.known_contact_profile {
            current.known_contact_profile = merge_non_empty(&current.known_contact_profile, profile);
        }

        append_unique(
            &mut current.processed_tool_message_keys,
            &update.processed_tool_message_keys,
            PROCESSED_KEYS_CAP,
        );
        if let Some(mark) = update.tool_scan_watermark {
            current.tool_scan_watermark = current.tool_scan_watermark.max(mark);
        }
        append_with_cap(&mut current.state_logs, &update.state_logs, STATE_LOG_CAP);
        append_with_cap(&mut current.search_history, &update.search_history, HISTORY_CAP);
        append_with_cap(&mut current.contact_history, &update.contact_history, HISTORY_CAP);

        if let Some(directive) = &update.runtime_directive {
            current.runtime_directive = directive.clone();
        }
    }
}
