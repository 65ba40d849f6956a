//! Partial state update returned by nodes.

use crate::channels::reducers::merge_non_empty;
use crate::message::Message;

use super::{
    ContactProfile, ContactRequest, Flow, Route, RuntimeDirective, SearchEvent, SearchFilters,
    VehicleCandidate,
};

/// Record of optional per-field updates.
///
/// `None` / empty means "leave the field alone". List fields are appended by the reducers;
/// scalar fields replace; `known_contact_profile` is merged non-empty-overwrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub messages: Vec<Message>,
    pub route: Option<Route>,
    pub active_flow: Option<Flow>,
    pub conversation_language: Option<String>,
    pub quote_agent_turns: Option<u32>,
    pub quote_agent_human_count: Option<usize>,
    pub contact_agent_turns: Option<u32>,
    pub contact_agent_human_count: Option<usize>,
    pub active_search_filters: Option<SearchFilters>,
    pub last_vehicle_candidates: Option<Vec<VehicleCandidate>>,
    pub selected_vehicle_id: Option<i64>,
    pub last_contact_request: Option<ContactRequest>,
    pub known_contact_profile: Option<ContactProfile>,
    pub processed_tool_message_keys: Vec<String>,
    pub tool_scan_watermark: Option<usize>,
    pub state_logs: Vec<String>,
    pub search_history: Vec<SearchEvent>,
    pub contact_history: Vec<ContactRequest>,
    pub runtime_directive: Option<RuntimeDirective>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Appends one message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.conversation_language = Some(language.into());
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    /// Composes two patches: `later` wins for replace-style fields, list fields concatenate,
    /// and contact profiles merge with the non-empty rule.
    pub fn merge(mut self, later: StatePatch) -> StatePatch {
        self.messages.extend(later.messages);
        self.route = later.route.or(self.route);
        self.active_flow = later.active_flow.or(self.active_flow);
        self.conversation_language = later.conversation_language.or(self.conversation_language);
        self.quote_agent_turns = later.quote_agent_turns.or(self.quote_agent_turns);
        self.quote_agent_human_count = later
            .quote_agent_human_count
            .or(self.quote_agent_human_count);
        self.contact_agent_turns = later.contact_agent_turns.or(self.contact_agent_turns);
        self.contact_agent_human_count = later
            .contact_agent_human_count
            .or(self.contact_agent_human_count);
        self.active_search_filters = later.active_search_filters.or(self.active_search_filters);
        self.last_vehicle_candidates = later
            .last_vehicle_candidates
            .or(self.last_vehicle_candidates);
        self.selected_vehicle_id = later.selected_vehicle_id.or(self.selected_vehicle_id);
        self.last_contact_request = later.last_contact_request.or(self.last_contact_request);
        self.known_contact_profile = match (self.known_contact_profile, later.known_contact_profile)
        {
            (Some(current), Some(new)) => Some(merge_non_empty(&current, &new)),
            (current, new) => new.or(current),
        };
        self.processed_tool_message_keys
            .extend(later.processed_tool_message_keys);
        self.tool_scan_watermark = self.tool_scan_watermark.max(later.tool_scan_watermark);
        self.state_logs.extend(later.state_logs);
        self.search_history.extend(later.search_history);
        self.contact_history.extend(later.contact_history);
        self.runtime_directive = later.runtime_directive.or(self.runtime_directive);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// **Scenario**: Later replace-style values win; lists concatenate in order.
    #[test]
    fn merge_later_wins_and_lists_concatenate() {
        let first = StatePatch {
            route: Some(Route::QuoteAgent),
            selected_vehicle_id: Some(1),
            state_logs: vec!["a".into()],
            ..Default::default()
        };
        let second = StatePatch {
            route: Some(Route::ContactAgent),
            state_logs: vec!["b".into()],
            ..Default::default()
        };
        let merged = first.merge(second);
        assert_eq!(merged.route, Some(Route::ContactAgent));
        assert_eq!(merged.selected_vehicle_id, Some(1));
        assert_eq!(merged.state_logs, vec!["a".to_string(), "b".to_string()]);
    }

    /// **Scenario**: Composing profiles never blanks a known field.
    #[test]
    fn merge_profiles_keeps_non_empty_values() {
        let first = StatePatch {
            known_contact_profile: Some(
                [("customer_name".to_string(), json!("Ana"))].into_iter().collect(),
            ),
            ..Default::default()
        };
        let second = StatePatch {
            known_contact_profile: Some(
                [("customer_name".to_string(), json!("  "))].into_iter().collect(),
            ),
            ..Default::default()
        };
        let merged = first.merge(second);
        assert_eq!(
            merged.known_contact_profile.unwrap()["customer_name"],
            json!("Ana")
        );
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(StatePatch::new().is_empty());
        assert!(!StatePatch::new().with_language("es").is_empty());
    }
}
