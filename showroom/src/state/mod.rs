//! Conversation state: the single mutable entity threaded through the graph.
//!
//! Nodes never mutate `ConversationState` directly; they return a [`StatePatch`] that the
//! graph applies through [`ConversationUpdater`](crate::channels::ConversationUpdater),
//! which owns the per-field reducer rules.

mod patch;

pub use patch::StatePatch;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::{ConversationUpdater, StateUpdater};
use crate::message::Message;

/// Persisted search constraints: allow-listed filter key -> JSON value.
pub type SearchFilters = BTreeMap<String, Value>;

/// Known customer contact fields (`customer_name`, `phone_number`, `preferred_call_time`).
pub type ContactProfile = BTreeMap<String, Value>;

/// Specialized agent chosen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    QuoteAgent,
    ContactAgent,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::QuoteAgent => "quote_agent",
            Route::ContactAgent => "contact_agent",
        }
    }
}

/// Flow of the most recent agent turn; lets the router keep a contact exchange going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Quote,
    Contact,
}

/// Compact record of one vehicle from a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleCandidate {
    pub id: i64,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub mileage_km: Option<i64>,
    #[serde(default)]
    pub price_usd: Option<i64>,
    #[serde(default)]
    pub country_of_origin: String,
}

/// One folded search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub tool_message_key: String,
    pub filters_used: SearchFilters,
    pub count: i64,
    pub vehicle_ids: Vec<i64>,
}

/// One folded callback request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub request_id: i64,
    pub vehicle_id: Option<i64>,
    pub customer_name: String,
    pub phone_number: String,
    pub preferred_call_time: String,
    pub created: bool,
}

/// Per-turn search instructions derived from the latest human message.
///
/// Stored in state so that re-entries of the quote agent within the same turn apply the
/// same rules as the first entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeDirective {
    #[serde(default)]
    pub country_id_override: Option<i64>,
    #[serde(default)]
    pub make_override: Option<String>,
    #[serde(default)]
    pub clear_make: bool,
    #[serde(default)]
    pub country_intent_detected: bool,
    #[serde(default)]
    pub parallel_search_mode: bool,
}

impl RuntimeDirective {
    /// Make override with surrounding whitespace removed; `None` when blank.
    pub fn make_override(&self) -> Option<&str> {
        self.make_override
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    /// Country intent was detected but no catalog country could be resolved.
    pub fn country_unresolved(&self) -> bool {
        self.country_intent_detected && self.country_id_override.is_none()
    }
}

/// Conversation state for one thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub route: Option<Route>,
    pub active_flow: Option<Flow>,
    pub conversation_language: Option<String>,
    pub quote_agent_turns: u32,
    pub quote_agent_human_count: usize,
    pub contact_agent_turns: u32,
    pub contact_agent_human_count: usize,
    pub active_search_filters: SearchFilters,
    pub last_vehicle_candidates: Vec<VehicleCandidate>,
    pub selected_vehicle_id: Option<i64>,
    pub last_contact_request: Option<ContactRequest>,
    pub known_contact_profile: ContactProfile,
    pub processed_tool_message_keys: Vec<String>,
    /// Transcript length the synchronizer has already scanned. Tool messages below it are
    /// never folded again, even after their keys age out of the capped ledger.
    pub tool_scan_watermark: usize,
    pub state_logs: Vec<String>,
    pub search_history: Vec<SearchEvent>,
    pub contact_history: Vec<ContactRequest>,
    pub runtime_directive: RuntimeDirective,
}

impl ConversationState {
    /// Returns a copy of this state with `patch` applied through the standard reducers.
    ///
    /// Nodes use this to read "state + sync patch" without mutating their input.
    pub fn with_patch(&self, patch: &StatePatch) -> ConversationState {
        let mut next = self.clone();
        ConversationUpdater.apply_update(&mut next, patch);
        next
    }

    /// Last message of the transcript, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
