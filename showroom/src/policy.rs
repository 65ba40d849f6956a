//! Tool-call policy for the quote agent.
//!
//! Rewrites a proposed batch of tool calls against the persisted filters and the turn's
//! runtime directive before anything executes.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::filters::{canonical_filters_key, sanitize_filters, DEFAULT_SEARCH_LIMIT};
use crate::language::is_spanish;
use crate::message::{Message, ToolCall};
use crate::state::{RuntimeDirective, SearchFilters};
use crate::tools::{LIST_AVAILABLE_VEHICLE_FILTERS, SEARCH_USED_VEHICLES};

/// Maximum catalog countries listed in a clarification.
const MAX_COUNTRY_OPTIONS: usize = 12;

/// Inputs besides the proposed message.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    pub active_filters: &'a SearchFilters,
    pub directive: &'a RuntimeDirective,
    pub language: &'a str,
    pub catalog_lookup_in_current_turn: bool,
    pub country_names: &'a [String],
}

/// Applies catalog gating, the country clarification block, filter merging and dedup.
pub fn enforce_quote_tool_policy(proposed: Message, ctx: PolicyContext<'_>) -> Message {
    let (id, content, tool_calls) = match proposed {
        Message::Agent {
            id,
            content,
            tool_calls,
        } => (id, content, tool_calls),
        other => return other,
    };
    if tool_calls.is_empty() {
        return Message::Agent {
            id,
            content,
            tool_calls,
        };
    }

    let search_calls = tool_calls
        .iter()
        .filter(|call| call.name == SEARCH_USED_VEHICLES)
        .count();
    let parallel = ctx.directive.parallel_search_mode || search_calls > 1;

    if search_calls > 0 && !ctx.catalog_lookup_in_current_turn {
        let base = tool_calls
            .iter()
            .find(|call| call.name == SEARCH_USED_VEHICLES)
            .map(|call| call.id.trim())
            .filter(|call_id| !call_id.is_empty())
            .unwrap_or("call_search");
        tracing::debug!(
            search_calls,
            "search proposed before catalog lookup; replacing batch"
        );
        return Message::Agent {
            id,
            content: String::new(),
            tool_calls: vec![ToolCall::new(
                format!("{base}_catalog"),
                LIST_AVAILABLE_VEHICLE_FILTERS,
                Map::new(),
            )],
        };
    }

    if search_calls > 0 && ctx.directive.country_unresolved() && !parallel {
        tracing::debug!("country requested but unresolved; asking for clarification");
        return Message::Agent {
            id,
            content: country_clarification(ctx.language, ctx.country_names),
            tool_calls: Vec::new(),
        };
    }

    let mut seen = HashSet::new();
    let mut enforced = Vec::with_capacity(tool_calls.len());
    for call in tool_calls {
        if call.name != SEARCH_USED_VEHICLES {
            enforced.push(call);
            continue;
        }
        let args = merged_search_args(&call.args, ctx, parallel);
        if !seen.insert(canonical_filters_key(&args)) {
            tracing::debug!(call_id = %call.id, "dropping duplicate search call");
            continue;
        }
        enforced.push(ToolCall::new(call.id, call.name, args.into_iter().collect()));
    }

    Message::Agent {
        id,
        content,
        tool_calls: enforced,
    }
}

fn merged_search_args(
    own: &Map<String, Value>,
    ctx: PolicyContext<'_>,
    parallel: bool,
) -> SearchFilters {
    let own = sanitize_filters(own);
    let mut args = if parallel {
        own
    } else {
        let mut merged = sanitize_filters(ctx.active_filters);
        merged.extend(own);
        let directive = ctx.directive;
        if let Some(country_id) = directive.country_id_override {
            merged.insert("country_id".into(), Value::from(country_id));
        } else if directive.country_intent_detected {
            merged.remove("country_id");
        }
        if directive.clear_make {
            merged.remove("make");
        }
        if let Some(make) = directive.make_override() {
            merged.insert("make".into(), Value::from(make));
        }
        merged
    };
    args.entry("limit".into())
        .or_insert_with(|| Value::from(DEFAULT_SEARCH_LIMIT));
    args
}

fn country_clarification(language: &str, country_names: &[String]) -> String {
    let options = country_names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .take(MAX_COUNTRY_OPTIONS)
        .collect::<Vec<_>>()
        .join(", ");
    let (lead, available) = if is_spanish(language) {
        (
            "Para buscar por país/origen necesito que confirmes el país exacto del catálogo.",
            "Países disponibles",
        )
    } else {
        (
            "To search by country/origin I need you to confirm the exact catalog country.",
            "Available countries",
        )
    };
    if options.is_empty() {
        lead.to_string()
    } else {
        format!("{lead} {available}: {options}.")
    }
}
