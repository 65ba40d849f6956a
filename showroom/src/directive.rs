//! Runtime directive inference for a new quote turn.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde_json::Value;

use crate::filters::safe_int;
use crate::message::Message;
use crate::oracle::{call_with_timeout, DecisionKind, Oracle};
use crate::prompts::quote_directive_prompt;
use crate::state::RuntimeDirective;
use crate::tools::{CatalogMetadata, CatalogProvider};

/// Asks the oracle for a directive and validates it against the catalog.
///
/// Any failure (catalog, oracle, timeout, shape) yields the empty directive.
pub async fn infer_runtime_directive(
    oracle: &dyn Oracle,
    catalog: &dyn CatalogProvider,
    latest_human_text: &str,
    timeout: Duration,
) -> RuntimeDirective {
    let text = latest_human_text.trim();
    if text.is_empty() {
        return RuntimeDirective::default();
    }
    let metadata = match catalog.metadata().await {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(error = %e, "catalog metadata unavailable; empty directive");
            return RuntimeDirective::default();
        }
    };
    if metadata.countries.is_empty() {
        return RuntimeDirective::default();
    }

    let prompt = [
        Message::system(quote_directive_prompt(&metadata.countries, &sorted_makes(&metadata))),
        Message::human(text),
    ];
    match call_with_timeout(timeout, oracle.decide(DecisionKind::QuoteDirective, &prompt)).await {
        Ok(raw) => validate_directive(&raw, &metadata),
        Err(e) => {
            tracing::warn!(error = %e, "directive inference failed; empty directive");
            RuntimeDirective::default()
        }
    }
}

fn sorted_makes(metadata: &CatalogMetadata) -> Vec<String> {
    let by_key: BTreeMap<String, String> = metadata
        .makes
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(|m| (m.to_lowercase(), m.to_string()))
        .collect();
    let mut makes: Vec<String> = by_key.into_values().collect();
    makes.sort();
    makes
}

/// Post-validates a raw directive object.
///
/// Unknown country ids are dropped, makes are normalized to their catalog spelling (or
/// dropped), parallel mode clears every other field, a make override clears `clear_make`,
/// and a country intent without an id sets it.
pub fn validate_directive(raw: &Value, metadata: &CatalogMetadata) -> RuntimeDirective {
    let Some(raw) = raw.as_object() else {
        return RuntimeDirective::default();
    };
    let flag = |key: &str| raw.get(key).and_then(Value::as_bool).unwrap_or(false);

    let valid_countries: HashSet<i64> = metadata.countries.iter().map(|c| c.id).collect();
    let makes_by_key: BTreeMap<String, String> = metadata
        .makes
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(|m| (m.to_lowercase(), m.to_string()))
        .collect();

    let mut directive = RuntimeDirective {
        country_id_override: raw
            .get("country_id_override")
            .and_then(safe_int)
            .filter(|id| valid_countries.contains(id)),
        make_override: raw
            .get("make_override")
            .and_then(Value::as_str)
            .and_then(|m| makes_by_key.get(&m.trim().to_lowercase()).cloned()),
        clear_make: flag("clear_make"),
        country_intent_detected: flag("country_intent_detected"),
        parallel_search_mode: flag("parallel_search_mode"),
    };

    if directive.parallel_search_mode {
        directive = RuntimeDirective {
            parallel_search_mode: true,
            ..Default::default()
        };
    }
    if directive.make_override.is_some() {
        directive.clear_make = false;
    }
    if directive.country_unresolved() {
        directive.clear_make = true;
    }
    directive
}
