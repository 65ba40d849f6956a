//! Helpers shared by the nodes: synchronized view, persisted context block, language.

use crate::language::{choose_language, sanitize_language_code};
use crate::message::Message;
use crate::oracle::{call_with_timeout, DecisionKind};
use crate::prompts::LANGUAGE_SYSTEM_PROMPT;
use crate::state::{ConversationState, StatePatch};
use crate::synchronizer::sync_tool_results;
use crate::transcript::{latest_human_text, trim_history};

use super::NodeContext;

/// Runs the synchronizer and returns its patch together with `state + patch`.
pub fn synchronized_view(state: &ConversationState) -> (StatePatch, ConversationState) {
    let sync = sync_tool_results(state);
    let view = state.with_patch(&sync);
    (sync, view)
}

/// Persisted memory rendered for prompts; empty when nothing is known.
pub fn render_context_block(state: &ConversationState) -> String {
    let mut lines: Vec<String> = Vec::new();
    if let Some(language) = state
        .conversation_language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        lines.push(format!("conversation_language={}", language.to_lowercase()));
    }
    if !state.active_search_filters.is_empty() {
        lines.push("Persisted active filters:".into());
        lines.push(serde_json::to_string(&state.active_search_filters).unwrap_or_default());
    }
    if !state.last_vehicle_candidates.is_empty() {
        let recent: Vec<_> = state.last_vehicle_candidates.iter().take(5).collect();
        lines.push("Recent vehicles in context:".into());
        lines.push(serde_json::to_string(&recent).unwrap_or_default());
    }
    if let Some(id) = state.selected_vehicle_id {
        lines.push(format!("selected_vehicle_id={id}"));
    }
    if !state.known_contact_profile.is_empty() {
        lines.push("Persisted contact profile:".into());
        lines.push(serde_json::to_string(&state.known_contact_profile).unwrap_or_default());
    }
    lines.join("\n").trim().to_string()
}

/// Resolves the conversation language: oracle inference, then stored, then default, then `und`.
pub async fn resolve_language(ctx: &NodeContext, state: &ConversationState) -> String {
    let existing = state
        .conversation_language
        .as_deref()
        .and_then(sanitize_language_code);
    let inferred = match &ctx.oracle {
        Some(oracle) if !latest_human_text(&state.messages).trim().is_empty() => {
            let mut prompt = vec![
                Message::system(LANGUAGE_SYSTEM_PROMPT),
                Message::system(format!(
                    "current_language={}",
                    existing.as_deref().unwrap_or("null")
                )),
            ];
            prompt.extend(trim_history(
                &state.messages,
                ctx.config.max_context_messages,
            ));
            match call_with_timeout(
                ctx.config.oracle_timeout,
                oracle.decide(DecisionKind::Language, &prompt),
            )
            .await
            {
                Ok(decision) => decision
                    .get("conversation_language")
                    .and_then(|v| v.as_str())
                    .and_then(sanitize_language_code),
                Err(e) => {
                    tracing::warn!(error = %e, "language inference failed; keeping stored language");
                    None
                }
            }
        }
        _ => None,
    };
    choose_language(
        inferred.as_deref(),
        existing.as_deref(),
        ctx.config.default_language.as_deref(),
    )
}
