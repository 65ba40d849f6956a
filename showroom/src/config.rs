//! Typed orchestration settings read from the process environment.
//!
//! The CLI loads `.env` and the XDG `config.toml` into the environment first (see the
//! `config` crate); this module only parses the resulting variables and applies floors.

use std::str::FromStr;
use std::time::Duration;

use crate::language::sanitize_language_code;

pub const ENV_MAX_AGENT_TOOL_ITERATIONS: &str = "MAX_AGENT_TOOL_ITERATIONS";
pub const ENV_MAX_QUOTE_ITERATIONS_PER_TURN: &str = "MAX_QUOTE_ITERATIONS_PER_TURN";
pub const ENV_MAX_CONTACT_ITERATIONS_PER_TURN: &str = "MAX_CONTACT_ITERATIONS_PER_TURN";
pub const ENV_MAX_CONTEXT_MESSAGES: &str = "MAX_CONTEXT_MESSAGES";
pub const ENV_OPENAI_TIMEOUT_SECONDS: &str = "OPENAI_TIMEOUT_SECONDS";
pub const ENV_DEFAULT_CONVERSATION_LANGUAGE: &str = "DEFAULT_CONVERSATION_LANGUAGE";
pub const ENV_FINAL_SUPERVISOR_USE_LLM: &str = "FINAL_SUPERVISOR_USE_LLM";
pub const ENV_GRAPH_RECURSION_LIMIT: &str = "GRAPH_RECURSION_LIMIT";

/// Limits and switches for one orchestrator instance.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Absolute re-entry cap per agent and turn (default 8, floor 1).
    pub max_agent_tool_iterations: u32,
    /// Per-turn re-entry cap for the quote agent (default 3, floor 3).
    pub max_quote_iterations_per_turn: u32,
    /// Per-turn re-entry cap for the contact agent (default 3, floor 3).
    pub max_contact_iterations_per_turn: u32,
    /// Messages of history included in prompts (default 18, floor 4).
    pub max_context_messages: usize,
    /// Deadline for every oracle call.
    pub oracle_timeout: Duration,
    /// Sanitized fallback language code, if configured.
    pub default_language: Option<String>,
    /// Whether the final supervisor may ask the oracle to rewrite the draft.
    pub supervisor_use_oracle: bool,
    /// Maximum node steps per turn.
    pub recursion_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_agent_tool_iterations: 8,
            max_quote_iterations_per_turn: 3,
            max_contact_iterations_per_turn: 3,
            max_context_messages: 18,
            oracle_timeout: Duration::from_secs(45),
            default_language: None,
            supervisor_use_oracle: true,
            recursion_limit: 25,
        }
    }
}

impl OrchestratorConfig {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; unparsable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_agent_tool_iterations =
            setting(&lookup, ENV_MAX_AGENT_TOOL_ITERATIONS, defaults.max_agent_tool_iterations)
                .max(1);
        let max_quote_iterations_per_turn = setting(
            &lookup,
            ENV_MAX_QUOTE_ITERATIONS_PER_TURN,
            defaults.max_quote_iterations_per_turn,
        )
        .max(3);
        let max_contact_iterations_per_turn = setting(
            &lookup,
            ENV_MAX_CONTACT_ITERATIONS_PER_TURN,
            defaults.max_contact_iterations_per_turn,
        )
        .max(3);
        let max_context_messages =
            setting(&lookup, ENV_MAX_CONTEXT_MESSAGES, defaults.max_context_messages).max(4);
        let timeout_secs = setting(&lookup, ENV_OPENAI_TIMEOUT_SECONDS, 45u64).max(1);
        let recursion_limit =
            setting(&lookup, ENV_GRAPH_RECURSION_LIMIT, defaults.recursion_limit).max(6);

        let supervisor_use_oracle = lookup(ENV_FINAL_SUPERVISOR_USE_LLM)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        Self {
            max_agent_tool_iterations,
            max_quote_iterations_per_turn,
            max_contact_iterations_per_turn,
            max_context_messages,
            oracle_timeout: Duration::from_secs(timeout_secs),
            default_language: lookup(ENV_DEFAULT_CONVERSATION_LANGUAGE)
                .and_then(|v| sanitize_language_code(&v)),
            supervisor_use_oracle,
            recursion_limit,
        }
    }
}

/// Parses `key` into the field's own type; missing, invalid or out-of-range values keep
/// `default`.
fn setting<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid numeric setting, using default");
            default
        }),
        None => default,
    }
}
