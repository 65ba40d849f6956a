//! Oracle: the language-model collaborator.
//!
//! Nodes depend on [`Oracle`] instead of a concrete client. Every call goes through
//! [`call_with_timeout`]; callers convert any [`OracleError`] into their documented fallback.

mod chat_completions;
mod scripted;

pub use chat_completions::ChatCompletionsOracle;
pub use scripted::{RecordedCall, ScriptedOracle};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::message::{new_message_id, Message, ToolCall};
use crate::tools::ToolSpec;

/// Structured decisions the oracle can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// `{"route": "quote_agent" | "contact_agent"}`
    Route,
    /// `{"conversation_language": "<code>"}`
    Language,
    /// `{"country_id_override", "make_override", "clear_make", "country_intent_detected",
    /// "parallel_search_mode"}`
    QuoteDirective,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Route => "route",
            DecisionKind::Language => "language",
            DecisionKind::QuoteDirective => "quote_directive",
        }
    }

    /// JSON Schema the decision object must conform to.
    pub fn schema(&self) -> Value {
        match self {
            DecisionKind::Route => serde_json::json!({
                "type": "object",
                "properties": {
                    "route": { "type": "string", "enum": ["quote_agent", "contact_agent"] }
                },
                "required": ["route"]
            }),
            DecisionKind::Language => serde_json::json!({
                "type": "object",
                "properties": { "conversation_language": { "type": "string" } },
                "required": ["conversation_language"]
            }),
            DecisionKind::QuoteDirective => serde_json::json!({
                "type": "object",
                "properties": {
                    "country_id_override": { "type": ["integer", "null"] },
                    "make_override": { "type": ["string", "null"] },
                    "clear_make": { "type": "boolean" },
                    "country_intent_detected": { "type": "boolean" },
                    "parallel_search_mode": { "type": "boolean" }
                }
            }),
        }
    }
}

/// Free-form agent reply: text plus an optional batch of tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AgentReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Agent message carrying this reply under a fresh id.
    pub fn into_message(self) -> Message {
        Message::Agent {
            id: Some(new_message_id()),
            content: self.content,
            tool_calls: self.tool_calls,
        }
    }
}

/// Oracle failures. Never surfaced to the customer; each maps to a fallback.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),
    #[error("oracle transport: {0}")]
    Transport(String),
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// Language-model oracle.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Returns a JSON object conforming to `kind.schema()`.
    async fn decide(&self, kind: DecisionKind, messages: &[Message]) -> Result<Value, OracleError>;

    /// Returns a reply, optionally with tool calls drawn from `tools`.
    async fn respond(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AgentReply, OracleError>;
}

/// Awaits `call` with a deadline.
pub async fn call_with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, OracleError>
where
    F: Future<Output = Result<T, OracleError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_is_reported() {
        let result: Result<(), OracleError> = call_with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(OracleError::Timeout(_))));
    }

    #[tokio::test]
    async fn completed_call_passes_through() {
        let result = call_with_timeout(Duration::from_secs(1), async { Ok::<_, OracleError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn reply_into_message_keeps_tool_calls() {
        let reply = AgentReply {
            content: String::new(),
            tool_calls: vec![ToolCall::new("c1", "search_used_vehicles", Default::default())],
        };
        let message = reply.into_message();
        assert!(message.is_agent());
        assert_eq!(message.tool_calls().len(), 1);
    }

    #[test]
    fn route_schema_lists_both_agents() {
        let schema = DecisionKind::Route.schema();
        assert_eq!(schema["properties"]["route"]["enum"][1], "contact_agent");
    }
}
