//! Tools node: executes the tool calls of the latest agent message.
//!
//! Every call yields exactly one tool message carrying the call id. Tool errors and
//! disallowed tools become `{"ok": false, "error": ...}` payloads; they never abort the turn.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use crate::error::AgentError;
use crate::graph::{GraphNode, Node};
use crate::message::{Message, ToolCall};
use crate::state::{ConversationState, StatePatch};
use crate::tools::{ToolExecutor, CONTACT_TOOL_NAMES, QUOTE_TOOL_NAMES};

fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}

/// Executes one agent's tool batch against its allowed tool set.
#[derive(Clone)]
pub struct ToolsNode {
    id: GraphNode,
    allowed: HashSet<&'static str>,
    executor: Arc<dyn ToolExecutor>,
}

impl std::fmt::Debug for ToolsNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsNode")
            .field("id", &self.id)
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}

impl ToolsNode {
    /// Tools node for the quote agent.
    pub fn quote(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            id: GraphNode::QuoteTools,
            allowed: QUOTE_TOOL_NAMES.into_iter().collect(),
            executor,
        }
    }

    /// Tools node for the contact agent.
    pub fn contact(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            id: GraphNode::ContactTools,
            allowed: CONTACT_TOOL_NAMES.into_iter().collect(),
            executor,
        }
    }

    async fn call(&self, call: &ToolCall) -> Message {
        let payload = if !self.allowed.contains(call.name.as_str()) {
            warn!(tool = %call.name, node = %self.id, "tool not available to this agent");
            json!({
                "ok": false,
                "error": format!("Tool {} is not available to this agent.", call.name),
            })
        } else {
            debug!(tool = %call.name, args = ?call.args, "Calling tool");
            match self
                .executor
                .execute(&call.name, Value::Object(call.args.clone()))
                .await
            {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool call failed");
                    json!({ "ok": false, "error": e.to_string() })
                }
            }
        };
        let content = payload.to_string();
        trace!(
            tool = %call.name,
            result_len = content.len(),
            result_preview = %truncate_for_log(&content, 200),
            "Tool returned"
        );
        Message::tool(Some(call.id.clone()), call.name.clone(), content)
    }
}

#[async_trait]
impl Node for ToolsNode {
    fn id(&self) -> GraphNode {
        self.id
    }

    async fn run(&self, state: &ConversationState) -> Result<StatePatch, AgentError> {
        let calls = match state.last_message() {
            Some(Message::Agent { tool_calls, .. }) => tool_calls.as_slice(),
            _ => &[],
        };
        let results = join_all(calls.iter().map(|call| self.call(call))).await;
        Ok(StatePatch {
            messages: results,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{
        InMemoryInventory, CREATE_EXECUTIVE_CALL_REQUEST, GET_VEHICLE_DETAILS,
        SEARCH_USED_VEHICLES,
    };
    use crate::transcript::parse_payload;
    use serde_json::Map;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn state_with_calls(calls: Vec<ToolCall>) -> ConversationState {
        ConversationState {
            messages: vec![
                Message::human("hola"),
                Message::Agent {
                    id: Some("a1".into()),
                    content: String::new(),
                    tool_calls: calls,
                },
            ],
            ..Default::default()
        }
    }

    fn inventory() -> Arc<dyn ToolExecutor> {
        Arc::new(InMemoryInventory::demo().unwrap())
    }

    /// **Scenario**: Results come back one per call, in call order, with their call ids.
    #[tokio::test]
    async fn results_follow_call_order() {
        let state = state_with_calls(vec![
            ToolCall::new("c1", GET_VEHICLE_DETAILS, args(json!({"vehicle_id": 1}))),
            ToolCall::new("c2", SEARCH_USED_VEHICLES, args(json!({"make": "Audi"}))),
        ]);
        let patch = ToolsNode::quote(inventory()).run(&state).await.unwrap();
        assert_eq!(patch.messages.len(), 2);
        let ids: Vec<_> = patch
            .messages
            .iter()
            .map(|m| match m {
                Message::Tool { call_id, .. } => call_id.clone().unwrap(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);
        let details = parse_payload(patch.messages[0].content()).unwrap();
        assert_eq!(details["found"], json!(true));
    }

    /// **Scenario**: The quote tools node refuses the contact-only tool.
    #[tokio::test]
    async fn disallowed_tool_yields_error_payload() {
        let state = state_with_calls(vec![ToolCall::new(
            "c1",
            CREATE_EXECUTIVE_CALL_REQUEST,
            Map::new(),
        )]);
        let patch = ToolsNode::quote(inventory()).run(&state).await.unwrap();
        let payload = parse_payload(patch.messages[0].content()).unwrap();
        assert_eq!(payload["ok"], json!(false));
        assert_eq!(
            payload["error"],
            json!("Tool create_executive_call_request is not available to this agent.")
        );
    }

    /// **Scenario**: Executor errors are reported in the payload instead of failing the turn.
    #[tokio::test]
    async fn executor_error_becomes_payload() {
        let state = state_with_calls(vec![ToolCall::new(
            "c1",
            SEARCH_USED_VEHICLES,
            args(json!({"year_min": "recent"})),
        )]);
        let patch = ToolsNode::quote(inventory()).run(&state).await.unwrap();
        let payload = parse_payload(patch.messages[0].content()).unwrap();
        assert_eq!(payload["ok"], json!(false));
        assert!(payload["error"].as_str().unwrap().contains("year_min"));
    }

    #[tokio::test]
    async fn no_calls_no_messages() {
        let state = ConversationState {
            messages: vec![Message::human("hola")],
            ..Default::default()
        };
        let patch = ToolsNode::contact(inventory()).run(&state).await.unwrap();
        assert!(patch.is_empty());
    }
}
