//! Conversation message types.
//!
//! Roles: System (prompt-only, never stored in state), Human, Agent, Tool.
//! `ConversationState::messages` holds Human/Agent/Tool messages in document order; nodes
//! prepend System messages when they build a prompt for the oracle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One tool invocation proposed by an agent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id; tool results reference it as `call_id`.
    pub id: String,
    /// Tool name (e.g. `search_used_vehicles`).
    pub name: String,
    /// Arguments object.
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Prompt instruction; built per oracle call.
    System { content: String },
    /// Customer input.
    Human { content: String },
    /// Agent reply, optionally carrying a batch of tool calls.
    Agent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Tool result; `content` is the JSON payload text.
    Tool {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        name: String,
        content: String,
    },
}

/// Returns a fresh agent message id.
pub fn new_message_id() -> String {
    format!("msg-{}", uuid::Uuid::new_v4())
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Creates a human message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    /// Creates an agent message with a fresh id and no tool calls.
    pub fn agent(content: impl Into<String>) -> Self {
        Self::Agent {
            id: Some(new_message_id()),
            content: content.into(),
            tool_calls: vec![],
        }
    }

    /// Creates an agent message with an explicit id (used when replacing a draft).
    pub fn agent_with_id(id: Option<String>, content: impl Into<String>) -> Self {
        Self::Agent {
            id,
            content: content.into(),
            tool_calls: vec![],
        }
    }

    /// Creates a tool result message.
    pub fn tool(call_id: Option<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            call_id,
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human { .. })
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent { .. })
    }

    /// Text content of any variant.
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Agent { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Tool calls of an agent message; empty for other roles.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Agent { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Constructors produce the correct variant; agent messages get an id.
    #[test]
    fn constructors_produce_variants() {
        assert!(matches!(Message::system("s"), Message::System { content } if content == "s"));
        assert!(Message::human("h").is_human());
        let agent = Message::agent("a");
        assert!(agent.is_agent());
        match agent {
            Message::Agent { id, .. } => assert!(id.is_some_and(|id| id.starts_with("msg-"))),
            other => panic!("expected agent, got {:?}", other),
        }
    }

    /// **Scenario**: Serialized messages are tagged by role so persisted threads are readable.
    #[test]
    fn serializes_with_role_tag() {
        let json = serde_json::to_value(Message::tool(
            Some("call-1".into()),
            "search_used_vehicles",
            "{}",
        ))
        .unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["call_id"], "call-1");
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back.content(), "{}");
    }

    /// **Scenario**: tool_calls() is empty for non-agent roles.
    #[test]
    fn tool_calls_only_on_agent() {
        assert!(Message::human("x").tool_calls().is_empty());
        let msg = Message::Agent {
            id: None,
            content: String::new(),
            tool_calls: vec![ToolCall::new("c1", "get_vehicle_details", Map::new())],
        };
        assert_eq!(msg.tool_calls().len(), 1);
    }
}
