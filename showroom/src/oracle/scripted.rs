//! Deterministic oracle for tests and offline runs.
//!
//! Decisions are queued per [`DecisionKind`] and replies in one queue; an exhausted queue
//! answers with `OracleError::Unavailable`, which exercises the caller's fallback.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{AgentReply, DecisionKind, Oracle, OracleError};
use crate::message::Message;
use crate::tools::ToolSpec;

/// One recorded oracle call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// `"respond"` or the decision kind name.
    pub kind: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

#[derive(Debug, Default)]
struct Script {
    decisions: HashMap<&'static str, VecDeque<Result<Value, String>>>,
    replies: VecDeque<Result<AgentReply, String>>,
    calls: Vec<RecordedCall>,
}

/// Oracle that replays queued answers in order.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<Script>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        if let Ok(mut script) = self.script.lock() {
            f(&mut script);
        }
        self
    }

    /// Queues a decision answer for `kind`.
    pub fn with_decision(self, kind: DecisionKind, value: Value) -> Self {
        self.edit(|s| {
            s.decisions
                .entry(kind.as_str())
                .or_default()
                .push_back(Ok(value))
        })
    }

    /// Queues a failing decision for `kind`.
    pub fn with_failed_decision(self, kind: DecisionKind) -> Self {
        self.edit(|s| {
            s.decisions
                .entry(kind.as_str())
                .or_default()
                .push_back(Err(format!("scripted {} failure", kind.as_str())))
        })
    }

    /// Queues an agent reply.
    pub fn with_reply(self, reply: AgentReply) -> Self {
        self.edit(|s| s.replies.push_back(Ok(reply)))
    }

    /// Queues a failing agent reply.
    pub fn with_failed_reply(self) -> Self {
        self.edit(|s| s.replies.push_back(Err("scripted reply failure".into())))
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Replies not yet consumed.
    pub fn pending_replies(&self) -> usize {
        self.script.lock().map(|s| s.replies.len()).unwrap_or(0)
    }
}

fn poisoned() -> OracleError {
    OracleError::Unavailable("scripted oracle lock poisoned".into())
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn decide(&self, kind: DecisionKind, messages: &[Message]) -> Result<Value, OracleError> {
        let mut script = self.script.lock().map_err(|_| poisoned())?;
        script.calls.push(RecordedCall {
            kind: kind.as_str().to_string(),
            messages: messages.to_vec(),
            tool_names: Vec::new(),
        });
        match script
            .decisions
            .get_mut(kind.as_str())
            .and_then(VecDeque::pop_front)
        {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(OracleError::InvalidResponse(reason)),
            None => Err(OracleError::Unavailable(format!(
                "no scripted {} decision",
                kind.as_str()
            ))),
        }
    }

    async fn respond(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AgentReply, OracleError> {
        let mut script = self.script.lock().map_err(|_| poisoned())?;
        script.calls.push(RecordedCall {
            kind: "respond".into(),
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });
        match script.replies.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(OracleError::Transport(reason)),
            None => Err(OracleError::Unavailable("no scripted reply".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// **Scenario**: Queued answers replay in order, then the oracle reports unavailable.
    #[tokio::test]
    async fn replays_then_exhausts() {
        let oracle = ScriptedOracle::new()
            .with_decision(DecisionKind::Route, json!({"route": "contact_agent"}))
            .with_reply(AgentReply::text("hola"));
        let route = oracle.decide(DecisionKind::Route, &[]).await.unwrap();
        assert_eq!(route["route"], "contact_agent");
        assert!(oracle.decide(DecisionKind::Route, &[]).await.is_err());
        assert!(oracle.decide(DecisionKind::Language, &[]).await.is_err());

        let reply = oracle.respond(&[Message::human("x")], &[]).await.unwrap();
        assert_eq!(reply.content, "hola");
        assert!(matches!(
            oracle.respond(&[], &[]).await,
            Err(OracleError::Unavailable(_))
        ));
        assert_eq!(oracle.calls().len(), 5);
        assert_eq!(oracle.pending_replies(), 0);
    }

    #[tokio::test]
    async fn failures_are_scripted() {
        let oracle = ScriptedOracle::new()
            .with_failed_decision(DecisionKind::Language)
            .with_failed_reply();
        assert!(matches!(
            oracle.decide(DecisionKind::Language, &[]).await,
            Err(OracleError::InvalidResponse(_))
        ));
        assert!(matches!(
            oracle.respond(&[], &[]).await,
            Err(OracleError::Transport(_))
        ));
    }
}
