//! Final supervisor node: turns the agent draft into the customer-facing reply.

use async_trait::async_trait;

use super::context::{resolve_language, synchronized_view};
use super::NodeContext;
use crate::error::AgentError;
use crate::graph::{GraphNode, Node};
use crate::message::Message;
use crate::oracle::{call_with_timeout, Oracle};
use crate::prompts::FINAL_RESPONSE_SYSTEM_PROMPT;
use crate::state::{ConversationState, StatePatch};
use crate::supervisor::sanitize_final_text;
use crate::transcript::latest_human_text;

/// Rewrites (optionally through the oracle) and sanitizes the last agent draft.
///
/// A changed reply replaces the draft in place by reusing its message id.
#[derive(Debug, Clone)]
pub struct FinalSupervisorNode {
    ctx: NodeContext,
}

impl FinalSupervisorNode {
    pub fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    async fn rewrite(
        &self,
        oracle: &dyn Oracle,
        view: &ConversationState,
        language: &str,
        draft: &str,
    ) -> String {
        let mut prompt = vec![
            Message::system(FINAL_RESPONSE_SYSTEM_PROMPT),
            Message::system(format!(
                "Conversation language code is `{language}`. \
                 Write the final customer answer in that same language."
            )),
        ];
        let request = latest_human_text(&view.messages).trim();
        if !request.is_empty() {
            prompt.push(Message::system(format!(
                "Latest user request that must be respected exactly:\n{request}"
            )));
        }
        if !view.active_search_filters.is_empty() {
            prompt.push(Message::system(format!(
                "Active search filters used by the system (internal reference only):\n{}",
                serde_json::to_string(&view.active_search_filters).unwrap_or_default()
            )));
        }
        prompt.push(Message::human(draft));

        match call_with_timeout(self.ctx.config.oracle_timeout, oracle.respond(&prompt, &[])).await
        {
            Ok(reply) if !reply.content.trim().is_empty() => reply.content.trim().to_string(),
            Ok(_) => draft.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "final rewrite failed; keeping draft");
                draft.to_string()
            }
        }
    }
}

#[async_trait]
impl Node for FinalSupervisorNode {
    fn id(&self) -> GraphNode {
        GraphNode::FinalSupervisor
    }

    async fn run(&self, state: &ConversationState) -> Result<StatePatch, AgentError> {
        let (sync, view) = synchronized_view(state);
        let language = resolve_language(&self.ctx, &view).await;
        let patch = sync.merge(StatePatch::new().with_language(language.clone()));

        let (draft_id, draft) = match view.last_message() {
            Some(Message::Agent { id, content, .. }) if !content.trim().is_empty() => {
                (id.clone(), content.trim().to_string())
            }
            _ => return Ok(patch),
        };

        let revised = match &self.ctx.oracle {
            Some(oracle) if self.ctx.config.supervisor_use_oracle => {
                self.rewrite(oracle.as_ref(), &view, &language, &draft).await
            }
            _ => draft.clone(),
        };
        let mut final_text = sanitize_final_text(&revised);
        if final_text.is_empty() {
            final_text = sanitize_final_text(&draft);
        }
        if final_text.is_empty() || final_text == draft {
            return Ok(patch);
        }
        tracing::debug!(draft_len = draft.len(), final_len = final_text.len(), "draft rewritten");
        Ok(patch.with_message(Message::agent_with_id(draft_id, final_text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::oracle::{AgentReply, DecisionKind, ScriptedOracle};
    use crate::tools::InMemoryInventory;
    use serde_json::json;
    use std::sync::Arc;

    fn node(oracle: Option<Arc<ScriptedOracle>>, use_oracle: bool) -> FinalSupervisorNode {
        let inventory = Arc::new(InMemoryInventory::demo().unwrap());
        FinalSupervisorNode::new(NodeContext::new(
            oracle.map(|o| o as Arc<dyn Oracle>),
            inventory.clone(),
            inventory,
            OrchestratorConfig {
                supervisor_use_oracle: use_oracle,
                ..Default::default()
            },
        ))
    }

    fn drafted(draft: &str) -> ConversationState {
        ConversationState {
            messages: vec![
                Message::human("busco un Audi"),
                Message::agent_with_id(Some("draft-1".into()), draft),
            ],
            conversation_language: Some("es".into()),
            ..Default::default()
        }
    }

    /// **Scenario**: The sanitized draft replaces the original under the same id.
    #[tokio::test]
    async fn sanitized_draft_reuses_id() {
        let state = drafted("ID: 53\n- **Audi A4** 2021 por $16,077.");
        let patch = node(None, false).run(&state).await.unwrap();
        assert_eq!(patch.messages.len(), 1);
        match &patch.messages[0] {
            Message::Agent { id, content, .. } => {
                assert_eq!(id.as_deref(), Some("draft-1"));
                assert_eq!(content, "Audi A4 2021 por $16,077.");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(patch.conversation_language.as_deref(), Some("es"));
    }

    #[tokio::test]
    async fn clean_draft_is_left_alone() {
        let patch = node(None, true)
            .run(&drafted("Tengo un Audi A4 2021 disponible."))
            .await
            .unwrap();
        assert!(patch.messages.is_empty());
    }

    /// **Scenario**: The oracle rewrite sees the latest request and the active filters.
    #[tokio::test]
    async fn oracle_rewrite_is_sanitized() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_decision(DecisionKind::Language, json!({"conversation_language": "es"}))
                .with_reply(AgentReply::text("Encontré un **Audi A4** 2021 (ID: 53).")),
        );
        let mut state = drafted("borrador");
        state.active_search_filters.insert("make".into(), json!("Audi"));
        let patch = node(Some(oracle.clone()), true).run(&state).await.unwrap();
        assert_eq!(patch.messages[0].content(), "Encontré un Audi A4 2021.");

        let respond = oracle.calls().into_iter().find(|c| c.kind == "respond").unwrap();
        assert!(respond.tool_names.is_empty());
        assert_eq!(
            respond.messages[2].content(),
            "Latest user request that must be respected exactly:\nbusco un Audi"
        );
        assert!(respond.messages[3].content().ends_with(r#"{"make":"Audi"}"#));
        assert_eq!(respond.messages.last().unwrap().content(), "borrador");
    }

    /// **Scenario**: A failed rewrite keeps the draft.
    #[tokio::test]
    async fn failed_rewrite_keeps_draft() {
        let oracle = Arc::new(ScriptedOracle::new().with_failed_reply());
        let patch = node(Some(oracle), true)
            .run(&drafted("Tengo un Audi A4."))
            .await
            .unwrap();
        assert!(patch.messages.is_empty());
    }

    #[tokio::test]
    async fn non_agent_last_message_is_skipped() {
        let state = ConversationState {
            messages: vec![Message::human("hola")],
            ..Default::default()
        };
        let patch = node(None, true).run(&state).await.unwrap();
        assert!(patch.messages.is_empty());
        assert_eq!(patch.conversation_language.as_deref(), Some("und"));
    }
}
