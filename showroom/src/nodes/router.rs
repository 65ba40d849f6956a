//! Router node: picks the agent for this turn.

use async_trait::async_trait;
use serde_json::Value;

use super::context::{render_context_block, resolve_language, synchronized_view};
use super::NodeContext;
use crate::error::AgentError;
use crate::graph::{GraphNode, Node};
use crate::message::Message;
use crate::oracle::{call_with_timeout, DecisionKind, Oracle};
use crate::prompts::ROUTER_SYSTEM_PROMPT;
use crate::state::{ConversationState, Flow, Route, StatePatch};
use crate::transcript::trim_history;

/// Routes to `quote_agent` or `contact_agent`; any oracle failure routes to `quote_agent`.
#[derive(Debug, Clone)]
pub struct RouterNode {
    ctx: NodeContext,
}

impl RouterNode {
    pub fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    async fn decide_route(
        &self,
        oracle: &dyn Oracle,
        view: &ConversationState,
        language: &str,
    ) -> Route {
        let mut prompt = vec![Message::system(ROUTER_SYSTEM_PROMPT)];
        if view.active_flow == Some(Flow::Contact) {
            prompt.push(Message::system(
                "Conversation state: previous active flow is `contact`. \
                 If the latest user message naturally continues that flow, keep `contact_agent`.",
            ));
        }
        prompt.push(Message::system(format!(
            "Conversation language code is `{language}`."
        )));
        let context = render_context_block(view);
        if !context.is_empty() {
            prompt.push(Message::system(format!(
                "Persisted thread context:\n{context}"
            )));
        }
        prompt.extend(trim_history(
            &view.messages,
            self.ctx.config.max_context_messages,
        ));

        let decision = call_with_timeout(
            self.ctx.config.oracle_timeout,
            oracle.decide(DecisionKind::Route, &prompt),
        )
        .await;
        match decision {
            Ok(value) => match value.get("route").and_then(Value::as_str) {
                Some("contact_agent") => Route::ContactAgent,
                Some("quote_agent") => Route::QuoteAgent,
                other => {
                    tracing::warn!(route = ?other, "unknown route decision; using quote_agent");
                    Route::QuoteAgent
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "route decision failed; using quote_agent");
                Route::QuoteAgent
            }
        }
    }
}

#[async_trait]
impl Node for RouterNode {
    fn id(&self) -> GraphNode {
        GraphNode::Router
    }

    async fn run(&self, state: &ConversationState) -> Result<StatePatch, AgentError> {
        let (sync, view) = synchronized_view(state);
        let language = resolve_language(&self.ctx, &view).await;
        let route = match &self.ctx.oracle {
            Some(oracle) => self.decide_route(oracle.as_ref(), &view, &language).await,
            None => Route::QuoteAgent,
        };
        tracing::debug!(route = route.as_str(), language = %language, "route selected");
        Ok(sync.merge(StatePatch::new().with_route(route).with_language(language)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::oracle::ScriptedOracle;
    use crate::tools::InMemoryInventory;
    use serde_json::json;
    use std::sync::Arc;

    fn node(oracle: Option<Arc<ScriptedOracle>>) -> RouterNode {
        let inventory = Arc::new(InMemoryInventory::demo().unwrap());
        RouterNode::new(NodeContext::new(
            oracle.map(|o| o as Arc<dyn Oracle>),
            inventory.clone(),
            inventory,
            OrchestratorConfig::default(),
        ))
    }

    fn state(text: &str) -> ConversationState {
        ConversationState {
            messages: vec![Message::human(text)],
            conversation_language: Some("es".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn no_oracle_routes_to_quote() {
        let patch = node(None).run(&state("hola")).await.unwrap();
        assert_eq!(patch.route, Some(Route::QuoteAgent));
        assert_eq!(patch.conversation_language.as_deref(), Some("es"));
    }

    /// **Scenario**: A failing oracle falls back to the quote agent.
    #[tokio::test]
    async fn oracle_failure_routes_to_quote() {
        let oracle = Arc::new(ScriptedOracle::new().with_failed_decision(DecisionKind::Route));
        let patch = node(Some(oracle)).run(&state("llámenme")).await.unwrap();
        assert_eq!(patch.route, Some(Route::QuoteAgent));
    }

    /// **Scenario**: A contact flow in progress adds the continuation hint to the prompt.
    #[tokio::test]
    async fn contact_flow_hint_is_sent() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_decision(DecisionKind::Route, json!({"route": "contact_agent"})),
        );
        let mut s = state("mi número es +56 9 1234 5678");
        s.active_flow = Some(Flow::Contact);
        let patch = node(Some(oracle.clone())).run(&s).await.unwrap();
        assert_eq!(patch.route, Some(Route::ContactAgent));

        let route_call = oracle
            .calls()
            .into_iter()
            .find(|c| c.kind == "route")
            .unwrap();
        assert!(route_call.messages[1]
            .content()
            .starts_with("Conversation state: previous active flow is `contact`."));
        assert_eq!(
            route_call.messages[2].content(),
            "Conversation language code is `es`."
        );
        assert!(route_call.messages.last().unwrap().is_human());
    }
}
