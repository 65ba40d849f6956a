//! Turn runner: load a thread, run the graph for one human message, persist the result.

use std::sync::Arc;

use crate::error::AgentError;
use crate::graph::CompiledGraph;
use crate::language::UNDETERMINED_LANGUAGE;
use crate::memory::{ThreadStore, TranscriptEntry};
use crate::message::Message;
use crate::replies::{could_not_complete, no_reply};
use crate::state::ConversationState;

/// Outcome of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    /// Customer-facing text.
    pub text: String,
    /// State as persisted after the turn.
    pub state: ConversationState,
    /// Whether the graph failed and the generic reply was used.
    pub degraded: bool,
}

/// Runs turns of a compiled graph against a thread store.
pub struct ConversationRunner {
    graph: CompiledGraph,
    store: Arc<dyn ThreadStore>,
}

impl ConversationRunner {
    pub fn new(graph: CompiledGraph, store: Arc<dyn ThreadStore>) -> Self {
        Self { graph, store }
    }

    /// Processes one human message on `thread_id`.
    ///
    /// Graph failures are answered with the generic reply and the pre-turn state plus the
    /// exchange is saved. Store failures are returned.
    pub async fn run_turn(&self, thread_id: &str, text: &str) -> Result<TurnReply, AgentError> {
        let snapshot = self.store.load(thread_id).await?;
        let mut input = snapshot.state;
        input.messages.push(Message::human(text));

        let (state, reply, degraded) = match self.graph.invoke(input.clone()).await {
            Ok(state) => {
                let reply = last_agent_text(&state)
                    .map(str::to_string)
                    .unwrap_or_else(|| no_reply(language_of(&state)).to_string());
                (state, reply, false)
            }
            Err(e) => {
                tracing::warn!(thread_id, error = %e, "turn failed; answering with generic reply");
                let reply = could_not_complete(language_of(&input)).to_string();
                let mut state = input;
                state.messages.push(Message::agent(reply.clone()));
                (state, reply, true)
            }
        };

        self.store
            .save(
                thread_id,
                &[
                    TranscriptEntry::user(text),
                    TranscriptEntry::assistant(reply.clone()),
                ],
                &state,
            )
            .await?;
        tracing::info!(thread_id, degraded, messages = state.messages.len(), "turn saved");
        Ok(TurnReply {
            text: reply,
            state,
            degraded,
        })
    }
}

fn language_of(state: &ConversationState) -> &str {
    state
        .conversation_language
        .as_deref()
        .unwrap_or(UNDETERMINED_LANGUAGE)
}

fn last_agent_text(state: &ConversationState) -> Option<&str> {
    state
        .messages
        .iter()
        .rev()
        .find_map(|m| match m {
            Message::Agent { content, .. } if !content.trim().is_empty() => Some(content.trim()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::memory::MemoryThreadStore;
    use crate::nodes::{build_graph, NodeContext};
    use crate::tools::InMemoryInventory;

    fn runner(config: OrchestratorConfig, store: Arc<MemoryThreadStore>) -> ConversationRunner {
        let inventory = Arc::new(InMemoryInventory::demo().unwrap());
        let graph = build_graph(NodeContext::new(None, inventory.clone(), inventory, config)).unwrap();
        ConversationRunner::new(graph, store)
    }

    /// **Scenario**: Without an oracle a turn still completes and is persisted.
    #[tokio::test]
    async fn offline_turn_is_saved() {
        let store = Arc::new(MemoryThreadStore::new());
        let config = OrchestratorConfig {
            default_language: Some("es".into()),
            ..Default::default()
        };
        let reply = runner(config, store.clone())
            .run_turn("t1", "hola")
            .await
            .unwrap();
        assert!(!reply.degraded);
        assert!(reply.text.contains("OPENAI_API_KEY"));

        let snapshot = store.load("t1").await.unwrap();
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.transcript[0].content, "hola");
        assert_eq!(snapshot.state.quote_agent_turns, 1);
    }

    /// **Scenario**: A graph failure yields the generic reply and keeps the pre-turn state.
    #[tokio::test]
    async fn graph_failure_is_degraded() {
        let store = Arc::new(MemoryThreadStore::new());
        let config = OrchestratorConfig {
            recursion_limit: 1,
            ..Default::default()
        };
        let reply = runner(config, store.clone())
            .run_turn("t1", "hello")
            .await
            .unwrap();
        assert!(reply.degraded);
        assert_eq!(
            reply.text,
            "I could not complete this automatically. Could you rephrase or try again?"
        );
        let snapshot = store.load("t1").await.unwrap();
        assert_eq!(snapshot.state.quote_agent_turns, 0);
        assert_eq!(snapshot.state.messages.len(), 2);
        assert!(snapshot.state.route.is_none());
    }
}
