//! Graph node trait: one step of a turn.

use async_trait::async_trait;

use super::GraphNode;
use crate::error::AgentError;
use crate::state::{ConversationState, StatePatch};

/// One step in the routing graph: state in, patch out.
///
/// Nodes never mutate state; the compiled graph applies the returned patch and then
/// consults [`next_node`](super::next_node) for the successor.
#[async_trait]
pub trait Node: Send + Sync {
    /// Which graph position this node fills. Unique within a graph.
    fn id(&self) -> GraphNode;

    async fn run(&self, state: &ConversationState) -> Result<StatePatch, AgentError>;
}
