//! Graph builder: registers one node per graph position and compiles.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::{CompiledGraph, GraphNode, Node};
use crate::channels::{BoxedStateUpdater, ConversationUpdater};
use crate::state::{ConversationState, StatePatch};

/// Default maximum node steps per turn.
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// Error when compiling the routing graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompilationError {
    /// A graph position has no registered node.
    #[error("node not found: {0}")]
    NodeNotFound(GraphNode),

    /// Two nodes were registered for the same graph position.
    #[error("node registered twice: {0}")]
    DuplicateNode(GraphNode),
}

/// Builder for [`CompiledGraph`].
pub struct GraphBuilder {
    nodes: Vec<Arc<dyn Node>>,
    state_updater: BoxedStateUpdater<ConversationState, StatePatch>,
    recursion_limit: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            state_updater: Arc::new(ConversationUpdater),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    pub fn add_node(mut self, node: Arc<dyn Node>) -> Self {
        self.nodes.push(node);
        self
    }

    /// Replaces the state updater (defaults to [`ConversationUpdater`]).
    pub fn with_state_updater(
        mut self,
        updater: BoxedStateUpdater<ConversationState, StatePatch>,
    ) -> Self {
        self.state_updater = updater;
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit.max(1);
        self
    }

    /// Validates that every graph position has exactly one node.
    pub fn compile(self) -> Result<CompiledGraph, CompilationError> {
        let mut nodes: HashMap<GraphNode, Arc<dyn Node>> = HashMap::new();
        for node in self.nodes {
            let id = node.id();
            if nodes.insert(id, node).is_some() {
                return Err(CompilationError::DuplicateNode(id));
            }
        }
        if let Some(missing) = GraphNode::ALL.iter().find(|id| !nodes.contains_key(id)) {
            return Err(CompilationError::NodeNotFound(*missing));
        }
        Ok(CompiledGraph::new(
            nodes,
            self.state_updater,
            self.recursion_limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use async_trait::async_trait;

    struct Noop(GraphNode);

    #[async_trait]
    impl Node for Noop {
        fn id(&self) -> GraphNode {
            self.0
        }

        async fn run(&self, _state: &ConversationState) -> Result<StatePatch, AgentError> {
            Ok(StatePatch::new())
        }
    }

    #[test]
    fn missing_node_fails_compile() {
        let err = GraphBuilder::new()
            .add_node(Arc::new(Noop(GraphNode::Router)))
            .compile()
            .err();
        assert_eq!(err, Some(CompilationError::NodeNotFound(GraphNode::QuoteAgent)));
    }

    #[test]
    fn duplicate_node_fails_compile() {
        let err = GraphBuilder::new()
            .add_node(Arc::new(Noop(GraphNode::Router)))
            .add_node(Arc::new(Noop(GraphNode::Router)))
            .compile()
            .err();
        assert_eq!(err, Some(CompilationError::DuplicateNode(GraphNode::Router)));
    }

    #[test]
    fn full_graph_compiles() {
        let builder = GraphNode::ALL
            .iter()
            .fold(GraphBuilder::new(), |b, id| b.add_node(Arc::new(Noop(*id))));
        assert!(builder.compile().is_ok());
    }
}
