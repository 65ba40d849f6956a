//! Compiled routing graph and its run loop.

use std::collections::HashMap;
use std::sync::Arc;

use super::logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
    log_node_state, log_state_update,
};
use super::{next_node, GraphNode, Node};
use crate::channels::BoxedStateUpdater;
use crate::error::AgentError;
use crate::state::{ConversationState, StatePatch};

/// Executable routing graph. Built by [`GraphBuilder::compile`](super::GraphBuilder::compile).
pub struct CompiledGraph {
    nodes: HashMap<GraphNode, Arc<dyn Node>>,
    state_updater: BoxedStateUpdater<ConversationState, StatePatch>,
    recursion_limit: usize,
}

impl CompiledGraph {
    pub(super) fn new(
        nodes: HashMap<GraphNode, Arc<dyn Node>>,
        state_updater: BoxedStateUpdater<ConversationState, StatePatch>,
        recursion_limit: usize,
    ) -> Self {
        Self {
            nodes,
            state_updater,
            recursion_limit,
        }
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Runs one turn from the router until a node has no successor.
    ///
    /// Fails with [`AgentError::RecursionLimit`] when more than `recursion_limit` nodes
    /// would run, or with any error a node returns.
    pub async fn invoke(&self, state: ConversationState) -> Result<ConversationState, AgentError> {
        let mut state = state;
        log_graph_start();
        let result = self.run_loop(&mut state).await;
        match result {
            Ok(steps) => {
                log_graph_complete(steps);
                Ok(state)
            }
            Err(e) => {
                log_graph_error(&e);
                Err(e)
            }
        }
    }

    async fn run_loop(&self, state: &mut ConversationState) -> Result<usize, AgentError> {
        let mut current = GraphNode::START;
        let mut steps = 0usize;
        loop {
            if steps >= self.recursion_limit {
                return Err(AgentError::RecursionLimit(self.recursion_limit));
            }
            steps += 1;

            let node = self.nodes.get(&current).cloned().ok_or_else(|| {
                AgentError::ExecutionFailed(format!("node not registered: {current}"))
            })?;

            log_node_start(current);
            log_node_state(current, &*state);

            let patch = node.run(state).await?;
            self.state_updater.apply_update(state, &patch);
            log_state_update(current, state.messages.len());

            let next = next_node(current, state);
            log_node_complete(current, next);
            match next {
                Some(id) => current = id,
                None => return Ok(steps),
            }
        }
    }
}
