//! Structured logging for graph execution events.

use std::fmt::Debug;

use super::GraphNode;
use crate::error::AgentError;

/// Log node execution start.
pub fn log_node_start(node: GraphNode) {
    tracing::debug!(node_id = node.as_str(), "Starting node execution");
}

/// Log the input state of a node.
pub fn log_node_state<S: Debug>(node: GraphNode, state: &S) {
    tracing::trace!(node_id = node.as_str(), state = ?state, "Node execution: state");
}

/// Log node execution completion and the chosen successor.
pub fn log_node_complete(node: GraphNode, next: Option<GraphNode>) {
    let next = next.map(|n| n.as_str()).unwrap_or("end");
    tracing::debug!(node_id = node.as_str(), next, "Node execution complete");
}

/// Log a state update applied after a node.
pub fn log_state_update(node: GraphNode, messages: usize) {
    tracing::debug!(node_id = node.as_str(), messages, "State updated");
}

pub fn log_graph_start() {
    tracing::info!("Starting graph execution");
}

pub fn log_graph_complete(steps: usize) {
    tracing::info!(steps, "Graph execution complete");
}

pub fn log_graph_error(error: &AgentError) {
    tracing::error!(?error, "Graph execution error");
}
