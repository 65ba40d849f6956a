//! Routing state machine: named nodes, a pure transition function and the run loop.
//!
//! Build with [`GraphBuilder`], compile to [`CompiledGraph`], then `invoke` once per turn.
//! Every node returns a [`StatePatch`](crate::state::StatePatch) that the compiled graph
//! applies through its state updater before asking [`next_node`] where to go.

mod builder;
mod compiled;
mod logging;
mod node;
mod routing;

pub use builder::{CompilationError, GraphBuilder};
pub use compiled::CompiledGraph;
pub use logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
    log_node_state, log_state_update,
};
pub use node::Node;
pub use routing::next_node;

use std::fmt;

/// Graph node identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GraphNode {
    Router,
    QuoteAgent,
    ContactAgent,
    QuoteTools,
    ContactTools,
    FinalSupervisor,
}

impl GraphNode {
    /// Every node, in registration order.
    pub const ALL: [GraphNode; 6] = [
        GraphNode::Router,
        GraphNode::QuoteAgent,
        GraphNode::ContactAgent,
        GraphNode::QuoteTools,
        GraphNode::ContactTools,
        GraphNode::FinalSupervisor,
    ];

    /// Entry node of every turn.
    pub const START: GraphNode = GraphNode::Router;

    pub fn as_str(&self) -> &'static str {
        match self {
            GraphNode::Router => "router",
            GraphNode::QuoteAgent => "quote_agent",
            GraphNode::ContactAgent => "contact_agent",
            GraphNode::QuoteTools => "quote_tools",
            GraphNode::ContactTools => "contact_tools",
            GraphNode::FinalSupervisor => "final_supervisor",
        }
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
