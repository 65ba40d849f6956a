//! Graph nodes of the car-sales conversation and the graph factory.

mod contact_agent;
mod context;
mod final_supervisor;
mod quote_agent;
mod router;
mod tools;

pub use contact_agent::ContactAgentNode;
pub use context::{render_context_block, resolve_language, synchronized_view};
pub use final_supervisor::FinalSupervisorNode;
pub use quote_agent::QuoteAgentNode;
pub use router::RouterNode;
pub use tools::ToolsNode;

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::graph::{CompilationError, CompiledGraph, GraphBuilder};
use crate::oracle::Oracle;
use crate::tools::{CatalogProvider, ToolExecutor};

/// Collaborators shared by every node.
#[derive(Clone)]
pub struct NodeContext {
    /// Language-model oracle; `None` runs the deterministic fallbacks only.
    pub oracle: Option<Arc<dyn Oracle>>,
    pub tools: Arc<dyn ToolExecutor>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub config: OrchestratorConfig,
}

impl NodeContext {
    pub fn new(
        oracle: Option<Arc<dyn Oracle>>,
        tools: Arc<dyn ToolExecutor>,
        catalog: Arc<dyn CatalogProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            oracle,
            tools,
            catalog,
            config,
        }
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("oracle", &self.oracle.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builds and compiles the six-node car-sales graph.
pub fn build_graph(ctx: NodeContext) -> Result<CompiledGraph, CompilationError> {
    let recursion_limit = ctx.config.recursion_limit;
    GraphBuilder::new()
        .add_node(Arc::new(RouterNode::new(ctx.clone())))
        .add_node(Arc::new(QuoteAgentNode::new(ctx.clone())))
        .add_node(Arc::new(ContactAgentNode::new(ctx.clone())))
        .add_node(Arc::new(ToolsNode::quote(ctx.tools.clone())))
        .add_node(Arc::new(ToolsNode::contact(ctx.tools.clone())))
        .add_node(Arc::new(FinalSupervisorNode::new(ctx)))
        .with_recursion_limit(recursion_limit)
        .compile()
}
