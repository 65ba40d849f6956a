//! Orchestration error types.
//!
//! Returned by graph nodes and the run loop. Oracle and tool failures are converted into
//! fallbacks at the call site, so only structural failures reach this type.

use thiserror::Error;

use crate::memory::StoreError;

/// Orchestration error.
///
/// Returned by `Node::run` and `CompiledGraph::invoke` when a turn cannot proceed.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Execution failed with a message (e.g. a node was missing from the graph).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The run loop exceeded the configured number of node steps for one turn.
    #[error("recursion limit of {0} steps reached")]
    RecursionLimit(usize),

    /// Thread storage failed while loading or saving a conversation.
    #[error("thread store: {0}")]
    Store(#[from] StoreError),
}
