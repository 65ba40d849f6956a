//! # Showroom
//!
//! Conversational orchestration core for a used-car dealership assistant. One customer
//! message runs one turn through a small routing graph:
//!
//! `router` → `quote_agent` | `contact_agent` → (their tool node, looping back) →
//! `final_supervisor`.
//!
//! ## Design principles
//!
//! - **Single state type**: [`ConversationState`] flows through every node; nodes return a
//!   [`StatePatch`] that the graph applies through the reducers in [`channels`].
//! - **Idempotent tool ingestion**: [`synchronizer::sync_tool_results`] folds each tool
//!   result into durable memory exactly once (active filters, candidates, contact profile).
//! - **Bounded loops**: [`guard::TurnGuard`] caps agent re-entries per turn and overall.
//! - **Policy before execution**: [`policy::enforce_quote_tool_policy`] gates searches on a
//!   catalog lookup, merges persisted filters and drops duplicate calls.
//! - **Fallible oracle**: every [`Oracle`] call has a deadline and a documented fallback.
//!
//! ## Main modules
//!
//! - [`graph`]: [`GraphNode`], [`Node`], [`GraphBuilder`], [`CompiledGraph`], [`next_node`].
//! - [`nodes`]: the six graph nodes and [`build_graph`].
//! - [`oracle`]: [`Oracle`] trait, [`ChatCompletionsOracle`], [`ScriptedOracle`].
//! - [`tools`]: [`ToolExecutor`], [`CatalogProvider`], [`InMemoryInventory`].
//! - [`memory`]: [`ThreadStore`], [`MemoryThreadStore`], [`SqliteThreadStore`].
//! - [`runner`]: [`ConversationRunner`]: load, run one turn, save.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use showroom::{
//!     build_graph, ConversationRunner, InMemoryInventory, MemoryThreadStore, NodeContext,
//!     OrchestratorConfig,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let inventory = Arc::new(InMemoryInventory::demo()?);
//! let ctx = NodeContext::new(None, inventory.clone(), inventory, OrchestratorConfig::from_env());
//! let runner = ConversationRunner::new(build_graph(ctx)?, Arc::new(MemoryThreadStore::new()));
//! let reply = runner.run_turn("thread-1", "Busco un SUV japonés").await?;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod config;
pub mod directive;
pub mod error;
pub mod filters;
pub mod graph;
pub mod guard;
pub mod language;
pub mod memory;
pub mod message;
pub mod nodes;
pub mod oracle;
pub mod policy;
pub mod prompts;
pub mod replies;
pub mod runner;
pub mod state;
pub mod supervisor;
pub mod synchronizer;
pub mod tools;
pub mod transcript;

pub use channels::{BoxedStateUpdater, ConversationUpdater, StateUpdater};
pub use config::OrchestratorConfig;
pub use error::AgentError;
pub use graph::{next_node, CompilationError, CompiledGraph, GraphBuilder, GraphNode, Node};
pub use memory::{
    MemoryThreadStore, SqliteThreadStore, StoreError, ThreadSnapshot, ThreadStore,
    TranscriptEntry, TranscriptRole,
};
pub use message::{Message, ToolCall};
pub use nodes::{build_graph, NodeContext};
pub use oracle::{
    AgentReply, ChatCompletionsOracle, DecisionKind, Oracle, OracleError, ScriptedOracle,
};
pub use runner::{ConversationRunner, TurnReply};
pub use state::{
    ConversationState, ContactProfile, ContactRequest, Flow, Route, RuntimeDirective,
    SearchEvent, SearchFilters, StatePatch, VehicleCandidate,
};
pub use tools::{
    CatalogMetadata, CatalogProvider, InMemoryInventory, ToolError, ToolExecutor, ToolSpec,
};
