//! State update channels: how node output is merged into the conversation state.
//!
//! Each field of [`ConversationState`](crate::state::ConversationState) has one reducer
//! (see [`reducers`]); [`ConversationUpdater`] applies a whole
//! [`StatePatch`](crate::state::StatePatch) in a fixed field order.

mod conversation;
pub mod reducers;

pub use conversation::ConversationUpdater;

use std::fmt::Debug;
use std::sync::Arc;

/// Trait for customizing how a node's update is applied to the current state.
///
/// The run loop calls `apply_update` after each node execution.
pub trait StateUpdater<S, U>: Send + Sync + Debug {
    /// Merge `update` (returned by a node) into `current`.
    fn apply_update(&self, current: &mut S, update: &U);
}

/// Shared updater handle stored by the compiled graph.
pub type BoxedStateUpdater<S, U> = Arc<dyn StateUpdater<S, U>>;
