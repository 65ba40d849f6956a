//! Thread storage: durable conversation state and the visible transcript per thread.
//!
//! The runner loads a [`ThreadSnapshot`] before a turn and saves the turn's transcript
//! delta plus the resulting state afterwards. Implementations: [`MemoryThreadStore`]
//! (tests, offline runs) and [`SqliteThreadStore`] (persistent).

mod in_memory;
mod sqlite;

pub use in_memory::MemoryThreadStore;
pub use sqlite::SqliteThreadStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;
use crate::state::ConversationState;

/// Thread store error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// State blob could not be encoded or decoded.
    #[error("serialization: {0}")]
    Serialization(String),
    /// Backend storage error. Message is opaque to avoid leaking backend types.
    #[error("storage: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Speaker of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
}

impl TranscriptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(TranscriptRole::User),
            "assistant" => Some(TranscriptRole::Assistant),
            _ => None,
        }
    }
}

/// One customer-visible line of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub content: String,
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TranscriptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TranscriptRole::Assistant,
            content: content.into(),
        }
    }

    fn to_message(&self) -> Message {
        match self.role {
            TranscriptRole::User => Message::human(self.content.clone()),
            TranscriptRole::Assistant => Message::agent(self.content.clone()),
        }
    }
}

/// Persisted view of one thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadSnapshot {
    pub state: ConversationState,
    pub transcript: Vec<TranscriptEntry>,
}

impl ThreadSnapshot {
    /// Builds a snapshot; a state blob without messages is seeded from the transcript.
    pub fn new(mut state: ConversationState, transcript: Vec<TranscriptEntry>) -> Self {
        if state.messages.is_empty() && !transcript.is_empty() {
            state.messages = transcript.iter().map(TranscriptEntry::to_message).collect();
        }
        Self { state, transcript }
    }
}

/// Durable per-thread storage.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Loads a thread; an unknown thread yields an empty snapshot.
    async fn load(&self, thread_id: &str) -> Result<ThreadSnapshot, StoreError>;

    /// Appends `delta` to the transcript and replaces the state blob.
    async fn save(
        &self,
        thread_id: &str,
        delta: &[TranscriptEntry],
        state: &ConversationState,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: A legacy blob without messages is rebuilt from the transcript.
    #[test]
    fn snapshot_seeds_messages_from_transcript() {
        let snapshot = ThreadSnapshot::new(
            ConversationState::default(),
            vec![TranscriptEntry::user("hola"), TranscriptEntry::assistant("¡Hola!")],
        );
        assert_eq!(snapshot.state.messages.len(), 2);
        assert!(snapshot.state.messages[0].is_human());
        assert!(snapshot.state.messages[1].is_agent());
    }

    #[test]
    fn role_parse_round_trip() {
        assert_eq!(TranscriptRole::parse("user"), Some(TranscriptRole::User));
        assert_eq!(TranscriptRole::parse(TranscriptRole::Assistant.as_str()), Some(TranscriptRole::Assistant));
        assert_eq!(TranscriptRole::parse("tool"), None);
    }

    #[test]
    fn store_error_display() {
        assert!(StoreError::Storage("disk".into()).to_string().contains("storage"));
        let e: StoreError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(e, StoreError::Serialization(_)));
    }
}
