//! In-memory thread store. Not persistent; for tests and offline runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StoreError, ThreadSnapshot, ThreadStore, TranscriptEntry};
use crate::state::ConversationState;

/// Thread store keyed by thread id.
#[derive(Debug, Clone, Default)]
pub struct MemoryThreadStore {
    inner: Arc<RwLock<HashMap<String, ThreadSnapshot>>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn load(&self, thread_id: &str) -> Result<ThreadSnapshot, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.get(thread_id).cloned().unwrap_or_default())
    }

    async fn save(
        &self,
        thread_id: &str,
        delta: &[TranscriptEntry],
        state: &ConversationState,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let snapshot = guard.entry(thread_id.to_string()).or_default();
        snapshot.transcript.extend_from_slice(delta);
        snapshot.state = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Route;

    #[tokio::test]
    async fn save_then_load() {
        let store = MemoryThreadStore::new();
        assert_eq!(store.load("t1").await.unwrap(), ThreadSnapshot::default());

        let state = ConversationState {
            route: Some(Route::ContactAgent),
            ..Default::default()
        };
        store
            .save("t1", &[TranscriptEntry::user("hola")], &state)
            .await
            .unwrap();
        store
            .save("t1", &[TranscriptEntry::assistant("¿En qué te ayudo?")], &state)
            .await
            .unwrap();

        let snapshot = store.load("t1").await.unwrap();
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.state.route, Some(Route::ContactAgent));
        assert!(store.load("t2").await.unwrap().transcript.is_empty());
    }
}
