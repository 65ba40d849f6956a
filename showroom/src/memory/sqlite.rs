//! SQLite-backed thread store. Persistent across process restarts.
//!
//! Tables: `conversation_threads(id, state_json, created_at)` holds the JSON-serialized
//! `ConversationState`; `conversation_messages(id, thread_id, role, content, created_at)`
//! holds the customer-visible transcript. Uses `spawn_blocking` with a connection per call.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{StoreError, ThreadSnapshot, ThreadStore, TranscriptEntry, TranscriptRole};
use crate::state::ConversationState;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS conversation_threads (
    id TEXT PRIMARY KEY,
    state_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS conversation_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (thread_id) REFERENCES conversation_threads (id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_conversation_messages_thread
    ON conversation_messages (thread_id, id);
"#;

fn storage(e: rusqlite::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// SQLite thread store.
///
/// **Interaction**: Used as `Arc<dyn ThreadStore>` by the conversation runner.
#[derive(Debug, Clone)]
pub struct SqliteThreadStore {
    db_path: PathBuf,
}

impl SqliteThreadStore {
    /// Opens (or creates) the database and ensures the schema exists.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        let conn = Connection::open(&db_path).map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

fn ensure_thread(conn: &Connection, thread_id: &str, now: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO conversation_threads (id, state_json, created_at) VALUES (?1, '{}', ?2)",
        params![thread_id, now],
    )
    .map_err(storage)?;
    Ok(())
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    async fn load(&self, thread_id: &str) -> Result<ThreadSnapshot, StoreError> {
        let db_path = self.db_path.clone();
        let thread_id = thread_id.to_string();

        let (state_json, rows) = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).map_err(storage)?;
            let state_json: Option<String> = conn
                .query_row(
                    "SELECT state_json FROM conversation_threads WHERE id = ?1",
                    params![thread_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage)?;
            let mut stmt = conn
                .prepare(
                    "SELECT role, content FROM conversation_messages WHERE thread_id = ?1 ORDER BY id ASC",
                )
                .map_err(storage)?;
            let rows = stmt
                .query_map(params![thread_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(storage)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage)?;
            Ok::<_, StoreError>((state_json, rows))
        })
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))??;

        let state = match state_json.as_deref().map(str::trim) {
            None | Some("") => ConversationState::default(),
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "unreadable state blob; starting from empty state");
                ConversationState::default()
            }),
        };
        let transcript = rows
            .into_iter()
            .filter_map(|(role, content)| {
                TranscriptRole::parse(&role).map(|role| TranscriptEntry { role, content })
            })
            .collect();
        Ok(ThreadSnapshot::new(state, transcript))
    }

    async fn save(
        &self,
        thread_id: &str,
        delta: &[TranscriptEntry],
        state: &ConversationState,
    ) -> Result<(), StoreError> {
        let state_json = serde_json::to_string(state)?;
        let db_path = self.db_path.clone();
        let thread_id = thread_id.to_string();
        let delta = delta.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(&db_path).map_err(storage)?;
            let tx = conn.transaction().map_err(storage)?;
            let now = chrono::Utc::now().to_rfc3339();
            ensure_thread(&tx, &thread_id, &now)?;
            for entry in &delta {
                tx.execute(
                    "INSERT INTO conversation_messages (thread_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![thread_id, entry.role.as_str(), entry.content, now],
                )
                .map_err(storage)?;
            }
            tx.execute(
                "UPDATE conversation_threads SET state_json = ?1 WHERE id = ?2",
                params![state_json, thread_id],
            )
            .map_err(storage)?;
            tx.commit().map_err(storage)?;
            Ok::<(), StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::state::Route;
    use serde_json::json;

    /// **Scenario**: State and transcript survive reopening the database.
    #[tokio::test]
    async fn round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.db");
        let store = SqliteThreadStore::new(&path).unwrap();

        let mut state = ConversationState {
            route: Some(Route::QuoteAgent),
            selected_vehicle_id: Some(42),
            messages: vec![Message::human("busco un suv"), Message::agent("Tengo 3 opciones.")],
            ..Default::default()
        };
        state
            .active_search_filters
            .insert("body_type_id".into(), json!(2));
        store
            .save(
                "thread-a",
                &[
                    TranscriptEntry::user("busco un suv"),
                    TranscriptEntry::assistant("Tengo 3 opciones."),
                ],
                &state,
            )
            .await
            .unwrap();

        let reopened = SqliteThreadStore::new(&path).unwrap();
        let snapshot = reopened.load("thread-a").await.unwrap();
        assert_eq!(snapshot.state, state);
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.transcript[1].role, TranscriptRole::Assistant);
    }

    #[tokio::test]
    async fn unknown_thread_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteThreadStore::new(dir.path().join("c.db")).unwrap();
        let snapshot = store.load("nope").await.unwrap();
        assert_eq!(snapshot, ThreadSnapshot::default());
    }

    /// **Scenario**: Legacy rows with `{}` state rebuild messages from the transcript.
    #[tokio::test]
    async fn empty_blob_uses_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteThreadStore::new(dir.path().join("c.db")).unwrap();
        store
            .save("t", &[TranscriptEntry::user("hola")], &ConversationState::default())
            .await
            .unwrap();
        let snapshot = store.load("t").await.unwrap();
        assert_eq!(snapshot.state.messages, vec![Message::human("hola")]);
    }
}
