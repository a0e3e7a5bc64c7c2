//! Storage for in-progress processing sessions.
//!
//! Commands only talk to [`SessionStore`]; the backing is chosen on the command line.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use crate::cli::SessionBackend;
use crate::model::ProcessingSession;
use crate::util::ensure_directory;

pub trait SessionStore {
    fn get(&self, session_id: &str) -> Result<Option<ProcessingSession>>;
    fn put(&self, session_id: &str, session: &ProcessingSession) -> Result<()>;
    /// Returns whether a session was removed.
    fn remove(&self, session_id: &str) -> Result<bool>;
}

pub fn open_session_store(
    backend: SessionBackend,
    cache_root: &Path,
) -> Result<Box<dyn SessionStore>> {
    match backend {
        SessionBackend::Memory => Ok(Box::new(InMemorySessionStore::default())),
        SessionBackend::Sqlite => {
            ensure_directory(cache_root)?;
            let store = SqliteSessionStore::open(&cache_root.join("sessions.sqlite"))?;
            Ok(Box::new(store))
        }
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, ProcessingSession>>,
}

impl InMemorySessionStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ProcessingSession>>> {
        self.sessions
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> Result<Option<ProcessingSession>> {
        Ok(self.lock()?.get(session_id).cloned())
    }

    fn put(&self, session_id: &str, session: &ProcessingSession) -> Result<()> {
        self.lock()?
            .insert(session_id.to_string(), session.clone());
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(session_id).is_some())
    }
}

pub struct SqliteSessionStore {
    connection: Connection,
}

impl SqliteSessionStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, session_id: &str) -> Result<Option<ProcessingSession>> {
        let payload: Option<String> = self
            .connection
            .query_row(
                "SELECT payload FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to load session {session_id}"))?;

        payload
            .map(|raw| {
                serde_json::from_str(&raw)
                    .with_context(|| format!("failed to parse stored session {session_id}"))
            })
            .transpose()
    }

    fn put(&self, session_id: &str, session: &ProcessingSession) -> Result<()> {
        let payload = serde_json::to_string(session)
            .with_context(|| format!("failed to serialize session {session_id}"))?;

        self.connection
            .execute(
                "INSERT INTO sessions (session_id, input_path, updated_at, payload)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(session_id) DO UPDATE SET
                   input_path = excluded.input_path,
                   updated_at = excluded.updated_at,
                   payload = excluded.payload",
                params![
                    session_id,
                    &session.input_path,
                    &session.updated_at,
                    payload
                ],
            )
            .with_context(|| format!("failed to store session {session_id}"))?;
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<bool> {
        let removed = self
            .connection
            .execute(
                "DELETE FROM sessions WHERE session_id = ?1",
                params![session_id],
            )
            .with_context(|| format!("failed to remove session {session_id}"))?;
        Ok(removed > 0)
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
              session_id TEXT PRIMARY KEY,
              input_path TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              payload TEXT NOT NULL
            );
            ",
        )
        .context("failed to create sessions schema")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookType, ValidationReport};

    fn sample_session(session_id: &str) -> ProcessingSession {
        ProcessingSession {
            session_id: session_id.to_string(),
            created_at: "2024-05-01T10:00:00Z".to_string(),
            updated_at: "2024-05-01T10:00:00Z".to_string(),
            input_path: "uploads/libro.pdf".to_string(),
            source_sha256: "abc".to_string(),
            year: 2024,
            book_type: BookType::Protocolo,
            output_root: "processed".to_string(),
            page_count: 2,
            page_texts: vec!["20241101007P00001".to_string(), String::new()],
            codes: vec!["20241101007P00001".to_string()],
            manual_anchors: Vec::new(),
            generated_files: vec!["processed/2024/PROTOCOLO/20241101007P00001.pdf".to_string()],
            validation: ValidationReport {
                total_found: 1,
                first_sequence: "00001".to_string(),
                last_sequence: "00001".to_string(),
                expected_range: "00001 - 00001".to_string(),
                missing: Vec::new(),
                duplicates: Vec::new(),
                is_continuous: true,
            },
        }
    }

    fn exercise_store(store: &dyn SessionStore) {
        assert!(store.get("missing").unwrap().is_none());

        let mut session = sample_session("s-1");
        store.put("s-1", &session).unwrap();
        assert_eq!(store.get("s-1").unwrap().unwrap().codes, session.codes);

        session.codes.push("20241101007P00002".to_string());
        store.put("s-1", &session).unwrap();
        assert_eq!(store.get("s-1").unwrap().unwrap().codes.len(), 2);

        assert!(store.remove("s-1").unwrap());
        assert!(!store.remove("s-1").unwrap());
        assert!(store.get("s-1").unwrap().is_none());
    }

    #[test]
    fn in_memory_store_supports_get_put_remove() {
        exercise_store(&InMemorySessionStore::default());
    }

    #[test]
    fn sqlite_store_supports_get_put_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::open(&dir.path().join("sessions.sqlite")).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn sqlite_store_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sessions.sqlite");

        SqliteSessionStore::open(&db_path)
            .unwrap()
            .put("s-2", &sample_session("s-2"))
            .unwrap();

        let reopened = SqliteSessionStore::open(&db_path).unwrap();
        let session = reopened.get("s-2").unwrap().unwrap();
        assert_eq!(session.book_type, BookType::Protocolo);
        assert_eq!(session.page_texts.len(), 2);
    }
}
