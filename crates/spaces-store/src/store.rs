//! SQLite storage for session rows.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;

use crate::types::{NewSession, Session, SessionId, Tab, WindowBounds, WindowId};
use crate::{StoreError, StoreResult};

/// Meta-table key holding the last-seen extension version.
const VERSION_KEY: &str = "extension_version";

/// SQLite-backed store for saved sessions.
///
/// The connection is guarded by a mutex; operations commit per-statement and
/// there are no multi-row transactions. Callers are expected to log failures
/// and degrade rather than propagate them to the UI channel.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Opens the store at the given path, creating the schema if needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store. Useful for testing.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                session_hash INTEGER NOT NULL,
                tabs TEXT NOT NULL,
                history TEXT NOT NULL,
                last_access TEXT NOT NULL,
                window_bounds TEXT,
                window_id INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_hash ON sessions(session_hash);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    // ========================================================================
    // Session rows
    // ========================================================================

    /// Fetches every stored session, in id order.
    pub fn fetch_all(&self) -> StoreResult<Vec<Session>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, session_hash, tabs, history, last_access, window_bounds, window_id
             FROM sessions ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;

        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(session_from_row(row)?);
        }
        Ok(sessions)
    }

    /// Fetches a session by id.
    pub fn fetch_by_id(&self, id: SessionId) -> StoreResult<Option<Session>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, session_hash, tabs, history, last_access, window_bounds, window_id
             FROM sessions WHERE id = ?",
        )?;
        let mut rows = stmt.query(params![id.0])?;

        match rows.next()? {
            Some(row) => Ok(Some(session_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Fetches the session currently recorded against a window id.
    ///
    /// Full scan over `fetch_all`; the dataset is small.
    pub fn fetch_by_window_id(&self, window_id: WindowId) -> StoreResult<Option<Session>> {
        Ok(self
            .fetch_all()?
            .into_iter()
            .find(|s| s.window_id == Some(window_id)))
    }

    /// Fetches a session by name, case-insensitively.
    ///
    /// Full scan over `fetch_all`; the dataset is small.
    pub fn fetch_by_name(&self, name: &str) -> StoreResult<Option<Session>> {
        let wanted = name.to_lowercase();
        Ok(self.fetch_all()?.into_iter().find(|s| {
            s.name
                .as_ref()
                .is_some_and(|n| n.to_lowercase() == wanted)
        }))
    }

    /// Inserts a new session row and returns it with its assigned id.
    pub fn create(&self, draft: NewSession) -> StoreResult<Session> {
        let tabs = serde_json::to_string(&draft.tabs)?;
        let history = serde_json::to_string(&draft.history)?;
        let bounds = draft
            .window_bounds
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (name, session_hash, tabs, history, last_access, window_bounds, window_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                draft.name,
                draft.session_hash as i64,
                tabs,
                history,
                draft.last_access.to_rfc3339(),
                bounds,
                draft.window_id.map(|w| w.0),
            ],
        )?;
        let id = SessionId(conn.last_insert_rowid());

        Ok(Session {
            id: Some(id),
            name: draft.name,
            session_hash: draft.session_hash,
            tabs: draft.tabs,
            history: draft.history,
            last_access: draft.last_access,
            window_bounds: draft.window_bounds,
            window_id: draft.window_id,
        })
    }

    /// Writes a session row back. The session must have an id.
    pub fn update(&self, session: &Session) -> StoreResult<Session> {
        let id = session.id.ok_or(StoreError::MissingId)?;

        let tabs = serde_json::to_string(&session.tabs)?;
        let history = serde_json::to_string(&session.history)?;
        let bounds = session
            .window_bounds
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.lock().execute(
            "UPDATE sessions
             SET name = ?, session_hash = ?, tabs = ?, history = ?, last_access = ?,
                 window_bounds = ?, window_id = ?
             WHERE id = ?",
            params![
                session.name,
                session.session_hash as i64,
                tabs,
                history,
                session.last_access.to_rfc3339(),
                bounds,
                session.window_id.map(|w| w.0),
                id.0,
            ],
        )?;

        Ok(session.clone())
    }

    /// Deletes a session row. Returns whether a row was removed.
    pub fn remove(&self, id: SessionId) -> StoreResult<bool> {
        let affected = self
            .conn
            .lock()
            .execute("DELETE FROM sessions WHERE id = ?", params![id.0])?;
        Ok(affected > 0)
    }

    // ========================================================================
    // Process-wide meta keys
    // ========================================================================

    /// Reads the last-seen extension version, if any was recorded.
    pub fn fetch_version(&self) -> StoreResult<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT value FROM meta WHERE key = ?")?;
        let mut rows = stmt.query(params![VERSION_KEY])?;

        match rows.next()? {
            Some(row) => {
                let raw: String = row.get(0)?;
                // The value is stored JSON-encoded.
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// Records the extension version as a JSON-encoded string.
    pub fn save_version(&self, version: &str) -> StoreResult<()> {
        let encoded = serde_json::to_string(version)?;
        self.conn.lock().execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![VERSION_KEY, encoded],
        )?;
        Ok(())
    }
}

fn session_from_row(row: &Row<'_>) -> StoreResult<Session> {
    let tabs_json: String = row.get(3)?;
    let history_json: String = row.get(4)?;
    let last_access_raw: String = row.get(5)?;
    let bounds_json: Option<String> = row.get(6)?;

    let tabs: Vec<Tab> = serde_json::from_str(&tabs_json)?;
    let history: Vec<Tab> = serde_json::from_str(&history_json)?;
    let last_access: DateTime<Utc> =
        DateTime::parse_from_rfc3339(&last_access_raw)?.with_timezone(&Utc);
    let window_bounds: Option<WindowBounds> = bounds_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    Ok(Session {
        id: Some(SessionId(row.get(0)?)),
        name: row.get(1)?,
        session_hash: row.get::<_, i64>(2)? as u32,
        tabs,
        history,
        last_access,
        window_bounds,
        window_id: row.get::<_, Option<i64>>(7)?.map(WindowId),
    })
}
