//! # Spaces Store
//!
//! Durable storage for saved browser spaces.
//!
//! SQLite is the only durable store. One row per saved session, with the tab
//! list, bounded history, and window bounds held as JSON columns, plus a
//! scalar `meta` table for process-wide keys (the last-seen extension
//! version).
//!
//! The store is deliberately thin: CRUD plus two filtered lookups. The
//! window-id and name lookups are full scans over `fetch_all`, which is fine
//! at the dataset sizes involved (tens to low hundreds of rows). All
//! consistency logic lives above this layer, in the registry and the engine.

mod store;
mod types;

pub use store::SessionStore;
pub use types::{NewSession, Session, SessionId, Tab, TabId, WindowBounds, WindowId};

/// Errors that can occur in the session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A JSON column failed to round-trip.
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    /// A timestamp column failed to parse.
    #[error("timestamp column error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// An update was attempted on a session that was never persisted.
    #[error("update requires a persisted session id")]
    MissingId,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
