//! Core types for saved spaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spaces_fingerprint::session_hash;

/// Durable identifier of a saved session, allocated by the store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Ephemeral identifier of a live browser window.
///
/// Window ids are owned by the platform and renumbered across browser
/// restarts; they are never valid across process lifetimes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

impl WindowId {
    /// Platform APIs use non-positive ids as "no window" markers.
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for WindowId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Ephemeral identifier of a live browser tab.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TabId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One tab of a saved space.
///
/// Only the fields the engine and the UI actually use are typed; everything
/// else the platform attached to the tab is round-tripped verbatim through
/// `platform_fields`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TabId>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    #[serde(flatten)]
    pub platform_fields: serde_json::Map<String, serde_json::Value>,
}

impl Tab {
    /// A bare tab holding only a URL, used when links are added to a space.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Persisted window geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// A saved (or not-yet-saved) browser space.
///
/// A session with `id = None` is *temporary*: it exists only in the registry,
/// mirrors an unmatched live window, and must therefore have `window_id`
/// present. Promotion to durable happens when the user names and saves it.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub id: Option<SessionId>,
    pub name: Option<String>,
    pub session_hash: u32,
    pub tabs: Vec<Tab>,
    pub history: Vec<Tab>,
    pub last_access: DateTime<Utc>,
    pub window_bounds: Option<WindowBounds>,
    pub window_id: Option<WindowId>,
}

impl Session {
    /// True for sessions that exist only in memory.
    pub fn is_temporary(&self) -> bool {
        self.id.is_none()
    }

    /// True while a live window is bound to this session.
    pub fn is_open(&self) -> bool {
        self.window_id.is_some()
    }

    /// Recomputes `session_hash` from the current tab list.
    pub fn refresh_hash(&mut self, extension_id: &str) {
        self.session_hash = session_hash(self.tabs.iter().map(|t| t.url.as_str()), extension_id);
    }
}

/// A session to be inserted; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub name: Option<String>,
    pub session_hash: u32,
    pub tabs: Vec<Tab>,
    pub history: Vec<Tab>,
    pub last_access: DateTime<Utc>,
    pub window_bounds: Option<WindowBounds>,
    pub window_id: Option<WindowId>,
}

impl NewSession {
    /// A temporary session mirroring an unmatched live window.
    pub fn temporary(window_id: WindowId, tabs: Vec<Tab>, session_hash: u32) -> Self {
        Self {
            name: None,
            session_hash,
            tabs,
            history: Vec::new(),
            last_access: Utc::now(),
            window_bounds: None,
            window_id: Some(window_id),
        }
    }

    /// Materializes the draft as an in-memory (temporary) session.
    pub fn into_session(self) -> Session {
        Session {
            id: None,
            name: self.name,
            session_hash: self.session_hash,
            tabs: self.tabs,
            history: self.history,
            last_access: self.last_access,
            window_bounds: self.window_bounds,
            window_id: self.window_id,
        }
    }
}
