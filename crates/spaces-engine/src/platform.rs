//! The browser platform seam.
//!
//! The engine never talks to the browser directly; everything goes through
//! [`Platform`]. Production wires this to the real extension APIs, tests use
//! the scripted mock in the test harness.

use async_trait::async_trait;
use spaces_store::{Tab, TabId, WindowBounds, WindowId};

/// Load state of a live tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
}

/// A live tab as reported by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformTab {
    pub id: TabId,
    pub window_id: WindowId,
    pub url: String,
    pub title: String,
    pub pinned: bool,
    pub fav_icon_url: Option<String>,
    pub status: TabStatus,
}

impl PlatformTab {
    /// Reshapes the platform tab into the record kept in sessions.
    ///
    /// Only the fields the engine and UI actually use survive; the rest of
    /// the platform object is deliberately dropped here to keep saved rows
    /// decoupled from the platform's object shape.
    pub fn to_record(&self) -> Tab {
        Tab {
            id: Some(self.id),
            url: self.url.clone(),
            title: self.title.clone(),
            pinned: self.pinned,
            fav_icon_url: self.fav_icon_url.clone(),
            platform_fields: serde_json::Map::new(),
        }
    }
}

/// Window type as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Normal,
    Popup,
    Panel,
    App,
}

/// A live window with its populated tab list.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformWindow {
    pub id: WindowId,
    pub kind: WindowKind,
    pub focused: bool,
    pub bounds: Option<WindowBounds>,
    pub tabs: Vec<PlatformTab>,
}

/// The delta delivered with a tab-updated event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabChange {
    pub url: Option<String>,
    pub status: Option<TabStatus>,
}

/// The context delivered with a tab-removed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabRemoveInfo {
    pub window_id: WindowId,
    pub is_window_closing: bool,
}

/// The context delivered with a tab-moved event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabMoveInfo {
    pub window_id: WindowId,
}

/// Platform error type.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The window id is unknown to the platform. Treated as transient: the
    /// handle may be stale mid-close, so the id is cleaned up but not
    /// blacklisted.
    #[error("window not found: {0}")]
    WindowNotFound(WindowId),

    /// The tab id is unknown to the platform.
    #[error("tab not found: {0}")]
    TabNotFound(TabId),

    /// The platform API is unavailable or failed.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Browser platform operations the engine depends on.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// Id of the currently focused window.
    async fn current_window_id(&self) -> Result<WindowId, PlatformError>;

    /// Fetches a window with its populated tab list.
    async fn get_window(&self, id: WindowId) -> Result<PlatformWindow, PlatformError>;

    /// Enumerates every live window, populated.
    async fn list_windows(&self) -> Result<Vec<PlatformWindow>, PlatformError>;

    /// Enumerates every live tab across all windows.
    async fn list_tabs(&self) -> Result<Vec<PlatformTab>, PlatformError>;

    /// Fetches a single tab.
    async fn get_tab(&self, id: TabId) -> Result<PlatformTab, PlatformError>;

    /// Opens a new window containing the given URLs.
    async fn create_window(
        &self,
        urls: Vec<String>,
        bounds: Option<WindowBounds>,
    ) -> Result<PlatformWindow, PlatformError>;

    /// Focuses a window.
    async fn focus_window(&self, id: WindowId) -> Result<(), PlatformError>;

    /// Focuses a tab (and raises its window).
    async fn focus_tab(&self, id: TabId) -> Result<(), PlatformError>;

    /// Creates a tab in a window.
    async fn create_tab(
        &self,
        window: WindowId,
        url: String,
        active: bool,
    ) -> Result<PlatformTab, PlatformError>;

    /// Moves a tab into another window.
    async fn move_tab(&self, tab: TabId, window: WindowId) -> Result<(), PlatformError>;

    /// Closes a tab.
    async fn remove_tab(&self, tab: TabId) -> Result<(), PlatformError>;
}
