//! # Spaces Engine
//!
//! The space reconciliation engine: binds live browser windows to saved
//! sessions and keeps both sides consistent under a stream of asynchronous
//! tab and window events.
//!
//! ## Non-negotiable Principles
//!
//! - **At most one session per window, one window per session** - The
//!   registry's indices enforce both at every mutation
//! - **A closed window never rebinds** - Window ids observed closing go into
//!   a closed set for the life of the process
//! - **Matching is by fingerprint only** - A saved session reattaches to a
//!   window exactly when the window's cleaned tab URLs hash to the stored
//!   fingerprint
//! - **Store failures degrade, never propagate** - The UI sees `false`; the
//!   engine logs and keeps going
//!
//! ## Architecture
//!
//! ```text
//! EVENT:
//!   platform event → debounce (1 s per window) → reconcile → store write
//!
//! STARTUP:
//!   version hook → load sessions → clear stale bindings → match by hash
//!
//! UI:
//!   request → canonicalize → engine op → space view | false
//! ```
//!
//! ## Crate Structure
//!
//! - [`engine`] - The engine itself: initialization, matching, event handlers
//! - [`platform`] - The browser platform seam
//! - [`config`] - Engine configuration
//! - [`dispatch`] - Protocol request dispatcher

mod api;
pub mod config;
pub mod dispatch;
mod engine;
mod history;
pub mod logging;
pub mod platform;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use engine::SpaceEngine;
pub use platform::{
    Platform, PlatformError, PlatformTab, PlatformWindow, TabChange, TabMoveInfo, TabRemoveInfo,
    TabStatus, WindowKind,
};

use spaces_store::{SessionId, StoreError, WindowId};

/// Errors that can occur in the engine.
///
/// Store and platform failures are usually absorbed inside the event
/// handlers; these surface only from the user-facing mutation API, where the
/// dispatcher turns them into a `false` response.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Another saved session already uses this name.
    #[error("name already in use: {0}")]
    NameConflict(String),

    /// Saving over a window that is already bound to a saved session would
    /// corrupt it.
    #[error("window {0} is already bound to a saved session")]
    WindowAlreadyBound(WindowId),

    /// The named session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// A switch/open request named neither a session nor a window.
    #[error("no session or window to act on")]
    MissingTarget,

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Platform error.
    #[error(transparent)]
    Platform(#[from] crate::platform::PlatformError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
