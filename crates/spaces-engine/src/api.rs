//! User-facing operations: saving, renaming, deleting, opening, and
//! reshuffling spaces.
//!
//! Everything here awaits initialization, then works through the registry
//! and store exactly like the event handlers do. Failures surface as typed
//! [`EngineError`]s; the dispatcher flattens them to the wire's `false`.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use spaces_fingerprint::{clean_url, session_hash};
use spaces_protocol::SessionPresence;
use spaces_store::{NewSession, Session, SessionId, Tab, TabId, WindowBounds, WindowId};

use crate::engine::SpaceEngine;
use crate::platform::Platform;
use crate::{EngineError, EngineResult};

impl<P: Platform> SpaceEngine<P> {
    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether a saved session with this name exists, and whether it is
    /// currently open in a window.
    pub async fn session_presence(&self, name: &str) -> SessionPresence {
        self.ensure_initialized().await;

        let row = match self.store().fetch_by_name(name) {
            Ok(row) => row,
            Err(e) => {
                warn!(name, error = %e, "presence lookup failed");
                None
            }
        };

        match row {
            Some(session) => {
                // The registry's copy of the binding is fresher than the row.
                let is_open = match session.id {
                    Some(id) => self
                        .session_by_id(id)
                        .await
                        .is_some_and(|cached| cached.is_open()),
                    None => session.is_open(),
                };
                SessionPresence {
                    exists: true,
                    is_open,
                }
            }
            None => SessionPresence {
                exists: false,
                is_open: false,
            },
        }
    }

    /// The space bound to a window, if any.
    pub async fn space_for_window(&self, window_id: WindowId) -> Option<Session> {
        self.ensure_initialized().await;
        self.session_by_window(window_id).await
    }

    /// The space of the currently focused window.
    pub async fn current_space(&self) -> Option<Session> {
        self.ensure_initialized().await;
        let window_id = match self.platform().current_window_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "no current window");
                return None;
            }
        };
        self.session_by_window(window_id).await
    }

    /// A saved space by id.
    pub async fn space_for_session(&self, id: SessionId) -> Option<Session> {
        self.ensure_initialized().await;
        self.session_by_id(id).await
    }

    /// Every space with at least one tab: open spaces first, then closed,
    /// most recently used first within each group.
    pub async fn all_spaces(&self) -> Vec<Session> {
        self.ensure_initialized().await;

        let mut spaces: Vec<Session> = self
            .state()
            .await
            .registry
            .get_all()
            .into_iter()
            .filter(|s| !s.tabs.is_empty())
            .collect();

        spaces.sort_by(|a, b| {
            b.is_open()
                .cmp(&a.is_open())
                .then(b.last_access.cmp(&a.last_access))
        });
        spaces
    }

    /// Detail of a live tab, reshaped to the record the UI understands.
    pub async fn tab_detail(&self, tab_id: TabId) -> Option<Tab> {
        self.ensure_initialized().await;
        match self.platform().get_tab(tab_id).await {
            Ok(tab) => Some(tab.to_record()),
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e, "tab detail lookup failed");
                None
            }
        }
    }

    // ========================================================================
    // Saving and naming
    // ========================================================================

    /// Saves a window's current tabs under a name.
    ///
    /// A window already bound to a saved session is rejected: saving over it
    /// would corrupt existing data. A window bound to a temporary session
    /// promotes that session in place.
    pub async fn save_new_session(
        &self,
        name: &str,
        tabs: Vec<Tab>,
        window_id: Option<WindowId>,
        bounds: Option<WindowBounds>,
        delete_old: bool,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;
        self.arbitrate_name(name, None, delete_old).await?;

        let mut state = self.state().await;

        let reuse_temporary = match window_id {
            Some(wid) => match state.registry.get_by_window_or_store(
                wid,
                self.store(),
                self.is_initialized(),
            ) {
                Some(existing) if !existing.is_temporary() => {
                    error!(
                        window_id = %wid,
                        session_id = ?existing.id,
                        "refusing to save over a saved session"
                    );
                    return Err(EngineError::WindowAlreadyBound(wid));
                }
                Some(_) => true,
                None => false,
            },
            None => false,
        };

        let hash = session_hash(
            tabs.iter().map(|t| t.url.as_str()),
            &self.config().extension_id,
        );
        let row = self.store().create(NewSession {
            name: Some(name.to_string()),
            session_hash: hash,
            tabs,
            history: Vec::new(),
            last_access: Utc::now(),
            window_bounds: bounds,
            window_id,
        })?;

        let cached = match window_id {
            Some(wid) if reuse_temporary => state.registry.promote_by_window(wid, row.clone()),
            Some(wid) => {
                if state.registry.add_safely(row.clone()) {
                    Some(row.clone())
                } else {
                    // Raced: another session claimed the window meanwhile.
                    state.registry.get_by_window(wid).cloned()
                }
            }
            None => {
                state.registry.add_safely(row.clone());
                Some(row.clone())
            }
        };

        info!(session_id = ?row.id, name, "saved new session");
        Ok(cached.unwrap_or(row))
    }

    /// Saves the focused window's tabs under a name. Protocol entry point
    /// for `save_new_session`.
    pub async fn save_window_as_session(
        &self,
        window_id: WindowId,
        name: &str,
        delete_old: bool,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;
        let window = self.platform().get_window(window_id).await?;
        self.save_new_session(
            name,
            Self::tab_records(&window.tabs),
            Some(window_id),
            window.bounds,
            delete_old,
        )
        .await
    }

    /// Renames a saved session, arbitrating name conflicts.
    ///
    /// A different session already holding the name fails the rename unless
    /// `delete_old` opts into deleting it. Renaming a session to its own
    /// name (capitalization changes) needs no arbitration.
    pub async fn update_session_name(
        &self,
        id: SessionId,
        new_name: &str,
        delete_old: bool,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;
        self.arbitrate_name(new_name, Some(id), delete_old).await?;

        let name = new_name.to_string();
        let patched = {
            let mut state = self.state().await;
            state.registry.patch_by_id(id, |s| s.name = Some(name.clone()))
        };

        let updated = match patched {
            Some(session) => session,
            None => {
                let mut row = self
                    .store()
                    .fetch_by_id(id)?
                    .ok_or(EngineError::SessionNotFound(id))?;
                row.name = Some(name);
                row
            }
        };

        let row = self.store().update(&updated)?;
        info!(session_id = %id, name = %new_name, "renamed session");
        Ok(row)
    }

    /// Persists an externally edited session and syncs the cached copy.
    pub async fn save_existing_session(&self, session: &Session) -> EngineResult<Session> {
        self.ensure_initialized().await;
        let row = self.store().update(session)?;
        let mut state = self.state().await;
        Ok(state.registry.sync_from_store(row))
    }

    /// Deletes a saved session. Returns whether a row was removed.
    pub async fn delete_session(&self, id: SessionId) -> EngineResult<bool> {
        self.ensure_initialized().await;
        let removed = self.store().remove(id)?;
        if removed {
            let mut state = self.state().await;
            state.registry.remove_by_id(id);
            info!(session_id = %id, "deleted session");
        }
        Ok(removed)
    }

    /// Replaces a saved session's tabs and refreshes its fingerprint.
    pub async fn update_session_tabs(&self, id: SessionId, tabs: Vec<Tab>) -> EngineResult<Session> {
        self.ensure_initialized().await;

        let extension_id = self.config().extension_id.clone();
        let patched = {
            let mut state = self.state().await;
            state.registry.patch_by_id(id, |s| {
                s.tabs = tabs.clone();
                s.refresh_hash(&extension_id);
            })
        };

        let updated = match patched {
            Some(session) => session,
            None => {
                let mut row = self
                    .store()
                    .fetch_by_id(id)?
                    .ok_or(EngineError::SessionNotFound(id))?;
                row.tabs = tabs;
                row.refresh_hash(&extension_id);
                row
            }
        };

        self.store().update(&updated)?;
        Ok(updated)
    }

    /// Creates a saved session from a backup snapshot. Name conflicts follow
    /// the rename policy.
    pub async fn restore_from_backup(
        &self,
        name: Option<String>,
        tabs: Vec<Tab>,
        history: Vec<Tab>,
        delete_old: bool,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;
        if let Some(name) = &name {
            self.arbitrate_name(name, None, delete_old).await?;
        }

        let hash = session_hash(
            tabs.iter().map(|t| t.url.as_str()),
            &self.config().extension_id,
        );
        let row = self.store().create(NewSession {
            name,
            session_hash: hash,
            tabs,
            history,
            last_access: Utc::now(),
            window_bounds: None,
            window_id: None,
        })?;

        let mut state = self.state().await;
        state.registry.add_safely(row.clone());
        info!(session_id = ?row.id, "restored session from backup");
        Ok(row)
    }

    /// Creates an unnamed saved session from a list of URLs.
    pub async fn import_new_session(&self, urls: Vec<String>) -> EngineResult<Session> {
        self.ensure_initialized().await;

        let tabs: Vec<Tab> = urls.into_iter().map(Tab::from_url).collect();
        let hash = session_hash(
            tabs.iter().map(|t| t.url.as_str()),
            &self.config().extension_id,
        );
        let row = self.store().create(NewSession {
            name: None,
            session_hash: hash,
            tabs,
            history: Vec::new(),
            last_access: Utc::now(),
            window_bounds: None,
            window_id: None,
        })?;

        let mut state = self.state().await;
        state.registry.add_safely(row.clone());
        Ok(row)
    }

    /// Fails with [`EngineError::NameConflict`] when a *different* session
    /// holds the name, unless `delete_old` opts into deleting it first.
    async fn arbitrate_name(
        &self,
        name: &str,
        own_id: Option<SessionId>,
        delete_old: bool,
    ) -> EngineResult<()> {
        let existing = match self.store().fetch_by_name(name) {
            Ok(existing) => existing,
            Err(e) => {
                warn!(name, error = %e, "name lookup failed; proceeding");
                None
            }
        };

        let Some(existing) = existing else {
            return Ok(());
        };
        if existing.id.is_some() && existing.id == own_id {
            return Ok(());
        }

        if !delete_old {
            debug!(name, other = ?existing.id, "name conflict");
            return Err(EngineError::NameConflict(name.to_string()));
        }
        if let Some(other) = existing.id {
            self.delete_session(other).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Opening and switching
    // ========================================================================

    /// Opens a saved space: focuses its window if it has one, otherwise
    /// opens a new window from the stored tabs (reusing saved geometry) and
    /// binds it.
    pub async fn load_session(
        &self,
        id: SessionId,
        tab_url: Option<&str>,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;

        let session = self
            .session_by_id(id)
            .await
            .ok_or(EngineError::SessionNotFound(id))?;

        if let Some(window_id) = session.window_id {
            return self.load_window(window_id, tab_url).await;
        }

        let urls: Vec<String> = session.tabs.iter().map(|t| t.url.clone()).collect();
        let window = self
            .platform()
            .create_window(urls, session.window_bounds)
            .await?;

        let bound = {
            let mut state = self.state().await;
            self.bind_locked(&mut state, id, window.id)
        };

        if let Some(url) = tab_url {
            self.focus_tab_matching(&window.tabs, url).await;
        }

        info!(session_id = %id, window_id = %window.id, "opened saved session");
        Ok(bound.unwrap_or(session))
    }

    /// Focuses a live window, optionally focusing one of its tabs by URL.
    pub async fn load_window(
        &self,
        window_id: WindowId,
        tab_url: Option<&str>,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;

        self.platform().focus_window(window_id).await?;
        if let Some(url) = tab_url {
            if let Ok(window) = self.platform().get_window(window_id).await {
                self.focus_tab_matching(&window.tabs, url).await;
            }
        }

        match self.session_by_window(window_id).await {
            Some(session) => Ok(session),
            None => {
                // Focused fine, but no session mirrors it yet; let matching
                // catch up like any other window event would.
                match self.platform().get_window(window_id).await {
                    Ok(window) => self
                        .ensure_session(window_id, &window.tabs)
                        .await
                        .ok_or(EngineError::MissingTarget),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Switches to a space by session id or window id.
    pub async fn switch_to_space(
        &self,
        session_id: Option<SessionId>,
        window_id: Option<WindowId>,
    ) -> EngineResult<Session> {
        match (session_id, window_id) {
            (_, Some(window_id)) => self.load_window(window_id, None).await,
            (Some(session_id), None) => self.load_session(session_id, None).await,
            (None, None) => Err(EngineError::MissingTarget),
        }
    }

    async fn focus_tab_matching(&self, tabs: &[crate::platform::PlatformTab], url: &str) {
        let extension_id = &self.config().extension_id;
        let wanted = clean_url(url, extension_id);
        let found = tabs
            .iter()
            .find(|t| t.url == url || (!wanted.is_empty() && clean_url(&t.url, extension_id) == wanted));
        if let Some(tab) = found {
            if let Err(e) = self.platform().focus_tab(tab.id).await {
                warn!(tab_id = %tab.id, error = %e, "failed to focus tab");
            }
        }
    }

    // ========================================================================
    // Tab and link placement
    // ========================================================================

    /// Moves a live tab into a space: into its window when open, into the
    /// stored tab list when closed.
    pub async fn move_tab_to_session(
        &self,
        tab_id: TabId,
        session_id: SessionId,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;

        let target = self
            .session_by_id(session_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;

        if let Some(window_id) = target.window_id {
            self.platform().move_tab(tab_id, window_id).await?;
            return Ok(self.session_by_id(session_id).await.unwrap_or(target));
        }

        let tab = self.platform().get_tab(tab_id).await?;
        self.platform().remove_tab(tab_id).await?;
        self.append_tab_to_closed_session(session_id, tab.to_record())
            .await
    }

    /// Adds a link to a space: as a background tab when open, appended to
    /// the stored tab list when closed.
    pub async fn add_link_to_session(
        &self,
        url: &str,
        session_id: SessionId,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;

        let target = self
            .session_by_id(session_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;

        if let Some(window_id) = target.window_id {
            self.platform()
                .create_tab(window_id, url.to_string(), false)
                .await?;
            return Ok(self.session_by_id(session_id).await.unwrap_or(target));
        }

        self.append_tab_to_closed_session(session_id, Tab::from_url(url))
            .await
    }

    /// Moves a live tab into another live window.
    pub async fn move_tab_to_window(
        &self,
        tab_id: TabId,
        window_id: WindowId,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;
        self.platform().move_tab(tab_id, window_id).await?;
        self.session_by_window(window_id)
            .await
            .ok_or(EngineError::MissingTarget)
    }

    /// Opens a link as a background tab of a live window.
    pub async fn add_link_to_window(&self, url: &str, window_id: WindowId) -> EngineResult<Session> {
        self.ensure_initialized().await;
        self.platform()
            .create_tab(window_id, url.to_string(), false)
            .await?;
        self.session_by_window(window_id)
            .await
            .ok_or(EngineError::MissingTarget)
    }

    /// Detaches a live tab into a brand-new named space.
    pub async fn move_tab_to_new_session(
        &self,
        tab_id: TabId,
        name: &str,
    ) -> EngineResult<Session> {
        self.ensure_initialized().await;
        self.arbitrate_name(name, None, false).await?;

        let tab = self.platform().get_tab(tab_id).await?;
        self.platform().remove_tab(tab_id).await?;
        self.create_closed_session(Some(name.to_string()), vec![tab.to_record()])
            .await
    }

    /// Files a link into a brand-new named space.
    pub async fn add_link_to_new_session(&self, url: &str, name: &str) -> EngineResult<Session> {
        self.ensure_initialized().await;
        self.arbitrate_name(name, None, false).await?;
        self.create_closed_session(Some(name.to_string()), vec![Tab::from_url(url)])
            .await
    }

    async fn append_tab_to_closed_session(
        &self,
        session_id: SessionId,
        record: Tab,
    ) -> EngineResult<Session> {
        let extension_id = self.config().extension_id.clone();
        let patched = {
            let mut state = self.state().await;
            state.registry.patch_by_id(session_id, |s| {
                s.tabs.push(record.clone());
                s.refresh_hash(&extension_id);
            })
        };

        let updated = match patched {
            Some(session) => session,
            None => {
                let mut row = self
                    .store()
                    .fetch_by_id(session_id)?
                    .ok_or(EngineError::SessionNotFound(session_id))?;
                row.tabs.push(record);
                row.refresh_hash(&extension_id);
                row
            }
        };

        self.store().update(&updated)?;
        Ok(updated)
    }

    async fn create_closed_session(
        &self,
        name: Option<String>,
        tabs: Vec<Tab>,
    ) -> EngineResult<Session> {
        let hash = session_hash(
            tabs.iter().map(|t| t.url.as_str()),
            &self.config().extension_id,
        );
        let row = self.store().create(NewSession {
            name,
            session_hash: hash,
            tabs,
            history: Vec::new(),
            last_access: Utc::now(),
            window_bounds: None,
            window_id: None,
        })?;

        let mut state = self.state().await;
        state.registry.add_safely(row.clone());
        Ok(row)
    }

    // ========================================================================
    // Popup parameters
    // ========================================================================

    /// Builds the query-string parameters the popup shell is opened with.
    /// Identifies the current space by session id when saved, else by
    /// window id.
    pub async fn generate_popup_params(
        &self,
        popup_action: &str,
        tab_url: Option<&str>,
    ) -> String {
        self.ensure_initialized().await;

        let mut params = format!("action={popup_action}");
        if let Some(space) = self.current_space().await {
            if let Some(id) = space.id {
                params.push_str(&format!("&sessionId={id}"));
            } else if let Some(window_id) = space.window_id {
                params.push_str(&format!("&windowId={window_id}"));
            }
        }
        if let Some(url) = tab_url {
            let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
            params.push_str(&format!("&url={encoded}"));
        }
        params
    }
}
