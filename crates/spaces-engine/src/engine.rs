//! The reconciliation engine.
//!
//! # Write Path (strict order per window)
//!
//! 1. Platform event arrives and is stamped
//! 2. The window's debounce timer is (re)armed
//! 3. On expiry the live window is fetched and reconciled into its session
//! 4. The session row is persisted if durable
//!
//! Rapid bursts (a session restore opening forty tabs) collapse into one
//! reconcile per window.
//!
//! # Startup
//!
//! Initialization runs once, guarded by a single-flight gate; every handler
//! awaits it. A platform restart renumbers window ids, so restart
//! initialization first zeroes every persisted binding, then re-binds saved
//! sessions to live windows purely by tab fingerprint.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use spaces_fingerprint::session_hash;
use spaces_registry::SessionRegistry;
use spaces_store::{NewSession, Session, SessionId, SessionStore, Tab, TabId, WindowBounds, WindowId};

use crate::config::EngineConfig;
use crate::history::{add_url_to_history, remove_url_from_history};
use crate::platform::{
    Platform, PlatformTab, PlatformWindow, TabChange, TabMoveInfo, TabRemoveInfo, TabStatus,
    WindowKind,
};

/// Initialization progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitPhase {
    Never,
    InProgress,
    Done,
}

/// Single-flight gate around initialization.
///
/// The first caller runs the init sequence; concurrent callers wait on the
/// same run; later callers short-circuit. A reset flips the phase back to
/// `Never` so the next caller starts a fresh run.
struct InitGate {
    tx: watch::Sender<InitPhase>,
}

impl InitGate {
    fn new() -> Self {
        let (tx, _) = watch::channel(InitPhase::Never);
        Self { tx }
    }

    /// Attempts to become the runner. Returns true for exactly one caller
    /// per `Never` phase.
    fn try_begin(&self) -> bool {
        let mut began = false;
        self.tx.send_if_modified(|phase| {
            if *phase == InitPhase::Never {
                *phase = InitPhase::InProgress;
                began = true;
                true
            } else {
                false
            }
        });
        began
    }

    fn complete(&self) {
        self.tx.send_replace(InitPhase::Done);
    }

    fn reset(&self) {
        self.tx.send_replace(InitPhase::Never);
    }

    async fn wait_done(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for checks the current value first, so a Done phase returns
        // immediately. The sender lives as long as the engine.
        let _ = rx.wait_for(|phase| *phase == InitPhase::Done).await;
    }
}

/// A pending history edit, applied at the window's next reconcile.
#[derive(Debug, Clone)]
pub(crate) struct HistoryEdit {
    pub url: String,
    pub window_id: WindowId,
    pub action: HistoryAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HistoryAction {
    Add,
    Remove,
}

/// Mutable engine state, guarded by one async mutex.
pub(crate) struct EngineState {
    pub registry: SessionRegistry,
    /// Last-known URL per tab id, kept so a removed tab's URL is still
    /// recoverable (removal events carry only the id).
    pub tab_history_urls: HashMap<TabId, String>,
    /// Window ids observed closing. Never rebound in this process lifetime.
    pub closed_windows: HashSet<WindowId>,
    /// FIFO of pending history edits, drained per window at reconcile time.
    pub history_queue: Vec<HistoryEdit>,
    session_timers: HashMap<WindowId, AbortHandle>,
    bounds_timers: HashMap<WindowId, AbortHandle>,
    /// Monotonic event stamp, for traceability.
    pub event_count: u64,
}

impl EngineState {
    fn new() -> Self {
        Self {
            registry: SessionRegistry::new(),
            tab_history_urls: HashMap::new(),
            closed_windows: HashSet::new(),
            history_queue: Vec::new(),
            session_timers: HashMap::new(),
            bounds_timers: HashMap::new(),
            event_count: 0,
        }
    }
}

struct EngineInner<P> {
    config: EngineConfig,
    platform: P,
    store: SessionStore,
    state: Mutex<EngineState>,
    init: InitGate,
    /// Set by the platform's startup signal; consumed by the next init run.
    restart_pending: AtomicBool,
    /// Mirrors the gate reaching `Done`; gates the registry's store fallback.
    initialized: AtomicBool,
}

/// The space reconciliation engine.
///
/// Cheap to clone; timer tasks hold clones.
pub struct SpaceEngine<P: Platform> {
    inner: Arc<EngineInner<P>>,
}

impl<P: Platform> Clone for SpaceEngine<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Platform> SpaceEngine<P> {
    pub fn new(config: EngineConfig, platform: P, store: SessionStore) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                platform,
                store,
                state: Mutex::new(EngineState::new()),
                init: InitGate::new(),
                restart_pending: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub(crate) fn platform(&self) -> &P {
        &self.inner.platform
    }

    pub(crate) fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub(crate) async fn state(&self) -> tokio::sync::MutexGuard<'_, EngineState> {
        self.inner.state.lock().await
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Shallow copy of the in-memory session list.
    pub async fn sessions(&self) -> Vec<Session> {
        self.ensure_initialized().await;
        self.state().await.registry.get_all()
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// The platform signaled a browser startup: window ids have been
    /// renumbered, so cached and persisted bindings are poison. The next
    /// initialization run clears them before matching.
    pub fn handle_startup(&self) {
        info!("platform startup: scheduling restart initialization");
        self.inner.restart_pending.store(true, Ordering::SeqCst);
        self.inner.initialized.store(false, Ordering::SeqCst);
        self.inner.init.reset();
    }

    /// Awaits initialization, running it if nobody has yet.
    pub async fn ensure_initialized(&self) {
        if self.inner.init.try_begin() {
            self.run_initialization().await;
            self.inner.initialized.store(true, Ordering::SeqCst);
            self.inner.init.complete();
            return;
        }
        self.inner.init.wait_done().await;
    }

    async fn run_initialization(&self) {
        let restart = self.inner.restart_pending.swap(false, Ordering::SeqCst);
        info!(restart, version = %self.inner.config.version, "initializing");

        // 1. Version hook: a version change recomputes every stored
        // fingerprint from its stored tabs.
        match self.inner.store.fetch_version() {
            Ok(previous) => {
                let current = self.inner.config.version.as_str();
                if let Some(previous) = previous {
                    if previous != current {
                        info!(%previous, current, "version changed; resetting session hashes");
                        self.reset_all_session_hashes();
                    }
                }
                if let Err(e) = self.inner.store.save_version(current) {
                    error!(error = %e, "failed to record version");
                }
            }
            Err(e) => error!(error = %e, "failed to read stored version"),
        }

        // 2. Load every saved session into the registry.
        let rows = match self.inner.store.fetch_all() {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "failed to load sessions; starting empty");
                Vec::new()
            }
        };

        {
            let mut state = self.state().await;
            for row in rows {
                state.registry.add_safely(row);
            }

            // 3. Restart: stale bindings are cleared and the cleared rows
            // written back, so a crashed write can't resurrect them.
            if restart {
                let cleared = state.registry.clear_all_windows();
                debug!(count = cleared.len(), "cleared stale window bindings");
                for session in cleared {
                    self.persist(&session);
                }
            }
        }

        // 4. Match every live window.
        let windows = match self.inner.platform.list_windows().await {
            Ok(windows) => windows,
            Err(e) => {
                error!(error = %e, "failed to enumerate windows");
                Vec::new()
            }
        };
        for window in &windows {
            let already_bound = {
                let state = self.state().await;
                state.registry.get_by_window(window.id).is_some()
            };
            if already_bound {
                // Service reactivation: the binding survived in memory.
                continue;
            }
            self.ensure_session(window.id, &window.tabs).await;
        }

        // 5. Seed the tab URL map from every open tab.
        match self.inner.platform.list_tabs().await {
            Ok(tabs) => {
                let mut state = self.state().await;
                for tab in tabs {
                    state.tab_history_urls.insert(tab.id, tab.url);
                }
            }
            Err(e) => error!(error = %e, "failed to enumerate tabs"),
        }

        info!(windows = windows.len(), "initialization complete");
    }

    /// Recomputes every stored session's fingerprint from its stored tabs.
    fn reset_all_session_hashes(&self) {
        let rows = match self.inner.store.fetch_all() {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "failed to load sessions for hash reset");
                return;
            }
        };

        for mut row in rows {
            let recomputed = session_hash(
                row.tabs.iter().map(|t| t.url.as_str()),
                &self.inner.config.extension_id,
            );
            if recomputed != row.session_hash {
                row.session_hash = recomputed;
                self.persist(&row);
            }
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Finds or creates the session for a live window.
    ///
    /// Durable sessions win: an unbound saved session whose fingerprint
    /// matches the window's tabs is re-bound. Otherwise the window gets a
    /// temporary session mirroring it.
    pub(crate) async fn ensure_session(
        &self,
        window_id: WindowId,
        tabs: &[PlatformTab],
    ) -> Option<Session> {
        let hash = session_hash(
            tabs.iter().map(|t| t.url.as_str()),
            &self.inner.config.extension_id,
        );

        let mut state = self.state().await;

        // Double-check: another caller may have raced us here.
        if let Some(existing) = state.registry.get_by_window(window_id) {
            return Some(existing.clone());
        }

        // An unbound saved session with a matching fingerprint claims the
        // window. First match in store order wins.
        let candidate = match self.inner.store.fetch_all() {
            Ok(rows) => rows.into_iter().find(|row| {
                row.session_hash == hash
                    && row.window_id.is_none()
                    && row
                        .id
                        .and_then(|id| state.registry.get_by_id(id))
                        .map_or(true, |cached| cached.window_id.is_none())
            }),
            Err(e) => {
                warn!(error = %e, "store scan failed; window gets a temporary session");
                None
            }
        };

        if let Some(row) = candidate {
            if let Some(id) = row.id {
                debug!(session_id = %id, window_id = %window_id, hash, "matched saved session");
                return self.bind_locked(&mut state, id, window_id);
            }
        }

        let session = NewSession::temporary(
            window_id,
            tabs.iter().map(PlatformTab::to_record).collect(),
            hash,
        )
        .into_session();

        if !state.registry.add_safely(session.clone()) {
            // Lost the race; adopt whichever session claimed the window.
            return state.registry.get_by_window(window_id).cloned();
        }
        debug!(window_id = %window_id, hash, "created temporary session");
        Some(session)
    }

    /// Binds a window to a saved session, displacing whatever held it.
    pub(crate) fn bind_locked(
        &self,
        state: &mut EngineState,
        id: SessionId,
        window_id: WindowId,
    ) -> Option<Session> {
        if let Some(existing) = state.registry.get_by_window(window_id).cloned() {
            if existing.id == Some(id) {
                return Some(existing);
            }
            if existing.is_temporary() {
                state.registry.remove_by_window(window_id);
            } else if let Some(cleared) = state.registry.clear_window(window_id) {
                self.persist(&cleared);
            }
        }

        let bound = state.registry.set_window_by_id(id, window_id)?;
        self.persist(&bound);
        Some(bound)
    }

    // ========================================================================
    // Event handlers
    // ========================================================================

    /// The platform also emits tab-updated for every created tab, so
    /// creation needs no work of its own.
    pub async fn handle_tab_created(&self, _tab: &PlatformTab) {}

    pub async fn handle_tab_updated(&self, tab: &PlatformTab, change: &TabChange) {
        self.ensure_initialized().await;

        let mut state = self.state().await;
        if state.closed_windows.contains(&tab.window_id) {
            return;
        }

        if tab.status == TabStatus::Complete {
            state.tab_history_urls.insert(tab.id, tab.url.clone());
            self.enqueue_window_event_locked(&mut state, tab.window_id);
        }

        if let Some(url) = &change.url {
            // The URL is live again; any historical trace of it is stale.
            state.history_queue.push(HistoryEdit {
                url: url.clone(),
                window_id: tab.window_id,
                action: HistoryAction::Remove,
            });
        }
    }

    pub async fn handle_tab_removed(&self, tab_id: TabId, info: &TabRemoveInfo) {
        self.ensure_initialized().await;

        if info.is_window_closing {
            self.window_removed_inner(info.window_id, true).await;
            return;
        }

        let mut state = self.state().await;
        if state.closed_windows.contains(&info.window_id) {
            return;
        }

        if let Some(url) = state.tab_history_urls.remove(&tab_id) {
            state.history_queue.push(HistoryEdit {
                url,
                window_id: info.window_id,
                action: HistoryAction::Add,
            });
        }
        self.enqueue_window_event_locked(&mut state, info.window_id);
    }

    pub async fn handle_tab_moved(&self, _tab_id: TabId, info: &TabMoveInfo) {
        self.ensure_initialized().await;

        let mut state = self.state().await;
        if state.closed_windows.contains(&info.window_id) {
            return;
        }
        self.enqueue_window_event_locked(&mut state, info.window_id);
    }

    pub async fn handle_window_focus_changed(&self, window_id: WindowId) {
        if !window_id.is_valid() {
            return;
        }
        self.ensure_initialized().await;

        let mut state = self.state().await;
        if state.closed_windows.contains(&window_id) {
            return;
        }
        // Memory only; the next durable write carries it along.
        state
            .registry
            .patch_by_window(window_id, |s| s.last_access = Utc::now());
    }

    pub async fn handle_window_removed(&self, window_id: WindowId) {
        self.ensure_initialized().await;
        self.window_removed_inner(window_id, true).await;
    }

    pub(crate) async fn window_removed_inner(&self, window_id: WindowId, mark_closed: bool) {
        let mut state = self.state().await;

        if state.closed_windows.contains(&window_id) {
            // Duplicate close event.
            return;
        }

        if mark_closed {
            state.closed_windows.insert(window_id);
            if let Some(timer) = state.session_timers.remove(&window_id) {
                timer.abort();
            }
            if let Some(timer) = state.bounds_timers.remove(&window_id) {
                timer.abort();
            }
        }

        let session =
            state
                .registry
                .get_by_window_or_store(window_id, &self.inner.store, self.is_initialized());

        match session {
            Some(session) if session.is_temporary() => {
                debug!(window_id = %window_id, "window closed; dropping temporary session");
                state.registry.remove_by_window(window_id);
            }
            Some(mut session) => {
                // Bounds are kept so the next restoration reuses the geometry.
                debug!(
                    window_id = %window_id,
                    session_id = ?session.id,
                    "window closed; unbinding saved session"
                );
                if let Some(cleared) = state.registry.clear_window(window_id) {
                    self.persist(&cleared);
                } else {
                    session.window_id = None;
                    self.persist(&session);
                }
            }
            None => {}
        }
    }

    pub async fn handle_window_bounds_changed(&self, window_id: WindowId, bounds: WindowBounds) {
        self.ensure_initialized().await;
        self.capture_window_bounds(window_id, bounds).await;
    }

    /// Records new window geometry on the bound saved session.
    ///
    /// The in-memory copy updates immediately; the write is debounced so a
    /// drag produces one store update. No-op for unbound or temporary
    /// sessions.
    pub(crate) async fn capture_window_bounds(&self, window_id: WindowId, bounds: WindowBounds) {
        let mut state = self.state().await;
        if state.closed_windows.contains(&window_id) {
            return;
        }

        let session_id = match state.registry.get_by_window(window_id) {
            Some(session) => match session.id {
                Some(id) => id,
                None => return,
            },
            None => return,
        };

        state
            .registry
            .patch_by_window(window_id, |s| s.window_bounds = Some(bounds));

        if let Some(timer) = state.bounds_timers.remove(&window_id) {
            timer.abort();
        }
        let engine = self.clone();
        let debounce = self.inner.config.bounds_debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            engine.flush_bounds(window_id, session_id).await;
        });
        state.bounds_timers.insert(window_id, handle.abort_handle());
    }

    async fn flush_bounds(&self, window_id: WindowId, session_id: SessionId) {
        let mut state = self.state().await;
        state.bounds_timers.remove(&window_id);
        if state.closed_windows.contains(&window_id) {
            return;
        }
        if let Some(session) = state.registry.get_by_id(session_id).cloned() {
            self.persist(&session);
        }
    }

    // ========================================================================
    // Event coalescing
    // ========================================================================

    /// Arms (or re-arms) the window's debounce timer. Bursts collapse to a
    /// single reconcile per window.
    pub(crate) fn enqueue_window_event_locked(&self, state: &mut EngineState, window_id: WindowId) {
        if let Some(timer) = state.session_timers.remove(&window_id) {
            timer.abort();
        }
        state.event_count += 1;
        debug!(window_id = %window_id, seq = state.event_count, "window event queued");

        let engine = self.clone();
        let debounce = self.inner.config.session_debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            {
                let mut state = engine.state().await;
                state.session_timers.remove(&window_id);
            }
            engine.handle_window_event(window_id).await;
        });
        state.session_timers.insert(window_id, handle.abort_handle());
    }

    /// Reconciles one window's session with the live window.
    pub(crate) async fn handle_window_event(&self, window_id: WindowId) {
        {
            let state = self.state().await;
            if !window_id.is_valid() || state.closed_windows.contains(&window_id) {
                return;
            }
        }

        let window = match self.inner.platform.get_window(window_id).await {
            Ok(window) => window,
            Err(e) => {
                // Stale handle: untangle bindings, but leave the id eligible
                // in case the failure was transient.
                warn!(window_id = %window_id, error = %e, "window fetch failed; unbinding");
                self.window_removed_inner(window_id, false).await;
                return;
            }
        };

        if self.is_internal_window(&window) {
            return;
        }

        let mut state = self.state().await;
        if state.closed_windows.contains(&window_id) {
            return;
        }

        let session =
            state
                .registry
                .get_by_window_or_store(window_id, &self.inner.store, self.is_initialized());

        if let Some(session) = &session {
            // Apply pending history edits, newest first, while the session
            // still holds the pre-event tab list.
            let mut working = session.clone();
            let mut index = state.history_queue.len();
            while index > 0 {
                index -= 1;
                if state.history_queue[index].window_id != window_id {
                    continue;
                }
                let edit = state.history_queue.remove(index);
                match edit.action {
                    HistoryAction::Add => add_url_to_history(
                        &mut working,
                        &edit.url,
                        &self.inner.config.extension_id,
                        self.inner.config.history_limit,
                    ),
                    HistoryAction::Remove => remove_url_from_history(
                        &mut working,
                        &edit.url,
                        &self.inner.config.extension_id,
                    ),
                }
            }

            // The live window is the truth for the tab list.
            working.tabs = window.tabs.iter().map(PlatformTab::to_record).collect();
            working.refresh_hash(&self.inner.config.extension_id);

            let updated = state.registry.patch_by_window(window_id, |s| {
                s.tabs = working.tabs.clone();
                s.history = working.history.clone();
                s.session_hash = working.session_hash;
            });

            if working.id.is_some() {
                self.persist(updated.as_ref().unwrap_or(&working));
            }
        }

        let needs_match = session.as_ref().map_or(true, Session::is_temporary);
        drop(state);

        if needs_match {
            // New window, or a still-unmatched temporary. The double-check
            // inside ensure_session keeps temporaries from duplicating.
            self.ensure_session(window_id, &window.tabs).await;
        }
    }

    /// Internal windows never get sessions: the extension's own single-tab
    /// windows, and popup/panel/app shells.
    pub(crate) fn is_internal_window(&self, window: &PlatformWindow) -> bool {
        let extension_id = &self.inner.config.extension_id;
        if !extension_id.is_empty()
            && window.tabs.len() == 1
            && window.tabs[0].url.contains(extension_id)
        {
            return true;
        }
        matches!(
            window.kind,
            WindowKind::Popup | WindowKind::Panel | WindowKind::App
        )
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Writes a durable session row, logging and swallowing failures.
    /// Temporary sessions are silently skipped.
    pub(crate) fn persist(&self, session: &Session) {
        if session.id.is_none() {
            return;
        }
        if let Err(e) = self.inner.store.update(session) {
            error!(session_id = ?session.id, error = %e, "failed to persist session");
        }
    }

    /// Looks up a session by durable id: registry first, store fallback.
    pub(crate) async fn session_by_id(&self, id: SessionId) -> Option<Session> {
        {
            let state = self.state().await;
            if let Some(session) = state.registry.get_by_id(id) {
                return Some(session.clone());
            }
        }
        match self.inner.store.fetch_by_id(id) {
            Ok(found) => found,
            Err(e) => {
                warn!(session_id = %id, error = %e, "store lookup failed");
                None
            }
        }
    }

    /// Looks up the session bound to a window: registry first, store
    /// fallback once initialized.
    pub(crate) async fn session_by_window(&self, window_id: WindowId) -> Option<Session> {
        let state = self.state().await;
        state
            .registry
            .get_by_window_or_store(window_id, &self.inner.store, self.is_initialized())
    }

    /// Helper for tab conversions used across the API surface.
    pub(crate) fn tab_records(tabs: &[PlatformTab]) -> Vec<Tab> {
        tabs.iter().map(PlatformTab::to_record).collect()
    }
}
