//! # Spaces Registry
//!
//! In-memory authoritative mirror of sessions and their window bindings.
//!
//! The registry is an insertion-ordered container with two indices kept in
//! lockstep: by session id (durable sessions only) and by window id (open
//! sessions only). The indices make the two cardinality invariants cheap to
//! enforce at the door:
//!
//! - no two entries share a session id;
//! - no two entries share a window id.
//!
//! Window bindings only change through [`SessionRegistry::set_window_by_id`],
//! [`SessionRegistry::clear_window`], and the removal operations, so the
//! window index can never silently drift from entry state. Field patches via
//! [`SessionRegistry::patch_by_id`] / [`SessionRegistry::patch_by_window`]
//! deliberately have no access to the identity fields.

use std::collections::{BTreeMap, HashMap};

use spaces_store::{Session, SessionId, SessionStore, WindowId};
use tracing::{debug, error, warn};

/// Insertion-order slot key. Private to the registry.
type Slot = u64;

/// The authoritative in-memory session list.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_slot: Slot,
    /// Insertion-ordered entries. BTreeMap iteration order is slot order.
    entries: BTreeMap<Slot, Session>,
    by_id: HashMap<SessionId, Slot>,
    by_window: HashMap<WindowId, Slot>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the session with the given id, if cached.
    pub fn get_by_id(&self, id: SessionId) -> Option<&Session> {
        self.by_id.get(&id).and_then(|slot| self.entries.get(slot))
    }

    /// Returns the session bound to the given window, if any.
    pub fn get_by_window(&self, window_id: WindowId) -> Option<&Session> {
        self.by_window
            .get(&window_id)
            .and_then(|slot| self.entries.get(slot))
    }

    /// Window lookup with explicit store fallback.
    ///
    /// Memory wins. Once the engine is initialized the mirror is assumed
    /// complete, so a miss also consults the store's persisted bindings
    /// (which can still name a window the mirror lost, e.g. after a failed
    /// add). Store failures degrade to a miss.
    pub fn get_by_window_or_store(
        &self,
        window_id: WindowId,
        store: &SessionStore,
        initialized: bool,
    ) -> Option<Session> {
        if let Some(session) = self.get_by_window(window_id) {
            return Some(session.clone());
        }
        if !initialized {
            return None;
        }
        match store.fetch_by_window_id(window_id) {
            Ok(found) => found,
            Err(e) => {
                warn!(window_id = %window_id, error = %e, "store fallback lookup failed");
                None
            }
        }
    }

    /// Shallow copy of every entry, in insertion order.
    pub fn get_all(&self) -> Vec<Session> {
        self.entries.values().cloned().collect()
    }

    /// Adds a session unless it would duplicate an id or a window binding.
    ///
    /// Returns whether the session was added. An id duplicate indicates a
    /// logic bug somewhere above and is logged as an error; a window
    /// duplicate is an expected race outcome and is only debug-logged.
    pub fn add_safely(&mut self, session: Session) -> bool {
        if let Some(id) = session.id {
            if self.by_id.contains_key(&id) {
                error!(session_id = %id, "registry already holds this session id");
                return false;
            }
        }
        if let Some(wid) = session.window_id {
            if self.by_window.contains_key(&wid) {
                debug!(window_id = %wid, "registry already holds a session for this window");
                return false;
            }
        }

        let slot = self.next_slot;
        self.next_slot += 1;

        if let Some(id) = session.id {
            self.by_id.insert(id, slot);
        }
        if let Some(wid) = session.window_id {
            self.by_window.insert(wid, slot);
        }
        self.entries.insert(slot, session);
        true
    }

    /// Splices out the session with the given id.
    pub fn remove_by_id(&mut self, id: SessionId) -> bool {
        let Some(slot) = self.by_id.remove(&id) else {
            return false;
        };
        if let Some(session) = self.entries.remove(&slot) {
            if let Some(wid) = session.window_id {
                self.by_window.remove(&wid);
            }
        }
        true
    }

    /// Splices out the session bound to the given window, returning it.
    pub fn remove_by_window(&mut self, window_id: WindowId) -> Option<Session> {
        let slot = self.by_window.remove(&window_id)?;
        let session = self.entries.remove(&slot)?;
        if let Some(id) = session.id {
            self.by_id.remove(&id);
        }
        Some(session)
    }

    /// Binds a window to the session with the given id.
    ///
    /// The window must not be bound to a different entry; callers clear
    /// competing bindings first. Returns the updated session.
    pub fn set_window_by_id(&mut self, id: SessionId, window_id: WindowId) -> Option<Session> {
        let slot = *self.by_id.get(&id)?;

        if let Some(&other) = self.by_window.get(&window_id) {
            if other != slot {
                error!(
                    session_id = %id,
                    window_id = %window_id,
                    "refusing to bind: window already bound to another session"
                );
                return None;
            }
        }

        let session = self.entries.get_mut(&slot)?;
        if let Some(old) = session.window_id {
            self.by_window.remove(&old);
        }
        session.window_id = Some(window_id);
        self.by_window.insert(window_id, slot);
        Some(session.clone())
    }

    /// Clears the window binding of the session bound to `window_id`.
    ///
    /// Returns the updated session. The entry itself is kept; for temporary
    /// sessions use [`SessionRegistry::remove_by_window`] instead.
    pub fn clear_window(&mut self, window_id: WindowId) -> Option<Session> {
        let slot = self.by_window.remove(&window_id)?;
        let session = self.entries.get_mut(&slot)?;
        session.window_id = None;
        Some(session.clone())
    }

    /// Clears every window binding and returns the updated sessions.
    ///
    /// Used at restart initialization: window ids are renumbered by the
    /// platform, so every cached binding is stale.
    pub fn clear_all_windows(&mut self) -> Vec<Session> {
        let cleared: Vec<Slot> = self.by_window.drain().map(|(_, slot)| slot).collect();
        let mut updated = Vec::with_capacity(cleared.len());
        for slot in cleared {
            if let Some(session) = self.entries.get_mut(&slot) {
                session.window_id = None;
                updated.push(session.clone());
            }
        }
        updated
    }

    /// Patches the session with the given id in place.
    ///
    /// The patch must not touch `id` or `window_id`; identity changes go
    /// through the dedicated operations so the indices stay consistent.
    pub fn patch_by_id(
        &mut self,
        id: SessionId,
        patch: impl FnOnce(&mut Session),
    ) -> Option<Session> {
        let slot = *self.by_id.get(&id)?;
        let session = self.entries.get_mut(&slot)?;
        apply_patch(session, patch);
        Some(session.clone())
    }

    /// Patches the session bound to the given window in place.
    pub fn patch_by_window(
        &mut self,
        window_id: WindowId,
        patch: impl FnOnce(&mut Session),
    ) -> Option<Session> {
        let slot = *self.by_window.get(&window_id)?;
        let session = self.entries.get_mut(&slot)?;
        apply_patch(session, patch);
        Some(session.clone())
    }

    /// Reference-preserving update from a store row.
    ///
    /// Finds the cached entry by id and patches its fields in place so the
    /// entry keeps its slot (and therefore its insertion position). If the
    /// row is not cached, a warning is logged and the row is returned
    /// without caching.
    pub fn sync_from_store(&mut self, row: Session) -> Session {
        let Some(id) = row.id else {
            warn!("store row without id cannot be synced into the registry");
            return row;
        };
        let Some(&slot) = self.by_id.get(&id) else {
            warn!(session_id = %id, "store row not present in registry; returning uncached");
            return row;
        };

        // Re-index the window binding if the row moved it.
        let old_window = self.entries.get(&slot).and_then(|s| s.window_id);
        if old_window != row.window_id {
            if let Some(old) = old_window {
                self.by_window.remove(&old);
            }
            if let Some(new) = row.window_id {
                self.by_window.insert(new, slot);
            }
        }

        self.entries.insert(slot, row.clone());
        row
    }

    /// Promotes the temporary session bound to `window_id` to the stored row.
    ///
    /// The entry keeps its slot; the id index gains the new id.
    pub fn promote_by_window(&mut self, window_id: WindowId, row: Session) -> Option<Session> {
        let slot = *self.by_window.get(&window_id)?;
        if let Some(id) = row.id {
            self.by_id.insert(id, slot);
        }
        self.entries.insert(slot, row.clone());
        Some(row)
    }
}

fn apply_patch(session: &mut Session, patch: impl FnOnce(&mut Session)) {
    let id = session.id;
    let window_id = session.window_id;
    patch(session);
    debug_assert_eq!(id, session.id, "patch must not change session id");
    debug_assert_eq!(
        window_id, session.window_id,
        "patch must not change window binding"
    );
    // Restore identity fields if a patch misbehaved in release builds.
    session.id = id;
    session.window_id = window_id;
}
