//! History edits applied while reconciling a window.
//!
//! Recently-closed tabs are not written into a session the moment they
//! close. Edits queue up and are applied, newest first, when the window's
//! debounced reconcile runs, while the session still holds the pre-close tab
//! list. That ordering is what the uniqueness guard below relies on.

use spaces_fingerprint::clean_url;
use spaces_store::Session;

/// Records a just-closed tab in the session's history.
///
/// The tab must still be present in `session.tabs` exactly once. Zero
/// matches means the URL was never part of this session; more than one
/// match means a mass-close is in flight and picking a record would be a
/// guess, so the edit is skipped entirely.
pub(crate) fn add_url_to_history(
    session: &mut Session,
    raw_url: &str,
    extension_id: &str,
    limit: usize,
) {
    let cleaned = clean_url(raw_url, extension_id);
    if cleaned.is_empty() {
        return;
    }

    let mut matches = session
        .tabs
        .iter()
        .filter(|t| clean_url(&t.url, extension_id) == cleaned);
    let record = match (matches.next(), matches.next()) {
        (Some(tab), None) => tab.clone(),
        _ => return,
    };

    session
        .history
        .retain(|t| clean_url(&t.url, extension_id) != cleaned);
    session.history.insert(0, record);
    session.history.truncate(limit);
}

/// Deletes every history entry matching the URL. Runs when the URL becomes
/// live again in some tab.
pub(crate) fn remove_url_from_history(session: &mut Session, raw_url: &str, extension_id: &str) {
    let cleaned = clean_url(raw_url, extension_id);
    session
        .history
        .retain(|t| clean_url(&t.url, extension_id) != cleaned);
}
