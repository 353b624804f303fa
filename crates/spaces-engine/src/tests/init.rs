//! Initialization: cold start, restart rebinding, the version hook, and the
//! single-flight barrier.

use spaces_store::{SessionStore, WindowId};

use crate::tests::harness::{TestHarness, VERSION};

#[tokio::test]
async fn cold_start_rebinds_saved_session_by_hash() {
    let harness = TestHarness::new();
    let saved = harness.seed_saved("work", &["https://example.com"]);
    let wid = harness.platform.add_window(&["https://example.com"]);

    let sessions = harness.engine.sessions().await;

    // Exactly one entry for the window: the saved session, rebound. No
    // temporary was created alongside it.
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, saved.id);
    assert_eq!(sessions[0].window_id, Some(wid));

    // The binding was persisted.
    let row = harness
        .engine
        .store()
        .fetch_by_id(saved.id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(row.window_id, Some(wid));
}

#[tokio::test]
async fn unmatched_window_gets_a_temporary_session() {
    let harness = TestHarness::new();
    harness.seed_saved("work", &["https://example.com"]);
    let wid = harness.platform.add_window(&["https://other.example"]);

    let sessions = harness.engine.sessions().await;

    assert_eq!(sessions.len(), 2);
    let temporary = sessions.iter().find(|s| s.is_temporary()).unwrap();
    assert_eq!(temporary.window_id, Some(wid));
    assert_eq!(temporary.tabs.len(), 1);
    assert_eq!(temporary.tabs[0].url, "https://other.example");
}

#[tokio::test]
async fn restart_zeroes_stale_persisted_bindings() {
    let harness = TestHarness::new();
    let mut saved = harness.seed_saved("work", &["https://example.com"]);

    // A binding from the previous browser run survives on disk. Its window
    // id means nothing now.
    saved.window_id = Some(WindowId(999));
    harness.engine.store().update(&saved).unwrap();

    harness.engine.handle_startup();
    let sessions = harness.engine.sessions().await;

    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].window_id.is_none());
    let row = harness
        .engine
        .store()
        .fetch_by_id(saved.id.unwrap())
        .unwrap()
        .unwrap();
    assert!(row.window_id.is_none());
}

#[tokio::test]
async fn restart_rebinds_by_hash_after_clearing() {
    let harness = TestHarness::new();
    let mut saved = harness.seed_saved("work", &["https://example.com"]);
    saved.window_id = Some(WindowId(999));
    harness.engine.store().update(&saved).unwrap();

    // The renumbered window has the same tabs.
    let wid = harness.platform.add_window(&["https://example.com"]);

    harness.engine.handle_startup();
    let sessions = harness.engine.sessions().await;

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, saved.id);
    assert_eq!(sessions[0].window_id, Some(wid));
}

#[tokio::test]
async fn version_change_recomputes_stored_hashes() {
    let store = SessionStore::in_memory().unwrap();
    store.save_version("0.9.9").unwrap();

    let harness = TestHarness::with_store(store);
    let mut saved = harness.seed_saved("work", &["https://example.com"]);
    // Simulate a row hashed by an older algorithm revision.
    saved.session_hash = 1;
    harness.engine.store().update(&saved).unwrap();

    harness.engine.ensure_initialized().await;

    let row = harness
        .engine
        .store()
        .fetch_by_id(saved.id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(row.session_hash, 632_849_614);
    assert_eq!(
        harness.engine.store().fetch_version().unwrap().as_deref(),
        Some(VERSION)
    );
}

#[tokio::test]
async fn first_run_records_version_without_rehashing() {
    let harness = TestHarness::new();
    let mut saved = harness.seed_saved("work", &["https://example.com"]);
    saved.session_hash = 1;
    harness.engine.store().update(&saved).unwrap();

    harness.engine.ensure_initialized().await;

    // No previous version on record: nothing to migrate from.
    let row = harness
        .engine
        .store()
        .fetch_by_id(saved.id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(row.session_hash, 1);
    assert_eq!(
        harness.engine.store().fetch_version().unwrap().as_deref(),
        Some(VERSION)
    );
}

#[tokio::test]
async fn initialization_is_single_flight() {
    let harness = TestHarness::new();
    harness.platform.add_window(&["https://example.com"]);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = harness.engine.clone();
        handles.push(tokio::spawn(async move {
            engine.ensure_initialized().await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // One init run: the platform was enumerated exactly once.
    assert_eq!(harness.platform.list_windows_call_count(), 1);
    assert_eq!(harness.engine.sessions().await.len(), 1);
}

#[tokio::test]
async fn reinitialization_runs_again_after_startup_signal() {
    let harness = TestHarness::new();
    harness.platform.add_window(&["https://example.com"]);

    harness.engine.ensure_initialized().await;
    assert_eq!(harness.platform.list_windows_call_count(), 1);

    // Repeated calls short-circuit.
    harness.engine.ensure_initialized().await;
    assert_eq!(harness.platform.list_windows_call_count(), 1);

    harness.engine.handle_startup();
    harness.engine.ensure_initialized().await;
    assert_eq!(harness.platform.list_windows_call_count(), 2);
}

#[tokio::test]
async fn tab_url_map_is_seeded_from_open_tabs() {
    let harness = TestHarness::new();
    let wid = harness.platform.add_window(&["https://a.example", "https://b.example"]);
    let tab_ids = harness.platform.tab_ids(wid);

    harness.engine.ensure_initialized().await;

    let state = harness.engine.state().await;
    assert_eq!(
        state.tab_history_urls.get(&tab_ids[0]).map(String::as_str),
        Some("https://a.example")
    );
    assert_eq!(
        state.tab_history_urls.get(&tab_ids[1]).map(String::as_str),
        Some("https://b.example")
    );
}

#[tokio::test]
async fn tie_break_is_store_iteration_order() {
    let harness = TestHarness::new();
    let first = harness.seed_saved("first", &["https://example.com"]);
    harness.seed_saved("second", &["https://example.com"]);

    harness.platform.add_window(&["https://example.com"]);

    let sessions = harness.engine.sessions().await;
    let bound: Vec<_> = sessions.iter().filter(|s| s.is_open()).collect();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].id, first.id, "lowest id wins: store order");
}
