//! End-to-end dispatch over the wire protocol.

use serde_json::Value;

use crate::dispatch::handle_raw;
use crate::tests::harness::TestHarness;

async fn roundtrip(harness: &TestHarness, raw: &str) -> Option<Value> {
    let response = handle_raw(&harness.engine, raw).await?;
    Some(serde_json::from_str(&response).unwrap())
}

#[tokio::test]
async fn malformed_requests_get_no_response() {
    let harness = TestHarness::new();

    assert!(handle_raw(&harness.engine, "not json").await.is_none());
    assert!(handle_raw(&harness.engine, r#"{"action":"no_such_action"}"#)
        .await
        .is_none());
    assert!(
        handle_raw(&harness.engine, r#"{"action":"delete_session"}"#)
            .await
            .is_none(),
        "missing required params are dropped, not answered"
    );
}

#[tokio::test]
async fn save_flow_over_the_wire() {
    let harness = TestHarness::new();
    let wid = harness.platform.add_window(&["https://a.example"]);

    // Ids and booleans arrive as strings and are canonicalized.
    let raw = format!(
        r#"{{"action":"save_new_session","windowId":"{}","name":"work","deleteOld":"false"}}"#,
        wid.0
    );
    let response = roundtrip(&harness, &raw).await.unwrap();

    assert_eq!(response["name"], "work");
    assert_eq!(response["windowId"], wid.0);
    assert!(response["sessionId"].is_number());
    assert_eq!(response["tabs"][0]["url"], "https://a.example");
    // A fresh save has an empty history, not an absent one.
    assert_eq!(response["history"], serde_json::json!([]));
}

#[tokio::test]
async fn conflicting_save_answers_false() {
    let harness = TestHarness::new();
    harness.seed_saved("work", &["https://a.example"]);
    let wid = harness.platform.add_window(&["https://b.example"]);

    let raw = format!(
        r#"{{"action":"save_new_session","windowId":{},"name":"Work"}}"#,
        wid.0
    );
    let response = roundtrip(&harness, &raw).await.unwrap();
    assert_eq!(response, Value::Bool(false));
}

#[tokio::test]
async fn closed_space_serializes_false_sentinels() {
    let harness = TestHarness::new();
    let saved = harness.seed_saved("closed", &["https://a.example"]);

    let raw = format!(
        r#"{{"action":"request_space_from_session_id","sessionId":{}}}"#,
        saved.id.unwrap().0
    );
    let response = roundtrip(&harness, &raw).await.unwrap();

    assert_eq!(response["name"], "closed");
    assert_eq!(response["windowId"], Value::Bool(false));
    assert!(response["sessionId"].is_number());
}

#[tokio::test]
async fn unknown_window_answers_false() {
    let harness = TestHarness::new();
    let response = roundtrip(
        &harness,
        r#"{"action":"request_space_from_window_id","windowId":424242}"#,
    )
    .await
    .unwrap();
    assert_eq!(response, Value::Bool(false));
}

#[tokio::test]
async fn all_spaces_orders_open_before_closed() {
    let harness = TestHarness::new();
    harness.seed_saved("closed", &["https://closed.example"]);
    harness.seed_saved("open", &["https://open.example"]);
    harness.platform.add_window(&["https://open.example"]);

    let response = roundtrip(&harness, r#"{"action":"request_all_spaces"}"#)
        .await
        .unwrap();
    let spaces = response.as_array().unwrap();

    assert_eq!(spaces.len(), 2);
    assert_eq!(spaces[0]["name"], "open");
    assert!(spaces[0]["windowId"].is_number());
    assert_eq!(spaces[1]["name"], "closed");
    assert_eq!(spaces[1]["windowId"], Value::Bool(false));
}

#[tokio::test]
async fn presence_query_over_the_wire() {
    let harness = TestHarness::new();
    harness.seed_saved("work", &["https://a.example"]);

    let response = roundtrip(
        &harness,
        r#"{"action":"request_session_presence","name":"WORK"}"#,
    )
    .await
    .unwrap();

    assert_eq!(response["exists"], true);
    assert_eq!(response["is_open"], false);
}

#[tokio::test]
async fn delete_answers_true_then_false() {
    let harness = TestHarness::new();
    let saved = harness.seed_saved("work", &["https://a.example"]);

    let raw = format!(
        r#"{{"action":"delete_session","sessionId":"{}"}}"#,
        saved.id.unwrap().0
    );
    assert_eq!(
        roundtrip(&harness, &raw).await.unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        roundtrip(&harness, &raw).await.unwrap(),
        Value::Bool(false)
    );
}

#[tokio::test]
async fn restore_from_backup_accepts_false_sentinels() {
    let harness = TestHarness::new();

    let raw = r#"{
        "action": "restore_from_backup",
        "space": {
            "sessionId": false,
            "windowId": false,
            "name": "imported",
            "tabs": [{"url": "https://a.example"}],
            "history": false
        }
    }"#;
    let response = roundtrip(&harness, raw).await.unwrap();

    assert_eq!(response["name"], "imported");
    assert!(response["sessionId"].is_number());
    assert_eq!(response["windowId"], Value::Bool(false));
}

#[tokio::test]
async fn ui_control_actions_pass_through() {
    let harness = TestHarness::new();

    let response = roundtrip(&harness, r#"{"action":"request_show_switcher"}"#)
        .await
        .unwrap();
    assert_eq!(response, Value::String("show_switcher".into()));

    let response = roundtrip(&harness, r#"{"action":"request_close"}"#)
        .await
        .unwrap();
    assert_eq!(response, Value::String("close".into()));
}

#[tokio::test]
async fn popup_params_carry_the_current_space() {
    let harness = TestHarness::new();
    let saved = harness.seed_saved("work", &["https://a.example"]);
    let wid = harness.platform.add_window(&["https://a.example"]);
    harness.platform.set_current(wid);

    let raw = r#"{"action":"generate_popup_params","popupAction":"switch","tabUrl":"https://a.example/page?x=1"}"#;
    let response = roundtrip(&harness, raw).await.unwrap();
    let params = response.as_str().unwrap();

    assert!(params.starts_with("action=switch"));
    assert!(params.contains(&format!("sessionId={}", saved.id.unwrap().0)));
    assert!(params.contains("url=https%3A%2F%2Fa.example%2Fpage%3Fx%3D1"));
}

#[tokio::test]
async fn import_over_the_wire() {
    let harness = TestHarness::new();

    let response = roundtrip(
        &harness,
        r#"{"action":"import_new_session","urlList":["https://a.example"]}"#,
    )
    .await
    .unwrap();

    assert!(response["sessionId"].is_number());
    assert_eq!(response["name"], Value::Bool(false));
    assert_eq!(response["tabs"][0]["url"], "https://a.example");
}
