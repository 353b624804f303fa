//! Request messages from the UI layers.

use serde::{Deserialize, Serialize};
use spaces_store::{SessionId, TabId, WindowId};
use tracing::debug;

use crate::params;
use crate::view::SpaceView;

/// A UI request, tagged by its `action` discriminant.
///
/// Query actions are read-only; mutation actions respond with the updated
/// space view or `false`; UI-control actions never touch engine state and
/// are passed through to the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Request {
    // ========================================================================
    // Queries
    // ========================================================================
    RequestSessionPresence {
        name: String,
    },
    RequestSpaceFromWindowId {
        #[serde(deserialize_with = "params::window_id")]
        window_id: WindowId,
    },
    RequestCurrentSpace,
    RequestSpaceFromSessionId {
        #[serde(deserialize_with = "params::session_id")]
        session_id: SessionId,
    },
    RequestAllSpaces,
    RequestTabDetail {
        #[serde(deserialize_with = "params::tab_id")]
        tab_id: TabId,
    },

    // ========================================================================
    // Mutations
    // ========================================================================
    SaveNewSession {
        #[serde(deserialize_with = "params::window_id")]
        window_id: WindowId,
        name: String,
        #[serde(default, deserialize_with = "params::flexible_bool")]
        delete_old: bool,
    },
    UpdateSessionName {
        #[serde(deserialize_with = "params::session_id")]
        session_id: SessionId,
        name: String,
        #[serde(default, deserialize_with = "params::flexible_bool")]
        delete_old: bool,
    },
    DeleteSession {
        #[serde(deserialize_with = "params::session_id")]
        session_id: SessionId,
    },
    LoadSession {
        #[serde(deserialize_with = "params::session_id")]
        session_id: SessionId,
        #[serde(default)]
        tab_url: Option<String>,
    },
    LoadWindow {
        #[serde(deserialize_with = "params::window_id")]
        window_id: WindowId,
        #[serde(default)]
        tab_url: Option<String>,
    },
    SwitchToSpace {
        #[serde(default, deserialize_with = "params::opt_session_id")]
        session_id: Option<SessionId>,
        #[serde(default, deserialize_with = "params::opt_window_id")]
        window_id: Option<WindowId>,
    },
    MoveTabToSession {
        #[serde(deserialize_with = "params::tab_id")]
        tab_id: TabId,
        #[serde(deserialize_with = "params::session_id")]
        session_id: SessionId,
    },
    AddLinkToSession {
        url: String,
        #[serde(deserialize_with = "params::session_id")]
        session_id: SessionId,
    },
    MoveTabToWindow {
        #[serde(deserialize_with = "params::tab_id")]
        tab_id: TabId,
        #[serde(deserialize_with = "params::window_id")]
        window_id: WindowId,
    },
    AddLinkToWindow {
        url: String,
        #[serde(deserialize_with = "params::window_id")]
        window_id: WindowId,
    },
    MoveTabToNewSession {
        #[serde(deserialize_with = "params::tab_id")]
        tab_id: TabId,
        name: String,
    },
    AddLinkToNewSession {
        url: String,
        name: String,
    },
    ImportNewSession {
        url_list: Vec<String>,
    },
    RestoreFromBackup {
        space: SpaceView,
        #[serde(default, deserialize_with = "params::flexible_bool")]
        delete_old: bool,
    },

    // ========================================================================
    // UI control (no engine state change)
    // ========================================================================
    RequestShowSpaces,
    RequestShowSwitcher,
    RequestShowMover,
    RequestShowKeyboardShortcuts,
    RequestClose,
    GeneratePopupParams {
        // Named `popupAction` on the wire: the envelope's `action` key is
        // taken by the discriminant.
        popup_action: String,
        #[serde(default)]
        tab_url: Option<String>,
    },
}

/// Parses a raw message into a request.
///
/// Malformed requests (unknown action, missing or uncanonicalizable params)
/// are dropped with no response; the UI interprets absence as failure.
pub fn parse_request(raw: &str) -> Option<Request> {
    match serde_json::from_str(raw) {
        Ok(request) => Some(request),
        Err(e) => {
            debug!(error = %e, "dropping malformed request");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_action() {
        let request = parse_request(r#"{"action":"request_all_spaces"}"#).unwrap();
        assert_eq!(request, Request::RequestAllSpaces);
    }

    #[test]
    fn canonicalizes_numeric_string_ids() {
        let request =
            parse_request(r#"{"action":"request_space_from_window_id","windowId":"42"}"#).unwrap();
        assert_eq!(
            request,
            Request::RequestSpaceFromWindowId {
                window_id: WindowId(42)
            }
        );
    }

    #[test]
    fn canonicalizes_string_booleans() {
        let request = parse_request(
            r#"{"action":"save_new_session","windowId":7,"name":"work","deleteOld":"false"}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::SaveNewSession {
                window_id: WindowId(7),
                name: "work".into(),
                delete_old: false,
            }
        );

        let request = parse_request(
            r#"{"action":"update_session_name","sessionId":"3","name":"Work","deleteOld":"true"}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::UpdateSessionName {
                session_id: SessionId(3),
                name: "Work".into(),
                delete_old: true,
            }
        );
    }

    #[test]
    fn delete_old_defaults_to_false() {
        let request =
            parse_request(r#"{"action":"save_new_session","windowId":7,"name":"work"}"#).unwrap();
        assert_eq!(
            request,
            Request::SaveNewSession {
                window_id: WindowId(7),
                name: "work".into(),
                delete_old: false,
            }
        );
    }

    #[test]
    fn switch_to_space_accepts_either_id() {
        let request =
            parse_request(r#"{"action":"switch_to_space","sessionId":"9"}"#).unwrap();
        assert_eq!(
            request,
            Request::SwitchToSpace {
                session_id: Some(SessionId(9)),
                window_id: None,
            }
        );

        let request = parse_request(r#"{"action":"switch_to_space","windowId":4}"#).unwrap();
        assert_eq!(
            request,
            Request::SwitchToSpace {
                session_id: None,
                window_id: Some(WindowId(4)),
            }
        );
    }

    #[test]
    fn malformed_requests_are_dropped() {
        // Not JSON.
        assert!(parse_request("not json").is_none());
        // Unknown action.
        assert!(parse_request(r#"{"action":"request_everything"}"#).is_none());
        // Missing required param.
        assert!(parse_request(r#"{"action":"delete_session"}"#).is_none());
        // Uncanonicalizable id.
        assert!(parse_request(r#"{"action":"delete_session","sessionId":"soon"}"#).is_none());
        // Uncanonicalizable boolean.
        assert!(parse_request(
            r#"{"action":"save_new_session","windowId":1,"name":"x","deleteOld":"maybe"}"#
        )
        .is_none());
    }

    #[test]
    fn import_takes_url_list() {
        let request = parse_request(
            r#"{"action":"import_new_session","urlList":["https://a.example","https://b.example"]}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::ImportNewSession {
                url_list: vec!["https://a.example".into(), "https://b.example".into()],
            }
        );
    }

    #[test]
    fn ui_control_actions_parse() {
        assert_eq!(
            parse_request(r#"{"action":"request_show_switcher"}"#).unwrap(),
            Request::RequestShowSwitcher
        );
        assert_eq!(
            parse_request(
                r#"{"action":"generate_popup_params","popupAction":"switch","tabUrl":"https://a.example"}"#
            )
            .unwrap(),
            Request::GeneratePopupParams {
                popup_action: "switch".into(),
                tab_url: Some("https://a.example".into()),
            }
        );
    }
}
