//! Wire views and response shapes.

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use spaces_store::{Session, SessionId, Tab, WindowId};

/// The space view returned to the UI.
///
/// Absent values serialize as `false`, matching the legacy wire shape. The
/// deserialize side accepts `false` (or a missing key) back as absence,
/// which is how backup snapshots arrive in `restore_from_backup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceView {
    #[serde(
        serialize_with = "or_false",
        deserialize_with = "false_as_none",
        default
    )]
    pub session_id: Option<SessionId>,
    #[serde(
        serialize_with = "or_false",
        deserialize_with = "false_as_none",
        default
    )]
    pub window_id: Option<WindowId>,
    #[serde(
        serialize_with = "or_false",
        deserialize_with = "false_as_none",
        default
    )]
    pub name: Option<String>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(
        serialize_with = "or_false",
        deserialize_with = "false_as_none",
        default
    )]
    pub history: Option<Vec<Tab>>,
}

impl SpaceView {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id,
            window_id: session.window_id,
            name: session.name.clone(),
            tabs: session.tabs.clone(),
            history: Some(session.history.clone()),
        }
    }
}

/// Answer to `request_session_presence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPresence {
    pub exists: bool,
    pub is_open: bool,
}

/// UI-control directive passed through to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiDirective {
    ShowSpaces,
    ShowSwitcher,
    ShowMover,
    ShowKeyboardShortcuts,
    Close,
}

/// Response to a request.
///
/// Mutations answer with the updated space view or `false`; queries answer
/// with their own shapes. `Ack` serializes as bare `true`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Space(SpaceView),
    Spaces(Vec<SpaceView>),
    Presence(SessionPresence),
    Tab(Tab),
    PopupParams(String),
    Ui(UiDirective),
    Ack,
    Failure,
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Response::Space(view) => view.serialize(serializer),
            Response::Spaces(views) => views.serialize(serializer),
            Response::Presence(presence) => presence.serialize(serializer),
            Response::Tab(tab) => tab.serialize(serializer),
            Response::PopupParams(params) => params.serialize(serializer),
            Response::Ui(directive) => directive.serialize(serializer),
            Response::Ack => serializer.serialize_bool(true),
            Response::Failure => serializer.serialize_bool(false),
        }
    }
}

fn or_false<S: Serializer, T: Serialize>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_bool(false),
    }
}

fn false_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Sentinel(bool),
        Value(T),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Sentinel(false) => Ok(None),
        Raw::Sentinel(true) => Err(D::Error::custom("true is not a valid absent marker")),
        Raw::Value(value) => Ok(Some(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session() -> Session {
        Session {
            id: Some(SessionId(3)),
            name: Some("work".into()),
            session_hash: 11,
            tabs: vec![Tab::from_url("https://example.com")],
            history: vec![Tab::from_url("https://old.example")],
            last_access: Utc::now(),
            window_bounds: None,
            window_id: Some(WindowId(7)),
        }
    }

    #[test]
    fn open_space_serializes_ids() {
        let view = SpaceView::from_session(&session());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["sessionId"], 3);
        assert_eq!(json["windowId"], 7);
        assert_eq!(json["name"], "work");
        assert_eq!(json["tabs"][0]["url"], "https://example.com");
        assert_eq!(json["history"][0]["url"], "https://old.example");
    }

    #[test]
    fn absent_values_serialize_as_false() {
        let mut s = session();
        s.id = None;
        s.name = None;
        s.window_id = None;

        let json = serde_json::to_value(SpaceView::from_session(&s)).unwrap();
        assert_eq!(json["sessionId"], false);
        assert_eq!(json["windowId"], false);
        assert_eq!(json["name"], false);
    }

    #[test]
    fn false_sentinels_deserialize_as_absent() {
        let view: SpaceView = serde_json::from_str(
            r#"{"sessionId":false,"windowId":false,"name":"backup","tabs":[],"history":false}"#,
        )
        .unwrap();
        assert!(view.session_id.is_none());
        assert!(view.window_id.is_none());
        assert_eq!(view.name.as_deref(), Some("backup"));
        assert!(view.history.is_none());
    }

    #[test]
    fn missing_keys_deserialize_as_absent() {
        let view: SpaceView =
            serde_json::from_str(r#"{"tabs":[{"url":"https://a.example"}]}"#).unwrap();
        assert!(view.session_id.is_none());
        assert!(view.name.is_none());
        assert_eq!(view.tabs.len(), 1);
    }

    #[test]
    fn view_round_trips() {
        let view = SpaceView::from_session(&session());
        let json = serde_json::to_string(&view).unwrap();
        let back: SpaceView = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
    }

    #[test]
    fn failure_and_ack_serialize_as_booleans() {
        assert_eq!(serde_json::to_value(Response::Failure).unwrap(), false);
        assert_eq!(serde_json::to_value(Response::Ack).unwrap(), true);
    }

    #[test]
    fn presence_uses_wire_field_names() {
        let json = serde_json::to_value(Response::Presence(SessionPresence {
            exists: true,
            is_open: false,
        }))
        .unwrap();
        assert_eq!(json["exists"], true);
        assert_eq!(json["is_open"], false);
    }

    #[test]
    fn ui_directive_serializes_snake_case() {
        let json = serde_json::to_value(Response::Ui(UiDirective::ShowSwitcher)).unwrap();
        assert_eq!(json, "show_switcher");
    }
}
