//! Parameter canonicalization for weakly-typed request fields.

use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use spaces_store::{SessionId, TabId, WindowId};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(i64),
    Str(String),
}

fn raw_to_i64<E: DeError>(raw: RawId) -> Result<i64, E> {
    match raw {
        RawId::Num(n) => Ok(n),
        RawId::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid id: {s:?}"))),
    }
}

pub fn session_id<'de, D: Deserializer<'de>>(d: D) -> Result<SessionId, D::Error> {
    raw_to_i64(RawId::deserialize(d)?).map(SessionId)
}

pub fn opt_session_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SessionId>, D::Error> {
    Option::<RawId>::deserialize(d)?
        .map(|raw| raw_to_i64(raw).map(SessionId))
        .transpose()
}

pub fn window_id<'de, D: Deserializer<'de>>(d: D) -> Result<WindowId, D::Error> {
    raw_to_i64(RawId::deserialize(d)?).map(WindowId)
}

pub fn opt_window_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<WindowId>, D::Error> {
    Option::<RawId>::deserialize(d)?
        .map(|raw| raw_to_i64(raw).map(WindowId))
        .transpose()
}

pub fn tab_id<'de, D: Deserializer<'de>>(d: D) -> Result<TabId, D::Error> {
    raw_to_i64(RawId::deserialize(d)?).map(TabId)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBool {
    Bool(bool),
    Str(String),
}

pub fn flexible_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match RawBool::deserialize(d)? {
        RawBool::Bool(b) => Ok(b),
        RawBool::Str(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(D::Error::custom(format!("invalid boolean: {other:?}"))),
        },
    }
}
