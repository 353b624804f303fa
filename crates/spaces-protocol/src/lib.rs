//! # Spaces Protocol
//!
//! Message protocol between the engine and the UI layers.
//!
//! Requests are tagged records with an `action` discriminant. Parameters
//! coming off the platform message channel are weakly typed: ids arrive as
//! numbers or numeric strings, booleans as booleans or the strings
//! `"true"`/`"false"`. Canonicalization to the typed form happens here, at
//! the boundary, so the engine only ever sees real ids and real booleans.
//!
//! Responses use the wire's legacy `false` sentinel for absent values: a
//! space view serializes absent ids/names/history as `false`, and a failed
//! mutation serializes as bare `false`. Inside the workspace everything is
//! `Option`; the sentinel exists only in the serialized form.

mod params;
mod request;
mod view;

pub use request::{parse_request, Request};
pub use view::{Response, SessionPresence, SpaceView, UiDirective};
