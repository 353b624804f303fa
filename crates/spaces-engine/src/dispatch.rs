//! Protocol request dispatcher.
//!
//! Maps canonicalized [`Request`]s onto engine operations and flattens the
//! results to wire responses: a mutation answers with the updated space view
//! or `false`; a malformed message produces no response at all.

use tracing::warn;

use spaces_protocol::{parse_request, Request, Response, SpaceView, UiDirective};
use spaces_store::Session;

use crate::engine::SpaceEngine;
use crate::platform::Platform;
use crate::EngineResult;

/// Handles one raw message off the UI channel. `None` means "send nothing";
/// the UI interprets absence as failure.
pub async fn handle_raw<P: Platform>(engine: &SpaceEngine<P>, raw: &str) -> Option<String> {
    let request = parse_request(raw)?;
    let response = dispatch(engine, request).await?;
    match serde_json::to_string(&response) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "failed to serialize response");
            None
        }
    }
}

/// Dispatches one canonicalized request.
pub async fn dispatch<P: Platform>(engine: &SpaceEngine<P>, request: Request) -> Option<Response> {
    let response = match request {
        // ====================================================================
        // Queries
        // ====================================================================
        Request::RequestSessionPresence { name } => {
            Response::Presence(engine.session_presence(&name).await)
        }
        Request::RequestSpaceFromWindowId { window_id } => {
            space_or_failure(engine.space_for_window(window_id).await)
        }
        Request::RequestCurrentSpace => space_or_failure(engine.current_space().await),
        Request::RequestSpaceFromSessionId { session_id } => {
            space_or_failure(engine.space_for_session(session_id).await)
        }
        Request::RequestAllSpaces => Response::Spaces(
            engine
                .all_spaces()
                .await
                .iter()
                .map(SpaceView::from_session)
                .collect(),
        ),
        Request::RequestTabDetail { tab_id } => match engine.tab_detail(tab_id).await {
            Some(tab) => Response::Tab(tab),
            None => Response::Failure,
        },

        // ====================================================================
        // Mutations
        // ====================================================================
        Request::SaveNewSession {
            window_id,
            name,
            delete_old,
        } => flatten(
            engine
                .save_window_as_session(window_id, &name, delete_old)
                .await,
        ),
        Request::UpdateSessionName {
            session_id,
            name,
            delete_old,
        } => flatten(
            engine
                .update_session_name(session_id, &name, delete_old)
                .await,
        ),
        Request::DeleteSession { session_id } => match engine.delete_session(session_id).await {
            Ok(true) => Response::Ack,
            Ok(false) => Response::Failure,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "delete failed");
                Response::Failure
            }
        },
        Request::LoadSession {
            session_id,
            tab_url,
        } => flatten(engine.load_session(session_id, tab_url.as_deref()).await),
        Request::LoadWindow { window_id, tab_url } => {
            flatten(engine.load_window(window_id, tab_url.as_deref()).await)
        }
        Request::SwitchToSpace {
            session_id,
            window_id,
        } => flatten(engine.switch_to_space(session_id, window_id).await),
        Request::MoveTabToSession { tab_id, session_id } => {
            flatten(engine.move_tab_to_session(tab_id, session_id).await)
        }
        Request::AddLinkToSession { url, session_id } => {
            flatten(engine.add_link_to_session(&url, session_id).await)
        }
        Request::MoveTabToWindow { tab_id, window_id } => {
            flatten(engine.move_tab_to_window(tab_id, window_id).await)
        }
        Request::AddLinkToWindow { url, window_id } => {
            flatten(engine.add_link_to_window(&url, window_id).await)
        }
        Request::MoveTabToNewSession { tab_id, name } => {
            flatten(engine.move_tab_to_new_session(tab_id, &name).await)
        }
        Request::AddLinkToNewSession { url, name } => {
            flatten(engine.add_link_to_new_session(&url, &name).await)
        }
        Request::ImportNewSession { url_list } => {
            flatten(engine.import_new_session(url_list).await)
        }
        Request::RestoreFromBackup { space, delete_old } => flatten(
            engine
                .restore_from_backup(
                    space.name,
                    space.tabs,
                    space.history.unwrap_or_default(),
                    delete_old,
                )
                .await,
        ),

        // ====================================================================
        // UI control: passed through, no engine state change
        // ====================================================================
        Request::RequestShowSpaces => Response::Ui(UiDirective::ShowSpaces),
        Request::RequestShowSwitcher => Response::Ui(UiDirective::ShowSwitcher),
        Request::RequestShowMover => Response::Ui(UiDirective::ShowMover),
        Request::RequestShowKeyboardShortcuts => Response::Ui(UiDirective::ShowKeyboardShortcuts),
        Request::RequestClose => Response::Ui(UiDirective::Close),
        Request::GeneratePopupParams {
            popup_action,
            tab_url,
        } => Response::PopupParams(
            engine
                .generate_popup_params(&popup_action, tab_url.as_deref())
                .await,
        ),
    };

    Some(response)
}

fn space_or_failure(session: Option<Session>) -> Response {
    match session {
        Some(session) => Response::Space(SpaceView::from_session(&session)),
        None => Response::Failure,
    }
}

fn flatten(result: EngineResult<Session>) -> Response {
    match result {
        Ok(session) => Response::Space(SpaceView::from_session(&session)),
        Err(e) => {
            warn!(error = %e, "mutation failed");
            Response::Failure
        }
    }
}
