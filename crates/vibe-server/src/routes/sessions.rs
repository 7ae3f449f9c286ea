//! Editing session endpoints
//!
//! JSON routes require the session owner. The preview is loaded by the
//! browser without credentials and is addressed by the session id alone.
//! The editor page and its message relay present the session's edit token
//! instead of the owner's identity, and sandbox remixes count against the
//! owner's usage limit.

use super::{credential, html, json, json_body, json_with_status, with_state};
use crate::error::{finish, ApiError};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vibe_core::{EditSession, PageInput, UserId};
use vibe_document::VariantLabel;
use vibe_sandbox::{host_page, SandboxMessage, SandboxRequest, EDIT_TOKEN_HEADER};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

/// `POST /api/sessions` and `POST /api/sessions/{id}/generate`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub input: PageInput,
    #[serde(default)]
    pub style: Option<String>,
    /// Slot to fill; the active one when absent
    #[serde(default)]
    pub target: Option<VariantLabel>,
}

/// `POST /api/sessions/{id}/activate`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ActivateRequest {
    pub variant: VariantLabel,
}

/// `GET /api/sessions/{id}/preview?scroll=N`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PreviewQuery {
    pub scroll: Option<u32>,
}

/// `GET /editor/{id}?token=T`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditorQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
struct Ignored {
    ignored: bool,
    reason: String,
}

pub(crate) fn routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let limit = state.body_limit;

    let create_route = warp::path!("api" / "sessions")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<GenerateRequest>(limit))
        .and_then(|state, credential, body| async move { finish(create_session(state, credential, body).await) });

    let snapshot_route = warp::path!("api" / "sessions" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(credential())
        .and_then(|id, state, credential| async move { finish(snapshot(state, credential, id).await) });

    let close_route = warp::path!("api" / "sessions" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(credential())
        .and_then(|id, state, credential| async move { finish(close_session(state, credential, id).await) });

    let generate_route = warp::path!("api" / "sessions" / String / "generate")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<GenerateRequest>(limit))
        .and_then(|id, state, credential, body| async move { finish(generate(state, credential, id, body).await) });

    let shift_route = warp::path!("api" / "sessions" / String / "vibe-shift")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and_then(|id, state, credential| async move { finish(vibe_shift(state, credential, id).await) });

    let activate_route = warp::path!("api" / "sessions" / String / "activate")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<ActivateRequest>(limit))
        .and_then(|id, state, credential, body| async move { finish(activate(state, credential, id, body).await) });

    let message_route = warp::path!("api" / "sessions" / String / "messages")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(warp::header::optional::<String>(EDIT_TOKEN_HEADER))
        .and(json_body::<serde_json::Value>(limit))
        .and_then(|id, state, credential, token, body| async move {
            finish(message(state, credential, token, id, body).await)
        });

    let preview_route = warp::path!("api" / "sessions" / String / "preview")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(warp::query::<PreviewQuery>())
        .and_then(|id, state, query| async move { finish(preview(state, id, query).await) });

    let editor_route = warp::path!("editor" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(warp::query::<EditorQuery>())
        .and_then(|id, state, query| async move { finish(editor(state, id, query).await) });

    create_route
        .or(snapshot_route)
        .unify()
        .or(close_route)
        .unify()
        .or(generate_route)
        .unify()
        .or(shift_route)
        .unify()
        .or(activate_route)
        .unify()
        .or(message_route)
        .unify()
        .or(preview_route)
        .unify()
        .or(editor_route)
        .unify()
        .boxed()
}

async fn owned_session(
    state: &AppState,
    credential: Option<String>,
    id: &str,
) -> Result<(Arc<EditSession>, Option<UserId>), ApiError> {
    let caller = state.caller(credential.as_deref()).await?;
    let session = state.session(id, caller.as_ref()).await?;
    Ok((session, caller))
}

async fn create_session(state: AppState, credential: Option<String>, body: GenerateRequest) -> Result<Response, ApiError> {
    let caller = state.caller(credential.as_deref()).await?;
    let session = EditSession::new(caller, state.critic.clone(), &state.core).with_renderer(state.renderer.clone());
    let target = body.target.unwrap_or(VariantLabel::A);
    let snapshot = session
        .generate(body.input, body.style.as_deref().unwrap_or_default(), target)
        .await?;

    tracing::info!(session = %session.id(), "Opened editing session");
    state.sessions.insert(session.id(), Arc::new(session)).await;
    Ok(json_with_status(&snapshot, StatusCode::CREATED))
}

async fn snapshot(state: AppState, credential: Option<String>, id: String) -> Result<Response, ApiError> {
    let (session, _) = owned_session(&state, credential, &id).await?;
    Ok(json(&session.snapshot()))
}

async fn close_session(state: AppState, credential: Option<String>, id: String) -> Result<Response, ApiError> {
    let (session, _) = owned_session(&state, credential, &id).await?;
    state.sessions.invalidate(&session.id()).await;
    tracing::info!(session = %session.id(), "Closed editing session");
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT).into_response())
}

async fn generate(
    state: AppState,
    credential: Option<String>,
    id: String,
    body: GenerateRequest,
) -> Result<Response, ApiError> {
    let (session, _) = owned_session(&state, credential, &id).await?;
    let target = body.target.unwrap_or_else(|| session.snapshot().active);
    let snapshot = session
        .generate(body.input, body.style.as_deref().unwrap_or_default(), target)
        .await?;
    Ok(json(&snapshot))
}

async fn vibe_shift(state: AppState, credential: Option<String>, id: String) -> Result<Response, ApiError> {
    let (session, _) = owned_session(&state, credential, &id).await?;
    Ok(json(&session.vibe_shift().await?))
}

async fn activate(
    state: AppState,
    credential: Option<String>,
    id: String,
    body: ActivateRequest,
) -> Result<Response, ApiError> {
    let (session, _) = owned_session(&state, credential, &id).await?;
    Ok(json(&session.activate(body.variant)?))
}

/// Relay a raw sandbox message. Shapes outside the contract are
/// acknowledged and dropped.
async fn message(
    state: AppState,
    credential: Option<String>,
    token: Option<String>,
    id: String,
    body: serde_json::Value,
) -> Result<Response, ApiError> {
    let (session, caller) = match token {
        Some(token) => {
            let session = state.session_with_token(&id, Some(&token)).await?;
            let owner = session.owner().cloned();
            (session, owner)
        }
        None => owned_session(&state, credential, &id).await?,
    };
    let request = match SandboxRequest::from_value(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!(session = %session.id(), error = %err, "Ignored sandbox message");
            let ignored = Ignored {
                ignored: true,
                reason: err.to_string(),
            };
            return Ok(json_with_status(&ignored, StatusCode::ACCEPTED));
        }
    };
    tracing::debug!(session = %session.id(), kind = request.message.kind(), "Sandbox message");
    if matches!(request.message, SandboxMessage::Remix { .. }) {
        state.check_usage(caller.as_ref()).await?;
    }
    Ok(json(&session.handle_message(&request).await?))
}

async fn preview(state: AppState, id: String, query: PreviewQuery) -> Result<Response, ApiError> {
    let session = state.session_by_id(&id).await?;
    Ok(html(session.preview(query.scroll)?))
}

async fn editor(state: AppState, id: String, query: EditorQuery) -> Result<Response, ApiError> {
    let session = state.session_with_token(&id, query.token.as_deref()).await?;
    Ok(html(host_page(&session.id().to_string(), session.edit_token())))
}
