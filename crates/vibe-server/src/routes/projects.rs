//! Projects, usage, gallery and billing endpoints

use super::{credential, json, json_body, with_state};
use crate::error::{finish, ApiError};
use crate::state::{AppState, WEBHOOK_SECRET_HEADER};
use serde::{Deserialize, Serialize};
use vibe_core::{BillingEvent, GalleryId, NewGalleryItem, NewProject, ProjectId, ProjectUpdate};
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::Filter;

/// `GET /api/gallery?limit=N`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct GalleryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Received {
    received: bool,
}

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: bool,
}

pub(crate) fn routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let limit = state.body_limit;

    let list_route = warp::path!("api" / "projects")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(credential())
        .and_then(|state, credential| async move { finish(list_projects(state, credential).await) });

    let create_route = warp::path!("api" / "projects")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<NewProject>(limit))
        .and_then(|state, credential, body| async move { finish(create_project(state, credential, body).await) });

    let get_route = warp::path!("api" / "projects" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(credential())
        .and_then(|id, state, credential| async move { finish(get_project(state, credential, id).await) });

    let update_route = warp::path!("api" / "projects" / String)
        .and(warp::patch())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<ProjectUpdate>(limit))
        .and_then(|id, state, credential, body| async move {
            finish(update_project(state, credential, id, body).await)
        });

    let delete_route = warp::path!("api" / "projects" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(credential())
        .and_then(|id, state, credential| async move { finish(delete_project(state, credential, id).await) });

    let usage_route = warp::path!("api" / "user" / "usage")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(credential())
        .and_then(|state, credential| async move { finish(usage(state, credential).await) });

    let gallery_route = warp::path!("api" / "gallery")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(warp::query::<GalleryQuery>())
        .and_then(|state, query| async move { finish(list_gallery(state, query).await) });

    let publish_route = warp::path!("api" / "gallery")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<NewGalleryItem>(limit))
        .and_then(|state, credential, body| async move { finish(publish(state, credential, body).await) });

    let unpublish_route = warp::path!("api" / "gallery" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(credential())
        .and_then(|id, state, credential| async move { finish(unpublish(state, credential, id).await) });

    let webhook_route = warp::path!("api" / "billing" / "webhook")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::header::optional::<String>(WEBHOOK_SECRET_HEADER))
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::bytes())
        .and_then(|state, secret, body: warp::hyper::body::Bytes| async move {
            finish(webhook(state, secret, &body).await)
        });

    list_route
        .or(create_route)
        .unify()
        .or(get_route)
        .unify()
        .or(update_route)
        .unify()
        .or(delete_route)
        .unify()
        .or(usage_route)
        .unify()
        .or(gallery_route)
        .unify()
        .or(publish_route)
        .unify()
        .or(unpublish_route)
        .unify()
        .or(webhook_route)
        .unify()
        .boxed()
}

async fn list_projects(state: AppState, credential: Option<String>) -> Result<Response, ApiError> {
    let owner = state.owner(credential.as_deref()).await?;
    Ok(json(&state.projects.list(&owner).await?))
}

async fn create_project(state: AppState, credential: Option<String>, body: NewProject) -> Result<Response, ApiError> {
    let owner = state.owner(credential.as_deref()).await?;
    let project = state.projects.create(&owner, body).await?;
    tracing::info!(owner = %owner, project = %project.id, "Created project");
    Ok(json(&project))
}

async fn get_project(state: AppState, credential: Option<String>, id: String) -> Result<Response, ApiError> {
    let owner = state.owner(credential.as_deref()).await?;
    let id: ProjectId = id.parse()?;
    Ok(json(&state.projects.get(&owner, id).await?))
}

async fn update_project(
    state: AppState,
    credential: Option<String>,
    id: String,
    body: ProjectUpdate,
) -> Result<Response, ApiError> {
    let owner = state.owner(credential.as_deref()).await?;
    let id: ProjectId = id.parse()?;
    Ok(json(&state.projects.update(&owner, id, body).await?))
}

async fn delete_project(state: AppState, credential: Option<String>, id: String) -> Result<Response, ApiError> {
    let owner = state.owner(credential.as_deref()).await?;
    let id: ProjectId = id.parse()?;
    let project = state.projects.delete(&owner, id).await?;
    tracing::info!(owner = %owner, project = %project.id, "Deleted project");
    Ok(json(&project))
}

async fn usage(state: AppState, credential: Option<String>) -> Result<Response, ApiError> {
    let user = state
        .caller(credential.as_deref())
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    Ok(json(&state.limiter.usage(&user).await?))
}

async fn list_gallery(state: AppState, query: GalleryQuery) -> Result<Response, ApiError> {
    let limit = query.limit.unwrap_or(state.gallery_page).min(state.gallery_page);
    Ok(json(&state.gallery.list(limit).await?))
}

async fn publish(state: AppState, credential: Option<String>, body: NewGalleryItem) -> Result<Response, ApiError> {
    let author = state.owner(credential.as_deref()).await?;
    if body.html.trim().is_empty() {
        return Err(ApiError::BadRequest("HTML is required".to_owned()));
    }
    let item = state.gallery.publish(&author, body).await?;
    tracing::info!(author = %author, item = %item.id, "Published to gallery");
    Ok(json(&item))
}

async fn unpublish(state: AppState, credential: Option<String>, id: String) -> Result<Response, ApiError> {
    let author = state.owner(credential.as_deref()).await?;
    let id: GalleryId = id.parse()?;
    state.gallery.delete(&author, id).await?;
    Ok(json(&Deleted { deleted: true }))
}

async fn webhook(state: AppState, secret: Option<String>, body: &[u8]) -> Result<Response, ApiError> {
    if !state.webhook_authorized(secret.as_deref()) {
        tracing::warn!("Rejected billing webhook with a bad secret");
        return Err(ApiError::Webhook("invalid signature".to_owned()));
    }
    let event: BillingEvent = serde_json::from_slice(body).map_err(|err| ApiError::Webhook(err.to_string()))?;
    if let Some(user) = state.users.apply_billing(event).await? {
        tracing::info!(user = %user.id, plan = ?user.plan, "Applied billing event");
    }
    Ok(json(&Received { received: true }))
}
