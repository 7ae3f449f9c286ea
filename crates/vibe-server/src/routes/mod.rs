//! HTTP routes
//!
//! - [`studio`]: one-shot generation and critique endpoints
//! - [`projects`]: saved projects, usage, gallery and billing
//! - [`sessions`]: editing sessions, sandbox messages, preview and editor

pub mod projects;
pub mod sessions;
pub mod studio;

use crate::error::recover;
use crate::state::{AppState, USER_HEADER};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Every route, with rejections recovered into JSON errors and a tracing
/// span per request
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    studio::routes(&state)
        .or(projects::routes(&state))
        .unify()
        .or(sessions::routes(&state))
        .unify()
        .recover(recover)
        .unify()
        .with(warp::trace::request())
}

pub(crate) fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Raw identity credential, if sent
pub(crate) fn credential() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>(USER_HEADER)
}

/// Size-limited JSON body
pub(crate) fn json_body<T>(limit: u64) -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(limit).and(warp::body::json())
}

pub(crate) fn json<T: Serialize>(value: &T) -> Response {
    warp::reply::json(value).into_response()
}

pub(crate) fn json_with_status<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub(crate) fn html(markup: String) -> Response {
    warp::reply::html(markup).into_response()
}
