//! HTTP error mapping
//!
//! Every failure leaves the server as `{ "error", "kind", "upgrade"? }` with
//! a status derived from its [`ErrorKind`]. Handler errors are turned into
//! responses directly; [`recover`] covers warp's own rejections.

use serde::Serialize;
use std::convert::Infallible;
use vibe_core::{CoreError, EditError, ErrorKind, StoreError};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

/// Failure of one API request
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Unauthorized")]
    Unauthenticated,

    #[error("{0}")]
    BadRequest(String),

    #[error("Webhook Error: {0}")]
    Webhook(String),
}

impl From<EditError> for ApiError {
    fn from(err: EditError) -> Self {
        Self::Core(err.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Core(err.into())
    }
}

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<bool>,
}

impl ApiError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::BadRequest(_) | Self::Webhook(_) => ErrorKind::Input,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        status_of(self.kind())
    }

    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let error = match self {
            Self::Core(err) => err.user_message(),
            other => other.to_string(),
        };
        let kind = self.kind();
        ErrorBody {
            error,
            kind,
            upgrade: (kind == ErrorKind::LimitReached).then_some(true),
        }
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        warp::reply::with_status(warp::reply::json(&self.body()), status).into_response()
    }
}

/// Status for each failure class
#[must_use]
pub const fn status_of(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Input => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::LimitReached => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Busy | ErrorKind::Addressing => StatusCode::CONFLICT,
        ErrorKind::NoOp => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ExternalTransient | ErrorKind::ExternalTerminal | ErrorKind::Parse => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Collapse a handler result into a response
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn finish(result: Result<Response, ApiError>) -> Result<Response, Infallible> {
    Ok(result.unwrap_or_else(Reply::into_response))
}

/// Turn warp's own rejections into the same JSON shape
///
/// # Errors
/// Never; every rejection becomes a response
pub async fn recover(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, kind, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, ErrorKind::NotFound, "Not found".to_owned())
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, ErrorKind::Input, format!("Invalid request body: {err}"))
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, ErrorKind::Input, "Request body is too large".to_owned())
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, ErrorKind::Input, "Content-Length is required".to_owned())
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, ErrorKind::Input, "Expected a JSON body".to_owned())
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, ErrorKind::Input, "Invalid query string".to_owned())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, ErrorKind::Input, "Method not allowed".to_owned())
    } else {
        tracing::error!(?rejection, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal, "Something went wrong".to_owned())
    };
    let body = ErrorBody {
        error: message,
        kind,
        upgrade: None,
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status).into_response())
}
