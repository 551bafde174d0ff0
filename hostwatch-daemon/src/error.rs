use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hostwatch_core::WatchError;
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// A remote operation failed; the message is safe to show to the caller.
    #[error("{0}")]
    Remote(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<WatchError> for AppError {
    fn from(e: WatchError) -> Self {
        match e {
            WatchError::Io(_) | WatchError::Archive(_) => AppError::Internal(e.into()),
            other => AppError::Remote(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            AppError::Remote(m) => {
                tracing::warn!("Remote operation failed: {m}");
                (StatusCode::BAD_GATEWAY, m.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}
