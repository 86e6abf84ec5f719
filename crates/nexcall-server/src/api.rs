//! Shared pieces of the JSON API.

use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nexcall_calls::CallsError;
use nexcall_db::DbPool;
use rusqlite::Connection;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("telephony provider error: {0}")]
    BadGateway(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<CallsError> for ApiError {
    fn from(e: CallsError) -> Self {
        match e {
            CallsError::NotFound(id) => ApiError::NotFound(format!("call not found: {}", id)),
            other => {
                tracing::error!(error = %other, "call store error");
                ApiError::InternalServerError("database error".to_string())
            }
        }
    }
}

/// Runs a call-store query on a pooled connection off the async runtime.
pub(crate) async fn with_conn<T, F>(pool: &DbPool, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, CallsError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get database connection");
            ApiError::InternalServerError("database unavailable".to_string())
        })?;
        op(&conn).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
}
