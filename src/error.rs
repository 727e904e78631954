use axum::{
    Json,
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::Message;

/// Result type for Record Store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// StoreError
///
/// Failures the Record Store surfaces to its callers. "No row found" is never an
/// error at this layer: lookups return `Option`/`Vec` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the insert. Carries the human name of the
    /// unique key, e.g. `"Title + Author"`.
    #[error("{0} already exists")]
    Conflict(&'static str),

    /// Connectivity, malformed query, or any other fault of the database layer.
    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Maps a unique-constraint violation to `Conflict(key)` and leaves every other
    /// database error as `Database`.
    pub fn from_insert(err: sqlx::Error, key: &'static str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(key)
            }
            _ => StoreError::Database(err),
        }
    }
}

/// AuthError
///
/// Failures of credential hashing and session-token handling.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// AppError
///
/// Failures of a request handler, rendered as a `Message` body with the matching status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AppError::Conflict(err.to_string()),
            StoreError::Database(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(store) => store.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

// Body extraction failures become 400 with a `Message` body.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::NotFound(m) | AppError::Conflict(m) | AppError::BadRequest(m) => m,
            AppError::Internal(detail) => {
                // Details stay in the log; the client only learns that the request failed.
                tracing::error!(status_code = %status.as_u16(), error = %detail, "Request failed");
                "Internal server error".to_string()
            }
        };

        (status, Json(Message::error(message))).into_response()
    }
}
