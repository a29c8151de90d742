// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// HTTP-facing Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

/// Failure of a persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// An exam tier could not be filled; no partial exam line is ever built.
    #[error("exam tier {tier} has {actual} of {expected} questions")]
    IncompleteTier {
        tier: String,
        expected: usize,
        actual: usize,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while serving one websocket session.
///
/// None of these cross to another client; the worst outcome is closing this connection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unknown client identity: {0}")]
    Identity(String),

    #[error("session superseded by a newer connection")]
    Superseded,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
}

impl SessionError {
    /// Stable code sent in the `ERROR` event.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Transport(_) => "TRANSPORT_ERROR",
            SessionError::Store(_) => "STORE_ERROR",
            SessionError::Identity(_) => "IDENTITY_ERROR",
            SessionError::Superseded => "SUPERSEDED",
            SessionError::InvalidState(_) => "INVALID_STATE",
            SessionError::MalformedFrame(_) => "MALFORMED_FRAME",
            SessionError::UnknownEvent(_) => "UNKNOWN_EVENT",
            SessionError::InvalidAnswer(_) => "INVALID_ANSWER",
        }
    }

    /// Whether the connection must be closed after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::MalformedFrame(_) | SessionError::Superseded
        )
    }
}

impl From<axum::Error> for SessionError {
    fn from(err: axum::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}
