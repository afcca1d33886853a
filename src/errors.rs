use crate::services::{paste_service::PasteError, render_service::RenderError};
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

/// An HTTP-facing error: a status code and a one-line message.
///
/// Rendered as plain text because most clients are `curl`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status, format!("{}\n", self.message)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

impl From<PasteError> for AppError {
    fn from(err: PasteError) -> Self {
        match err {
            PasteError::TooLarge { .. } | PasteError::TooSmall { .. } => {
                AppError::new(StatusCode::NOT_ACCEPTABLE, err.to_string())
            }
            PasteError::NotFound(_) => AppError::not_found("not found"),
            PasteError::InvalidFilename(_) | PasteError::InvalidNamespace(_) => {
                AppError::bad_request(err.to_string())
            }
            PasteError::Unsupported(..) => {
                AppError::new(StatusCode::METHOD_NOT_ALLOWED, err.to_string())
            }
            PasteError::KeySpaceExhausted(_) => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            PasteError::Storage(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::bad_request(err.to_string())
    }
}
