//! API error handling
//!
//! `AppError` is the domain error taxonomy seen by handlers. Rendering
//! attaches an [`ErrorReport`] to the response so the terminal
//! error-normalizing middleware can produce the final envelope.
//!
//! The envelope `message` is the localized summary for the error kind; the
//! `error` field carries the specific reason.
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roster_core::{RunMode, StoreError};
use thiserror::Error;

use crate::auth::jwt::TokenError;
use crate::auth::password::PasswordError;
use crate::messages::MessageKey;
use crate::response::Envelope;

pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input
    #[error("{0}")]
    BadRequest(String),

    /// Duplicate unique key
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// The store did not answer within its deadline
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Unexpected failure; `detail` only reaches clients in debug mode
    #[error("{message}: {detail}")]
    Internal { message: String, detail: String },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{resource} not found"))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: INTERNAL_ERROR_MESSAGE.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Classify a repository failure, keeping the operation as context
    pub fn storage(operation: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::not_found("user"),
            StoreError::Conflict(_) => Self::Conflict("email already in use".to_string()),
            StoreError::Timeout => {
                Self::ServiceUnavailable(format!("{operation}: storage timed out"))
            }
            StoreError::Database(e) => Self::Internal {
                message: INTERNAL_ERROR_MESSAGE.to_string(),
                detail: format!("{operation}: {e}"),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Catalogue entry for the envelope message
    pub fn key(&self) -> MessageKey {
        match self {
            AppError::BadRequest(_) => MessageKey::BadRequest,
            AppError::Conflict(_) => MessageKey::Conflict,
            AppError::NotFound(_) => MessageKey::NotFound,
            AppError::Unauthorized(_) => MessageKey::Unauthorized,
            AppError::Forbidden(_) => MessageKey::Forbidden,
            AppError::ServiceUnavailable(_) => MessageKey::ServiceUnavailable,
            AppError::Internal { .. } => MessageKey::InternalError,
        }
    }

    fn report(&self) -> ErrorReport {
        match self {
            AppError::Internal { message, detail } => ErrorReport {
                status: self.status(),
                key: self.key(),
                reason: message.clone(),
                detail: Some(detail.clone()),
            },
            other => ErrorReport {
                status: other.status(),
                key: other.key(),
                reason: other.to_string(),
                detail: None,
            },
        }
    }
}

/// Rendering record attached to error responses.
///
/// Carries what the normalizer needs to re-render the envelope for the
/// configured [`RunMode`].
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    /// Localized into the envelope `message`
    pub key: MessageKey,
    /// Client-safe reason for the envelope `error`
    pub reason: String,
    /// Internal detail, never shown in release mode
    pub detail: Option<String>,
}

impl ErrorReport {
    /// Stand-in for error responses produced outside `AppError`
    pub fn generic(status: StatusCode) -> Self {
        let (key, reason) = match status {
            StatusCode::NOT_FOUND => (MessageKey::NotFound, "resource not found"),
            StatusCode::METHOD_NOT_ALLOWED => (MessageKey::MethodNotAllowed, "method not allowed"),
            StatusCode::UNAUTHORIZED => (MessageKey::Unauthorized, "unauthorized"),
            StatusCode::FORBIDDEN => (MessageKey::Forbidden, "forbidden"),
            StatusCode::REQUEST_TIMEOUT => (MessageKey::RequestTimeout, "request timeout"),
            StatusCode::PAYLOAD_TOO_LARGE => (MessageKey::PayloadTooLarge, "payload too large"),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                (MessageKey::UnsupportedMediaType, "unsupported media type")
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                (MessageKey::ServiceUnavailable, "service unavailable")
            }
            s if s.is_server_error() => (MessageKey::InternalError, INTERNAL_ERROR_MESSAGE),
            _ => (MessageKey::BadRequest, "bad request"),
        };
        Self {
            status,
            key,
            reason: reason.to_string(),
            detail: None,
        }
    }

    pub fn envelope(&self, mode: RunMode) -> Envelope<()> {
        let error = match (&self.detail, mode) {
            (Some(detail), RunMode::Debug) => detail.clone(),
            _ => self.reason.clone(),
        };
        Envelope::failure(self.status, self.key.localized(), error)
    }

    pub fn render(&self, mode: RunMode) -> Response {
        (self.status, Json(self.envelope(mode))).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal { detail, .. } = &self {
            tracing::error!(detail = %detail, "Internal error");
        }
        let report = self.report();
        let mut response = report.render(RunMode::Release);
        response.extensions_mut().insert(report);
        response
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::storage("storage", err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => AppError::internal(format!("token signing failed: {e}")),
            TokenError::SystemTime(e) => AppError::internal(format!("clock error: {e}")),
            TokenError::Expired => AppError::unauthorized("token has expired"),
            _ => AppError::unauthorized("invalid token"),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::internal(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err)
    }
}
