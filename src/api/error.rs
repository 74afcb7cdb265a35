use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ApiResponse;
use crate::domain::FieldIssue;
use crate::services::{AuthError, ContactError, ContentError, TokenError, UploadError};

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Development switch: put internal error text into 500 responses.
pub fn set_expose_details(expose: bool) {
    EXPOSE_DETAILS.store(expose, Ordering::Relaxed);
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ValidationError(String),

    /// Validation failure with per-field detail.
    InvalidFields(Vec<FieldIssue>),

    Conflict(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),

    PayloadTooLarge(String),

    UnsupportedMedia(String),

    TooManyRequests { retry_after: u64 },

    /// Upstream failure; the message is logged, never returned.
    DeliveryFailed(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::InvalidFields(issues) => {
                write!(f, "Validation error: {} invalid field(s)", issues.len())
            }
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::UnsupportedMedia(msg) => write!(f, "Unsupported media type: {}", msg),
            ApiError::TooManyRequests { retry_after } => {
                write!(f, "Too many requests, retry after {}s", retry_after)
            }
            ApiError::DeliveryFailed(msg) => write!(f, "Delivery failed: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

fn hidden(public: &str, detail: &str) -> String {
    if EXPOSE_DETAILS.load(Ordering::Relaxed) {
        format!("{public}: {detail}")
    } else {
        public.to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiResponse::<()>::error(msg)),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error(hidden("A database error occurred", &msg)),
                )
            }
            ApiError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, ApiResponse::error(msg))
            }
            ApiError::InvalidFields(issues) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::error("Validation failed").with_details(issues),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ApiResponse::error(msg)),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error(hidden("An internal error occurred", &msg)),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ApiResponse::error(msg)),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ApiResponse::error(msg)),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, ApiResponse::error(msg))
            }
            ApiError::UnsupportedMedia(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, ApiResponse::error(msg))
            }
            ApiError::TooManyRequests { retry_after } => {
                let body = ApiResponse::<()>::error("Too many requests, please try again later")
                    .with_retry_after(retry_after);
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }
            ApiError::DeliveryFailed(msg) => {
                tracing::error!("Delivery failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error(hidden("Failed to send message", &msg)),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{err:#}"))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidRefreshToken => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::AccountDisabled => ApiError::Forbidden(err.to_string()),
            AuthError::InvalidAccessToken(TokenError::Expired) => {
                ApiError::Unauthorized("Access token expired".to_string())
            }
            AuthError::InvalidAccessToken(_) | AuthError::SessionRevoked => {
                ApiError::Unauthorized("Invalid or expired token".to_string())
            }
            AuthError::WrongCurrentPassword | AuthError::SamePassword | AuthError::Validation(_) => {
                ApiError::ValidationError(err.to_string())
            }
            AuthError::UserNotFound => ApiError::NotFound(err.to_string()),
            AuthError::Database(msg) => ApiError::DatabaseError(msg),
            AuthError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound | ContentError::BackupNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ContentError::UnknownSection(_) => ApiError::NotFound(err.to_string()),
            ContentError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            ContentError::Validation(issues) => ApiError::InvalidFields(issues),
            ContentError::Database(msg) => ApiError::DatabaseError(msg),
            ContentError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::UnknownKind(_) | UploadError::Empty => {
                ApiError::ValidationError(err.to_string())
            }
            UploadError::UnsupportedType(_) => ApiError::UnsupportedMedia(err.to_string()),
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::Io(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<ContactError> for ApiError {
    fn from(err: ContactError) -> Self {
        match err {
            ContactError::RateLimited { retry_after } => ApiError::TooManyRequests { retry_after },
            ContactError::InvalidInput(issues) => ApiError::InvalidFields(issues),
            ContactError::DeliveryFailed(msg) => ApiError::DeliveryFailed(msg),
            ContactError::NotConfigured => {
                ApiError::DeliveryFailed("mail transport not configured".to_string())
            }
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }
}
