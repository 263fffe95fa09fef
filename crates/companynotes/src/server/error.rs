//! Mapping of crate errors onto HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::error::Error;

/// An error response with a short, client-safe message.
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 401
    Unauthorized(String),
    /// 403
    Forbidden(String),
    /// 404
    NotFound(String),
    /// 413
    PayloadTooLarge,
    /// 500 with a client-safe message.
    Failed(String),
    /// 500 with a fixed message; the detail is only logged.
    Internal(String),
    /// 503
    ServiceUnavailable(String),
}

impl ApiError {
    /// A 400 with the given message.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// A 401 for a request that needs an identified caller.
    #[must_use]
    pub fn authentication_required() -> Self {
        Self::Unauthorized("Authentication required".to_string())
    }
}

fn capitalized(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::AuthenticationRequired => Self::authentication_required(),
            Error::InvalidToken(_) => Self::Unauthorized("Invalid token".to_string()),
            Error::NotAuthorized { action } => {
                Self::Forbidden(format!("Not authorized to {action} this note"))
            }
            Error::NotFound { what, .. } => Self::NotFound(format!("{} not found", capitalized(what))),
            Error::NotConfigured { what } => {
                Self::ServiceUnavailable(format!("{} is not configured", capitalized(what)))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            debug!("Rejected request body: {}", rejection.body_text());
            Self::bad_request("Invalid JSON body")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
            Self::Failed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Self::Internal(detail) => {
                error!("Request failed: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unexpected server error".to_string(),
                )
            }
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
