//! HTTP error responses for web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::SquirrelError;

use super::Backend;

const INTERNAL_MESSAGE: &str = "Something went wrong.";
pub(crate) const AUTH_FAILED: &str = "Authentication failed";

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn invalid_request() -> Self {
        Self::bad_request(SquirrelError::InvalidRequest.to_string())
    }
}

pub fn status_from_error(err: &SquirrelError) -> StatusCode {
    match err {
        SquirrelError::Validation { .. }
        | SquirrelError::InvalidRequest
        | SquirrelError::MalformedId
        | SquirrelError::InvalidCredentials
        | SquirrelError::Provider { .. } => StatusCode::BAD_REQUEST,
        SquirrelError::Conflict { .. } => StatusCode::CONFLICT,
        SquirrelError::Anonymous | SquirrelError::NotFound { .. } => StatusCode::NOT_FOUND,
        SquirrelError::Database { .. }
        | SquirrelError::DatabaseQuery { .. }
        | SquirrelError::PasswordHash { .. }
        | SquirrelError::Internal { .. }
        | SquirrelError::ConfigParse { .. }
        | SquirrelError::ConfigMissing { .. }
        | SquirrelError::ConfigInvalid { .. }
        | SquirrelError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SquirrelError> for WebError {
    fn from(err: SquirrelError) -> Self {
        let status = status_from_error(&err);
        if let SquirrelError::Provider { reason } = &err {
            tracing::warn!(%reason, "federated login failed");
            return Self::bad_request(AUTH_FAILED);
        }
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
            return Self::internal(INTERNAL_MESSAGE);
        }
        Self::new(status, err.to_string())
    }
}

impl From<tower_sessions::session::Error> for WebError {
    fn from(err: tower_sessions::session::Error) -> Self {
        tracing::error!(error = %err, "session store failed");
        Self::internal(INTERNAL_MESSAGE)
    }
}

impl From<axum_login::Error<Backend>> for WebError {
    fn from(err: axum_login::Error<Backend>) -> Self {
        match err {
            axum_login::Error::Session(e) => e.into(),
            axum_login::Error::Backend(e) => e.into(),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
