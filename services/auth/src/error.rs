//! Error taxonomy of the authentication service and its HTTP mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{jwt::IssueError, password::HashError, repositories::StoreError};

/// Errors returned by the session manager and the request authenticator
#[derive(Debug, Error)]
pub enum AuthError {
    /// Input failed shape validation
    #[error("{0}")]
    Validation(String),

    /// Unknown email, wrong password or unreadable stored hash
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Refresh token not found
    #[error("invalid token")]
    InvalidToken,

    /// Refresh token revoked or past its expiry
    #[error("token expired")]
    ExpiredToken,

    /// Access token missing, malformed, badly signed or expired
    #[error("unauthorized")]
    Unauthorized,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Hashing, entropy or signing failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<HashError> for AuthError {
    fn from(err: HashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<IssueError> for AuthError {
    fn from(err: IssueError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl AuthError {
    /// HTTP status and client-facing message
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid credentials".to_string())
            }
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid token".to_string()),
            AuthError::ExpiredToken => (StatusCode::UNAUTHORIZED, "token expired".to_string()),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            AuthError::DuplicateEmail => {
                (StatusCode::CONFLICT, "email already registered".to_string())
            }
            AuthError::Storage(_) | AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Storage(_) | AuthError::Internal(_) = &self {
            error!("Request failed: {}", self);
        }

        let (status, error_message) = self.status_and_message();
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for authentication results
pub type AuthResult<T> = Result<T, AuthError>;
