use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::jwt::TokenError;

/// Outcome of a failed auth flow, mapped 1:1 onto an HTTP response.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("User already exists")]
    UserExists,
    #[error("User not found")]
    UserNotFound,
    #[error("Wrong password")]
    WrongPassword,
    #[error("No token provided")]
    NoToken,
    #[error("Invalid token")]
    InvalidToken(#[source] TokenError),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidInput(_) | AuthError::UserExists | AuthError::UserNotFound => {
                StatusCode::BAD_REQUEST
            }
            AuthError::WrongPassword | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::NoToken => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(e) => AuthError::Internal(anyhow::anyhow!(e)),
            other => AuthError::InvalidToken(other),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(e) = &self {
            error!(error = %format!("{e:#}"), "internal error");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}
