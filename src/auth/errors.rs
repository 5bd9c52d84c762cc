//! Failures of the signup and login flows and how they reach the client.
//!
//! Client mistakes are returned verbatim as `400 {"message": ...}`. Collaborator
//! failures are logged with their detail and rendered as a bare 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::dto::MessageResponse;

/// Errors raised by a [`UserStore`](super::repo::UserStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already in use")]
    DuplicateEmail,

    #[error("user store unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid request body")]
    MalformedBody,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    WeakPassword(String),

    #[error("Email already in use")]
    DuplicateEmail,

    /// Deliberately identical for unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("user store unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),

    #[error("password hashing failed: {0}")]
    HashingFailure(String),

    #[error("token signing failed: {0}")]
    TokenSigning(#[from] jsonwebtoken::errors::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::Unavailable(e) => AuthError::StorageUnavailable(e),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MalformedBody
            | AuthError::MissingField(_)
            | AuthError::WeakPassword(_)
            | AuthError::DuplicateEmail
            | AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AuthError::StorageUnavailable(_)
            | AuthError::HashingFailure(_)
            | AuthError::TokenSigning(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(MessageResponse { message })).into_response()
    }
}
