use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::auth::store::StoreError;

/// Errors surfaced to HTTP callers.
///
/// `InvalidCredentials` deliberately covers both "no such user" and "wrong
/// password" so responses cannot be used to enumerate usernames.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Username already taken!")]
    DuplicateUsername,
    #[error("Invalid credentials!")]
    InvalidCredentials,
    #[error("Incorrect old password!")]
    WrongOldPassword,
    #[error("User not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::DuplicateUsername => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::WrongOldPassword => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => ApiError::DuplicateUsername,
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Backend(e) => ApiError::Internal(e.into()),
        }
    }
}
