use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failure modes of link mutations. Every variant is a handled business-rule
/// outcome except `Internal`, which wraps unexpected store failures.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("No authenticated identity")]
    Unauthenticated,

    #[error("{0}")]
    InvalidInput(String),

    #[error("This short code is already taken")]
    CodeConflict,

    #[error("Could not find a free short code, try again")]
    CodeExhausted,

    #[error("Link not found")]
    NotFound,

    #[error("This link belongs to another user")]
    Forbidden,

    #[error("An unexpected error occurred")]
    Internal(#[from] anyhow::Error),
}

impl LinkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LinkError::Unauthenticated => StatusCode::UNAUTHORIZED,
            LinkError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LinkError::CodeConflict => StatusCode::CONFLICT,
            LinkError::CodeExhausted => StatusCode::SERVICE_UNAVAILABLE,
            LinkError::NotFound => StatusCode::NOT_FOUND,
            LinkError::Forbidden => StatusCode::FORBIDDEN,
            LinkError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        if let LinkError::Internal(ref source) = self {
            tracing::error!("Internal error while handling request: {:?}", source);
        }

        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("A user with this email already exists")]
    UserAlreadyExists,

    #[error("Invalid email or password")]
    WrongCredentials,

    #[error("Failed to generate session")]
    TokenCreation,

    #[error("Invalid or expired session")]
    InvalidToken,

    #[error("An unexpected error occurred")]
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthError::WrongCredentials => StatusCode::UNAUTHORIZED,
            AuthError::TokenCreation => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
