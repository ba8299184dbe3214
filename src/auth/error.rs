//! Sign-in error taxonomy and its mapping onto HTTP errors

use thiserror::Error;
use tracing::{error, warn};

use crate::common::ApiError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Token exchange or userinfo call failed or returned a malformed payload
    #[error("identity provider error ({code}): {description}")]
    UpstreamIdentity { code: String, description: String },

    /// Required claims missing or empty after a successful upstream call
    #[error("invalid identity claims: {0}")]
    InvalidClaims(String),

    /// A concurrent sign-in won the race and the single re-read could not
    /// find the account it wrote
    #[error("concurrent sign-in could not be reconciled")]
    ResolutionConflict,

    /// The email belongs to an account already linked to another subject id
    #[error("email is already linked to a different Google account")]
    AccountLinkConflict,

    #[error("session signing failed: {0}")]
    Signing(String),

    #[error("invalid session token")]
    InvalidToken,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    pub fn upstream(code: impl Into<String>, description: impl Into<String>) -> Self {
        AuthError::UpstreamIdentity {
            code: code.into(),
            description: description.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UpstreamIdentity { code, description } => {
                warn!(upstream_code = %code, "Sign-in rejected: upstream identity error");
                ApiError::BadRequest(format!(
                    "Could not validate Google credentials: {}",
                    description
                ))
            }
            AuthError::InvalidClaims(msg) => {
                warn!(reason = %msg, "Sign-in rejected: invalid claims");
                ApiError::BadRequest(format!("Could not validate Google credentials: {}", msg))
            }
            AuthError::AccountLinkConflict => ApiError::Conflict(
                "This email is already linked to a different Google account".to_string(),
            ),
            AuthError::ResolutionConflict => {
                error!("Account resolution conflict persisted after re-read");
                ApiError::InternalServer("Could not resolve account".to_string())
            }
            AuthError::Signing(msg) => {
                error!(error = %msg, "Session signing failed");
                ApiError::InternalServer("Could not issue session".to_string())
            }
            AuthError::InvalidToken => {
                ApiError::Unauthorized("Could not validate credentials".to_string())
            }
            AuthError::Database(e) => ApiError::DatabaseError(e),
        }
    }
}
