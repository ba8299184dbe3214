//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::models::Account;
use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated account extractor
///
/// Validates the `Authorization: Bearer <jwt>` session credential and loads
/// the account it names.
#[derive(Debug)]
pub struct AuthedUser {
    pub account: Account,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let Some(token) = token else {
            warn!("Authentication failed: missing Authorization header");
            return Err(ApiError::Unauthorized("Not authenticated".into()));
        };

        // Handle "Bearer <token>" format or raw token
        let bare_token = token.strip_prefix("Bearer ").unwrap_or(token);

        let claims = app_state.session_issuer.verify(bare_token)?;

        let account = app_state
            .accounts
            .find_by_id(&claims.sub)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %claims.sub, "Database error during account lookup in authentication");
                ApiError::InternalServer("account lookup failed".to_string())
            })?;

        match account {
            Some(account) => {
                debug!(
                    user_id = %account.id,
                    email = %safe_email_log(&account.email),
                    "Account authentication successful via extractor"
                );
                Ok(AuthedUser { account })
            }
            None => {
                warn!(user_id = %claims.sub, "Authentication failed: account not found in database");
                Err(ApiError::NotFound("User not found".into()))
            }
        }
    }
}
