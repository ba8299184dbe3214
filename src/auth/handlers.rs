//! Authentication handlers

use axum::{
    extract::{Extension, Json, Path, Query},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::extractors::AuthedUser;
use super::flow::sign_in;
use super::models::{Account, CallbackParams, Provider};
use super::redirect::frontend_redirect_url;
use crate::common::{safe_token_log, ApiError, AppState};

fn parse_provider(raw: &str) -> Result<Provider, ApiError> {
    Provider::parse(raw).ok_or_else(|| {
        warn!(provider = %raw, "Sign-in requested for unsupported provider");
        ApiError::NotFound(format!("Unsupported identity provider: {}", raw))
    })
}

/// 302 Found with a Location header
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// GET /api/v1/login/{provider}
/// Redirects the client to the provider's consent page
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;
    let auth_url = state.identity_provider.authorization_url();

    debug!(provider = provider.as_str(), "Redirecting to identity provider");
    Ok(found(&auth_url))
}

/// GET /api/v1/login/{provider}/callback?code=...
/// Completes sign-in and redirects to `{frontend}/login?token=<jwt>`
pub async fn callback(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;

    if let Some(error) = params.error.as_deref() {
        warn!(
            provider = provider.as_str(),
            oauth_error = %error,
            oauth_error_description = ?params.error_description,
            "Identity provider returned error to callback"
        );
        return Err(ApiError::BadRequest(
            "Google sign-in was cancelled or denied".to_string(),
        ));
    }

    let code = params
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            warn!(provider = provider.as_str(), "No authorization code in OAuth callback");
            ApiError::BadRequest("No authorization code provided".to_string())
        })?;

    let outcome = sign_in(
        state.identity_provider.as_ref(),
        &state.resolver,
        &state.session_issuer,
        code,
    )
    .await?;

    let redirect_url = frontend_redirect_url(&state.config, &outcome.credential.token);
    info!(
        user_id = %outcome.account.id,
        token = %safe_token_log(&outcome.credential.token),
        "Redirecting signed-in user to frontend"
    );

    Ok(found(&redirect_url))
}

/// GET /api/v1/users/me
/// Returns the account named by the bearer session credential
pub async fn me_handler(authed: AuthedUser) -> Json<Account> {
    Json(authed.account)
}

/// GET /health
pub async fn health(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
