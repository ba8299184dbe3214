//! Sign-in flow: code exchange -> userinfo -> account resolution -> session

use tracing::info;

use super::error::AuthError;
use super::models::{Account, SessionCredential};
use super::resolver::AccountResolver;
use super::session::SessionIssuer;
use crate::common::safe_email_log;
use crate::services::IdentityProviderClient;

#[derive(Debug)]
pub struct SignIn {
    pub account: Account,
    pub credential: SessionCredential,
}

/// Runs one sign-in. Upstream failures stop the flow before the resolver is
/// called, so a rejected sign-in never mutates an account.
pub async fn sign_in(
    provider: &dyn IdentityProviderClient,
    resolver: &AccountResolver,
    issuer: &SessionIssuer,
    code: &str,
) -> Result<SignIn, AuthError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AuthError::upstream(
            "invalid_request",
            "missing authorization code",
        ));
    }

    let access_token = provider.exchange_code(code).await?;
    let claims = provider.fetch_userinfo(&access_token).await?;
    let account = resolver.resolve(claims).await?;
    let credential = issuer.issue(&account.id)?;

    info!(
        user_id = %account.id,
        email = %safe_email_log(&account.email),
        provider = "google",
        "User authentication successful via Google OAuth"
    );

    Ok(SignIn { account, credential })
}
