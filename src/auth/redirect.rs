//! Client-facing redirect after a successful sign-in

use crate::common::config::{Config, Environment};

/// Picks the frontend origin. A missing or localhost `FRONTEND_URL` is only
/// honoured in a local environment; hosted deployments fall back.
pub fn frontend_origin<'a>(
    frontend_url: Option<&'a str>,
    fallback: &'a str,
    environment: &Environment,
) -> &'a str {
    match frontend_url {
        Some(url) if !url.contains("localhost") || environment.is_local() => url,
        _ => fallback,
    }
}

/// `{frontend}/login?token=<credential>`
pub fn frontend_redirect_url(config: &Config, token: &str) -> String {
    let origin = frontend_origin(
        config.frontend_url.as_deref(),
        &config.frontend_fallback_url,
        &config.environment,
    );
    format!(
        "{}/login?token={}",
        origin.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}
