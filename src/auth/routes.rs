//! Authentication routes

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET {prefix}/login/:provider` - Redirect to the provider consent page
/// - `GET {prefix}/login/:provider/callback` - Complete sign-in, redirect with token
/// - `GET {prefix}/users/me` - Current account (bearer token)
/// - `GET /health` - Liveness and database check
pub fn auth_routes(prefix: &str) -> Router {
    let prefix = prefix.trim_end_matches('/');
    Router::new()
        .route(&format!("{}/login/:provider", prefix), get(handlers::login))
        .route(
            &format!("{}/login/:provider/callback", prefix),
            get(handlers::callback),
        )
        .route(&format!("{}/users/me", prefix), get(handlers::me_handler))
        .route("/health", get(handlers::health))
}
