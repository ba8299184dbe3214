// src/logging_middleware.rs
//! Middleware for logging requests with credentials redacted
//!
//! The callback URL carries the authorization code and the frontend redirect
//! carries the session token, so neither may reach the logs verbatim.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::debug;

use crate::common::safe_token_log;

const SENSITIVE_PARAMS: [&str; 3] = ["code", "token", "state"];

/// Replaces the values of sensitive query parameters with a masked form
pub fn redact_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if SENSITIVE_PARAMS.contains(&key) => {
                format!("{}={}", key, safe_token_log(value))
            }
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Logs method, path, redacted query, status and latency for every request
pub async fn log_request_response(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(redact_query);
    let started = Instant::now();

    let response = next.run(request).await;

    let location = response
        .headers()
        .get(axum::http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|loc| match loc.split_once('?') {
            Some((base, q)) => format!("{}?{}", base, redact_query(q)),
            None => loc.to_string(),
        });

    debug!(
        method = %method,
        path = %path,
        query = ?query,
        status = %response.status(),
        location = ?location,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "📤 Response"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_code_and_token() {
        assert_eq!(
            redact_query("code=4/0AfJohXlongauthcode&scope=email"),
            "code=4/0A...code&scope=email"
        );
        assert_eq!(redact_query("token=abc"), "token=***");
    }

    #[test]
    fn test_leaves_other_params() {
        assert_eq!(redact_query("error=access_denied"), "error=access_denied");
        assert_eq!(redact_query("flag"), "flag");
    }
}
