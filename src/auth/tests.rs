//! Tests for the sign-in flow and the auth routes
//!
//! These tests drive the full callback path against an in-memory database
//! with a fake identity provider in place of Google:
//! - Upstream failures never reach the account resolver
//! - The callback redirects with a verifiable session token
//! - The bearer extractor accepts issued tokens and rejects forged ones

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::auth::error::AuthError;
    use crate::auth::flow::sign_in;
    use crate::auth::models::ProviderClaims;
    use crate::auth::resolver::AccountResolver;
    use crate::auth::session::SessionIssuer;
    use crate::auth::store::{AccountStore, SqliteAccountStore};
    use crate::common::config::Config;
    use crate::common::migrations::run_migrations;
    use crate::common::AppState;
    use crate::services::google::GoogleError;
    use crate::services::IdentityProviderClient;

    const SECRET: &str = "test_secret_key";

    /// Stands in for Google: canned results for both calls, counting each
    struct FakeProvider {
        token: Result<String, (String, String)>,
        userinfo: Result<ProviderClaims, String>,
        exchanges: AtomicUsize,
        userinfo_calls: AtomicUsize,
    }

    impl FakeProvider {
        fn returning(claims: ProviderClaims) -> Self {
            Self {
                token: Ok("ya29.fake".to_string()),
                userinfo: Ok(claims),
                exchanges: AtomicUsize::new(0),
                userinfo_calls: AtomicUsize::new(0),
            }
        }

        fn failing_exchange(code: &str, description: &str) -> Self {
            Self {
                token: Err((code.to_string(), description.to_string())),
                ..Self::returning(ProviderClaims::new("unused", "unused@x.com", None))
            }
        }

        fn malformed_userinfo(reason: &str) -> Self {
            Self {
                userinfo: Err(reason.to_string()),
                ..Self::returning(ProviderClaims::new("unused", "unused@x.com", None))
            }
        }
    }

    #[async_trait]
    impl IdentityProviderClient for FakeProvider {
        fn authorization_url(&self) -> String {
            crate::services::google::authorization_url("test_client_id", "http://localhost/cb")
        }

        async fn exchange_code(&self, _code: &str) -> Result<String, GoogleError> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            self.token.clone().map_err(|(code, description)| GoogleError::Provider {
                code,
                description,
            })
        }

        async fn fetch_userinfo(&self, access_token: &str) -> Result<ProviderClaims, GoogleError> {
            assert_eq!(access_token, "ya29.fake");
            self.userinfo_calls.fetch_add(1, Ordering::SeqCst);
            self.userinfo
                .clone()
                .map_err(GoogleError::MalformedPayload)
        }
    }

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool, false).await.unwrap();
        pool
    }

    async fn count_accounts(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    fn test_config(extra: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = [
            ("GOOGLE_CLIENT_ID", "test_client_id"),
            ("GOOGLE_CLIENT_SECRET", "test_client_secret"),
            ("SECRET_KEY", SECRET),
            ("FRONTEND_URL", "http://localhost:5173"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    fn issuer() -> SessionIssuer {
        SessionIssuer::new(SECRET, Duration::minutes(60)).unwrap()
    }

    fn app_state(pool: SqlitePool, provider: Arc<FakeProvider>, config: Config) -> Arc<AppState> {
        let accounts: Arc<dyn AccountStore> = Arc::new(SqliteAccountStore::new(pool.clone()));
        Arc::new(AppState::new(pool, Arc::new(config), accounts, issuer(), provider))
    }

    async fn get(app: axum::Router, uri: &str, bearer: Option<&str>) -> axum::response::Response {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    // ------------------------------------------------------------------------
    // Flow
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_sign_in_creates_account_and_issues_session() {
        let pool = setup_pool().await;
        let resolver = AccountResolver::new(Arc::new(SqliteAccountStore::new(pool.clone())));
        let provider = FakeProvider::returning(ProviderClaims::new("P2", "b@x.com", Some("Bea")));
        let issuer = issuer();

        let outcome = sign_in(&provider, &resolver, &issuer, "auth-code").await.unwrap();

        assert_eq!(outcome.account.email, "b@x.com");
        assert_eq!(outcome.credential.subject, outcome.account.id);
        let claims = issuer.verify(&outcome.credential.token).unwrap();
        assert_eq!(claims.sub, outcome.account.id);
        assert_eq!(count_accounts(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_failed_exchange_skips_userinfo_and_resolver() {
        let pool = setup_pool().await;
        let resolver = AccountResolver::new(Arc::new(SqliteAccountStore::new(pool.clone())));
        let provider = FakeProvider::failing_exchange("invalid_grant", "Bad Request");

        let result = sign_in(&provider, &resolver, &issuer(), "stale-code").await;

        assert!(matches!(result, Err(AuthError::UpstreamIdentity { .. })));
        assert_eq!(provider.userinfo_calls.load(Ordering::SeqCst), 0);
        assert_eq!(count_accounts(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_malformed_userinfo_never_reaches_resolver() {
        let pool = setup_pool().await;
        let resolver = AccountResolver::new(Arc::new(SqliteAccountStore::new(pool.clone())));
        let provider = FakeProvider::malformed_userinfo("userinfo missing id");

        let result = sign_in(&provider, &resolver, &issuer(), "auth-code").await;

        assert!(matches!(result, Err(AuthError::UpstreamIdentity { .. })));
        assert_eq!(count_accounts(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_empty_code_rejected_before_exchange() {
        let pool = setup_pool().await;
        let resolver = AccountResolver::new(Arc::new(SqliteAccountStore::new(pool)));
        let provider = FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", None));

        let result = sign_in(&provider, &resolver, &issuer(), "   ").await;

        assert!(matches!(result, Err(AuthError::UpstreamIdentity { .. })));
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_subject_is_invalid_claims() {
        let pool = setup_pool().await;
        let resolver = AccountResolver::new(Arc::new(SqliteAccountStore::new(pool.clone())));
        let provider = FakeProvider::returning(ProviderClaims::new("", "a@x.com", None));

        let result = sign_in(&provider, &resolver, &issuer(), "auth-code").await;

        assert!(matches!(result, Err(AuthError::InvalidClaims(_))));
        assert_eq!(count_accounts(&pool).await, 0);
    }

    // ------------------------------------------------------------------------
    // Routes
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_redirects_to_provider() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", None)));
        let app = crate::build_router(app_state(pool, provider, test_config(&[])));

        let response = get(app, "/api/v1/login/google", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let target = location(&response);
        assert!(target.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(target.contains("prompt=consent"));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_found() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", None)));
        let app = crate::build_router(app_state(pool, provider, test_config(&[])));

        let response = get(app, "/api/v1/login/myspace", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert!(body["detail"].as_str().unwrap().contains("myspace"));
    }

    #[tokio::test]
    async fn test_callback_redirects_with_token() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", Some("Ada"))));
        let app = crate::build_router(app_state(pool.clone(), provider, test_config(&[])));

        let response = get(app, "/api/v1/login/google/callback?code=auth-code", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let target = location(&response);
        let token = target
            .strip_prefix("http://localhost:5173/login?token=")
            .expect("redirect to configured frontend");
        let claims = issuer().verify(token).unwrap();
        let account = SqliteAccountStore::new(pool)
            .find_by_id(&claims.sub)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.google_id.as_deref(), Some("P1"));
    }

    #[tokio::test]
    async fn test_hosted_callback_uses_fallback_origin() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", None)));
        let config = test_config(&[
            ("ENVIRONMENT", "production"),
            ("FRONTEND_FALLBACK_URL", "https://app.example.com"),
        ]);
        let app = crate::build_router(app_state(pool, provider, config));

        let response = get(app, "/api/v1/login/google/callback?code=auth-code", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("https://app.example.com/login?token="));
    }

    #[tokio::test]
    async fn test_callback_without_code_is_bad_request() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", None)));
        let app = crate::build_router(app_state(pool, provider.clone(), test_config(&[])));

        let response = get(app, "/api/v1/login/google/callback", None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "No authorization code provided");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_with_provider_error_is_bad_request() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", None)));
        let app = crate::build_router(app_state(pool, provider.clone(), test_config(&[])));

        let response = get(
            app,
            "/api/v1/login/google/callback?error=%3Cscript%3Ealert(1)%3C%2Fscript%3E",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "Google sign-in was cancelled or denied");
        assert!(!body["detail"].as_str().unwrap_or_default().contains("script"));
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_upstream_failure_returns_detail() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::failing_exchange("invalid_grant", "Bad Request"));
        let app = crate::build_router(app_state(pool.clone(), provider, test_config(&[])));

        let response = get(app, "/api/v1/login/google/callback?code=used-code", None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "Could not validate Google credentials: Bad Request");
        assert_eq!(count_accounts(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_me_returns_account_for_issued_token() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", Some("Ada"))));
        let state = app_state(pool.clone(), provider, test_config(&[]));
        let account = state
            .resolver
            .resolve(ProviderClaims::new("P1", "a@x.com", Some("Ada")))
            .await
            .unwrap();
        let token = state.session_issuer.issue(&account.id).unwrap().token;
        let app = crate::build_router(state);

        let response = get(app, "/api/v1/users/me", Some(&token)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], account.id.as_str());
        assert_eq!(body["email"], "a@x.com");
        assert!(body.get("hashed_password").is_none());
    }

    #[tokio::test]
    async fn test_me_rejects_missing_and_forged_tokens() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", None)));
        let state = app_state(pool, provider, test_config(&[]));
        let forged = SessionIssuer::new("other_secret", Duration::minutes(5))
            .unwrap()
            .issue("U_FORGED0000")
            .unwrap()
            .token;
        let app = crate::build_router(state);

        let missing = get(app.clone(), "/api/v1/users/me", None).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let forged = get(app, "/api/v1/users/me", Some(&forged)).await;
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health() {
        let pool = setup_pool().await;
        let provider = Arc::new(FakeProvider::returning(ProviderClaims::new("P1", "a@x.com", None)));
        let app = crate::build_router(app_state(pool, provider, test_config(&[])));

        let response = get(app, "/health", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }
}
