// src/services/google.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::auth::error::AuthError;
use crate::auth::models::ProviderClaims;
use crate::common::config::Config;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Google returned {code}: {description}")]
    Provider { code: String, description: String },

    #[error("Malformed response: {0}")]
    MalformedPayload(String),
}

impl From<GoogleError> for AuthError {
    fn from(err: GoogleError) -> Self {
        match err {
            GoogleError::RequestFailed(_) => {
                AuthError::upstream("request_failed", "identity provider unreachable")
            }
            GoogleError::Provider { code, description } => AuthError::upstream(code, description),
            GoogleError::MalformedPayload(msg) => AuthError::upstream("malformed_response", msg),
        }
    }
}

/// The two provider calls a sign-in needs, plus the URL that starts it.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    fn authorization_url(&self) -> String;

    /// Authorization code -> provider access token
    async fn exchange_code(&self, code: &str) -> Result<String, GoogleError>;

    /// Provider access token -> identity claims
    async fn fetch_userinfo(&self, access_token: &str) -> Result<ProviderClaims, GoogleError>;
}

#[derive(Debug, Clone)]
pub struct GoogleService {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleService {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<(u16, Value), GoogleError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;
        let body = serde_json::from_str::<Value>(&text).map_err(|_| {
            warn!(http_status = status, body = %text, "Google returned a non-JSON body");
            GoogleError::MalformedPayload(format!("HTTP {} with non-JSON body", status))
        })?;
        Ok((status, body))
    }
}

/// Scopes, consent and offline access are fixed for sign-in
pub fn authorization_url(client_id: &str, redirect_uri: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        GOOGLE_AUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode("email profile")
    )
}

/// Fails if the payload carries an OAuth `error` field
pub fn check_error_field(body: &Value) -> Result<(), GoogleError> {
    let Some(error) = body.get("error") else {
        return Ok(());
    };

    // Token endpoint: {"error": "invalid_grant", "error_description": "..."}
    // Userinfo: {"error": {"code": 401, "message": "...", "status": "UNAUTHENTICATED"}}
    let (code, description) = match error {
        Value::String(code) => {
            let description = body
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or(code)
                .to_string();
            (code.clone(), description)
        }
        Value::Object(obj) => {
            let code = obj
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| obj.get("code").map(|c| c.to_string()))
                .unwrap_or_else(|| "error".to_string());
            let description = obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("identity provider error")
                .to_string();
            (code, description)
        }
        other => (other.to_string(), "identity provider error".to_string()),
    };

    warn!(upstream_code = %code, payload = %body, "Google OAuth Error");
    Err(GoogleError::Provider { code, description })
}

pub fn parse_token_response(status: u16, body: &Value) -> Result<String, GoogleError> {
    check_error_field(body)?;

    match body.get("access_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => {
            warn!(http_status = status, payload = %body, "Token response missing access_token");
            Err(GoogleError::MalformedPayload(
                "token response missing access_token".to_string(),
            ))
        }
    }
}

pub fn parse_userinfo(status: u16, body: &Value) -> Result<ProviderClaims, GoogleError> {
    check_error_field(body)?;

    let field = |name: &str| body.get(name).and_then(Value::as_str);

    let Some(subject_id) = field("id") else {
        warn!(http_status = status, payload = %body, "Userinfo response missing id");
        return Err(GoogleError::MalformedPayload("userinfo missing id".to_string()));
    };
    let Some(email) = field("email") else {
        warn!(http_status = status, payload = %body, "Userinfo response missing email");
        return Err(GoogleError::MalformedPayload("userinfo missing email".to_string()));
    };
    if body.get("verified_email").and_then(Value::as_bool) == Some(false) {
        warn!(provider_id = %subject_id, "Google account email is not verified");
        return Err(GoogleError::Provider {
            code: "unverified_email".to_string(),
            description: "Google account email is not verified".to_string(),
        });
    }

    Ok(ProviderClaims::new(subject_id, email, field("name")))
}

#[async_trait]
impl IdentityProviderClient for GoogleService {
    fn authorization_url(&self) -> String {
        authorization_url(&self.client_id, &self.redirect_uri)
    }

    async fn exchange_code(&self, code: &str) -> Result<String, GoogleError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = GOOGLE_TOKEN_URL, "HTTP error contacting Google token endpoint");
                GoogleError::RequestFailed(e.to_string())
            })?;

        let (status, body) = Self::read_json(response).await?;
        parse_token_response(status, &body)
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<ProviderClaims, GoogleError> {
        let response = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = GOOGLE_USERINFO_URL, "HTTP error contacting Google userinfo endpoint");
                GoogleError::RequestFailed(e.to_string())
            })?;

        let (status, body) = Self::read_json(response).await?;
        let claims = parse_userinfo(status, &body)?;
        debug!(provider_id = %claims.subject_id, "Fetched Google userinfo");
        Ok(claims)
    }
}
