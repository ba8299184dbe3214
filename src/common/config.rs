// src/common/config.rs
//! Runtime configuration loaded from the environment
//!
//! Everything the sign-in flow needs is read once at startup and then shared
//! read-only through `AppState`.

use std::env;
use thiserror::Error;

pub const DEFAULT_API_V1_STR: &str = "/api/v1";
pub const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 60 * 24 * 8;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Deployment environment tag. Anything other than `local` is treated as a
/// hosted deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Local,
    Hosted(String),
}

impl Environment {
    pub fn parse(raw: &str) -> Self {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() || tag == "local" {
            Environment::Local
        } else {
            Environment::Hosted(tag)
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Environment::Local)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database_url: String,
    pub port: u16,
    pub api_v1_str: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub frontend_url: Option<String>,
    pub frontend_fallback_url: String,
    pub cors_origins: Vec<String>,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub reset_db: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let environment = Environment::parse(&get("ENVIRONMENT").unwrap_or_default());
        let api_v1_str = get("API_V1_STR").unwrap_or_else(|| DEFAULT_API_V1_STR.to_string());

        let port = match get("PORT") {
            Some(p) => p.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => 8000,
        };

        let access_token_expire_minutes = match get("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Some(m) => {
                let minutes = m.parse::<i64>().map_err(|e| ConfigError::Invalid {
                    name: "ACCESS_TOKEN_EXPIRE_MINUTES",
                    reason: e.to_string(),
                })?;
                if minutes <= 0 {
                    return Err(ConfigError::Invalid {
                        name: "ACCESS_TOKEN_EXPIRE_MINUTES",
                        reason: "must be positive".to_string(),
                    });
                }
                minutes
            }
            None => DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
        };

        let backend_host =
            get("BACKEND_HOST").unwrap_or_else(|| format!("http://localhost:{}", port));
        let google_redirect_uri = get("GOOGLE_REDIRECT_URI").unwrap_or_else(|| {
            format!(
                "{}{}/login/google/callback",
                backend_host.trim_end_matches('/'),
                api_v1_str
            )
        });

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            environment,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://signin_api.db".to_string()),
            port,
            api_v1_str,
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            google_redirect_uri,
            frontend_url: get("FRONTEND_URL"),
            frontend_fallback_url: get("FRONTEND_FALLBACK_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            cors_origins,
            secret_key: required("SECRET_KEY")?,
            access_token_expire_minutes,
            reset_db: get("RESET_DB").map(|v| v.to_lowercase() == "true").unwrap_or(false),
        })
    }
}
