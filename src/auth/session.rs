//! Session credential issuing and verification (HS256 JWT)

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use tracing::{debug, warn};

use super::error::AuthError;
use super::models::{SessionClaims, SessionCredential};
use crate::common::config::{Config, ConfigError};

/// Signs session credentials with the process-wide key. Built once at
/// startup; a missing key is a configuration error, not a request error.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::Missing("SECRET_KEY"));
        }
        if ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                name: "ACCESS_TOKEN_EXPIRE_MINUTES",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(
            &config.secret_key,
            Duration::minutes(config.access_token_expire_minutes),
        )
    }

    pub fn issue(&self, account_id: &str) -> Result<SessionCredential, AuthError> {
        self.issue_at(account_id, Utc::now())
    }

    pub fn issue_at(
        &self,
        account_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<SessionCredential, AuthError> {
        if account_id.is_empty() {
            return Err(AuthError::Signing("empty subject".to_string()));
        }

        let expires_at = issued_at + self.ttl;
        let claims = SessionClaims {
            sub: account_id.to_string(),
            iat: issued_at.timestamp().max(0) as usize,
            exp: expires_at.timestamp().max(0) as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        debug!(user_id = %account_id, expires_at = %expires_at, "Session credential issued");

        Ok(SessionCredential {
            token,
            subject: account_id.to_string(),
            issued_at,
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        decode::<SessionClaims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                warn!(error = %e, "JWT token validation failed");
                AuthError::InvalidToken
            })
    }
}
