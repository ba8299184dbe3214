//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account database model (`users` table)
#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing, default)]
    pub hashed_password: Option<String>,
    pub google_id: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Account {
    pub fn has_password(&self) -> bool {
        self.hashed_password.is_some()
    }
}

/// Identity attributes asserted by the provider about the signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderClaims {
    pub subject_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl ProviderClaims {
    pub fn new(subject_id: &str, email: &str, display_name: Option<&str>) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
        }
    }

    /// Trims every field, lower-cases the email and drops a blank display name
    pub fn normalized(self) -> Self {
        Self {
            subject_id: self.subject_id.trim().to_string(),
            email: normalize_email(&self.email),
            display_name: self
                .display_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signed session token handed to the client after sign-in. Never stored.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub token: String,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Query parameters Google sends to the callback
#[derive(Deserialize, Debug, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Identity providers accepted in `/login/{provider}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
}

impl Provider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "google" => Some(Provider::Google),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
        }
    }
}
