//! Account resolution: maps verified provider claims onto exactly one account
//!
//! Resolution runs in two stages. The lookup stage classifies the claims as
//! [`Lookup::Found`] (subject id already linked), [`Lookup::FoundByEmail`]
//! (an account exists for the email but is not linked yet) or
//! [`Lookup::NotFound`]. The mutation stage then performs at most one write:
//! nothing, a link update, or an insert.
//!
//! A write that loses a race against a concurrent sign-in for the same
//! identity is retried once from the lookup stage, which then finds the
//! winner's account.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::models::{Account, ProviderClaims};
use super::store::{AccountStore, NewAccount, StoreError};
use crate::common::{safe_email_log, ValidationResult, Validator};

/// Re-reads allowed after a uniqueness conflict
const MAX_CONFLICT_RETRIES: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Account),
    FoundByEmail(Account),
    NotFound,
}

/// Result of a single mutation attempt
#[derive(Debug)]
enum Step {
    Done(Account),
    Conflict,
}

pub struct ClaimsValidator;

impl Validator<ProviderClaims> for ClaimsValidator {
    fn validate(&self, claims: &ProviderClaims) -> ValidationResult {
        let mut result = ValidationResult::new();
        if claims.subject_id.trim().is_empty() {
            result.add_error("subject_id", "must not be empty");
        }
        if claims.email.trim().is_empty() {
            result.add_error("email", "must not be empty");
        }
        result
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation => AuthError::ResolutionConflict,
            StoreError::Database(e) => AuthError::Database(e),
        }
    }
}

#[derive(Clone)]
pub struct AccountResolver {
    store: Arc<dyn AccountStore>,
}

impl AccountResolver {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, claims: ProviderClaims) -> Result<Account, AuthError> {
        let validation = ClaimsValidator.validate(&claims);
        if !validation.is_valid {
            return Err(AuthError::InvalidClaims(validation.summary()));
        }
        let claims = claims.normalized();

        for attempt in 0..=MAX_CONFLICT_RETRIES {
            let lookup = self.lookup(&claims).await?;
            match self.apply(&claims, lookup).await? {
                Step::Done(account) => return Ok(account),
                Step::Conflict => {
                    warn!(
                        attempt = attempt,
                        provider_id = %claims.subject_id,
                        email = %safe_email_log(&claims.email),
                        "Concurrent sign-in detected, re-reading account"
                    );
                }
            }
        }

        Err(AuthError::ResolutionConflict)
    }

    /// Subject id first so a linked account is never re-linked by email
    pub async fn lookup(&self, claims: &ProviderClaims) -> Result<Lookup, AuthError> {
        if let Some(account) = self.store.find_by_google_id(&claims.subject_id).await? {
            debug!(user_id = %account.id, "Account found by provider subject id");
            return Ok(Lookup::Found(account));
        }

        if let Some(account) = self.store.find_by_email(&claims.email).await? {
            debug!(user_id = %account.id, "Account found by email");
            return Ok(Lookup::FoundByEmail(account));
        }

        Ok(Lookup::NotFound)
    }

    async fn apply(&self, claims: &ProviderClaims, lookup: Lookup) -> Result<Step, AuthError> {
        match lookup {
            Lookup::Found(account) => Ok(Step::Done(account)),

            Lookup::FoundByEmail(account) => match account.google_id.clone() {
                Some(existing) if existing == claims.subject_id => Ok(Step::Done(account)),
                Some(_) => {
                    warn!(
                        user_id = %account.id,
                        provider_id = %claims.subject_id,
                        "Refusing to relink account already bound to another subject id"
                    );
                    Err(AuthError::AccountLinkConflict)
                }
                None => {
                    let linked = self
                        .store
                        .link_google_id(
                            &account.id,
                            &claims.subject_id,
                            claims.display_name.as_deref(),
                        )
                        .await;
                    match linked {
                        Ok(Some(updated)) => {
                            info!(
                                user_id = %updated.id,
                                email = %safe_email_log(&updated.email),
                                has_password = updated.has_password(),
                                provider = "google",
                                "Linked Google identity to existing account"
                            );
                            Ok(Step::Done(updated))
                        }
                        Ok(None) | Err(StoreError::UniqueViolation) => Ok(Step::Conflict),
                        Err(e) => Err(e.into()),
                    }
                }
            },

            Lookup::NotFound => {
                let new_account = NewAccount {
                    email: claims.email.clone(),
                    full_name: claims.display_name.clone(),
                    google_id: claims.subject_id.clone(),
                };
                match self.store.insert(new_account).await {
                    Ok(account) => {
                        info!(
                            user_id = %account.id,
                            email = %safe_email_log(&account.email),
                            provider = "google",
                            "Created new account via Google sign-in"
                        );
                        Ok(Step::Done(account))
                    }
                    Err(StoreError::UniqueViolation) => Ok(Step::Conflict),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}
