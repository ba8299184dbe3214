// Application state shared across all handlers

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::resolver::AccountResolver;
use crate::auth::session::SessionIssuer;
use crate::auth::store::AccountStore;
use crate::common::config::Config;
use crate::services::IdentityProviderClient;

/// Built once at startup and read-only afterwards
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub accounts: Arc<dyn AccountStore>,
    pub resolver: AccountResolver,
    pub session_issuer: SessionIssuer,
    pub identity_provider: Arc<dyn IdentityProviderClient>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Arc<Config>,
        accounts: Arc<dyn AccountStore>,
        session_issuer: SessionIssuer,
        identity_provider: Arc<dyn IdentityProviderClient>,
    ) -> Self {
        Self {
            db,
            config,
            resolver: AccountResolver::new(accounts.clone()),
            accounts,
            session_issuer,
            identity_provider,
        }
    }
}
