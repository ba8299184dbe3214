//! # Auth Module
//!
//! Google sign-in for the API:
//! - Provider redirect and callback handling
//! - Account resolution (lookup, link by email, or create)
//! - JWT session credentials and the AuthedUser extractor

pub mod error;
pub mod extractors;
pub mod flow;
pub mod handlers;
pub mod models;
pub mod redirect;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use models::Account;
pub use routes::auth_routes;
