// src/services/mod.rs
//
// Outbound integrations used by the sign-in flow

pub mod google;

pub use google::{GoogleService, IdentityProviderClient};
