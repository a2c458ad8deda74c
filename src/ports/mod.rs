//! Port traits implemented by adapters.

pub mod config_port;
pub mod credential_store;
pub mod directory_port;
#[cfg(feature = "web")]
pub mod identity_provider;
