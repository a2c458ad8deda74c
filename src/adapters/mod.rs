//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod sqlite_adapter;
#[cfg(feature = "web")]
pub mod google_oauth;
#[cfg(feature = "web")]
pub mod web;
