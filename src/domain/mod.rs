//! Core domain types and logic.

pub mod error;
pub mod user;
pub mod settings;
pub mod password;
pub mod identity;
pub mod registration;
pub mod profile;
pub mod game;
