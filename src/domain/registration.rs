//! Local account registration.

use serde_json::{Map, Value};

use crate::domain::error::SquirrelError;
use crate::domain::password::Hasher;
use crate::domain::settings::AuthSettings;
use crate::domain::user::{NewUser, User};
use crate::ports::credential_store::CredentialStore;

/// Registration form. Non-string values count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
}

impl Registration {
    pub fn from_json(body: &Map<String, Value>) -> Self {
        let field = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            username: field("username"),
            email: field("email"),
            password: field("password"),
            bio: field("bio"),
        }
    }
}

pub fn check_password(password: &str, settings: &AuthSettings) -> Result<(), SquirrelError> {
    if password.chars().count() < settings.min_password_length {
        return Err(SquirrelError::validation(format!(
            "Password must be at least {} characters long.",
            settings.min_password_length
        )));
    }
    Ok(())
}

pub fn check_username(username: &str, settings: &AuthSettings) -> Result<(), SquirrelError> {
    if username.is_empty() {
        return Err(SquirrelError::validation("Missing username."));
    }
    if username.chars().count() > settings.max_username_length {
        return Err(SquirrelError::validation(format!(
            "Username may not be longer than {} characters.",
            settings.max_username_length
        )));
    }
    Ok(())
}

pub fn check_email(email: &str) -> Result<(), SquirrelError> {
    if email.is_empty() {
        return Err(SquirrelError::validation("Missing email."));
    }
    Ok(())
}

/// Validate and create a local account.
///
/// Field checks run in order: password present, password length, username
/// present, username length, email present. Uniqueness is checked by the store
/// inside the insert transaction, username first.
pub fn register(
    store: &dyn CredentialStore,
    hasher: &Hasher,
    settings: &AuthSettings,
    form: Registration,
) -> Result<User, SquirrelError> {
    let password = form
        .password
        .ok_or_else(|| SquirrelError::validation("Missing password."))?;
    check_password(&password, settings)?;
    let username = form.username.unwrap_or_default();
    check_username(&username, settings)?;
    let email = form.email.unwrap_or_default();
    check_email(&email)?;

    let new_user = NewUser {
        username,
        email,
        password_hash: Some(hasher.hash(&password)?),
        bio: form.bio,
    };
    let user = store.create_user(&new_user)?;
    tracing::info!(user_id = user.id, "registered user");
    Ok(user)
}
