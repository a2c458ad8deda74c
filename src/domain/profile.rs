//! Self-service profile updates.
//!
//! A patch may only name `username`, `email`, `password` and `bio`, each as a
//! string. The whole patch is validated before anything is written; values
//! equal to the current ones are dropped; what survives is written in a single
//! store update.

use serde_json::{Map, Value};

use crate::domain::error::{SquirrelError, UniqueField};
use crate::domain::password::Hasher;
use crate::domain::registration::{check_email, check_password, check_username};
use crate::domain::settings::AuthSettings;
use crate::domain::user::{User, UserChanges};
use crate::ports::credential_store::CredentialStore;

/// A patch that passed the whitelist and type checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
}

impl ProfilePatch {
    pub fn from_json(body: &Map<String, Value>) -> Result<Self, SquirrelError> {
        let mut patch = ProfilePatch::default();
        for (key, value) in body {
            let Value::String(s) = value else {
                return Err(SquirrelError::InvalidRequest);
            };
            let slot = match key.as_str() {
                "username" => &mut patch.username,
                "email" => &mut patch.email,
                "password" => &mut patch.password,
                "bio" => &mut patch.bio,
                _ => return Err(SquirrelError::InvalidRequest),
            };
            *slot = Some(s.clone());
        }
        Ok(patch)
    }
}

pub struct ProfileEditor<'a> {
    store: &'a dyn CredentialStore,
    hasher: &'a Hasher,
    settings: &'a AuthSettings,
}

impl<'a> ProfileEditor<'a> {
    pub fn new(store: &'a dyn CredentialStore, hasher: &'a Hasher, settings: &'a AuthSettings) -> Self {
        Self {
            store,
            hasher,
            settings,
        }
    }

    /// Validate and apply `body` to `user`, returning the refreshed record.
    ///
    /// A patch that changes nothing returns `user` without touching the store.
    pub fn apply_settings(&self, user: &User, body: &Map<String, Value>) -> Result<User, SquirrelError> {
        let patch = ProfilePatch::from_json(body)?;
        let changes = self.plan(user, patch)?;
        if changes.is_empty() {
            return Ok(user.clone());
        }
        let updated = self.store.update_user(user.id, &changes)?;
        tracing::info!(user_id = user.id, "profile updated");
        Ok(updated)
    }

    fn plan(&self, user: &User, patch: ProfilePatch) -> Result<UserChanges, SquirrelError> {
        if let Some(username) = &patch.username {
            check_username(username, self.settings)?;
        }
        if let Some(email) = &patch.email {
            check_email(email)?;
        }
        if let Some(password) = &patch.password {
            check_password(password, self.settings)?;
        }

        let username = patch.username.filter(|u| *u != user.username);
        let email = patch.email.filter(|e| *e != user.email);
        let bio = patch.bio.filter(|b| Some(b) != user.bio.as_ref());
        let password = patch
            .password
            .filter(|p| !self.hasher.verify(p, user.password_hash.as_deref()));

        if let Some(username) = &username {
            ensure_free(self.store.find_by_username(username)?, user, UniqueField::Username)?;
        }
        if let Some(email) = &email {
            ensure_free(self.store.find_by_email(email)?, user, UniqueField::Email)?;
        }

        let password_hash = password.map(|p| self.hasher.hash(&p)).transpose()?;
        Ok(UserChanges {
            username,
            email,
            password_hash,
            bio,
        })
    }
}

fn ensure_free(holder: Option<User>, user: &User, field: UniqueField) -> Result<(), SquirrelError> {
    match holder {
        Some(other) if other.id != user.id => {
            tracing::debug!(user_id = user.id, ?field, "profile update collides");
            Err(SquirrelError::conflict(field))
        }
        _ => Ok(()),
    }
}
