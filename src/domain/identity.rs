//! Identity resolution for local and federated logins.

use crate::domain::error::{SquirrelError, UniqueField};
use crate::domain::password::Hasher;
use crate::domain::settings::AuthSettings;
use crate::domain::user::{FederatedProfile, NewUser, User};
use crate::ports::credential_store::CredentialStore;

/// Fallback username when a provider supplies no usable display name.
const FALLBACK_USERNAME: &str = "squirrel";
/// Attempts at a free username before giving up on a federated sign-up.
const MAX_USERNAME_ATTEMPTS: u32 = 20;

/// Resolves login attempts to users. Holds no state of its own.
pub struct IdentityResolver<'a> {
    store: &'a dyn CredentialStore,
    hasher: &'a Hasher,
    settings: &'a AuthSettings,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a dyn CredentialStore, hasher: &'a Hasher, settings: &'a AuthSettings) -> Self {
        Self {
            store,
            hasher,
            settings,
        }
    }

    /// `identifier` is tried as a username, then as an email.
    ///
    /// Unknown identifier and wrong password both yield
    /// [`SquirrelError::InvalidCredentials`], after the same amount of hashing.
    pub fn resolve_local(&self, identifier: &str, plaintext: &str) -> Result<User, SquirrelError> {
        let found = match self.store.find_by_username(identifier)? {
            Some(user) => Some(user),
            None => self.store.find_by_email(identifier)?,
        };
        match found {
            Some(user) if user.has_local_password() => {
                if self.hasher.verify(plaintext, user.password_hash.as_deref()) {
                    Ok(user)
                } else {
                    Err(SquirrelError::InvalidCredentials)
                }
            }
            Some(user) => {
                tracing::debug!(user_id = user.id, "password login for federated-only account");
                self.hasher.verify_decoy(plaintext);
                Err(SquirrelError::InvalidCredentials)
            }
            None => {
                self.hasher.verify_decoy(plaintext);
                Err(SquirrelError::InvalidCredentials)
            }
        }
    }

    /// Return the user linked to the profile's identity, creating and linking a
    /// new passwordless user on first sight.
    pub fn resolve_federated(&self, profile: &FederatedProfile) -> Result<User, SquirrelError> {
        if let Some(user) = self
            .store
            .find_by_federated(&profile.provider, &profile.provider_user_id)?
        {
            return Ok(user);
        }

        let email = profile
            .emails
            .iter()
            .map(|e| e.trim())
            .find(|e| !e.is_empty())
            .ok_or_else(|| SquirrelError::validation("Federated profile has no email."))?
            .to_string();
        let base = self.base_username(&profile.display_name);

        for attempt in 0..MAX_USERNAME_ATTEMPTS {
            let new_user = NewUser {
                username: self.candidate_username(&base, attempt),
                email: email.clone(),
                password_hash: None,
                bio: None,
            };
            match self.store.create_federated_user(
                &new_user,
                &profile.provider,
                &profile.provider_user_id,
            ) {
                Ok(user) => {
                    tracing::info!(
                        provider = %profile.provider,
                        user_id = user.id,
                        "created user from federated login"
                    );
                    return Ok(user);
                }
                Err(SquirrelError::Conflict {
                    field: UniqueField::Username,
                }) => continue,
                // Lost a race with a concurrent first login for the same identity.
                Err(SquirrelError::Conflict {
                    field: UniqueField::FederatedIdentity,
                }) => {
                    return self
                        .store
                        .find_by_federated(&profile.provider, &profile.provider_user_id)?
                        .ok_or_else(|| SquirrelError::Internal {
                            reason: "federated identity vanished after conflict".to_string(),
                        });
                }
                Err(err) => return Err(err),
            }
        }
        Err(SquirrelError::conflict(UniqueField::Username))
    }

    fn base_username(&self, display_name: &str) -> String {
        let trimmed: String = display_name
            .trim()
            .chars()
            .take(self.settings.max_username_length)
            .collect();
        if trimmed.is_empty() {
            FALLBACK_USERNAME.to_string()
        } else {
            trimmed
        }
    }

    /// `base`, then `base2`, `base3`, ... truncated so the suffix always fits.
    fn candidate_username(&self, base: &str, attempt: u32) -> String {
        if attempt == 0 {
            return base.to_string();
        }
        let suffix = (attempt + 1).to_string();
        let room = self.settings.max_username_length.saturating_sub(suffix.len());
        let head: String = base.chars().take(room).collect();
        format!("{head}{suffix}")
    }
}
