//! One-way password hashing and verification (argon2id).

use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;

use crate::domain::error::SquirrelError;
use crate::domain::settings::AuthSettings;

/// Hashes new passwords with the configured cost and verifies stored hashes.
///
/// Verification reads the parameters embedded in the stored PHC string, so
/// hashes produced under an older cost keep verifying after the cost changes.
#[derive(Clone)]
pub struct Hasher {
    argon2: Argon2<'static>,
    /// Hash of a throwaway password under the configured parameters.
    decoy: Arc<str>,
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher").finish_non_exhaustive()
    }
}

impl Hasher {
    /// `cost` is the argon2 time cost; `memory_kib` the memory cost.
    pub fn new(cost: u32, memory_kib: u32) -> Result<Self, SquirrelError> {
        let params = Params::new(memory_kib, cost, 1, None).map_err(|e| {
            SquirrelError::PasswordHash {
                reason: e.to_string(),
            }
        })?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy = hash_with(&argon2, DECOY_PASSWORD)?;
        Ok(Self {
            argon2,
            decoy: Arc::from(decoy),
        })
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self, SquirrelError> {
        Self::new(settings.hash_cost, settings.hash_memory_kib)
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, SquirrelError> {
        hash_with(&self.argon2, plaintext)
    }

    /// A missing, empty or unparsable hash never matches.
    pub fn verify(&self, plaintext: &str, hashed: Option<&str>) -> bool {
        let Some(hashed) = hashed.filter(|h| !h.is_empty()) else {
            return false;
        };
        let Ok(parsed) = PasswordHash::new(hashed) else {
            return false;
        };
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spend a full verification on the decoy hash and report no match.
    ///
    /// Used when there is no stored hash to check, so a miss costs the same
    /// as a wrong password.
    pub fn verify_decoy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, Some(&*self.decoy));
        false
    }
}

const DECOY_PASSWORD: &str = "no account has this password";

fn hash_with(argon2: &Argon2<'_>, plaintext: &str) -> Result<String, SquirrelError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SquirrelError::PasswordHash {
            reason: e.to_string(),
        })
}
