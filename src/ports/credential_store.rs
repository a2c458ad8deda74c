//! Credential store port: users and their federated identity links.

use crate::domain::error::SquirrelError;
use crate::domain::user::{NewUser, User, UserChanges, UserId};

/// Persistence for [`User`] and
/// [`FederatedIdentity`](crate::domain::user::FederatedIdentity) records.
///
/// Writes are atomic. A write that would break a uniqueness constraint fails
/// with [`SquirrelError::Conflict`] naming the colliding field, whether the
/// collision is caught by a pre-check or by the store's own constraint.
pub trait CredentialStore {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, SquirrelError>;

    fn find_by_username(&self, username: &str) -> Result<Option<User>, SquirrelError>;

    fn find_by_email(&self, email: &str) -> Result<Option<User>, SquirrelError>;

    /// User linked to `(provider, provider_user_id)`, if any.
    fn find_by_federated(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, SquirrelError>;

    /// All users ordered by id.
    fn list_users(&self) -> Result<Vec<User>, SquirrelError>;

    /// Checks username then email uniqueness and inserts, in one transaction.
    fn create_user(&self, new_user: &NewUser) -> Result<User, SquirrelError>;

    /// Inserts the user and its identity link together, or neither.
    fn create_federated_user(
        &self,
        new_user: &NewUser,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<User, SquirrelError>;

    /// Applies every change or none. Unknown id is `NotFound`.
    fn update_user(&self, id: UserId, changes: &UserChanges) -> Result<User, SquirrelError>;

    fn set_admin(&self, id: UserId, admin: bool) -> Result<User, SquirrelError>;
}
