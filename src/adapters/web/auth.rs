//! Authentication backend for axum-login.
//!
//! Local logins check a username or email plus password; federated logins
//! arrive with a provider profile already fetched by [`super::oauth`].

use std::sync::Arc;

use axum_login::{AuthUser, AuthnBackend, UserId as AuthUserId};
use time::{Duration, OffsetDateTime};
use tower_sessions::{Expiry, Session};

use crate::domain::error::SquirrelError;
use crate::domain::identity::IdentityResolver;
use crate::domain::password::Hasher;
use crate::domain::settings::Settings;
use crate::domain::user::{FederatedProfile, User, UserId};
use crate::ports::credential_store::CredentialStore;

use super::blocking;

/// Fix the session's expiry at `lifetime_secs` from now.
///
/// Call right after a login. Later writes to the session leave the deadline
/// where it is; anonymous sessions keep the layer's inactivity expiry.
pub(crate) fn start_session_clock(session: &Session, lifetime_secs: i64) {
    let deadline = OffsetDateTime::now_utc() + Duration::seconds(lifetime_secs);
    session.set_expiry(Some(Expiry::AtDateTime(deadline)));
}

impl AuthUser for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }

    /// Changing the password invalidates sessions bound to the old hash.
    fn session_auth_hash(&self) -> &[u8] {
        self.password_hash.as_deref().unwrap_or_default().as_bytes()
    }
}

#[derive(Clone)]
pub enum Credentials {
    Password { identifier: String, password: String },
    Federated(FederatedProfile),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { identifier, .. } => f
                .debug_struct("Password")
                .field("identifier", identifier)
                .finish_non_exhaustive(),
            Credentials::Federated(profile) => f.debug_tuple("Federated").field(profile).finish(),
        }
    }
}

#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn CredentialStore + Send + Sync>,
    hasher: Arc<Hasher>,
    settings: Arc<Settings>,
}

impl Backend {
    pub fn new(
        store: Arc<dyn CredentialStore + Send + Sync>,
        hasher: Arc<Hasher>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            store,
            hasher,
            settings,
        }
    }
}

impl AuthnBackend for Backend {
    type User = User;
    type Credentials = Credentials;
    type Error = SquirrelError;

    async fn authenticate(&self, creds: Self::Credentials) -> Result<Option<User>, SquirrelError> {
        let backend = self.clone();
        blocking(move || {
            let resolver = IdentityResolver::new(
                backend.store.as_ref(),
                &backend.hasher,
                &backend.settings.auth,
            );
            match creds {
                Credentials::Password {
                    identifier,
                    password,
                } => match resolver.resolve_local(&identifier, &password) {
                    Ok(user) => Ok(Some(user)),
                    Err(SquirrelError::InvalidCredentials) => Ok(None),
                    Err(err) => Err(err),
                },
                Credentials::Federated(profile) => resolver.resolve_federated(&profile).map(Some),
            }
        })
        .await
    }

    async fn get_user(&self, user_id: &AuthUserId<Self>) -> Result<Option<User>, SquirrelError> {
        let store = self.store.clone();
        let id = *user_id;
        blocking(move || store.find_by_id(id)).await
    }
}
