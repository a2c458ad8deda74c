//! The request's principal: the session's user, or nobody.
//!
//! The auth layer loads the session user once. [`resolve_principal`] copies
//! that result into the request extensions so every later consumer (gates,
//! handlers) reads the same value without going back to the store.

use axum::extract::FromRequestParts;
use axum::http::{Extensions, request::Parts};
use axum_login::AuthSession;

use crate::domain::error::SquirrelError;
use crate::domain::user::User;

use super::{Backend, WebError};

#[derive(Debug, Clone, Default)]
pub enum Principal {
    #[default]
    Anonymous,
    User(User),
}

impl Principal {
    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::User(user) => Some(user),
            Principal::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.admin)
    }

    /// The user, or [`SquirrelError::Anonymous`].
    pub fn require(&self) -> Result<&User, SquirrelError> {
        self.user().ok_or(SquirrelError::Anonymous)
    }
}

/// Bind the principal for this request, at most once.
pub fn resolve_principal(extensions: &mut Extensions) -> Principal {
    if let Some(principal) = extensions.get::<Principal>() {
        return principal.clone();
    }
    let principal = match extensions
        .get::<AuthSession<Backend>>()
        .and_then(|session| session.user.clone())
    {
        Some(user) => Principal::User(user),
        None => Principal::Anonymous,
    };
    extensions.insert(principal.clone());
    principal
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(resolve_principal(&mut parts.extensions))
    }
}
