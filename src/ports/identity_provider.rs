//! External identity provider port (OAuth sign-in).

use std::future::Future;
use std::pin::Pin;

use crate::domain::error::SquirrelError;
use crate::domain::user::FederatedProfile;

pub type ProfileFuture<'a> =
    Pin<Box<dyn Future<Output = Result<FederatedProfile, SquirrelError>> + Send + 'a>>;

pub trait IdentityProvider: Send + Sync {
    /// Provider identifier stored on federated identity links, e.g. `google`.
    fn name(&self) -> &str;

    /// Where to send the browser to start sign-in. `state` must come back on the callback.
    fn authorize_url(&self, state: &str) -> String;

    /// Trade an authorization code for the signed-in account's profile.
    fn exchange<'a>(&'a self, code: &'a str) -> ProfileFuture<'a>;
}
