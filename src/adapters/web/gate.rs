//! Route access policies.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::principal::{Principal, resolve_principal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Anyone. The principal is still bound for later consumers.
    Open,
    /// A logged-in user. Without `redirect_on_fail` anonymous requests go
    /// through and the handler answers for itself.
    RequireUser { redirect_on_fail: bool },
    /// A logged-in admin. Everyone else is sent to the login page.
    RequireAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Redirect,
}

impl Policy {
    pub fn decide(self, principal: &Principal) -> Decision {
        match self {
            Policy::Open => Decision::Proceed,
            Policy::RequireUser { redirect_on_fail } => {
                if principal.user().is_none() && redirect_on_fail {
                    Decision::Redirect
                } else {
                    Decision::Proceed
                }
            }
            Policy::RequireAdmin => {
                if principal.is_admin() {
                    Decision::Proceed
                } else {
                    Decision::Redirect
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gate {
    policy: Policy,
    login_path: Arc<str>,
}

impl Gate {
    pub fn new(policy: Policy, login_path: &str) -> Self {
        Self {
            policy,
            login_path: Arc::from(login_path),
        }
    }
}

pub async fn enforce(State(gate): State<Gate>, mut request: Request, next: Next) -> Response {
    let principal = resolve_principal(request.extensions_mut());
    match gate.policy.decide(&principal) {
        Decision::Proceed => next.run(request).await,
        Decision::Redirect => {
            tracing::debug!(
                policy = ?gate.policy,
                path = %request.uri().path(),
                "access denied, redirecting to login"
            );
            Redirect::to(&gate.login_path).into_response()
        }
    }
}
