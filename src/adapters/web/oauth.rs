//! Federated sign-in routes.
//!
//! `GET /auth/{provider}` puts a random `state` in a signed, short-lived
//! cookie and redirects to the provider. The callback checks that `state`,
//! exchanges the code for a profile and logs the resolved user in.
//!
//! The state cookie is `SameSite=Lax` so it survives the provider's
//! cross-site redirect back, whatever the session cookie's policy is.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
    },
    response::{IntoResponse, Redirect, Response},
};
use axum_login::AuthSession;
use serde::Deserialize;
use time::Duration;
use tower_sessions::cookie::{Cookie, CookieJar, Key, SameSite};

use crate::domain::error::SquirrelError;
use crate::ports::identity_provider::IdentityProvider;

use super::auth::start_session_clock;
use super::error::AUTH_FAILED;
use super::{AppState, Backend, Credentials, WebError};

const STATE_COOKIE: &str = "squirrel.oauth";
const STATE_COOKIE_PATH: &str = "/auth";
const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn provider<'a>(state: &'a AppState, name: &str) -> Result<&'a dyn IdentityProvider, WebError> {
    state
        .providers
        .get(name)
        .map(|p| p.as_ref())
        .ok_or_else(|| WebError::not_found("Unknown sign-in provider."))
}

fn csrf_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

fn header_value(cookie: &Cookie<'_>) -> Result<HeaderValue, WebError> {
    HeaderValue::from_str(&cookie.to_string()).map_err(|e| {
        WebError::from(SquirrelError::Internal {
            reason: e.to_string(),
        })
    })
}

/// Signed `Set-Cookie` value carrying `token`.
fn state_cookie(key: &Key, token: String, secure: bool) -> Result<HeaderValue, WebError> {
    let mut jar = CookieJar::new();
    jar.signed_mut(key).add(
        Cookie::build((STATE_COOKIE, token))
            .path(STATE_COOKIE_PATH)
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::minutes(STATE_TTL_MINUTES)),
    );
    let signed = jar
        .get(STATE_COOKIE)
        .ok_or_else(|| SquirrelError::Internal {
            reason: "state cookie missing from jar".to_string(),
        })?;
    header_value(signed)
}

fn clear_state_cookie() -> Result<HeaderValue, WebError> {
    header_value(
        &Cookie::build((STATE_COOKIE, ""))
            .path(STATE_COOKIE_PATH)
            .max_age(Duration::ZERO)
            .build(),
    )
}

/// The state from a correctly signed cookie, if the request carries one.
fn issued_state(headers: &HeaderMap, key: &Key) -> Option<String> {
    let mut jar = CookieJar::new();
    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(value.to_string()).flatten() {
            jar.add_original(cookie.into_owned());
        }
    }
    jar.signed(key)
        .get(STATE_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub async fn begin(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, WebError> {
    let provider = provider(&state, &name)?;
    let token = csrf_token();
    let url = provider.authorize_url(&token);
    let secure = !state.settings.session.local_deploy;
    let cookie = state_cookie(&state.cookie_key, token, secure)?;
    Ok(([(SET_COOKIE, cookie)], Redirect::to(&url)).into_response())
}

pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    mut auth_session: AuthSession<Backend>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, WebError> {
    let provider = provider(&state, &name)?;
    let expected = issued_state(&headers, &state.cookie_key);

    if let Some(error) = &params.error {
        tracing::warn!(provider = %name, %error, "provider refused sign-in");
        return Err(WebError::bad_request(AUTH_FAILED));
    }
    let (Some(code), Some(returned)) = (params.code, params.state) else {
        return Err(WebError::bad_request(AUTH_FAILED));
    };
    if expected.as_deref() != Some(returned.as_str()) {
        tracing::warn!(provider = %name, "oauth state mismatch");
        return Err(WebError::bad_request(AUTH_FAILED));
    }

    let profile = provider.exchange(&code).await?;
    let Some(user) = auth_session
        .authenticate(Credentials::Federated(profile))
        .await?
    else {
        return Err(WebError::bad_request(AUTH_FAILED));
    };
    auth_session.login(&user).await?;
    start_session_clock(&auth_session.session, state.settings.session.lifetime_secs);
    tracing::info!(provider = %name, user_id = user.id, "federated login");

    Ok((
        [(SET_COOKIE, clear_state_cookie()?)],
        Redirect::to(&state.federated_redirect),
    )
        .into_response())
}
