//! HTTP request handlers for web adapter.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_login::AuthSession;
use serde_json::{Value, json};
use tower_sessions::Session;

use crate::domain::error::{INVALID_CREDENTIALS, SquirrelError};
use crate::domain::game::{self, CATALOG, CatalogGame, IndependentGame, NewIndependentGame, NewsletterEntry};
use crate::domain::profile::ProfileEditor;
use crate::domain::registration::{Registration, register as register_user};
use crate::domain::user::{PrivateProfile, PublicProfile, SummaryProfile, parse_user_id, summary_or_empty};

use super::auth::start_session_clock;
use super::{AppState, Backend, Credentials, Payload, Principal, WebError, blocking};

/// Session key for the one-shot login failure message.
const LOGIN_ERROR_KEY: &str = "login.error";

pub async fn root(principal: Principal) -> Json<Value> {
    Json(json!({
        "authenticated": principal.user().is_some(),
        "user": summary_or_empty(principal.user()),
    }))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Payload(body): Payload,
) -> Result<Json<Value>, WebError> {
    let form = Registration::from_json(&body);
    blocking(move || {
        register_user(
            state.store.as_ref(),
            &state.hasher,
            &state.settings.auth,
            form,
        )
    })
    .await?;
    Ok(Json(json!({ "message": "User registered" })))
}

pub async fn login_page(session: Session) -> Result<Json<Value>, WebError> {
    let flash: Option<String> = session.remove(LOGIN_ERROR_KEY).await?;
    Ok(Json(match flash {
        Some(error) => json!({ "error": error }),
        None => json!({ "message": "Please log in." }),
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    mut auth_session: AuthSession<Backend>,
    payload: Payload,
) -> Result<Response, WebError> {
    let creds = Credentials::Password {
        identifier: payload.text("username"),
        password: payload.text("password"),
    };

    let user = match auth_session.authenticate(creds).await? {
        Some(user) => user,
        None => {
            tracing::info!("local login rejected");
            auth_session
                .session
                .insert(LOGIN_ERROR_KEY, INVALID_CREDENTIALS)
                .await?;
            return Ok(Redirect::to(&state.settings.auth.login_path).into_response());
        }
    };

    auth_session.login(&user).await?;
    start_session_clock(&auth_session.session, state.settings.session.lifetime_secs);
    tracing::info!(user_id = user.id, "local login");
    Ok(Redirect::to("/").into_response())
}

pub async fn logout(mut auth_session: AuthSession<Backend>) -> Result<Response, WebError> {
    if let Some(user) = auth_session.logout().await? {
        tracing::info!(user_id = user.id, "logged out");
    }
    Ok(Redirect::to("/").into_response())
}

pub async fn get_profile(principal: Principal) -> Result<Json<PrivateProfile>, WebError> {
    let user = principal.require()?;
    Ok(Json(PrivateProfile::from(user)))
}

pub async fn put_profile(
    State(state): State<Arc<AppState>>,
    mut auth_session: AuthSession<Backend>,
    principal: Principal,
    Payload(body): Payload,
) -> Result<Json<PrivateProfile>, WebError> {
    let user = principal.require()?.clone();
    let previous_hash = user.password_hash.clone();

    let updated = blocking(move || {
        ProfileEditor::new(state.store.as_ref(), &state.hasher, &state.settings.auth)
            .apply_settings(&user, &body)
    })
    .await?;

    // The session is bound to the password hash; rebind it after a change.
    if updated.password_hash != previous_hash {
        auth_session.login(&updated).await?;
    }
    Ok(Json(PrivateProfile::from(&updated)))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SummaryProfile>>, WebError> {
    let users = blocking(move || state.store.list_users()).await?;
    Ok(Json(users.iter().map(SummaryProfile::from).collect()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<PublicProfile>, WebError> {
    let id = parse_user_id(&raw_id)?;
    let user = blocking(move || state.store.find_by_id(id))
        .await?
        .ok_or_else(|| SquirrelError::not_found("There is no user with that userId."))?;
    Ok(Json(PublicProfile::from(&user)))
}

pub async fn leaderboard() -> Json<Value> {
    Json(game::leaderboard())
}

pub async fn game_catalog() -> Json<&'static [CatalogGame]> {
    Json(CATALOG)
}

pub async fn newsletter(
    State(state): State<Arc<AppState>>,
    Payload(body): Payload,
) -> Result<Json<NewsletterEntry>, WebError> {
    let address = game::newsletter_address(&body)?;
    let entry = blocking(move || state.directory.subscribe_newsletter(&address)).await?;
    Ok(Json(entry))
}

pub async fn submit_independent_game(
    State(state): State<Arc<AppState>>,
    Payload(body): Payload,
) -> Result<Json<IndependentGame>, WebError> {
    let submission = NewIndependentGame::from_json(&body)?;
    let created = blocking(move || state.directory.submit_independent_game(&submission)).await?;
    tracing::info!(game_id = created.id, "independent game submitted");
    Ok(Json(created))
}

pub async fn admin_independent_games(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<IndependentGame>>, WebError> {
    let games = blocking(move || state.directory.list_independent_games()).await?;
    Ok(Json(games))
}

pub async fn not_found() -> WebError {
    WebError::not_found("Not found.")
}
