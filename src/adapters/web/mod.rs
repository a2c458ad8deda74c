//! Web server adapter.
//!
//! JSON API on axum. Sessions live in SQLite (tower-sessions) and carry the
//! logged-in user id (axum-login). Route access goes through [`gate`].

mod auth;
mod error;
mod gate;
mod handlers;
mod oauth;
mod payload;
mod principal;

pub use auth::{Backend, Credentials};
pub use error::WebError;
pub use gate::{Decision, Gate, Policy};
pub use payload::Payload;
pub use principal::{Principal, resolve_principal};

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use axum_login::AuthManagerLayerBuilder;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_rusqlite_store::RusqliteStore;

use crate::adapters::google_oauth::GoogleProvider;
use crate::domain::error::SquirrelError;
use crate::domain::password::Hasher;
use crate::domain::settings::Settings;
use crate::ports::credential_store::CredentialStore;
use crate::ports::directory_port::DirectoryPort;
use crate::ports::identity_provider::IdentityProvider;

pub struct AppState {
    pub store: Arc<dyn CredentialStore + Send + Sync>,
    pub directory: Arc<dyn DirectoryPort + Send + Sync>,
    pub settings: Arc<Settings>,
    pub hasher: Arc<Hasher>,
    pub providers: HashMap<String, Arc<dyn IdentityProvider>>,
    /// Where a completed federated login lands.
    pub federated_redirect: String,
    /// Signs the session cookie and the sign-in state cookie.
    pub(crate) cookie_key: Key,
}

impl AppState {
    /// Registers Google sign-in when the settings carry a `[google]` section.
    pub fn new(
        store: Arc<dyn CredentialStore + Send + Sync>,
        directory: Arc<dyn DirectoryPort + Send + Sync>,
        settings: Arc<Settings>,
    ) -> Result<Self, SquirrelError> {
        let hasher = Arc::new(Hasher::from_settings(&settings.auth)?);
        let cookie_key = Key::try_from(settings.session.secret.as_slice()).map_err(|e| {
            SquirrelError::ConfigInvalid {
                section: "session".to_string(),
                key: "secret".to_string(),
                reason: e.to_string(),
            }
        })?;
        let mut state = Self {
            store,
            directory,
            hasher,
            providers: HashMap::new(),
            federated_redirect: "/".to_string(),
            cookie_key,
            settings: settings.clone(),
        };
        if let Some(google) = &settings.google {
            state.federated_redirect = google.success_redirect.clone();
            state = state.with_provider(Arc::new(GoogleProvider::new(google.clone())));
        }
        Ok(state)
    }

    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }
}

/// Run store and hashing work off the async executor.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, SquirrelError>
where
    F: FnOnce() -> Result<T, SquirrelError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SquirrelError::Internal {
            reason: e.to_string(),
        })?
}

async fn open_session_store(path: &str) -> Result<RusqliteStore, SquirrelError> {
    let conn = if path == ":memory:" {
        tokio_rusqlite::Connection::open_in_memory().await
    } else {
        tokio_rusqlite::Connection::open(path).await
    }
    .map_err(|e| SquirrelError::Database {
        reason: e.to_string(),
    })?;
    let store = RusqliteStore::new(conn);
    store.migrate().await.map_err(|e| SquirrelError::Database {
        reason: e.to_string(),
    })?;
    Ok(store)
}

pub async fn build_router(state: AppState) -> Result<Router, SquirrelError> {
    let session = &state.settings.session;
    let session_store = open_session_store(&session.sqlite_path).await?;
    let (same_site, secure) = if session.local_deploy {
        (SameSite::Strict, false)
    } else {
        (SameSite::None, true)
    };
    let session_layer = SessionManagerLayer::new(session_store)
        .with_http_only(true)
        .with_same_site(same_site)
        .with_secure(secure)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
            session.lifetime_secs,
        )))
        .with_signed(state.cookie_key.clone());

    let backend = Backend::new(
        state.store.clone(),
        state.hasher.clone(),
        state.settings.clone(),
    );
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    Ok(routes(Arc::new(state)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(auth_layer),
    ))
}

fn routes(state: Arc<AppState>) -> Router {
    let login_path = state.settings.auth.login_path.clone();
    let guard = |policy| from_fn_with_state(Gate::new(policy, &login_path), gate::enforce);

    Router::new()
        .route("/", get(handlers::root))
        .route("/register", post(handlers::register))
        .route(&login_path, get(handlers::login_page).post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route(
            "/profile",
            get(handlers::get_profile)
                .route_layer(guard(Policy::RequireUser {
                    redirect_on_fail: false,
                }))
                .merge(put(handlers::put_profile).route_layer(guard(Policy::RequireUser {
                    redirect_on_fail: true,
                }))),
        )
        .route("/users", get(handlers::list_users))
        .route("/users/{user_id}", get(handlers::get_user))
        .route("/leaderboard", get(handlers::leaderboard))
        .route("/game", get(handlers::game_catalog))
        .route("/newsletter", post(handlers::newsletter))
        .route("/independentgame", post(handlers::submit_independent_game))
        .route(
            "/admin/independentgame",
            get(handlers::admin_independent_games).route_layer(guard(Policy::RequireAdmin)),
        )
        .route("/auth/{provider}", get(oauth::begin))
        .route("/auth/{provider}/callback", get(oauth::callback))
        .fallback(handlers::not_found)
        .layer(guard(Policy::Open))
        .with_state(state)
}
