#![allow(dead_code)]

use chrono::Utc;
use squirrel::domain::error::{SquirrelError, UniqueField};
use squirrel::domain::game::{IndependentGame, NewIndependentGame, NewsletterEntry};
use squirrel::domain::password::Hasher;
use squirrel::domain::settings::{AuthSettings, DatabaseSettings, SessionSettings, Settings};
use squirrel::domain::user::{FederatedIdentity, FederatedProfile, NewUser, User, UserChanges, UserId};
use squirrel::ports::credential_store::CredentialStore;
use squirrel::ports::directory_port::DirectoryPort;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const TEST_PASSWORD: &str = "acorns123";

/// Cheap argon2 parameters so tests don't spend their time hashing.
pub fn test_auth_settings() -> AuthSettings {
    AuthSettings {
        hash_cost: 1,
        hash_memory_kib: 64,
        ..AuthSettings::default()
    }
}

pub fn test_hasher() -> Hasher {
    Hasher::from_settings(&test_auth_settings()).unwrap()
}

pub fn test_settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            sqlite_path: ":memory:".to_string(),
            pool_size: 1,
        },
        auth: test_auth_settings(),
        session: SessionSettings {
            secret: vec![7u8; 64],
            lifetime_secs: 3600,
            local_deploy: true,
            sqlite_path: ":memory:".to_string(),
        },
        listen: "127.0.0.1:0".to_string(),
        google: None,
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    identities: Vec<FederatedIdentity>,
    newsletter: Vec<NewsletterEntry>,
    games: Vec<IndependentGame>,
}

/// In-memory store that counts the calls tests care about.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub find_by_id_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_id_count(&self) -> usize {
        self.find_by_id_calls.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn identity_count(&self) -> usize {
        self.tables.lock().unwrap().identities.len()
    }

    /// Insert a user with a local password, bypassing registration.
    pub fn seed_user(&self, username: &str, email: &str, password: &str) -> User {
        let hash = test_hasher().hash(password).unwrap();
        self.create_user(&NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(hash),
            bio: None,
        })
        .unwrap()
    }

    fn insert(tables: &mut Tables, new_user: &NewUser) -> Result<User, SquirrelError> {
        if tables.users.iter().any(|u| u.username == new_user.username) {
            return Err(SquirrelError::conflict(UniqueField::Username));
        }
        if tables.users.iter().any(|u| u.email == new_user.email) {
            return Err(SquirrelError::conflict(UniqueField::Email));
        }
        let user = User {
            id: tables.users.len() as UserId + 1,
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            bio: new_user.bio.clone(),
            admin: false,
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

impl CredentialStore for MemoryStore {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, SquirrelError> {
        self.find_by_id_calls.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, SquirrelError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, SquirrelError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    fn find_by_federated(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, SquirrelError> {
        let tables = self.tables.lock().unwrap();
        let Some(link) = tables
            .identities
            .iter()
            .find(|i| i.provider == provider && i.provider_user_id == provider_user_id)
        else {
            return Ok(None);
        };
        Ok(tables.users.iter().find(|u| u.id == link.user_id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>, SquirrelError> {
        Ok(self.tables.lock().unwrap().users.clone())
    }

    fn create_user(&self, new_user: &NewUser) -> Result<User, SquirrelError> {
        let mut tables = self.tables.lock().unwrap();
        Self::insert(&mut tables, new_user)
    }

    fn create_federated_user(
        &self,
        new_user: &NewUser,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<User, SquirrelError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .identities
            .iter()
            .any(|i| i.provider == provider && i.provider_user_id == provider_user_id)
        {
            return Err(SquirrelError::conflict(UniqueField::FederatedIdentity));
        }
        let user = Self::insert(&mut tables, new_user)?;
        tables.identities.push(FederatedIdentity {
            provider: provider.to_string(),
            provider_user_id: provider_user_id.to_string(),
            user_id: user.id,
        });
        Ok(user)
    }

    fn update_user(&self, id: UserId, changes: &UserChanges) -> Result<User, SquirrelError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        if let Some(username) = &changes.username {
            if tables.users.iter().any(|u| u.id != id && &u.username == username) {
                return Err(SquirrelError::conflict(UniqueField::Username));
            }
        }
        if let Some(email) = &changes.email {
            if tables.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(SquirrelError::conflict(UniqueField::Email));
            }
        }
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| SquirrelError::not_found("There is no user with that userId."))?;
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(hash) = &changes.password_hash {
            user.password_hash = Some(hash.clone());
        }
        if let Some(bio) = &changes.bio {
            user.bio = Some(bio.clone());
        }
        Ok(user.clone())
    }

    fn set_admin(&self, id: UserId, admin: bool) -> Result<User, SquirrelError> {
        let mut tables = self.tables.lock().unwrap();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| SquirrelError::not_found("There is no user with that userId."))?;
        user.admin = admin;
        Ok(user.clone())
    }
}

impl DirectoryPort for MemoryStore {
    fn list_independent_games(&self) -> Result<Vec<IndependentGame>, SquirrelError> {
        Ok(self.tables.lock().unwrap().games.clone())
    }

    fn submit_independent_game(&self, game: &NewIndependentGame) -> Result<IndependentGame, SquirrelError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.games.iter().any(|g| g.game_name == game.game_name) {
            return Err(SquirrelError::conflict(UniqueField::GameName));
        }
        if tables.games.iter().any(|g| g.link_url == game.link_url) {
            return Err(SquirrelError::conflict(UniqueField::GameLink));
        }
        let entry = IndependentGame {
            id: tables.games.len() as i64 + 1,
            game_name: game.game_name.clone(),
            description: game.description.clone(),
            image_url: game.image_url.clone(),
            tag1: game.tag1.clone(),
            tag2: game.tag2.clone(),
            tag3: game.tag3.clone(),
            category: game.category.clone(),
            link_url: game.link_url.clone(),
            email: game.email.clone(),
            additional_info: game.additional_info.clone(),
            verified: false,
            created_at: Utc::now(),
        };
        tables.games.push(entry.clone());
        Ok(entry)
    }

    fn subscribe_newsletter(&self, address: &str) -> Result<NewsletterEntry, SquirrelError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.newsletter.iter().any(|n| n.address == address) {
            return Err(SquirrelError::conflict(UniqueField::NewsletterAddress));
        }
        let entry = NewsletterEntry {
            id: tables.newsletter.len() as i64 + 1,
            address: address.to_string(),
            created_at: Utc::now(),
        };
        tables.newsletter.push(entry.clone());
        Ok(entry)
    }
}

pub fn federated_profile(provider_user_id: &str, display_name: &str, email: &str) -> FederatedProfile {
    FederatedProfile {
        provider: "mock".to_string(),
        provider_user_id: provider_user_id.to_string(),
        display_name: display_name.to_string(),
        emails: vec![email.to_string()],
    }
}

#[cfg(feature = "web")]
pub mod web {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, Response, header},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use squirrel::adapters::web::{AppState, build_router};
    use squirrel::ports::identity_provider::{IdentityProvider, ProfileFuture};
    use std::sync::Arc;

    /// Identity provider that answers known codes with canned profiles.
    #[derive(Default)]
    pub struct MockProvider {
        profiles: HashMap<String, FederatedProfile>,
    }

    impl MockProvider {
        pub fn with_code(mut self, code: &str, profile: FederatedProfile) -> Self {
            self.profiles.insert(code.to_string(), profile);
            self
        }
    }

    impl IdentityProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn authorize_url(&self, state: &str) -> String {
            format!("https://id.example/authorize?state={state}")
        }

        fn exchange<'a>(&'a self, code: &'a str) -> ProfileFuture<'a> {
            let result = self.profiles.get(code).cloned().ok_or(SquirrelError::Provider {
                reason: format!("unknown code {code}"),
            });
            Box::pin(async move { result })
        }
    }

    pub async fn create_app(store: Arc<MemoryStore>) -> Router {
        create_app_with_provider(store, MockProvider::default()).await
    }

    pub async fn create_app_with_provider(store: Arc<MemoryStore>, provider: MockProvider) -> Router {
        let state = AppState::new(store.clone(), store, Arc::new(test_settings()))
            .unwrap()
            .with_provider(Arc::new(provider));
        build_router(state).await.unwrap()
    }

    pub fn extract_cookies(response: &Response<Body>) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn build_cookie_header(set_cookies: &[String]) -> String {
        set_cookies
            .iter()
            .map(|sc| sc.split(';').next().unwrap_or("").to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn location(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    pub fn login_request(username: &str, password: &str) -> Request<Body> {
        let form_data = format!("username={}&password={}", username, password);
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form_data))
            .unwrap()
    }

    pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Log in and return the cookie header for the session.
    pub async fn login_cookie(app: &Router, username: &str, password: &str) -> String {
        use tower::ServiceExt;

        let response = app
            .clone()
            .oneshot(login_request(username, password))
            .await
            .unwrap();
        assert_eq!(location(&response), "/", "login for {username} should succeed");
        build_cookie_header(&extract_cookies(&response))
    }
}
