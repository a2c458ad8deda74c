//! Immutable runtime settings.
//!
//! Built once at startup from a [`ConfigPort`] and shared by reference; core
//! logic never reads configuration from anywhere else.

use crate::domain::error::SquirrelError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_HASH_COST: u32 = 10;
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 7168;
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;
pub const DEFAULT_MAX_USERNAME_LENGTH: usize = 20;
pub const ONE_WEEK_SECS: i64 = 7 * 24 * 60 * 60;
/// Signed cookies need a 64-byte master key.
pub const SESSION_SECRET_LEN: usize = 64;

/// Credential and account rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// argon2 time cost (iterations).
    pub hash_cost: u32,
    pub hash_memory_kib: u32,
    pub min_password_length: usize,
    pub max_username_length: usize,
    pub login_path: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            hash_cost: DEFAULT_HASH_COST,
            hash_memory_kib: DEFAULT_HASH_MEMORY_KIB,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            max_username_length: DEFAULT_MAX_USERNAME_LENGTH,
            login_path: "/login".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub sqlite_path: String,
    pub pool_size: u32,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub secret: Vec<u8>,
    pub lifetime_secs: i64,
    /// Local deploys get `SameSite=Strict` without `Secure`; otherwise `SameSite=None; Secure`.
    /// Off unless configured.
    pub local_deploy: bool,
    pub sqlite_path: String,
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("secret", &"<redacted>")
            .field("lifetime_secs", &self.lifetime_secs)
            .field("local_deploy", &self.local_deploy)
            .field("sqlite_path", &self.sqlite_path)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub success_redirect: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub session: SessionSettings,
    pub listen: String,
    pub google: Option<GoogleSettings>,
}

impl Settings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SquirrelError> {
        let database = database_settings(config)?;
        let auth = auth_settings(config)?;
        let session = session_settings(config, &database)?;
        let listen = config
            .get_string("web", "listen")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let google = google_settings(config)?;
        Ok(Self {
            database,
            auth,
            session,
            listen,
            google,
        })
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SquirrelError {
    SquirrelError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SquirrelError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SquirrelError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn positive(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<i64, SquirrelError> {
    let value = config.get_int(section, key, default);
    if value <= 0 {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(value)
}

fn positive_u32(config: &dyn ConfigPort, section: &str, key: &str, default: u32) -> Result<u32, SquirrelError> {
    let value = positive(config, section, key, i64::from(default))?;
    u32::try_from(value).map_err(|_| invalid(section, key, format!("{key} is too large")))
}

fn database_settings(config: &dyn ConfigPort) -> Result<DatabaseSettings, SquirrelError> {
    Ok(DatabaseSettings {
        sqlite_path: required(config, "database", "sqlite_path")?,
        pool_size: positive_u32(config, "database", "pool_size", 4)?,
    })
}

fn auth_settings(config: &dyn ConfigPort) -> Result<AuthSettings, SquirrelError> {
    let defaults = AuthSettings::default();
    let hash_memory_kib = positive_u32(config, "auth", "hash_memory_kib", defaults.hash_memory_kib)?;
    if hash_memory_kib < 8 {
        return Err(invalid("auth", "hash_memory_kib", "hash_memory_kib must be at least 8"));
    }
    let login_path = config
        .get_string("auth", "login_path")
        .unwrap_or(defaults.login_path);
    if !login_path.starts_with('/') {
        return Err(invalid("auth", "login_path", "login_path must start with '/'"));
    }
    Ok(AuthSettings {
        hash_cost: positive_u32(config, "auth", "hash_cost", defaults.hash_cost)?,
        hash_memory_kib,
        min_password_length: positive(
            config,
            "auth",
            "min_password_length",
            defaults.min_password_length as i64,
        )? as usize,
        max_username_length: positive(
            config,
            "auth",
            "max_username_length",
            defaults.max_username_length as i64,
        )? as usize,
        login_path,
    })
}

fn session_settings(
    config: &dyn ConfigPort,
    database: &DatabaseSettings,
) -> Result<SessionSettings, SquirrelError> {
    let secret_hex = required(config, "session", "secret")?;
    let secret = hex::decode(&secret_hex)
        .map_err(|e| invalid("session", "secret", format!("secret must be hex: {e}")))?;
    if secret.len() < SESSION_SECRET_LEN {
        return Err(invalid(
            "session",
            "secret",
            format!("secret must be at least {SESSION_SECRET_LEN} bytes"),
        ));
    }
    Ok(SessionSettings {
        secret,
        lifetime_secs: positive(config, "session", "lifetime_secs", ONE_WEEK_SECS)?,
        local_deploy: config.get_bool("session", "local_deploy", false),
        sqlite_path: config
            .get_string("session", "sqlite_path")
            .unwrap_or_else(|| database.sqlite_path.clone()),
    })
}

fn google_settings(config: &dyn ConfigPort) -> Result<Option<GoogleSettings>, SquirrelError> {
    if config.get_string("google", "client_id").is_none() {
        return Ok(None);
    }
    Ok(Some(GoogleSettings {
        client_id: required(config, "google", "client_id")?,
        client_secret: required(config, "google", "client_secret")?,
        callback_url: required(config, "google", "callback_url")?,
        success_redirect: config
            .get_string("google", "success_redirect")
            .unwrap_or_else(|| "/".to_string()),
    }))
}
