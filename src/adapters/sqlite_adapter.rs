//! SQLite persistence adapter for users, federated identities and the directory.

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use crate::domain::error::{SquirrelError, UniqueField};
use crate::domain::game::{IndependentGame, NewIndependentGame, NewsletterEntry};
use crate::domain::settings::DatabaseSettings;
use crate::domain::user::{NewUser, User, UserChanges, UserId};
use crate::ports::credential_store::CredentialStore;
use crate::ports::directory_port::DirectoryPort;

const USER_COLUMNS: &str = "id, username, email, password_hash, bio, admin";
const GAME_COLUMNS: &str = "id, game_name, description, image_url, tag1, tag2, tag3, category, \
                            link_url, email, additional_info, verified, created_at";
const NO_SUCH_USER: &str = "There is no user with that userId.";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn open(settings: &DatabaseSettings) -> Result<Self, SquirrelError> {
        if settings.sqlite_path == ":memory:" {
            return Self::in_memory();
        }
        let manager = SqliteConnectionManager::file(&settings.sqlite_path).with_init(|c| {
            c.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder().max_size(settings.pool_size).build(manager)?;
        Ok(Self { pool })
    }

    /// Each in-memory connection is its own database, so the pool holds one.
    pub fn in_memory() -> Result<Self, SquirrelError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SquirrelError> {
        Ok(self.pool.get()?)
    }

    pub fn initialize_schema(&self) -> Result<(), SquirrelError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                bio TEXT,
                admin INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS federated_identities (
                provider TEXT NOT NULL,
                provider_user_id TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id),
                PRIMARY KEY (provider, provider_user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_federated_user ON federated_identities(user_id);
            CREATE TABLE IF NOT EXISTS newsletter (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS independent_games (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                image_url TEXT NOT NULL,
                tag1 TEXT,
                tag2 TEXT,
                tag3 TEXT,
                category TEXT NOT NULL,
                link_url TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                additional_info TEXT,
                verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(query_error)?;
        Ok(())
    }

    fn find_user_where(&self, column: &str, value: &dyn rusqlite::ToSql) -> Result<Option<User>, SquirrelError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
        conn.query_row(&sql, [value], user_from_row)
            .optional()
            .map_err(query_error)
    }
}

/// Column that a UNIQUE/PRIMARY KEY failure message points at.
fn unique_violation(err: &rusqlite::Error) -> Option<UniqueField> {
    let rusqlite::Error::SqliteFailure(failure, Some(message)) = err else {
        return None;
    };
    if failure.code != rusqlite::ffi::ErrorCode::ConstraintViolation {
        return None;
    }
    let columns = message.strip_prefix("UNIQUE constraint failed: ")?;
    match columns {
        "users.username" => Some(UniqueField::Username),
        "users.email" => Some(UniqueField::Email),
        "newsletter.address" => Some(UniqueField::NewsletterAddress),
        "independent_games.game_name" => Some(UniqueField::GameName),
        "independent_games.link_url" => Some(UniqueField::GameLink),
        c if c.starts_with("federated_identities.") => Some(UniqueField::FederatedIdentity),
        _ => None,
    }
}

fn query_error(err: rusqlite::Error) -> SquirrelError {
    match unique_violation(&err) {
        Some(field) => SquirrelError::conflict(field),
        None => SquirrelError::DatabaseQuery {
            reason: err.to_string(),
        },
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        bio: row.get(4)?,
        admin: row.get(5)?,
    })
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<IndependentGame> {
    Ok(IndependentGame {
        id: row.get(0)?,
        game_name: row.get(1)?,
        description: row.get(2)?,
        image_url: row.get(3)?,
        tag1: row.get(4)?,
        tag2: row.get(5)?,
        tag3: row.get(6)?,
        category: row.get(7)?,
        link_url: row.get(8)?,
        email: row.get(9)?,
        additional_info: row.get(10)?,
        verified: row.get(11)?,
        created_at: timestamp(row, 12)?,
    })
}

fn taken(tx: &rusqlite::Transaction<'_>, column: &str, value: &str) -> Result<bool, SquirrelError> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM users WHERE {column} = ?1)");
    tx.query_row(&sql, [value], |row| row.get(0))
        .map_err(query_error)
}

fn insert_user(tx: &rusqlite::Transaction<'_>, new_user: &NewUser) -> Result<User, SquirrelError> {
    if taken(tx, "username", &new_user.username)? {
        return Err(SquirrelError::conflict(UniqueField::Username));
    }
    if taken(tx, "email", &new_user.email)? {
        return Err(SquirrelError::conflict(UniqueField::Email));
    }
    tx.execute(
        "INSERT INTO users (username, email, password_hash, bio, admin) VALUES (?1, ?2, ?3, ?4, 0)",
        params![
            new_user.username,
            new_user.email,
            new_user.password_hash,
            new_user.bio
        ],
    )
    .map_err(query_error)?;
    Ok(User {
        id: tx.last_insert_rowid(),
        username: new_user.username.clone(),
        email: new_user.email.clone(),
        password_hash: new_user.password_hash.clone(),
        bio: new_user.bio.clone(),
        admin: false,
    })
}

impl CredentialStore for SqliteAdapter {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, SquirrelError> {
        self.find_user_where("id", &id)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, SquirrelError> {
        self.find_user_where("username", &username)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, SquirrelError> {
        self.find_user_where("email", &email)
    }

    fn find_by_federated(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, SquirrelError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT u.id, u.username, u.email, u.password_hash, u.bio, u.admin
             FROM federated_identities f JOIN users u ON u.id = f.user_id
             WHERE f.provider = ?1 AND f.provider_user_id = ?2",
            params![provider, provider_user_id],
            user_from_row,
        )
        .optional()
        .map_err(query_error)
    }

    fn list_users(&self) -> Result<Vec<User>, SquirrelError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(query_error)?;
        let rows = stmt.query_map([], user_from_row).map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn create_user(&self, new_user: &NewUser) -> Result<User, SquirrelError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error)?;
        let user = insert_user(&tx, new_user)?;
        tx.commit().map_err(query_error)?;
        Ok(user)
    }

    fn create_federated_user(
        &self,
        new_user: &NewUser,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<User, SquirrelError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error)?;
        let linked: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM federated_identities
                 WHERE provider = ?1 AND provider_user_id = ?2)",
                params![provider, provider_user_id],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        if linked {
            return Err(SquirrelError::conflict(UniqueField::FederatedIdentity));
        }
        let user = insert_user(&tx, new_user)?;
        tx.execute(
            "INSERT INTO federated_identities (provider, provider_user_id, user_id)
             VALUES (?1, ?2, ?3)",
            params![provider, provider_user_id, user.id],
        )
        .map_err(query_error)?;
        tx.commit().map_err(query_error)?;
        Ok(user)
    }

    fn update_user(&self, id: UserId, changes: &UserChanges) -> Result<User, SquirrelError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error)?;
        let updated = tx
            .execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    email = COALESCE(?3, email),
                    password_hash = COALESCE(?4, password_hash),
                    bio = COALESCE(?5, bio)
                 WHERE id = ?1",
                params![
                    id,
                    changes.username,
                    changes.email,
                    changes.password_hash,
                    changes.bio
                ],
            )
            .map_err(query_error)?;
        if updated == 0 {
            return Err(SquirrelError::not_found(NO_SUCH_USER));
        }
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = tx.query_row(&sql, [id], user_from_row).map_err(query_error)?;
        tx.commit().map_err(query_error)?;
        Ok(user)
    }

    fn set_admin(&self, id: UserId, admin: bool) -> Result<User, SquirrelError> {
        let conn = self.conn()?;
        let updated = conn
            .execute("UPDATE users SET admin = ?2 WHERE id = ?1", params![id, admin])
            .map_err(query_error)?;
        if updated == 0 {
            return Err(SquirrelError::not_found(NO_SUCH_USER));
        }
        drop(conn);
        self.find_by_id(id)?
            .ok_or_else(|| SquirrelError::not_found(NO_SUCH_USER))
    }
}

impl DirectoryPort for SqliteAdapter {
    fn list_independent_games(&self) -> Result<Vec<IndependentGame>, SquirrelError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {GAME_COLUMNS} FROM independent_games ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(query_error)?;
        let rows = stmt.query_map([], game_from_row).map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn submit_independent_game(
        &self,
        game: &NewIndependentGame,
    ) -> Result<IndependentGame, SquirrelError> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO independent_games (game_name, description, image_url, tag1, tag2, tag3,
                 category, link_url, email, additional_info, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)",
            params![
                game.game_name,
                game.description,
                game.image_url,
                game.tag1,
                game.tag2,
                game.tag3,
                game.category,
                game.link_url,
                game.email,
                game.additional_info,
                created_at.to_rfc3339()
            ],
        )
        .map_err(query_error)?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {GAME_COLUMNS} FROM independent_games WHERE id = ?1");
        conn.query_row(&sql, [id], game_from_row).map_err(query_error)
    }

    fn subscribe_newsletter(&self, address: &str) -> Result<NewsletterEntry, SquirrelError> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO newsletter (address, created_at) VALUES (?1, ?2)",
            params![address, created_at.to_rfc3339()],
        )
        .map_err(query_error)?;
        Ok(NewsletterEntry {
            id: conn.last_insert_rowid(),
            address: address.to_string(),
            created_at,
        })
    }
}
