//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::error::SquirrelError;
use crate::domain::password::Hasher;
use crate::domain::settings::{AuthSettings, Settings};
use crate::ports::credential_store::CredentialStore;

#[derive(Parser, Debug)]
#[command(name = "squirrel", about = "Squirrel community site server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Output an argon2 hash for a password read from stdin
    HashPassword {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Grant or revoke admin rights
    Promote {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        username: String,
        #[arg(long)]
        revoke: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    let result = match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::HashPassword { config } => run_hash_password(config.as_ref()),
        Command::Promote {
            config,
            username,
            revoke,
        } => run_promote(&config, &username, !revoke),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (tests driving `run`) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn load_config(path: &PathBuf) -> Result<Settings, SquirrelError> {
    let config = FileConfigAdapter::from_file(path).map_err(|e| SquirrelError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Settings::from_config(&config)
}

fn open_store(settings: &Settings) -> Result<SqliteAdapter, SquirrelError> {
    let store = SqliteAdapter::open(&settings.database)?;
    store.initialize_schema()?;
    Ok(store)
}

fn run_serve(config_path: &PathBuf) -> Result<(), SquirrelError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, build_router};
        use std::sync::Arc;

        tracing::info!(config = %config_path.display(), "loading config");
        let settings = Arc::new(load_config(config_path)?);
        let store = Arc::new(open_store(&settings)?);
        let state = AppState::new(store.clone(), store, settings.clone())?;

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async {
            let router = build_router(state).await?;
            let listener = tokio::net::TcpListener::bind(settings.listen.as_str()).await?;
            tracing::info!(listen = %settings.listen, "web server started");
            axum::serve(listener, router).await?;
            Ok::<(), SquirrelError>(())
        })
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        Err(SquirrelError::Internal {
            reason: "web feature is required for serve".to_string(),
        })
    }
}

fn run_hash_password(config_path: Option<&PathBuf>) -> Result<(), SquirrelError> {
    let auth = match config_path {
        Some(path) => load_config(path)?.auth,
        None => AuthSettings::default(),
    };
    let hasher = Hasher::from_settings(&auth)?;

    eprintln!("Enter password to hash:");
    let password = io::stdin().lock().lines().next().transpose()?.unwrap_or_default();
    println!("{}", hasher.hash(&password)?);
    Ok(())
}

fn run_promote(config_path: &PathBuf, username: &str, admin: bool) -> Result<(), SquirrelError> {
    let settings = load_config(config_path)?;
    let store = open_store(&settings)?;
    let user = store
        .find_by_username(username)?
        .ok_or_else(|| SquirrelError::not_found(format!("no user named {username}")))?;
    let user = store.set_admin(user.id, admin)?;
    tracing::info!(user_id = user.id, admin = user.admin, "admin flag updated");
    eprintln!("{} admin = {}", user.username, user.admin);
    Ok(())
}
