//! Grange server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens an
//! in-process SQLite store, and serves the directory API over HTTP.
//!
//! # Operator helpers
//!
//! ```text
//! cargo run -p grange-api --bin server -- --hash-password
//! cargo run -p grange-api --bin server -- --create-admin admin@example.org
//! ```
//!
//! Both read the password from stdin and exit without serving.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use grange_api::{AppState, ServerConfig, api_router};
use grange_core::{identity::NewUser, store::DirectoryStore as _};
use grange_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Grange community directory server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Create a system administrator with this email (password from
  /// stdin) and exit.
  #[arg(long, value_name = "EMAIL")]
  create_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = password_from_stdin()?;
    println!("{}", hash_password(&password)?);
    return Ok(());
  }

  // Load configuration.
  let config: ServerConfig = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("GRANGE"))
    .build()
    .context("failed to load configuration")?
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&config.store_path);

  // Helper mode: seed a system administrator and exit.
  if let Some(email) = cli.create_admin {
    return create_admin(&store_path, &email).await;
  }

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let purged = store.purge_expired_sessions(chrono::Utc::now()).await?;
  if purged > 0 {
    tracing::info!("purged {purged} expired sessions");
  }

  let state = AppState { store: Arc::new(store) };
  let app = api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", config.host, config.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Seed a system administrator account.
async fn create_admin(store_path: &Path, email: &str) -> anyhow::Result<()> {
  let email = email.trim().to_lowercase();
  anyhow::ensure!(email.contains('@'), "{email:?} is not an email address");

  let password = password_from_stdin()?;
  anyhow::ensure!(
    password.chars().count() >= 8,
    "password must be at least 8 characters"
  );

  let store = SqliteStore::open(store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let user = store
    .create_user(NewUser {
      email,
      password_hash: hash_password(&password)?,
      is_system_admin: true,
    })
    .await
    .context("failed to create administrator")?;

  println!("created system administrator {} (user {})", user.email, user.user_id);
  Ok(())
}

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
  Ok(hash.to_string())
}

/// Read a password from stdin.
fn password_from_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
