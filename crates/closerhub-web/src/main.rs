//! closerhub server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), layers
//! `CLOSERHUB__*` environment variables on top, opens the SQLite store and
//! serves the marketplace over HTTP. Uploaded photos are served from the
//! configured upload directory.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use closerhub_store_sqlite::SqliteStore;
use closerhub_web::{
  AppState, ServerConfig,
  collab::{billing::StripeBilling, storage::DiskObjectStorage},
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "closerhub marketplace server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CLOSERHUB").separator("__"))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.store_path = expand_tilde(&server_cfg.store_path);
  server_cfg.uploads.dir = expand_tilde(&server_cfg.uploads.dir);

  if server_cfg.billing.webhook_secret.is_empty() {
    tracing::warn!("billing.webhook_secret is empty; billing webhooks will be rejected");
  }

  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;

  let billing = StripeBilling::new(&server_cfg.billing, &server_cfg.base_url)
    .context("failed to build billing client")?;
  let storage = DiskObjectStorage::new(&server_cfg.uploads);

  let state = AppState {
    store:   Arc::new(store),
    billing: Arc::new(billing),
    storage: Arc::new(storage),
    config:  Arc::new(server_cfg.clone()),
  };

  let mut app = closerhub_web::router(state);
  if let Some(mount) = upload_mount(&server_cfg.uploads.public_base_url)? {
    app = app.nest_service(mount, ServeDir::new(&server_cfg.uploads.dir));
  }

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Local path the upload directory is served under, or `None` when uploads
/// are served from an absolute URL elsewhere. The site root is refused: it
/// would shadow every route.
fn upload_mount(public_base_url: &str) -> anyhow::Result<Option<&str>> {
  if !public_base_url.starts_with('/') {
    return Ok(None);
  }
  let mount = public_base_url.trim_end_matches('/');
  if mount.is_empty() {
    anyhow::bail!("uploads.public_base_url must not be the site root");
  }
  Ok(Some(mount))
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
