//! canvass-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `CANVASS_*` environment variables, opens the SQLite store, wires up the
//! channel adapters, and serves the Canvass JSON API over HTTP.

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use canvass_api::AppState;
use canvass_channels::{AnyAdapter, DryRunAdapter, HttpEmailAdapter, WhatsAppAdapter};
use canvass_core::{
  analytics::AnalyticsOptions,
  channel::{Adapters, Channel},
};
use canvass_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Canvass survey distribution server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
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
  let server_cfg = settings::load(cli.config)?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let adapters = build_adapters(&server_cfg)?;
  let state = AppState::new(
    Arc::new(store),
    adapters,
    server_cfg.dispatch.to_dispatch_config(),
    AnalyticsOptions::from(&server_cfg.analytics),
  );

  let app = canvass_api::api_router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// One adapter slot per channel: the configured provider, else the dry-run
/// adapter when `dry_run` is set, else empty.
fn build_adapters(cfg: &ServerConfig) -> anyhow::Result<Adapters<AnyAdapter>> {
  let timeout = cfg.dispatch.send_timeout();

  let email = match &cfg.email {
    Some(settings) => Some(AnyAdapter::from(
      HttpEmailAdapter::new(settings.clone(), timeout).context("invalid [email] settings")?,
    )),
    None => fallback(Channel::Email, cfg.dry_run),
  };
  let messaging = match &cfg.messaging {
    Some(settings) => Some(AnyAdapter::from(
      WhatsAppAdapter::new(settings.clone(), timeout).context("invalid [messaging] settings")?,
    )),
    None => fallback(Channel::Messaging, cfg.dry_run),
  };

  Ok(Adapters::new(email, messaging))
}

fn fallback(channel: Channel, dry_run: bool) -> Option<AnyAdapter> {
  if dry_run {
    info!(%channel, "no settings, using dry-run adapter");
    Some(DryRunAdapter::new(channel).into())
  } else {
    warn!(%channel, "channel not configured, deliveries on it will fail");
    None
  }
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
