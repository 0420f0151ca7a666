//! # sanchar
//!
//! Relay server binary: loads settings, opens the store, wires push and
//! metrics, and serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sanchar_core::{DirectoryLookup, SessionStore};
use sanchar_server::push::{ExpoConfig, ExpoPushService, NoopPush, PushDispatcher};
use sanchar_server::relay::RelayOptions;
use sanchar_server::{RelayEngine, SancharServer, ServerConfig};
use sanchar_settings::SancharSettings;
use sanchar_store::{MemoryStore, SqliteStore};

/// Sanchar relay server.
#[derive(Parser, Debug)]
#[command(name = "sanchar", about = "Scanner-to-owner chat and call relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Keep everything in memory instead of `SQLite`.
    #[arg(long, conflicts_with = "db_path")]
    in_memory: bool,

    /// Settings file (defaults to `~/.sanchar/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn resolve_db_path(cli: &Cli, settings: &SancharSettings) -> PathBuf {
    cli.db_path
        .clone()
        .or_else(|| settings.storage.db_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| sanchar_settings::loader::sanchar_home().join("sanchar.db"))
}

fn open_store(
    cli: &Cli,
    settings: &SancharSettings,
) -> Result<(Arc<dyn SessionStore>, Arc<dyn DirectoryLookup>)> {
    if cli.in_memory {
        tracing::warn!("using in-memory store, nothing will persist");
        let store = Arc::new(MemoryStore::new());
        let sessions: Arc<dyn SessionStore> = store.clone();
        let directory: Arc<dyn DirectoryLookup> = store;
        return Ok((sessions, directory));
    }
    let path = resolve_db_path(cli, settings);
    ensure_parent_dir(&path)?;
    let path_str = path.to_string_lossy();
    let store = Arc::new(
        SqliteStore::open(&path_str)
            .with_context(|| format!("Failed to open database: {}", path.display()))?,
    );
    tracing::info!(path = %path.display(), "database ready");
    let sessions: Arc<dyn SessionStore> = store.clone();
    let directory: Arc<dyn DirectoryLookup> = store;
    Ok((sessions, directory))
}

fn build_push(settings: &SancharSettings) -> Result<Arc<dyn PushDispatcher>> {
    if !settings.push.enabled {
        tracing::info!("push notifications disabled");
        return Ok(Arc::new(NoopPush));
    }
    let service = ExpoPushService::new(ExpoConfig::from_settings(&settings.push))
        .context("Failed to build push client")?;
    tracing::info!(endpoint = %settings.push.endpoint, "push notifications enabled");
    Ok(Arc::new(service))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(sanchar_settings::loader::settings_path);
    let settings = sanchar_settings::loader::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings: {}", settings_path.display()))?;

    if cli.json_logs || settings.logging.json {
        sanchar_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        sanchar_core::logging::init_subscriber(&settings.logging.level);
    }

    let (store, directory) = open_store(&cli, &settings)?;
    let push = build_push(&settings)?;
    let metrics_handle = sanchar_server::metrics::install_recorder();

    let mut config = ServerConfig::from_settings(&settings);
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let engine = RelayEngine::new(
        store,
        directory,
        push,
        RelayOptions {
            push_only_when_offline: config.push_only_when_offline,
        },
    );
    let running = SancharServer::new(config, Arc::new(engine))
        .with_metrics(metrics_handle)
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(addr = %running.local_addr(), "sanchar relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("shutdown requested");
    running.shutdown(Some(Duration::from_secs(10))).await;
    Ok(())
}
