//! Random User-Agent background host: entry point.
//!
//! Runs the add-on's background runtime as a standalone process.  Requests
//! and browser events arrive as newline-delimited JSON on stdin; answers are
//! written to stdout.  Logs go to stderr so they never mix with the protocol.
//!
//! # Usage
//!
//! ```text
//! rua-host [OPTIONS]
//!
//! Options:
//!   --config <PATH>     Host config file [default: platform config dir]
//!   --data-dir <DIR>    Persist settings under DIR (in memory when unset)
//!   --no-sync           Behave as if browser sync storage is disabled
//!   --log-level <LVL>   Log level when RUST_LOG is unset
//!   --write-config      Write the effective config file and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable         | Description                           |
//! |------------------|---------------------------------------|
//! | `RUA_CONFIG`     | Host config file                      |
//! | `RUA_DATA_DIR`   | Settings directory                    |
//! | `RUA_NO_SYNC`    | Disable the sync storage area         |
//! | `RUA_LOG_LEVEL`  | Log level when `RUST_LOG` is unset    |
//!
//! # Architecture overview
//!
//! ```text
//! stdin/stdout (NDJSON)
//!       ↕
//! StdioHost ──► Dispatcher ──► settings / useragent / exceptions handlers
//!    │                              ↕
//!    └──► BackgroundController ◄── StoreProxy ◄──► PersistentStore
//!              │                                     ↕
//!              └── RenewTimer              sync.json / local.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rua_background::application::api::build_registry;
use rua_background::application::background::BackgroundController;
use rua_background::application::dispatcher::Dispatcher;
use rua_background::application::persistent_store::{
    PersistentStore, SelectorCache, StorageArea, StorageBackend,
};
use rua_background::application::store_proxy::StoreProxy;
use rua_background::infrastructure::host_config::{self, HostConfig};
use rua_background::infrastructure::storage::{
    FailureMode, FileSelector, JsonFileBackend, MemoryBackend, MemorySelector,
};
use rua_background::infrastructure::transport::StdioHost;
use rua_background::infrastructure::ui::{LoggingIconRenderer, LoggingTabCloser};
use rua_background::infrastructure::useragent::TemplateProvider;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Random User-Agent background host.
#[derive(Debug, Parser)]
#[command(
    name = "rua-host",
    about = "Background runtime of the Random User-Agent add-on over stdio",
    version
)]
struct Cli {
    /// Host config file.  Defaults to `host.toml` in the platform config dir.
    #[arg(long, env = "RUA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding `sync.json`, `local.json` and the selector hint.
    ///
    /// Overrides `storage.data_dir` from the config file.
    #[arg(long, env = "RUA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Treat the sync storage area as disabled.
    #[arg(long, env = "RUA_NO_SYNC")]
    no_sync: bool,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "RUA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write the effective config to the config file and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Applies the command-line overrides on top of `file`.
    fn merge_into(&self, mut file: HostConfig) -> HostConfig {
        if let Some(dir) = &self.data_dir {
            file.storage.data_dir = Some(dir.clone());
        }
        if self.no_sync {
            file.storage.sync_available = false;
        }
        if let Some(level) = &self.log_level {
            file.host.log_level = level.clone();
        }
        file
    }

    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => host_config::config_file_path().context("locating host config"),
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

/// Builds the persistent store described by `config`.
fn build_store(config: &HostConfig) -> PersistentStore {
    let sync_available = config.storage.sync_available;
    let (sync, local, selector): (
        Arc<dyn StorageBackend>,
        Arc<dyn StorageBackend>,
        Arc<dyn SelectorCache>,
    ) = match &config.storage.data_dir {
        Some(dir) => {
            let sync = if sync_available {
                JsonFileBackend::in_dir(dir, StorageArea::Sync)
            } else {
                JsonFileBackend::disabled(StorageArea::Sync, dir.join("sync.json"))
            };
            (
                Arc::new(sync),
                Arc::new(JsonFileBackend::in_dir(dir, StorageArea::Local)),
                Arc::new(FileSelector::in_dir(dir)),
            )
        }
        None => {
            let sync = MemoryBackend::new(StorageArea::Sync);
            if !sync_available {
                sync.set_failure(FailureMode::SyncDisabled);
            }
            (
                Arc::new(sync),
                Arc::new(MemoryBackend::new(StorageArea::Local)),
                Arc::new(MemorySelector::default()),
            )
        }
    };
    PersistentStore::new(sync, local, selector)
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path()?;
    let file = host_config::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let config = cli.merge_into(file);

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // stdout carries the protocol, so log lines go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.host.log_level)),
        )
        .init();

    if cli.write_config {
        host_config::save_to(&config_path, &config)
            .with_context(|| format!("writing {}", config_path.display()))?;
        info!("wrote {}", config_path.display());
        return Ok(());
    }

    match &config.storage.data_dir {
        Some(dir) => info!("Random User-Agent host starting, data in {}", dir.display()),
        None => info!("Random User-Agent host starting, settings kept in memory"),
    }

    // ── Runtime wiring ────────────────────────────────────────────────────────
    let store = Arc::new(build_store(&config));
    let proxy = Arc::new(StoreProxy::new(store));
    let provider = Arc::new(TemplateProvider);
    let icon = Arc::new(LoggingIconRenderer::default());
    let controller = BackgroundController::new(Arc::clone(&proxy), provider.clone(), icon)
        .context("building background controller")?;
    let registry = build_registry(&proxy, provider);
    let dispatcher = Arc::new(Dispatcher::new(registry, proxy, Arc::new(LoggingTabCloser)));

    controller.start().await.context("starting background runtime")?;

    // ── Serve until stdin closes or Ctrl+C ─────────────────────────────────────
    let host = StdioHost::new(dispatcher, Arc::clone(&controller));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = host.run(stdin, tokio::io::stdout()) => {
            if let Err(e) = result {
                error!("stdio transport failed: {e}");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("received Ctrl+C, shutting down"),
                Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
            }
        }
    }

    controller.shutdown().await;
    info!("Random User-Agent host stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
