//! PersistentStore: the live configuration plus its durable copy.
//!
//! The store owns the process's single [`Configuration`] and knows how to
//! read it from, and write it to, one of two storage backends:
//!
//! - **sync**  – storage synchronized across the user's browsers;
//! - **local** – storage on this machine only.
//!
//! # The selector hint (for beginners)
//!
//! Which backend holds the record is itself a setting (`sync`), which creates
//! a chicken-and-egg problem on startup: we need the record to know where the
//! record lives.  The store therefore keeps a tiny out-of-band hint, the
//! [`SelectorCache`], written after every successful save.  On cold start
//! `load` reads from whatever area the hint names (local when there is no hint).
//!
//! # Sync-disabled fallback
//!
//! Some browsers can switch synchronized storage off entirely, in which case
//! every sync operation fails with [`BackendError::SyncDisabled`].  Both `load`
//! and `save` treat that error specially: they permanently downgrade to local
//! storage (hint = local, `sync = false`) and retry exactly once.  Any other
//! backend error is logged and reported as a failure, never retried.
//!
//! # Write ordering
//!
//! Saves are fire-and-forget from the caller's point of view, so several may
//! be in flight at once.  An async write lock serializes them and each save
//! snapshots the configuration only after taking the lock, so the last save to
//! start always writes the newest state.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rua_core::domain::settings::LEGACY_FRAGMENT_KEY;
use rua_core::{Configuration, STORAGE_KEY};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

// ── Storage areas ─────────────────────────────────────────────────────────────

/// The two logical storage areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageArea {
    Sync,
    Local,
}

impl StorageArea {
    /// The area selected by a configuration's `sync` flag.
    pub fn for_sync_flag(sync_enabled: bool) -> Self {
        if sync_enabled {
            StorageArea::Sync
        } else {
            StorageArea::Local
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageArea {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sync" => Ok(StorageArea::Sync),
            "local" => Ok(StorageArea::Local),
            other => Err(format!("unknown storage area: {other}")),
        }
    }
}

// ── Backend abstraction ───────────────────────────────────────────────────────

/// Error type reported by storage backends.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Synchronized storage is switched off in the browser.  Triggers the
    /// one-time fallback to local storage.
    #[error("synchronized storage is disabled")]
    SyncDisabled,

    /// A file system I/O error occurred.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored document could not be parsed.
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    /// Any other backend failure (quota, transient unavailability).
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// A durable key-value storage area.
///
/// Mirrors the browser storage API: `get` returns only the requested keys
/// that exist, `set` upserts every entry of the map, `clear` erases the area.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, BackendError>;

    async fn set(&self, items: Map<String, Value>) -> Result<(), BackendError>;

    async fn clear(&self) -> Result<(), BackendError>;
}

/// Process-local cache of the area that last received the record.
pub trait SelectorCache: Send + Sync {
    fn get(&self) -> Option<StorageArea>;
    fn set(&self, area: StorageArea);
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// The live configuration and its dual-backend persistence.
pub struct PersistentStore {
    config: Mutex<Configuration>,
    sync: Arc<dyn StorageBackend>,
    local: Arc<dyn StorageBackend>,
    selector: Arc<dyn SelectorCache>,
    loaded: AtomicBool,
    write_lock: tokio::sync::Mutex<()>,
}

impl PersistentStore {
    /// Creates a store holding the built-in defaults.
    pub fn new(
        sync: Arc<dyn StorageBackend>,
        local: Arc<dyn StorageBackend>,
        selector: Arc<dyn SelectorCache>,
    ) -> Self {
        Self {
            config: Mutex::new(Configuration::default()),
            sync,
            local,
            selector,
            loaded: AtomicBool::new(false),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns a copy of the live configuration.
    pub fn snapshot(&self) -> Configuration {
        self.lock().clone()
    }

    /// Runs `f` against the live configuration.
    pub fn read<R>(&self, f: impl FnOnce(&Configuration) -> R) -> R {
        f(&self.lock())
    }

    /// Runs `f` with mutable access to the live configuration.
    ///
    /// Does not persist anything; callers go through the store proxy for that.
    pub fn write<R>(&self, f: impl FnOnce(&mut Configuration) -> R) -> R {
        f(&mut self.lock())
    }

    /// Whether `load` has completed at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Reads the persisted record and merges it into the live configuration.
    ///
    /// Missing records count as "no prior state".  On the first successful
    /// call a legacy `data` fragment, if present, is deep-merged as well.
    /// Returns the resulting configuration.
    pub async fn load(&self) -> Configuration {
        let keys = [STORAGE_KEY, LEGACY_FRAGMENT_KEY];
        let mut area = self.selector.get().unwrap_or(StorageArea::Local);
        let mut fell_back = false;

        let stored = loop {
            match self.backend(area).get(&keys).await {
                Ok(items) => break items,
                Err(BackendError::SyncDisabled) if area == StorageArea::Sync => {
                    info!("sync disabled, falling back to local storage");
                    self.selector.set(StorageArea::Local);
                    self.write(|cfg| cfg.sync_enabled = false);
                    area = StorageArea::Local;
                    fell_back = true;
                }
                Err(e) => {
                    error!("failed to load settings from {area} storage: {e}");
                    break Map::new();
                }
            }
        };

        let first_load = !self.is_loaded();
        let record = stored.get(STORAGE_KEY).and_then(Value::as_object);
        let legacy = record
            .and_then(|r| r.get(LEGACY_FRAGMENT_KEY))
            .or_else(|| stored.get(LEGACY_FRAGMENT_KEY))
            .filter(|v| v.is_object());

        self.write(|cfg| {
            if let Some(record) = record {
                let changed = cfg.merge_record(record);
                debug!("merged {} stored setting(s)", changed.len());
            }
            if first_load {
                if let Some(fragment) = legacy {
                    *cfg = cfg.merged_with(fragment);
                    info!("imported legacy settings fragment");
                }
            }
            if fell_back {
                cfg.sync_enabled = false;
            }
        });
        self.loaded.store(true, Ordering::SeqCst);

        info!("settings loaded from {area} storage");
        self.snapshot()
    }

    /// Writes the whole configuration to the backend selected by `sync`.
    ///
    /// Returns `false` only when the backend reported an error other than the
    /// sync-disabled condition (which is recovered by falling back to local).
    pub async fn save(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut fell_back = false;

        loop {
            let (area, items) = {
                let cfg = self.lock();
                let mut items = Map::new();
                items.insert(STORAGE_KEY.to_string(), Value::Object(cfg.to_record()));
                (StorageArea::for_sync_flag(cfg.sync_enabled), items)
            };

            match self.backend(area).set(items).await {
                Ok(()) => {
                    self.selector.set(area);
                    debug!("settings saved to {area} storage");
                    return true;
                }
                Err(BackendError::SyncDisabled) if area == StorageArea::Sync && !fell_back => {
                    info!("sync disabled, falling back to local storage");
                    self.write(|cfg| cfg.sync_enabled = false);
                    self.selector.set(StorageArea::Local);
                    fell_back = true;
                }
                Err(e) => {
                    error!("failed to save settings to {area} storage: {e}");
                    return false;
                }
            }
        }
    }

    /// Returns once no save holds the write lock.
    pub async fn flush(&self) {
        drop(self.write_lock.lock().await);
    }

    /// Erases the durable copy in the area selected by `sync`.
    ///
    /// The live configuration is not modified.
    pub async fn clear(&self) -> bool {
        let area = self.read(|cfg| StorageArea::for_sync_flag(cfg.sync_enabled));
        match self.backend(area).clear().await {
            Ok(()) => {
                warn!("settings cleared from {area} storage");
                true
            }
            Err(e) => {
                error!("failed to clear {area} storage: {e}");
                false
            }
        }
    }

    fn backend(&self, area: StorageArea) -> &Arc<dyn StorageBackend> {
        match area {
            StorageArea::Sync => &self.sync,
            StorageArea::Local => &self.local,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Configuration> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
