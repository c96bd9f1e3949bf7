//! JSON-file storage backend.
//!
//! Each storage area is one JSON document (an object of key → value) in the
//! host's data directory:
//!
//! ```text
//! <data-dir>/
//! ├── sync.json
//! ├── local.json
//! └── selector
//! ```
//!
//! Writes go to a temporary sibling file which is then renamed over the
//! document, so a crash mid-write leaves the previous document intact.
//!
//! A sync area built with [`JsonFileBackend::disabled`] refuses every
//! operation with [`BackendError::SyncDisabled`], mirroring a browser whose
//! synchronized storage is switched off.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::persistent_store::{BackendError, StorageArea, StorageBackend};

/// A [`StorageBackend`] persisting one area as a JSON file.
#[derive(Debug)]
pub struct JsonFileBackend {
    area: StorageArea,
    path: PathBuf,
    available: bool,
    io_lock: Mutex<()>,
}

impl JsonFileBackend {
    /// Backend for `area` stored at `<dir>/<area>.json`.
    pub fn in_dir(dir: &Path, area: StorageArea) -> Self {
        Self::new(area, dir.join(format!("{area}.json")))
    }

    pub fn new(area: StorageArea, path: PathBuf) -> Self {
        Self {
            area,
            path,
            available: true,
            io_lock: Mutex::new(()),
        }
    }

    /// A backend that reports [`BackendError::SyncDisabled`] for everything.
    pub fn disabled(area: StorageArea, path: PathBuf) -> Self {
        Self {
            available: false,
            ..Self::new(area, path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.available {
            Ok(())
        } else {
            Err(BackendError::SyncDisabled)
        }
    }

    async fn read_document(&self) -> Result<Map<String, Value>, BackendError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(BackendError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(BackendError::Corrupt(format!(
                "{} does not hold a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(BackendError::Corrupt(format!("{}: {e}", self.path.display()))),
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<(), BackendError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_error(dir))?;
        }
        let text = serde_json::to_string_pretty(document)
            .map_err(|e| BackendError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io_error(&self.path))?;
        debug!("wrote {} storage to {}", self.area, self.path.display());
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BackendError {
    let path = path.to_path_buf();
    move |source| BackendError::Io { path, source }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, BackendError> {
        self.check()?;
        let _guard = self.io_lock.lock().await;
        let document = self.read_document().await?;
        Ok(keys
            .iter()
            .filter_map(|k| document.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), BackendError> {
        self.check()?;
        let _guard = self.io_lock.lock().await;
        let mut document = self.read_document().await?;
        document.extend(items);
        self.write_document(&document).await
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.check()?;
        let _guard = self.io_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BackendError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
