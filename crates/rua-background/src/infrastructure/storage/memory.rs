//! In-memory storage backend and selector cache.
//!
//! Used by unit tests and by the host when no data directory is configured.
//! A [`FailureMode`] can be switched on to make every operation fail, which
//! is how tests exercise the sync-disabled fallback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::application::persistent_store::{
    BackendError, SelectorCache, StorageArea, StorageBackend,
};

/// How a [`MemoryBackend`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    #[default]
    None,
    /// Every operation reports [`BackendError::SyncDisabled`].
    SyncDisabled,
    /// Every operation reports [`BackendError::Unavailable`].
    Unavailable,
}

/// A [`StorageBackend`] holding its items in a map.
#[derive(Debug)]
pub struct MemoryBackend {
    area: StorageArea,
    items: Mutex<Map<String, Value>>,
    failure: Mutex<FailureMode>,
    get_calls: AtomicUsize,
    set_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(area: StorageArea) -> Self {
        Self {
            area,
            items: Mutex::new(Map::new()),
            failure: Mutex::new(FailureMode::None),
            get_calls: AtomicUsize::new(0),
            set_calls: AtomicUsize::new(0),
        }
    }

    /// Switches failure injection on or off.
    pub fn set_failure(&self, mode: FailureMode) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    /// Stores `value` under `key` directly, bypassing failure injection.
    pub fn seed(&self, key: &str, value: Value) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    /// Returns a copy of everything stored.
    pub fn contents(&self) -> Map<String, Value> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `get` calls received, failed ones included.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `set` calls received, failed ones included.
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), BackendError> {
        match *self.failure.lock().unwrap_or_else(PoisonError::into_inner) {
            FailureMode::None => Ok(()),
            FailureMode::SyncDisabled => Err(BackendError::SyncDisabled),
            FailureMode::Unavailable => Err(BackendError::Unavailable(format!(
                "{} storage is offline",
                self.area
            ))),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, BackendError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .iter()
            .filter_map(|k| items.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), BackendError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(items);
        Ok(())
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.check()?;
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// A [`SelectorCache`] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySelector {
    area: Mutex<Option<StorageArea>>,
}

impl SelectorCache for MemorySelector {
    fn get(&self) -> Option<StorageArea> {
        *self.area.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, area: StorageArea) {
        *self.area.lock().unwrap_or_else(PoisonError::into_inner) = Some(area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_returns_only_existing_requested_keys() {
        // Arrange
        let backend = MemoryBackend::new(StorageArea::Local);
        backend.seed("a", json!(1));
        backend.seed("b", json!(2));

        // Act
        let items = backend.get(&["a", "missing"]).await.unwrap();

        // Assert
        assert_eq!(items.len(), 1);
        assert_eq!(items["a"], json!(1));
    }

    #[tokio::test]
    async fn test_failure_mode_applies_to_every_operation() {
        let backend = MemoryBackend::new(StorageArea::Sync);
        backend.set_failure(FailureMode::SyncDisabled);

        assert!(matches!(backend.get(&["a"]).await, Err(BackendError::SyncDisabled)));
        assert!(matches!(backend.set(Map::new()).await, Err(BackendError::SyncDisabled)));
        assert!(matches!(backend.clear().await, Err(BackendError::SyncDisabled)));
        assert_eq!(backend.get_calls(), 1);
        assert_eq!(backend.set_calls(), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let backend = MemoryBackend::new(StorageArea::Local);
        backend.seed("a", json!(true));

        tokio_test::assert_ok!(tokio_test::block_on(backend.clear()));

        assert!(backend.contents().is_empty());
    }

    #[test]
    fn test_memory_selector_starts_empty() {
        let selector = MemorySelector::default();
        assert_eq!(selector.get(), None);
        selector.set(StorageArea::Sync);
        assert_eq!(selector.get(), Some(StorageArea::Sync));
    }
}
