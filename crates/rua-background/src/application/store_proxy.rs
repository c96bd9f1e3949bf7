//! StoreProxy: field-level access to the configuration with change hooks.
//!
//! Every read and write of a setting in the background runtime goes through
//! this wrapper, which gives one code path for the rule
//!
//! ```text
//! set(field, value):  mutate in memory  →  start a save  →  notify observers
//! ```
//!
//! The save is fire-and-forget: `set` returns as soon as the value is visible
//! in memory, and hands back a [`SaveHandle`] that tests (or careful callers)
//! may await to observe the persistence result.  The proxy still counts its
//! in-flight saves, and [`StoreProxy::flush`] waits for all of them; the host
//! calls it on shutdown so an acknowledged write is never lost.
//!
//! Observers are held weakly so an observer that also owns the proxy (the
//! background controller does) does not form a reference cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use rua_core::{Configuration, SettingField, SettingsError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::persistent_store::PersistentStore;

/// Name answered by [`StoreProxy::get_by_name`] with the loaded flag.
pub const IS_LOADED: &str = "is_loaded";

/// Error type for proxy writes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The value was rejected by the configuration.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Receives configuration access notifications.
///
/// Both hooks default to no-ops so observers only implement what they need.
#[async_trait]
pub trait SettingsObserver: Send + Sync {
    /// Called after every field read.
    fn on_get(&self, _name: &str) {}

    /// Called after every field write with the value now stored.
    async fn on_set(&self, _name: &str, _value: &Value) {}
}

/// Completion handle of a fire-and-forget save.
#[derive(Debug)]
pub struct SaveHandle(JoinHandle<bool>);

impl SaveHandle {
    /// Waits for the save to finish and returns whether it succeeded.
    pub async fn wait(self) -> bool {
        match self.0.await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("save task did not complete: {e}");
                false
            }
        }
    }
}

// ── Pending saves ─────────────────────────────────────────────────────────────

/// Count of spawned saves that have not finished yet.
#[derive(Debug, Default)]
struct PendingSaves {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingSaves {
    fn track(self: &Arc<Self>) -> PendingGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        PendingGuard(Arc::clone(self))
    }

    fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.len() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the pending count when the save task ends, even if it is
/// cancelled or panics.
struct PendingGuard(Arc<PendingSaves>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

// ── Proxy ─────────────────────────────────────────────────────────────────────

/// Observable, auto-saving access to the configuration.
pub struct StoreProxy {
    store: Arc<PersistentStore>,
    observers: RwLock<Vec<Weak<dyn SettingsObserver>>>,
    pending: Arc<PendingSaves>,
}

impl StoreProxy {
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self {
            store,
            observers: RwLock::new(Vec::new()),
            pending: Arc::default(),
        }
    }

    /// Registers an observer.  Dropped observers are pruned lazily.
    pub fn subscribe<O: SettingsObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<dyn SettingsObserver> = Arc::downgrade(observer) as Weak<dyn SettingsObserver>;
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(weak);
    }

    /// The wrapped store.
    pub fn store(&self) -> &Arc<PersistentStore> {
        &self.store
    }

    /// A copy of the live configuration.  Does not fire `on_get`.
    pub fn snapshot(&self) -> Configuration {
        self.store.snapshot()
    }

    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded()
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Returns the current value of `field`.
    pub fn get(&self, field: SettingField) -> Value {
        let value = self.store.read(|cfg| cfg.get(field));
        self.notify_get(field.as_str());
        value
    }

    /// Like [`get`](Self::get), decoded into `T`.
    ///
    /// `None` when the stored value does not fit `T` (for example a `null`
    /// user-agent read as `String`).
    pub fn get_as<T: DeserializeOwned>(&self, field: SettingField) -> Option<T> {
        serde_json::from_value(self.get(field)).ok()
    }

    /// Returns the value for a field name, or the loaded flag for
    /// [`IS_LOADED`].  Any other name yields `None`.
    pub fn get_by_name(&self, name: &str) -> Option<Value> {
        let value = if name == IS_LOADED {
            Some(Value::Bool(self.is_loaded()))
        } else {
            name.parse::<SettingField>()
                .ok()
                .map(|field| self.store.read(|cfg| cfg.get(field)))
        };
        self.notify_get(name);
        value
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Stores `value` in `field`, starts a save and notifies observers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Settings`] when the value is rejected.  Nothing
    /// is saved or notified in that case.
    pub async fn set(&self, field: SettingField, value: Value) -> Result<SaveHandle, StoreError> {
        let stored = self.store.write(|cfg| {
            cfg.apply(field, value)?;
            Ok::<_, SettingsError>(cfg.get(field))
        })?;
        let handle = self.spawn_save();
        self.notify_set(field.as_str(), &stored).await;
        Ok(handle)
    }

    /// Like [`set`](Self::set) for a field name.
    ///
    /// Unknown names are not persisted but observers still hear about them;
    /// `Ok(None)` is returned in that case.
    pub async fn set_by_name(
        &self,
        name: &str,
        value: Value,
    ) -> Result<Option<SaveHandle>, StoreError> {
        match name.parse::<SettingField>() {
            Ok(field) => self.set(field, value).await.map(Some),
            Err(_) => {
                debug!("setting \"{name}\" is not persisted");
                self.notify_set(name, &value).await;
                Ok(None)
            }
        }
    }

    /// Deep-merges a nested fragment into the configuration.
    ///
    /// Each field whose value changes goes through [`set`](Self::set), so it
    /// is saved and observed like any other write.  Returns the changed fields.
    pub async fn import(&self, fragment: &Value) -> Vec<SettingField> {
        let merged = self.store.read(|cfg| cfg.merged_with(fragment));
        let changed = self.snapshot().diff(&merged);
        for &field in &changed {
            if let Err(e) = self.set(field, merged.get(field)).await {
                warn!("import skipped {field}: {e}");
            }
        }
        changed
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    /// Loads from storage and notifies observers of every changed field.
    pub async fn load(&self) -> Configuration {
        let before = self.snapshot();
        let after = self.store.load().await;
        for field in before.diff(&after) {
            self.notify_set(field.as_str(), &after.get(field)).await;
        }
        after
    }

    pub async fn save(&self) -> bool {
        self.store.save().await
    }

    pub async fn clear(&self) -> bool {
        self.store.clear().await
    }

    /// Number of fire-and-forget saves still running.
    pub fn pending_saves(&self) -> usize {
        self.pending.len()
    }

    /// Waits until every save started by [`set`](Self::set) has finished and
    /// no other save holds the store's write lock.
    pub async fn flush(&self) {
        let waiting = self.pending.len();
        self.pending.wait_idle().await;
        self.store.flush().await;
        debug!("flushed {waiting} pending save(s)");
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn spawn_save(&self) -> SaveHandle {
        let store = Arc::clone(&self.store);
        let guard = self.pending.track();
        SaveHandle(tokio::spawn(async move {
            let _guard = guard;
            store.save().await
        }))
    }

    fn live_observers(&self) -> Vec<Arc<dyn SettingsObserver>> {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        observers.retain(|o| o.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }

    fn notify_get(&self, name: &str) {
        for observer in self.live_observers() {
            observer.on_get(name);
        }
    }

    async fn notify_set(&self, name: &str, value: &Value) {
        for observer in self.live_observers() {
            observer.on_set(name, value).await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::persistent_store::StorageArea;
    use crate::infrastructure::storage::{MemoryBackend, MemorySelector};
    use rua_core::STORAGE_KEY;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every notification as `"get:<name>"` / `"set:<name>=<value>"`.
    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SettingsObserver for RecordingObserver {
        fn on_get(&self, name: &str) {
            self.events.lock().unwrap().push(format!("get:{name}"));
        }

        async fn on_set(&self, name: &str, value: &Value) {
            self.events.lock().unwrap().push(format!("set:{name}={value}"));
        }
    }

    fn proxy() -> (Arc<StoreProxy>, Arc<MemoryBackend>, Arc<RecordingObserver>) {
        let sync = Arc::new(MemoryBackend::new(StorageArea::Sync));
        let local = Arc::new(MemoryBackend::new(StorageArea::Local));
        let store = Arc::new(PersistentStore::new(
            sync,
            local.clone(),
            Arc::new(MemorySelector::default()),
        ));
        let proxy = Arc::new(StoreProxy::new(store));
        let observer = Arc::new(RecordingObserver::default());
        proxy.subscribe(&observer);
        (proxy, local, observer)
    }

    /// A valid value for `field` that differs from the default.
    fn sample_value(field: SettingField) -> Value {
        match field {
            SettingField::Enabled => json!(true),
            SettingField::Sync => json!(false),
            SettingField::Useragent => json!("UA/1"),
            SettingField::RenewEnabled => json!(false),
            SettingField::RenewInterval => json!(5000),
            SettingField::RenewOnStartup => json!(false),
            SettingField::CustomUseragent => {
                json!({ "enabled": true, "value": "Custom/1", "list": [] })
            }
            SettingField::JavascriptProtectionEnabled => json!(false),
            SettingField::GeneratorTypes => json!(["firefox_linux"]),
            SettingField::ExceptionsList => json!(["*://intranet/*"]),
        }
    }

    #[tokio::test]
    async fn test_set_is_visible_before_save_completes() {
        for field in SettingField::ALL {
            // Arrange
            let (proxy, local, _observer) = proxy();
            let value = sample_value(field);

            // Act
            let handle = proxy.set(field, value.clone()).await.expect("valid value");

            // Assert: the spawned save has not run yet on this single-threaded runtime.
            assert_eq!(local.set_calls(), 0, "{}", field.as_str());
            assert_eq!(proxy.get(field), value, "{}", field.as_str());
            assert!(handle.wait().await);
            assert_eq!(local.set_calls(), 1, "{}", field.as_str());
        }
    }

    #[tokio::test]
    async fn test_flush_waits_for_unawaited_saves() {
        // Arrange
        let (proxy, local, _observer) = proxy();
        drop(proxy.set(SettingField::Enabled, json!(true)).await.unwrap());
        drop(proxy.set(SettingField::Useragent, json!("UA/2")).await.unwrap());
        assert_eq!(proxy.pending_saves(), 2);

        // Act
        proxy.flush().await;

        // Assert
        assert_eq!(proxy.pending_saves(), 0);
        assert_eq!(local.set_calls(), 2);
        assert_eq!(local.contents()[STORAGE_KEY]["enabled"], json!(true));
        assert_eq!(local.contents()[STORAGE_KEY]["useragent"], json!("UA/2"));
    }

    #[tokio::test]
    async fn test_flush_without_pending_saves_returns_immediately() {
        let (proxy, local, _observer) = proxy();

        proxy.flush().await;

        assert_eq!(proxy.pending_saves(), 0);
        assert_eq!(local.set_calls(), 0);
    }

    #[tokio::test]
    async fn test_each_set_triggers_its_own_save() {
        let (proxy, local, _observer) = proxy();

        let a = proxy.set(SettingField::Enabled, json!(true)).await.unwrap();
        let b = proxy.set(SettingField::Sync, json!(false)).await.unwrap();
        a.wait().await;
        b.wait().await;

        assert_eq!(local.set_calls(), 2);
        assert_eq!(local.contents()[STORAGE_KEY]["enabled"], json!(true));
    }

    #[tokio::test]
    async fn test_set_notifies_after_mutation_with_stored_value() {
        // Arrange
        let (proxy, _local, observer) = proxy();

        // Act
        proxy.set(SettingField::RenewInterval, json!(5000)).await.unwrap();

        // Assert
        assert_eq!(observer.events(), vec!["set:renew_interval=5000".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_set_neither_saves_nor_notifies() {
        // Arrange
        let (proxy, local, observer) = proxy();

        // Act
        let result = proxy.set(SettingField::RenewInterval, json!(0)).await;

        // Assert
        assert!(result.is_err());
        tokio::task::yield_now().await;
        assert_eq!(local.set_calls(), 0);
        assert!(observer.events().is_empty());
    }

    #[tokio::test]
    async fn test_get_fires_on_get() {
        let (proxy, _local, observer) = proxy();

        proxy.get(SettingField::Enabled);

        assert_eq!(observer.events(), vec!["get:enabled".to_string()]);
    }

    #[tokio::test]
    async fn test_typed_get_fires_on_get() {
        // Arrange
        let (proxy, _local, observer) = proxy();

        // Act
        let patterns: Option<Vec<String>> = proxy.get_as(SettingField::ExceptionsList);
        let useragent: Option<String> = proxy.get_as(SettingField::Useragent);

        // Assert
        assert_eq!(patterns, Some(vec!["chrome://*".to_string()]));
        assert_eq!(useragent, None);
        assert_eq!(
            observer.events(),
            vec!["get:exceptions_list".to_string(), "get:useragent".to_string()]
        );
    }

    #[tokio::test]
    async fn test_get_by_name_answers_loaded_flag_and_unknown_names() {
        // Arrange
        let (proxy, _local, observer) = proxy();

        // Act
        let before = proxy.get_by_name(IS_LOADED);
        proxy.load().await;
        let after = proxy.get_by_name(IS_LOADED);
        let unknown = proxy.get_by_name("favourite_colour");

        // Assert
        assert_eq!(before, Some(json!(false)));
        assert_eq!(after, Some(json!(true)));
        assert_eq!(unknown, None);
        assert!(observer.events().contains(&"get:favourite_colour".to_string()));
    }

    #[tokio::test]
    async fn test_set_by_name_with_unknown_name_only_notifies() {
        // Arrange
        let (proxy, local, observer) = proxy();

        // Act
        let handle = proxy.set_by_name("transient", json!(1)).await.unwrap();

        // Assert
        assert!(handle.is_none());
        tokio::task::yield_now().await;
        assert_eq!(local.set_calls(), 0);
        assert_eq!(observer.events(), vec!["set:transient=1".to_string()]);
    }

    #[tokio::test]
    async fn test_import_routes_changed_fields_through_set() {
        // Arrange
        let (proxy, _local, observer) = proxy();
        let fragment = json!({ "enabled": true, "sync": false, "custom_useragent": { "value": "X" } });

        // Act
        let changed = proxy.import(&fragment).await;

        // Assert
        assert_eq!(changed, vec![SettingField::Enabled, SettingField::CustomUseragent]);
        assert!(proxy.snapshot().enabled);
        assert_eq!(proxy.snapshot().custom_useragent.value.as_deref(), Some("X"));
        assert_eq!(observer.events().len(), 2);
    }

    #[tokio::test]
    async fn test_load_notifies_changed_fields() {
        // Arrange
        let (proxy, local, observer) = proxy();
        local.seed(STORAGE_KEY, json!({ "renew_enabled": false, "enabled": false }));

        // Act
        proxy.load().await;

        // Assert: `enabled` did not change, so only one notification.
        assert_eq!(observer.events(), vec!["set:renew_enabled=false".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_observer_is_not_called() {
        let (proxy, _local, observer) = proxy();
        drop(observer);

        let result = proxy.set(SettingField::Enabled, json!(true)).await;

        assert!(result.is_ok());
    }
}
