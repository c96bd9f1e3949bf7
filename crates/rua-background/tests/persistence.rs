//! Integration tests for settings persistence on disk.
//!
//! These tests exercise `PersistentStore` + `StoreProxy` over the JSON file
//! backends, including a simulated process restart and the sync-disabled
//! fallback.

use std::path::Path;
use std::sync::Arc;

use rua_background::application::persistent_store::{PersistentStore, StorageArea};
use rua_background::application::store_proxy::StoreProxy;
use rua_background::infrastructure::storage::{FileSelector, JsonFileBackend};
use rua_core::SettingField;
use serde_json::{json, Value};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn file_proxy(dir: &Path, sync_available: bool) -> Arc<StoreProxy> {
    let sync = if sync_available {
        JsonFileBackend::in_dir(dir, StorageArea::Sync)
    } else {
        JsonFileBackend::disabled(StorageArea::Sync, dir.join("sync.json"))
    };
    let store = PersistentStore::new(
        Arc::new(sync),
        Arc::new(JsonFileBackend::in_dir(dir, StorageArea::Local)),
        Arc::new(FileSelector::in_dir(dir)),
    );
    Arc::new(StoreProxy::new(Arc::new(store)))
}

fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).expect("document exists");
    serde_json::from_str(&text).expect("valid JSON")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_settings_survive_restart() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let before = file_proxy(dir.path(), true);
    before.load().await;
    before
        .set(SettingField::Enabled, json!(true))
        .await
        .unwrap()
        .wait()
        .await;
    before
        .set(SettingField::ExceptionsList, json!(["*://intranet/*"]))
        .await
        .unwrap()
        .wait()
        .await;

    // Act
    let after = file_proxy(dir.path(), true);
    let cfg = after.load().await;

    // Assert
    assert!(cfg.enabled);
    assert_eq!(cfg.exception_patterns, vec!["*://intranet/*".to_string()]);
    assert!(dir.path().join("local.json").exists());
}

#[tokio::test]
async fn test_enabling_sync_moves_settings_to_sync_area() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let proxy = file_proxy(dir.path(), true);
    proxy.load().await;

    // Act
    let saved = proxy
        .set(SettingField::Sync, json!(true))
        .await
        .unwrap()
        .wait()
        .await;

    // Assert
    assert!(saved);
    let record = read_json(&dir.path().join("sync.json"));
    assert_eq!(record[rua_core::STORAGE_KEY]["sync"], json!(true));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("selector")).unwrap(),
        "sync"
    );

    let reopened = file_proxy(dir.path(), true);
    assert!(reopened.load().await.sync_enabled);
}

#[tokio::test]
async fn test_sync_disabled_browser_falls_back_to_local() {
    // Arrange: a previous run left a "sync" hint behind.
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("selector"), "sync").unwrap();
    let proxy = file_proxy(dir.path(), false);

    // Act
    let cfg = proxy.load().await;
    let saved = proxy
        .set(SettingField::Sync, json!(true))
        .await
        .unwrap()
        .wait()
        .await;

    // Assert
    assert!(!cfg.sync_enabled);
    assert!(saved);
    assert_eq!(proxy.get(SettingField::Sync), json!(false));
    assert!(dir.path().join("local.json").exists());
    assert!(!dir.path().join("sync.json").exists());
}

#[tokio::test]
async fn test_clear_erases_the_durable_copy_only() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let proxy = file_proxy(dir.path(), true);
    proxy.load().await;
    proxy
        .set(SettingField::Enabled, json!(true))
        .await
        .unwrap()
        .wait()
        .await;

    // Act
    let cleared = proxy.clear().await;

    // Assert
    assert!(cleared);
    assert_eq!(proxy.get(SettingField::Enabled), json!(true));
    assert!(!dir.path().join("local.json").exists());
    let reopened = file_proxy(dir.path(), true);
    assert!(!reopened.load().await.enabled);
}

#[tokio::test]
async fn test_flush_before_exit_keeps_unawaited_writes() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let proxy = file_proxy(dir.path(), true);
    proxy.load().await;
    drop(proxy.set(SettingField::Enabled, json!(true)).await.unwrap());
    drop(
        proxy
            .set(SettingField::ExceptionsList, json!(["*://bank/*"]))
            .await
            .unwrap(),
    );

    // Act
    proxy.flush().await;
    drop(proxy);

    // Assert
    let record = read_json(&dir.path().join("local.json"));
    assert_eq!(record[rua_core::STORAGE_KEY]["enabled"], json!(true));
    assert_eq!(record[rua_core::STORAGE_KEY]["exceptions_list"], json!(["*://bank/*"]));
}
