//! Integration tests for the stdio transport.
//!
//! These tests wire the whole runtime the way `rua-host` does (in-memory
//! storage, template provider, logging UI adapters) and drive it with
//! newline-delimited JSON.

use std::sync::Arc;

use rua_background::application::api::build_registry;
use rua_background::application::background::{BackgroundController, IconState};
use rua_background::application::dispatcher::{Dispatcher, ImportLatch};
use rua_background::application::persistent_store::{PersistentStore, StorageArea};
use rua_background::application::store_proxy::StoreProxy;
use rua_background::infrastructure::storage::{MemoryBackend, MemorySelector};
use rua_background::infrastructure::transport::StdioHost;
use rua_background::infrastructure::ui::{LoggingIconRenderer, LoggingTabCloser};
use rua_background::infrastructure::useragent::TemplateProvider;
use rua_core::SettingField;
use serde_json::{json, Value};

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Runtime {
    host: StdioHost,
    dispatcher: Arc<Dispatcher>,
    proxy: Arc<StoreProxy>,
    icon: Arc<LoggingIconRenderer>,
}

fn runtime() -> Runtime {
    let store = PersistentStore::new(
        Arc::new(MemoryBackend::new(StorageArea::Sync)),
        Arc::new(MemoryBackend::new(StorageArea::Local)),
        Arc::new(MemorySelector::default()),
    );
    let proxy = Arc::new(StoreProxy::new(Arc::new(store)));
    let provider = Arc::new(TemplateProvider);
    let icon = Arc::new(LoggingIconRenderer::default());
    let controller = BackgroundController::new(Arc::clone(&proxy), provider.clone(), icon.clone())
        .expect("default interval is non-zero");
    let dispatcher = Arc::new(Dispatcher::new(
        build_registry(&proxy, provider),
        Arc::clone(&proxy),
        Arc::new(LoggingTabCloser),
    ));
    Runtime {
        host: StdioHost::new(Arc::clone(&dispatcher), controller),
        dispatcher,
        proxy,
        icon,
    }
}

/// Feeds `lines` to the host and returns every output line parsed as JSON.
async fn exchange(host: &StdioHost, lines: &[&str]) -> Vec<Value> {
    let input: String = lines.iter().map(|l| format!("{l}\n")).collect();
    let mut output = Vec::new();
    host.run(input.as_bytes(), &mut output)
        .await
        .expect("in-memory streams never fail");
    String::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|l| serde_json::from_str(l).expect("one JSON value per line"))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_answers_keep_request_order() {
    // Arrange
    let rt = runtime();
    let line = json!({
        "id": "0b7c6a3e-2f44-4d57-9a55-8f3f0d8c1e21",
        "payload": [
            { "action": "settings.setEnabled", "data": { "enabled": true } },
            { "action": "settings.doesNotExist" },
            { "action": "settings.getEnabled" }
        ]
    })
    .to_string();

    // Act
    let out = exchange(&rt.host, &[&line]).await;

    // Assert
    assert_eq!(
        out,
        vec![json!({
            "id": "0b7c6a3e-2f44-4d57-9a55-8f3f0d8c1e21",
            "payload": [true, null, true]
        })]
    );
}

#[tokio::test]
async fn test_events_and_garbage_produce_no_output() {
    // Arrange
    let rt = runtime();
    let enable = json!({ "payload": { "action": "settings.setEnabled", "data": { "enabled": true } } })
        .to_string();
    let tab = json!({ "event": "tab_updated", "tab_id": 5, "url": "https://example.com/", "status": "loading" })
        .to_string();

    // Act
    let out = exchange(&rt.host, &[&enable, "", "not json at all", &tab]).await;

    // Assert
    assert_eq!(out, vec![json!({ "payload": true })]);
    assert_eq!(rt.icon.last(), Some((Some(5), IconState::Active)));
}

#[tokio::test]
async fn test_tab_on_excepted_page_gets_inactive_icon() {
    let rt = runtime();
    let setup = json!({ "payload": [
        { "action": "settings.setEnabled", "data": { "enabled": true } },
        { "action": "exceptions.add", "data": { "pattern": "*://intranet/*" } }
    ]})
    .to_string();
    let tab = json!({ "event": "tab_updated", "tab_id": 8, "url": "http://intranet/wiki", "status": "loading" })
        .to_string();

    exchange(&rt.host, &[&setup, &tab]).await;

    assert_eq!(rt.icon.last(), Some((Some(8), IconState::Inactive)));
}

#[tokio::test]
async fn test_settings_import_is_accepted_once() {
    // Arrange
    let rt = runtime();
    let first = json!({ "tab_id": 7, "payload": { "action": "settings", "data": { "data": { "enabled": true } } } })
        .to_string();
    let second = json!({ "tab_id": 7, "payload": { "action": "settings", "data": { "enabled": false } } })
        .to_string();

    // Act
    let out = exchange(&rt.host, &[&first, &second]).await;

    // Assert
    assert_eq!(out, vec![json!({ "payload": null }), json!({ "payload": null })]);
    assert_eq!(rt.dispatcher.import_latch(), ImportLatch::Imported);
    assert_eq!(rt.proxy.get(SettingField::Enabled), json!(true));
}

#[tokio::test]
async fn test_renew_generates_useragent_from_templates() {
    let rt = runtime();
    let line = json!({ "payload": [{ "action": "useragent.renew" }, { "action": "useragent.get" }] })
        .to_string();

    let out = exchange(&rt.host, &[&line]).await;

    let payload = &out[0]["payload"];
    assert_eq!(payload[0], json!(true));
    assert!(payload[1]
        .as_str()
        .is_some_and(|ua| ua.starts_with("Mozilla/5.0")));
}

#[tokio::test]
async fn test_any_json_id_is_echoed_back() {
    // Arrange
    let rt = runtime();
    let numeric = json!({ "id": 7, "payload": { "action": "settings.getEnabled" } }).to_string();
    let text = json!({ "id": "req-2", "payload": { "action": "settings.getEnabled" } }).to_string();

    // Act
    let out = exchange(&rt.host, &[&numeric, &text]).await;

    // Assert
    assert_eq!(
        out,
        vec![
            json!({ "id": 7, "payload": false }),
            json!({ "id": "req-2", "payload": false })
        ]
    );
}

#[tokio::test]
async fn test_malformed_request_still_gets_an_answer() {
    // Arrange
    let rt = runtime();
    let bad_tab = json!({ "id": 9, "tab_id": "nine", "payload": { "action": "settings.setEnabled", "data": { "enabled": true } } })
        .to_string();
    let next = json!({ "id": 10, "payload": { "action": "settings.getEnabled" } }).to_string();

    // Act
    let out = exchange(&rt.host, &[&bad_tab, &next]).await;

    // Assert: the bad line is answered but not executed.
    assert_eq!(
        out,
        vec![
            json!({ "id": 9, "payload": null }),
            json!({ "id": 10, "payload": false })
        ]
    );
    assert_eq!(rt.proxy.get(SettingField::Enabled), json!(false));
}
