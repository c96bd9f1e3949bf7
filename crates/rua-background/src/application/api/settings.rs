//! The `settings` namespace.
//!
//! Boolean preferences share one getter/setter shape:
//! `getX` answers the flag, `setX {"enabled": bool}` writes it.

use std::sync::Arc;

use rua_core::{deep_merge, SettingField};
use serde_json::{Map, Value};

use super::write_field;
use crate::application::dispatcher::HandlerRegistry;
use crate::application::store_proxy::StoreProxy;

const NAMESPACE: &str = "settings";

/// `(method suffix, field)` for every boolean preference.
const FLAGS: [(&str, SettingField); 5] = [
    ("Enabled", SettingField::Enabled),
    ("JavascriptProtectionEnabled", SettingField::JavascriptProtectionEnabled),
    ("RenewEnabled", SettingField::RenewEnabled),
    ("RenewOnstartupEnabled", SettingField::RenewOnStartup),
    ("SyncEnabled", SettingField::Sync),
];

/// Keys accepted by `setCustomUseragent`.
const CUSTOM_KEYS: [&str; 3] = ["enabled", "value", "list"];

pub fn register(registry: &mut HandlerRegistry, proxy: &Arc<StoreProxy>) {
    let p = Arc::clone(proxy);
    registry.register(NAMESPACE, "getAll", move |_| Value::Object(p.snapshot().to_record()));

    for (suffix, field) in FLAGS {
        register_flag(registry, proxy, suffix, field);
    }

    // Renew interval, in milliseconds.  The "Microseconds" name is historic.
    for method in ["getRenewInterval", "getRenewIntervalInMicroseconds"] {
        let p = Arc::clone(proxy);
        registry.register(NAMESPACE, method, move |_| p.get(SettingField::RenewInterval));
    }
    register_setter(registry, proxy, "setRenewInterval", "interval", SettingField::RenewInterval);

    let p = Arc::clone(proxy);
    registry.register(NAMESPACE, "getGeneratorTypes", move |_| p.get(SettingField::GeneratorTypes));
    register_setter(registry, proxy, "setGeneratorTypes", "types", SettingField::GeneratorTypes);

    let p = Arc::clone(proxy);
    registry.register(NAMESPACE, "getCustomUseragent", move |_| p.get(SettingField::CustomUseragent));
    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "setCustomUseragent", move |params| {
        let p = Arc::clone(&p);
        async move {
            let patch: Map<String, Value> = params
                .into_iter()
                .filter(|(k, _)| CUSTOM_KEYS.contains(&k.as_str()))
                .collect();
            let mut merged = p.get(SettingField::CustomUseragent);
            deep_merge(&mut merged, &Value::Object(patch));
            Value::Bool(write_field(&p, SettingField::CustomUseragent, merged).await)
        }
    });

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "clear", move |_| {
        let p = Arc::clone(&p);
        async move { Value::Bool(p.clear().await) }
    });
}

fn register_flag(registry: &mut HandlerRegistry, proxy: &Arc<StoreProxy>, suffix: &str, field: SettingField) {
    let p = Arc::clone(proxy);
    registry.register(NAMESPACE, &format!("get{suffix}"), move |_| p.get(field));

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, &format!("set{suffix}"), move |params| {
        let p = Arc::clone(&p);
        async move {
            let accepted = match params.get("enabled") {
                Some(flag @ Value::Bool(_)) => write_field(&p, field, flag.clone()).await,
                _ => false,
            };
            Value::Bool(accepted)
        }
    });
}

/// Registers `method {param: value}` writing `value` into `field`.
fn register_setter(
    registry: &mut HandlerRegistry,
    proxy: &Arc<StoreProxy>,
    method: &str,
    param: &'static str,
    field: SettingField,
) {
    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, method, move |params| {
        let p = Arc::clone(&p);
        async move {
            let accepted = match params.get(param) {
                Some(value) => write_field(&p, field, value.clone()).await,
                None => false,
            };
            Value::Bool(accepted)
        }
    });
}

#[cfg(test)]
mod tests {
    use crate::application::api::test_support::Harness;
    use crate::application::api::useragent::MockUserAgentProvider;
    use rua_core::STORAGE_KEY;
    use serde_json::json;

    fn harness() -> Harness {
        Harness::new(MockUserAgentProvider::new())
    }

    #[tokio::test]
    async fn test_get_all_returns_whole_record() {
        let h = harness();

        let all = h.call("settings.getAll", json!({})).await.unwrap();

        assert_eq!(all["renew_interval"], json!(600_000));
        assert_eq!(all["exceptions_list"], json!(["chrome://*"]));
    }

    #[tokio::test]
    async fn test_set_enabled_then_get_enabled() {
        // Arrange
        let h = harness();

        // Act
        let accepted = h.call("settings.setEnabled", json!({ "enabled": true })).await;
        let enabled = h.call("settings.getEnabled", json!({})).await;

        // Assert
        assert_eq!(accepted, Some(json!(true)));
        assert_eq!(enabled, Some(json!(true)));
    }

    #[tokio::test]
    async fn test_flag_setter_rejects_non_boolean() {
        let h = harness();

        let accepted = h.call("settings.setSyncEnabled", json!({ "enabled": "yes" })).await;

        assert_eq!(accepted, Some(json!(false)));
        assert!(!h.proxy.snapshot().sync_enabled);
    }

    #[tokio::test]
    async fn test_every_flag_pair_is_registered() {
        let h = harness();
        for suffix in ["JavascriptProtectionEnabled", "RenewEnabled", "RenewOnstartupEnabled"] {
            let set = h
                .call(&format!("settings.set{suffix}"), json!({ "enabled": false }))
                .await;
            let get = h.call(&format!("settings.get{suffix}"), json!({})).await;
            assert_eq!(set, Some(json!(true)), "set{suffix}");
            assert_eq!(get, Some(json!(false)), "get{suffix}");
        }
    }

    #[tokio::test]
    async fn test_renew_interval_getters_agree() {
        // Arrange
        let h = harness();

        // Act
        h.call("settings.setRenewInterval", json!({ "interval": 30000 })).await;
        let ms = h.call("settings.getRenewInterval", json!({})).await;
        let legacy = h.call("settings.getRenewIntervalInMicroseconds", json!({})).await;

        // Assert
        assert_eq!(ms, Some(json!(30000)));
        assert_eq!(legacy, ms);
    }

    #[tokio::test]
    async fn test_set_renew_interval_rejects_zero_and_missing() {
        let h = harness();

        assert_eq!(h.call("settings.setRenewInterval", json!({ "interval": 0 })).await, Some(json!(false)));
        assert_eq!(h.call("settings.setRenewInterval", json!({})).await, Some(json!(false)));
        assert_eq!(h.proxy.snapshot().renew_interval_ms, 600_000);
    }

    #[tokio::test]
    async fn test_set_generator_types_validates_tags() {
        // Arrange
        let h = harness();

        // Act
        let ok = h
            .call("settings.setGeneratorTypes", json!({ "types": ["safari_iphone", "edge_win"] }))
            .await;
        let bad = h
            .call("settings.setGeneratorTypes", json!({ "types": ["lynx_dos"] }))
            .await;
        let types = h.call("settings.getGeneratorTypes", json!({})).await;

        // Assert
        assert_eq!(ok, Some(json!(true)));
        assert_eq!(bad, Some(json!(false)));
        assert_eq!(types, Some(json!(["edge_win", "safari_iphone"])));
    }

    #[tokio::test]
    async fn test_set_custom_useragent_patches_given_keys_only() {
        // Arrange
        let h = harness();
        h.call("settings.setCustomUseragent", json!({ "list": ["A", "B"] })).await;

        // Act
        let accepted = h
            .call("settings.setCustomUseragent", json!({ "enabled": true, "bogus": 1 }))
            .await;
        let custom = h.call("settings.getCustomUseragent", json!({})).await;

        // Assert
        assert_eq!(accepted, Some(json!(true)));
        assert_eq!(custom, Some(json!({ "enabled": true, "value": null, "list": ["A", "B"] })));
    }

    #[tokio::test]
    async fn test_clear_erases_stored_record() {
        // Arrange
        let h = harness();
        h.proxy.set(rua_core::SettingField::Enabled, json!(true)).await.unwrap().wait().await;

        // Act
        let cleared = h.call("settings.clear", json!({})).await;

        // Assert
        assert_eq!(cleared, Some(json!(true)));
        assert!(!h.local.contents().contains_key(STORAGE_KEY));
    }
}
