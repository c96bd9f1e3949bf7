//! Request handlers exposed to the extension contexts.
//!
//! Each submodule registers one namespace:
//!
//! | Namespace    | Purpose                                          |
//! |--------------|--------------------------------------------------|
//! | `settings`   | read and change individual preferences           |
//! | `useragent`  | read the active user-agent, generate a new one   |
//! | `exceptions` | manage and test the per-site exception patterns  |
//!
//! Setters answer `true` when the value was accepted and `false` otherwise;
//! no error ever crosses the message boundary.

pub mod exceptions;
pub mod settings;
pub mod useragent;

use std::sync::Arc;

use rua_core::SettingField;
use serde_json::Value;
use tracing::warn;

use super::dispatcher::HandlerRegistry;
use super::store_proxy::StoreProxy;
use useragent::UserAgentProvider;

/// Builds the registry holding every namespace.
pub fn build_registry(proxy: &Arc<StoreProxy>, provider: Arc<dyn UserAgentProvider>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    settings::register(&mut registry, proxy);
    useragent::register(&mut registry, proxy, provider);
    exceptions::register(&mut registry, proxy);
    registry
}

/// Writes one field and reports acceptance as a boolean.
pub(crate) async fn write_field(proxy: &StoreProxy, field: SettingField, value: Value) -> bool {
    match proxy.set(field, value).await {
        Ok(_) => true,
        Err(e) => {
            warn!("rejected update of {field}: {e}");
            false
        }
    }
}
