//! The `useragent` namespace and the renew operation.
//!
//! Renewing chooses the next user-agent in this order:
//!
//! 1. custom mode on and a fixed `value` set → that value;
//! 2. custom mode on and a non-empty `list` → a random entry;
//! 3. otherwise → the [`UserAgentProvider`], restricted to the enabled
//!    generator types.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rua_core::{Configuration, GeneratorType, SettingField};
use serde_json::Value;
use tracing::{info, warn};

use super::write_field;
use crate::application::dispatcher::HandlerRegistry;
use crate::application::store_proxy::StoreProxy;

const NAMESPACE: &str = "useragent";

/// Produces realistic user-agent strings.
#[cfg_attr(test, mockall::automock)]
pub trait UserAgentProvider: Send + Sync {
    /// Returns a user-agent of one of `types`, or `None` when `types` is
    /// empty or unsupported.
    fn generate(&self, types: &BTreeSet<GeneratorType>) -> Option<String>;
}

pub fn register(registry: &mut HandlerRegistry, proxy: &Arc<StoreProxy>, provider: Arc<dyn UserAgentProvider>) {
    let p = Arc::clone(proxy);
    registry.register(NAMESPACE, "get", move |_| p.get(SettingField::Useragent));

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "renew", move |_| {
        let p = Arc::clone(&p);
        let provider = Arc::clone(&provider);
        async move { Value::Bool(renew_useragent(&p, provider.as_ref()).await) }
    });
}

/// Picks a new user-agent and stores it.  Returns `false` when nothing could
/// be produced.
pub async fn renew_useragent(proxy: &StoreProxy, provider: &dyn UserAgentProvider) -> bool {
    let Some(useragent) = next_useragent(&proxy.snapshot(), provider) else {
        warn!("could not produce a new user-agent");
        return false;
    };
    let renewed = write_field(proxy, SettingField::Useragent, Value::String(useragent)).await;
    if renewed {
        info!("user-agent renewed");
    }
    renewed
}

fn next_useragent(cfg: &Configuration, provider: &dyn UserAgentProvider) -> Option<String> {
    let custom = &cfg.custom_useragent;
    if custom.enabled {
        if let Some(value) = custom.value.as_deref().filter(|v| !v.trim().is_empty()) {
            return Some(value.to_string());
        }
        if let Some(pick) = custom.list.choose(&mut rand::thread_rng()) {
            return Some(pick.clone());
        }
    }
    provider.generate(&cfg.generator_types)
}
