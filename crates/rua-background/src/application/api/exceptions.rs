//! The `exceptions` namespace: sites where spoofing is suspended.

use std::sync::Arc;

use rua_core::domain::exceptions::{is_valid_pattern, pattern_for_uri, pattern_matches};
use rua_core::{ExceptionMatcher, SettingField};
use serde_json::{Map, Value};
use tracing::debug;

use super::write_field;
use crate::application::dispatcher::HandlerRegistry;
use crate::application::store_proxy::StoreProxy;

const NAMESPACE: &str = "exceptions";

pub fn register(registry: &mut HandlerRegistry, proxy: &Arc<StoreProxy>) {
    let p = Arc::clone(proxy);
    registry.register(NAMESPACE, "uriMatch", move |params| match str_param(&params, "uri") {
        Some(uri) => Value::Bool(uri_match(&p, uri)),
        None => Value::Null,
    });

    let p = Arc::clone(proxy);
    registry.register(NAMESPACE, "getPatterns", move |_| p.get(SettingField::ExceptionsList));

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "setPatterns", move |params| {
        let p = Arc::clone(&p);
        async move {
            let accepted = match params.get("patterns") {
                Some(patterns) => write_field(&p, SettingField::ExceptionsList, patterns.clone()).await,
                None => false,
            };
            Value::Bool(accepted)
        }
    });

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "add", move |params| {
        let p = Arc::clone(&p);
        async move {
            let pattern = str_param(&params, "pattern").map(str::to_string);
            Value::Bool(match pattern {
                Some(pattern) => add_pattern(&p, pattern).await,
                None => false,
            })
        }
    });

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "addUriPattern", move |params| {
        let p = Arc::clone(&p);
        async move {
            let pattern = str_param(&params, "uri").map(pattern_for_uri);
            Value::Bool(match pattern {
                Some(pattern) => add_pattern(&p, pattern).await,
                None => false,
            })
        }
    });

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "remove", move |params| {
        let p = Arc::clone(&p);
        async move {
            let pattern = str_param(&params, "pattern").map(str::to_string);
            Value::Bool(match pattern {
                Some(pattern) => remove_where(&p, |existing| existing == pattern).await,
                None => false,
            })
        }
    });

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "removeUriPattern", move |params| {
        let p = Arc::clone(&p);
        async move {
            let uri = str_param(&params, "uri").map(str::to_string);
            Value::Bool(match uri {
                Some(uri) => remove_where(&p, |existing| pattern_matches(existing, &uri)).await,
                None => false,
            })
        }
    });

    let p = Arc::clone(proxy);
    registry.register_async(NAMESPACE, "clear", move |_| {
        let p = Arc::clone(&p);
        async move { Value::Bool(write_field(&p, SettingField::ExceptionsList, Value::Array(Vec::new())).await) }
    });
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn patterns(proxy: &StoreProxy) -> Vec<String> {
    proxy.get_as(SettingField::ExceptionsList).unwrap_or_default()
}

fn uri_match(proxy: &StoreProxy, uri: &str) -> bool {
    let patterns = patterns(proxy);
    ExceptionMatcher::new(&patterns).is_match(uri)
}

async fn add_pattern(proxy: &StoreProxy, pattern: String) -> bool {
    if !is_valid_pattern(&pattern) {
        debug!("refusing invalid exception pattern \"{pattern}\"");
        return false;
    }
    let mut patterns = patterns(proxy);
    if patterns.contains(&pattern) {
        return true;
    }
    patterns.push(pattern);
    write_patterns(proxy, patterns).await
}

/// Removes every pattern for which `doomed` holds.  Returns `false` when
/// nothing matched.
async fn remove_where(proxy: &StoreProxy, doomed: impl Fn(&str) -> bool) -> bool {
    let mut patterns = patterns(proxy);
    let before = patterns.len();
    patterns.retain(|p| !doomed(p.as_str()));
    if patterns.len() == before {
        return false;
    }
    write_patterns(proxy, patterns).await
}

async fn write_patterns(proxy: &StoreProxy, patterns: Vec<String>) -> bool {
    let value = Value::Array(patterns.into_iter().map(Value::String).collect());
    write_field(proxy, SettingField::ExceptionsList, value).await
}
