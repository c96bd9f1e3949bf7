//! Dispatcher: routes inbound requests to registered handlers.
//!
//! # Routing
//!
//! An action such as `"exceptions.uriMatch"` is split at the first `.` into a
//! namespace and a method, which together key the [`HandlerRegistry`].  The
//! handler receives the request's `data` mapping (empty when absent) and its
//! result becomes the response.  Unknown actions answer `None` and are logged.
//!
//! # Batches
//!
//! A batch is processed one element at a time, in order, and the N-th answer
//! always lands in the N-th slot.  A failing element never affects its
//! neighbours.
//!
//! # The settings import channel
//!
//! The reserved action `"settings"` lets an external page hand over a
//! configuration exported elsewhere.  It is honoured exactly once per process
//! (see [`ImportLatch`]): the fragment is merged into the live configuration
//! and the tab that sent it is closed.  Later `"settings"` requests are ignored.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use rua_core::protocol::parse_request;
use rua_core::{Inbound, Outbound, Request, Response, Route};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::messaging::MessageSender;
use super::store_proxy::StoreProxy;

/// Future returned by a registered handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Value> + Send>>;

type Handler = Arc<dyn Fn(Map<String, Value>) -> HandlerFuture + Send + Sync>;

/// Closes browser tabs.
#[cfg_attr(test, mockall::automock)]
pub trait TabCloser: Send + Sync {
    fn close_tab(&self, tab_id: i64);
}

// ── Handler registry ──────────────────────────────────────────────────────────

/// Handlers keyed by `(namespace, method)`.
///
/// A handler returning `Value::Null` produces an empty (`None`) response.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler that completes synchronously.
    pub fn register<F>(&mut self, namespace: &str, method: &str, handler: F)
    where
        F: Fn(Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        self.insert(
            namespace,
            method,
            Arc::new(move |params| -> HandlerFuture {
                let value = handler(params);
                Box::pin(std::future::ready(value))
            }),
        );
    }

    /// Registers a handler that completes asynchronously.
    pub fn register_async<F, Fut>(&mut self, namespace: &str, method: &str, handler: F)
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.insert(
            namespace,
            method,
            Arc::new(move |params| -> HandlerFuture { Box::pin(handler(params)) }),
        );
    }

    pub fn contains(&self, namespace: &str, method: &str) -> bool {
        self.handlers
            .contains_key(&(namespace.to_string(), method.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn insert(&mut self, namespace: &str, method: &str, handler: Handler) {
        let key = (namespace.to_string(), method.to_string());
        if self.handlers.insert(key, handler).is_some() {
            warn!("handler {namespace}.{method} registered twice; keeping the latest");
        }
    }

    fn resolve(&self, namespace: &str, method: &str) -> Option<Handler> {
        self.handlers
            .get(&(namespace.to_string(), method.to_string()))
            .cloned()
    }
}

// ── Import latch ──────────────────────────────────────────────────────────────

/// One-shot guard for the settings import channel.  Never resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportLatch {
    #[default]
    AwaitingImport,
    Imported,
}

impl ImportLatch {
    /// Moves to `Imported`.  Returns `true` only for the first call.
    pub fn claim(&mut self) -> bool {
        match self {
            ImportLatch::AwaitingImport => {
                *self = ImportLatch::Imported;
                true
            }
            ImportLatch::Imported => false,
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Answers inbound requests from every extension context.
pub struct Dispatcher {
    registry: HandlerRegistry,
    proxy: Arc<StoreProxy>,
    tab_closer: Arc<dyn TabCloser>,
    latch: Mutex<ImportLatch>,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, proxy: Arc<StoreProxy>, tab_closer: Arc<dyn TabCloser>) -> Self {
        Self {
            registry,
            proxy,
            tab_closer,
            latch: Mutex::new(ImportLatch::default()),
        }
    }

    /// Current state of the settings import latch.
    pub fn import_latch(&self) -> ImportLatch {
        *self.latch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answers a single request or an ordered batch.
    pub async fn handle(&self, inbound: Inbound, sender: &MessageSender) -> Outbound {
        match inbound {
            Inbound::Single(raw) => Outbound::Single(self.handle_one(&raw, sender).await),
            Inbound::Batch(items) => {
                let mut responses = Vec::with_capacity(items.len());
                for raw in &items {
                    responses.push(self.handle_one(raw, sender).await);
                }
                Outbound::Batch(responses)
            }
        }
    }

    async fn handle_one(&self, raw: &Value, sender: &MessageSender) -> Response {
        let Some(request) = parse_request(raw) else {
            debug!("ignoring malformed request: {raw}");
            return None;
        };

        match request.route() {
            Route::SettingsImport => {
                self.import_settings(&request, sender).await;
                None
            }
            Route::Method { namespace, method } => match self.registry.resolve(namespace, method) {
                Some(handler) => match handler(request.params()).await {
                    Value::Null => None,
                    value => Some(value),
                },
                None => {
                    warn!("no handler for action \"{}\"", request.action);
                    None
                }
            },
            Route::Invalid => {
                warn!("cannot route action \"{}\"", request.action);
                None
            }
        }
    }

    async fn import_settings(&self, request: &Request, sender: &MessageSender) {
        let claimed = self
            .latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .claim();
        if !claimed {
            debug!("settings already imported; ignoring repeated import");
            return;
        }

        let data = Value::Object(request.params());
        let fragment = data
            .get("data")
            .filter(|inner| inner.is_object())
            .cloned()
            .unwrap_or(data);
        let changed = self.proxy.import(&fragment).await;
        info!("imported {} setting(s) from an external page", changed.len());

        if let Some(tab_id) = sender.tab_id {
            self.tab_closer.close_tab(tab_id);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
