//! Application layer of the background runtime.
//!
//! # What lives here? (for beginners)
//!
//! The application layer holds the runtime's behaviour: how settings are
//! loaded, changed and saved, how requests are answered and when the
//! user-agent is renewed.  It talks to storage, tabs and the toolbar only
//! through traits, so the same code runs against the in-memory backends in
//! tests and the file backends in `rua-host`.
//!
//! # Sub-modules
//!
//! - **`persistent_store`** – the live configuration and its sync/local
//!   persistence with the sync-disabled fallback.
//!
//! - **`store_proxy`** – field-level get/set with change observers and
//!   fire-and-forget saves.
//!
//! - **`dispatcher`** – routes `"namespace.method"` requests (and ordered
//!   batches) to registered handlers; owns the one-shot settings import.
//!
//! - **`api`** – the `settings`, `useragent` and `exceptions` handlers.
//!
//! - **`renew_timer`** – the restartable periodic task behind auto-renew.
//!
//! - **`background`** – startup sequence, timer and icon reactions.
//!
//! - **`content_script`** – the per-page query-then-inject flow.
//!
//! - **`messaging`** – sender identity, the client-side request trait and
//!   transport errors.

pub mod api;
pub mod background;
pub mod content_script;
pub mod dispatcher;
pub mod messaging;
pub mod persistent_store;
pub mod renew_timer;
pub mod store_proxy;
