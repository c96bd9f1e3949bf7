//! # rua-core
//!
//! Shared library for Random User-Agent containing the settings model, the
//! URL exception matcher and the JSON request protocol spoken between the
//! extension surfaces (background runtime, popup, content script).
//!
//! This crate has zero dependencies on async runtimes, storage backends or
//! transports.  Everything here is plain data plus pure functions, so the
//! background runtime and its tests can share one definition of "what a
//! setting is" and "what a request looks like".
//!
//! # Architecture overview (for beginners)
//!
//! The add-on keeps a single preference record (the [`Configuration`]) in the
//! background process.  Other contexts never touch that record directly;
//! they send [`Request`]s such as `{"action": "settings.getEnabled"}` over a
//! message bus, and the background dispatcher answers them.
//!
//! - **`domain`** – the preference record, its field names, defaults and the
//!   merge rules used when partial records come back from storage.
//!
//! - **`protocol`** – the request/response envelope shapes, including batched
//!   requests whose answers must come back in the same order.
//!
//! - **`page`** – the content-script decision "should this page get the
//!   spoofed user-agent, and what literal should be injected?".

pub mod domain;
pub mod page;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rua_core::Configuration` instead of `rua_core::domain::settings::Configuration`.
pub use domain::exceptions::ExceptionMatcher;
pub use domain::merge::deep_merge;
pub use domain::settings::{
    Configuration, CustomUserAgent, GeneratorType, SettingField, SettingsError, STORAGE_KEY,
};
pub use protocol::request::{Inbound, Outbound, Request, Response, Route};
