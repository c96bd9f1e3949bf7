//! Infrastructure layer for the background runtime.
//!
//! Contains the adapters behind the application traits: JSON-file and
//! in-memory storage, the in-process message bus and the stdio transport, the
//! template user-agent generator, headless icon/tab adapters and the host's
//! TOML configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and `rua_core`,
//! but MUST NOT be imported by the `application` layer outside its tests.

pub mod host_config;
pub mod storage;
pub mod transport;
pub mod ui;
pub mod useragent;
