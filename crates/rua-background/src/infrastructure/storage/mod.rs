//! Storage backends and selector caches.
//!
//! | Type              | Persistence              | Used by                |
//! |-------------------|--------------------------|------------------------|
//! | `MemoryBackend`   | process lifetime         | tests, `--data-dir` unset |
//! | `JsonFileBackend` | one JSON file per area   | `rua-host`             |
//! | `MemorySelector`  | process lifetime         | tests                  |
//! | `FileSelector`    | one-line text file       | `rua-host`             |

pub mod file;
pub mod memory;
pub mod selector;

pub use file::JsonFileBackend;
pub use memory::{FailureMode, MemoryBackend, MemorySelector};
pub use selector::FileSelector;
