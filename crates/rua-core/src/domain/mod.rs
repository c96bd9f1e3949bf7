//! Domain layer: the preference record and the rules that operate on it.
//!
//! Nothing in this module performs I/O.  Storage, transports and timers live
//! in `rua-background`; this layer only answers questions such as "which
//! fields exist?", "is this value valid for that field?" and "does this URL
//! match an exception pattern?".

pub mod exceptions;
pub mod merge;
pub mod settings;
