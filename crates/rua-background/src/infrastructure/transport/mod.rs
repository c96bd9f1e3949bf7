//! Message transports connecting extension contexts to the dispatcher.
//!
//! - **`bus`**   – in-process `mpsc` + `oneshot` request/reply channel.
//! - **`stdio`** – newline-delimited JSON over the host's stdin/stdout.

pub mod bus;
pub mod stdio;

pub use bus::{channel, BusClient, MessageBus};
pub use stdio::{HostEvent, StdioHost};
