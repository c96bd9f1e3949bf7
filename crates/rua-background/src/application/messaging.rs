//! Types shared by the dispatcher and the transports.

use async_trait::async_trait;
use rua_core::{Inbound, Outbound};
use thiserror::Error;

/// Who sent a message.  `tab_id` is `None` for non-tab contexts (the popup).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageSender {
    pub tab_id: Option<i64>,
}

impl MessageSender {
    pub fn tab(tab_id: i64) -> Self {
        Self {
            tab_id: Some(tab_id),
        }
    }
}

/// Error type for message transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The receiving side has shut down.
    #[error("message channel closed")]
    Closed,

    /// Reading or writing the underlying stream failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Client side of a request/response channel to the background runtime.
#[async_trait]
pub trait RequestSender: Send + Sync {
    /// Sends a single request or batch and waits for the correlated answer.
    async fn send(&self, inbound: Inbound) -> Result<Outbound, TransportError>;
}
