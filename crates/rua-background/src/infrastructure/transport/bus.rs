//! In-process message bus between extension contexts and the dispatcher.
//!
//! ```text
//! BusClient ──(Envelope: id, sender, inbound, reply)──► MessageBus ──► Dispatcher
//!     ▲                                                                   │
//!     └──────────────────────── oneshot reply ◄───────────────────────────┘
//! ```
//!
//! Every request carries its own `oneshot` reply channel, so answers can never
//! be delivered to the wrong caller.  The bus serves envelopes one at a time
//! in arrival order; the reply is always delivered asynchronously, even when
//! the handler finished synchronously.

use std::sync::Arc;

use async_trait::async_trait;
use rua_core::{Inbound, Outbound};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::dispatcher::Dispatcher;
use crate::application::messaging::{MessageSender, RequestSender, TransportError};

/// Default number of requests that may wait for the dispatcher.
pub const DEFAULT_CAPACITY: usize = 64;

/// One request in flight.
#[derive(Debug)]
pub struct Envelope {
    /// Correlation id, used in log lines.
    pub id: Uuid,
    pub sender: MessageSender,
    pub inbound: Inbound,
    pub reply: oneshot::Sender<Outbound>,
}

/// Creates a connected client/bus pair.
pub fn channel(capacity: usize) -> (BusClient, MessageBus) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        BusClient {
            tx,
            sender: MessageSender::default(),
        },
        MessageBus { rx },
    )
}

/// Sending half.  Cheap to clone; each clone may carry its own sender identity.
#[derive(Debug, Clone)]
pub struct BusClient {
    tx: mpsc::Sender<Envelope>,
    sender: MessageSender,
}

impl BusClient {
    /// A client whose requests appear to come from tab `tab_id`.
    pub fn for_tab(&self, tab_id: i64) -> Self {
        Self {
            tx: self.tx.clone(),
            sender: MessageSender::tab(tab_id),
        }
    }

    /// Sends `inbound` and waits for its answer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the bus has shut down, or the
    /// request was dropped unanswered.
    pub async fn request(&self, inbound: Inbound) -> Result<Outbound, TransportError> {
        let (reply, answer) = oneshot::channel();
        let envelope = Envelope {
            id: Uuid::new_v4(),
            sender: self.sender,
            inbound,
            reply,
        };
        self.tx
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed)?;
        answer.await.map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl RequestSender for BusClient {
    async fn send(&self, inbound: Inbound) -> Result<Outbound, TransportError> {
        self.request(inbound).await
    }
}

/// Receiving half, drained by [`MessageBus::serve`].
#[derive(Debug)]
pub struct MessageBus {
    rx: mpsc::Receiver<Envelope>,
}

impl MessageBus {
    /// Answers envelopes until every client has been dropped.
    pub async fn serve(mut self, dispatcher: Arc<Dispatcher>) {
        while let Some(envelope) = self.rx.recv().await {
            debug!(
                "request {} ({} item(s)) from {:?}",
                envelope.id,
                envelope.inbound.len(),
                envelope.sender
            );
            let outbound = dispatcher.handle(envelope.inbound, &envelope.sender).await;
            if envelope.reply.send(outbound).is_err() {
                debug!("requester of {} went away before the reply", envelope.id);
            }
        }
        info!("message bus closed");
    }
}
