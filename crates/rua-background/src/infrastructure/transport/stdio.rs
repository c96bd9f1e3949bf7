//! Newline-delimited JSON transport used by `rua-host`.
//!
//! The browser side (a native-messaging shim, or a test harness) writes one
//! JSON object per line to the host's stdin.  Two kinds of line exist.
//!
//! **Requests**, answered with exactly one output line:
//!
//! ```json
//! {"id": "6f1c…", "tab_id": 12, "payload": [{"action": "settings.getEnabled"}]}
//! ```
//! ```json
//! {"id": "6f1c…", "payload": [true]}
//! ```
//!
//! **Browser events**, which produce no output:
//!
//! ```json
//! {"event": "storage_changed"}
//! {"event": "tab_updated", "tab_id": 12, "url": "https://example.com/", "status": "loading"}
//! ```
//!
//! The `id` may be any JSON value and is echoed back unchanged.  A request
//! whose other fields are malformed (say a string `tab_id`) still gets an
//! answer with a `null` payload so the caller is not left waiting.  Lines that
//! match neither shape are logged and skipped; they never stop the loop.  The
//! loop ends at end of input.

use std::sync::Arc;

use rua_core::Inbound;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::application::background::BackgroundController;
use crate::application::dispatcher::Dispatcher;
use crate::application::messaging::{MessageSender, TransportError};

/// A browser event forwarded to the background controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    StorageChanged,
    TabUpdated {
        tab_id: i64,
        url: String,
        status: String,
    },
}

/// A request line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestLine {
    /// Correlation token chosen by the caller.
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub tab_id: Option<i64>,
    pub payload: Value,
}

/// Any valid input line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HostLine {
    Event(HostEvent),
    Request(RequestLine),
}

/// The answer to a [`RequestLine`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub payload: Value,
}

impl ResponseLine {
    /// The `null` answer for a request line that could not be decoded.
    ///
    /// Returns `None` when `line` does not look like a request at all.
    pub fn for_malformed(line: &str) -> Option<Self> {
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(line) else {
            return None;
        };
        if !fields.contains_key("payload") {
            return None;
        }
        Some(Self {
            id: fields.get("id").filter(|id| !id.is_null()).cloned(),
            payload: Value::Null,
        })
    }
}

/// Serves the NDJSON protocol over any async byte streams.
pub struct StdioHost {
    dispatcher: Arc<Dispatcher>,
    controller: Arc<BackgroundController>,
}

impl StdioHost {
    pub fn new(dispatcher: Arc<Dispatcher>, controller: Arc<BackgroundController>) -> Self {
        Self {
            dispatcher,
            controller,
        }
    }

    /// Processes lines from `reader` until end of input.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if reading or writing the streams fails.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut served = 0usize;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<HostLine>(line) {
                Ok(HostLine::Request(request)) => {
                    let response = self.answer(request).await;
                    write_line(&mut writer, &response).await?;
                    served += 1;
                }
                Ok(HostLine::Event(event)) => self.on_event(event).await,
                Err(e) => match ResponseLine::for_malformed(line) {
                    Some(response) => {
                        warn!("answering malformed request with null: {e}");
                        write_line(&mut writer, &response).await?;
                        served += 1;
                    }
                    None => warn!("skipping malformed input line: {e}"),
                },
            }
        }

        info!("input closed after {served} request(s)");
        Ok(())
    }

    async fn answer(&self, request: RequestLine) -> ResponseLine {
        let sender = MessageSender {
            tab_id: request.tab_id,
        };
        let outbound = self
            .dispatcher
            .handle(Inbound::from_value(request.payload), &sender)
            .await;
        ResponseLine {
            id: request.id,
            payload: outbound.into_value(),
        }
    }

    async fn on_event(&self, event: HostEvent) {
        debug!("browser event {event:?}");
        match event {
            HostEvent::StorageChanged => self.controller.on_storage_changed().await,
            HostEvent::TabUpdated {
                tab_id,
                url,
                status,
            } => {
                self.controller.on_tab_updated(tab_id, &url, &status);
            }
        }
    }
}

async fn write_line<W>(writer: &mut W, response: &ResponseLine) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = serde_json::to_string(response)?;
    frame.push('\n');
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
