//! The per-page protection flow run by the content script.
//!
//! The content script cannot read settings directly.  It sends the four
//! [`page_queries`] as one batch, waits for the answers and hands the
//! resulting [`InjectionPlan`] (if any) to the page [`Injector`].
//!
//! It also relays the page's `settings` event: the event detail is sent to
//! the background runtime as the reserved `"settings"` import request.

use rua_core::page::{page_queries, InjectionPlan, Injector, PageState};
use rua_core::protocol::SETTINGS_ACTION;
use rua_core::{Inbound, Request};
use serde_json::Value;
use tracing::debug;

use super::messaging::{RequestSender, TransportError};

/// Asks the background runtime about `uri` and injects the spoofed
/// user-agent into the page when every condition allows it.
///
/// Returns the plan that was applied.
///
/// # Errors
///
/// Returns [`TransportError`] when the batch could not be delivered.
pub async fn protect_page(
    sender: &dyn RequestSender,
    injector: &dyn Injector,
    uri: &str,
) -> Result<Option<InjectionPlan>, TransportError> {
    let answers = sender
        .send(Inbound::batch(&page_queries(uri)))
        .await?
        .into_responses();
    let plan = PageState::from_responses(&answers).plan();

    match &plan {
        Some(plan) => injector.inject(plan),
        None => debug!("page {uri} left untouched"),
    }
    Ok(plan)
}

/// Relays a page's `settings` event detail as a settings import request.
///
/// Only object details are sent; anything else is dropped and `Ok(false)` is
/// returned.  The answer is ignored.
///
/// # Errors
///
/// Returns [`TransportError`] when the request could not be delivered.
pub async fn forward_settings(
    sender: &dyn RequestSender,
    detail: Value,
) -> Result<bool, TransportError> {
    if !detail.is_object() {
        debug!("ignoring settings event without an object detail");
        return Ok(false);
    }
    sender
        .send(Request::with_data(SETTINGS_ACTION, detail).into())
        .await?;
    Ok(true)
}
