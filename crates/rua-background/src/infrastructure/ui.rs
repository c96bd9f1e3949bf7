//! Headless browser-UI adapters for `rua-host`.
//!
//! The host has no toolbar and no tabs of its own.  These adapters report what
//! the browser would have been asked to do as structured log events, which the
//! native-messaging shim (or a person reading the logs) can act on.

use std::sync::Mutex;

use tracing::info;

use crate::application::background::{IconRenderer, IconState};
use crate::application::dispatcher::TabCloser;

/// [`IconRenderer`] that logs every icon change and remembers the last one.
#[derive(Debug, Default)]
pub struct LoggingIconRenderer {
    last: Mutex<Option<(Option<i64>, IconState)>>,
}

impl LoggingIconRenderer {
    /// The most recent `(tab, state)` rendered, if any.
    pub fn last(&self) -> Option<(Option<i64>, IconState)> {
        self.last.lock().ok().and_then(|last| *last)
    }
}

impl IconRenderer for LoggingIconRenderer {
    fn render(&self, tab_id: Option<i64>, state: IconState) {
        match tab_id {
            Some(tab) => info!(tab, icon = state.as_str(), "set tab icon"),
            None => info!(icon = state.as_str(), "set global icon"),
        }
        if let Ok(mut last) = self.last.lock() {
            *last = Some((tab_id, state));
        }
    }
}

/// [`TabCloser`] that logs the close request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTabCloser;

impl TabCloser for LoggingTabCloser {
    fn close_tab(&self, tab_id: i64) {
        info!(tab = tab_id, "close tab");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_starts_without_history() {
        assert_eq!(LoggingIconRenderer::default().last(), None);
    }

    #[test]
    fn test_renderer_remembers_latest_icon() {
        // Arrange
        let renderer = LoggingIconRenderer::default();

        // Act
        renderer.render(None, IconState::Active);
        renderer.render(Some(4), IconState::Inactive);

        // Assert
        assert_eq!(renderer.last(), Some((Some(4), IconState::Inactive)));
    }
}
