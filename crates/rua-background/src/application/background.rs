//! BackgroundController: startup sequence and reactions to setting changes.
//!
//! The controller owns the renew timer and keeps it, and the toolbar icon,
//! consistent with the configuration:
//!
//! | Field written    | Reaction                                  |
//! |------------------|-------------------------------------------|
//! | `enabled`        | icon becomes `Active` / `Disabled`        |
//! | `renew_interval` | timer re-timed (`set_interval`)           |
//! | `renew_enabled`  | timer started / stopped                   |
//!
//! It subscribes itself to the [`StoreProxy`] on construction.  The proxy
//! holds observers weakly, so whoever builds the controller must keep the
//! returned `Arc` alive for the reactions to keep working.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rua_core::{ExceptionMatcher, SettingField};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::api::useragent::{renew_useragent, UserAgentProvider};
use super::renew_timer::{RenewTimer, TimerError};
use super::store_proxy::{SettingsObserver, StoreProxy};

/// Tab status that triggers an icon refresh.
pub const STATUS_LOADING: &str = "loading";

/// What the toolbar icon shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    /// Spoofing is on and applies to the page.
    Active,
    /// Spoofing is on but the page is excepted.
    Inactive,
    /// Spoofing is off.
    Disabled,
}

impl IconState {
    pub fn for_enabled(enabled: bool) -> Self {
        if enabled {
            IconState::Active
        } else {
            IconState::Disabled
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IconState::Active => "active",
            IconState::Inactive => "inactive",
            IconState::Disabled => "disabled",
        }
    }
}

/// Draws the toolbar icon.  `tab_id == None` sets the global icon.
#[cfg_attr(test, mockall::automock)]
pub trait IconRenderer: Send + Sync {
    fn render(&self, tab_id: Option<i64>, state: IconState);
}

/// Drives the background runtime's long-lived behaviour.
pub struct BackgroundController {
    proxy: Arc<StoreProxy>,
    provider: Arc<dyn UserAgentProvider>,
    icon: Arc<dyn IconRenderer>,
    timer: RenewTimer,
}

impl BackgroundController {
    /// Builds the controller and subscribes it to `proxy`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError`] if the configured renew interval is zero.
    pub fn new(
        proxy: Arc<StoreProxy>,
        provider: Arc<dyn UserAgentProvider>,
        icon: Arc<dyn IconRenderer>,
    ) -> Result<Arc<Self>, TimerError> {
        let period = Duration::from_millis(proxy.snapshot().renew_interval_ms);
        let timer = {
            let proxy = Arc::clone(&proxy);
            let provider = Arc::clone(&provider);
            RenewTimer::new("User-Agent renew timer", period, move || {
                let proxy = Arc::clone(&proxy);
                let provider = Arc::clone(&provider);
                async move {
                    renew_useragent(&proxy, provider.as_ref()).await;
                }
            })?
        };

        let controller = Arc::new(Self {
            proxy,
            provider,
            icon,
            timer,
        });
        controller.proxy.subscribe(&controller);
        Ok(controller)
    }

    pub fn timer(&self) -> &RenewTimer {
        &self.timer
    }

    /// Loads settings and brings the timer and icon in line with them.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError`] if the stored interval cannot drive the timer.
    pub async fn start(&self) -> Result<(), TimerError> {
        let cfg = self.proxy.load().await;

        if cfg.renew_on_startup {
            renew_useragent(&self.proxy, self.provider.as_ref()).await;
        }
        self.timer
            .set_interval(Duration::from_millis(cfg.renew_interval_ms))
            .await?;
        if cfg.renew_enabled {
            self.timer.start();
        }
        self.icon.render(None, IconState::for_enabled(cfg.enabled));

        info!("background runtime started");
        Ok(())
    }

    /// Stops the renew timer, then waits for every pending save.
    pub async fn shutdown(&self) {
        self.timer.stop().await;
        self.proxy.flush().await;
        debug!("background runtime stopped");
    }

    /// Storage was changed by another instance: re-read it when syncing.
    pub async fn on_storage_changed(&self) {
        if self.proxy.get_as(SettingField::Sync) == Some(true) {
            self.proxy.load().await;
            info!("settings synchronized");
        }
    }

    /// Refreshes a tab's icon when it starts loading a page.
    ///
    /// Returns the state drawn, or `None` for other statuses.
    pub fn on_tab_updated(&self, tab_id: i64, url: &str, status: &str) -> Option<IconState> {
        if status != STATUS_LOADING {
            return None;
        }
        let enabled = self.proxy.get_as(SettingField::Enabled) == Some(true);
        let patterns: Vec<String> = self
            .proxy
            .get_as(SettingField::ExceptionsList)
            .unwrap_or_default();
        let state = if !enabled {
            IconState::Disabled
        } else if ExceptionMatcher::new(&patterns).is_match(url) {
            IconState::Inactive
        } else {
            IconState::Active
        };
        self.icon.render(Some(tab_id), state);
        Some(state)
    }
}

#[async_trait]
impl SettingsObserver for BackgroundController {
    async fn on_set(&self, name: &str, value: &Value) {
        match name.parse::<SettingField>() {
            Ok(SettingField::Enabled) => {
                self.icon
                    .render(None, IconState::for_enabled(value.as_bool() == Some(true)));
            }
            Ok(SettingField::RenewInterval) => {
                let Some(ms) = value.as_u64() else { return };
                match self.timer.set_interval(Duration::from_millis(ms)).await {
                    Ok(()) => info!("\"{}\" updated to \"{ms}\"", self.timer.name()),
                    Err(e) => warn!("{e}"),
                }
            }
            Ok(SettingField::RenewEnabled) => {
                if value.as_bool() == Some(true) {
                    self.timer.start();
                } else {
                    self.timer.stop().await;
                }
                info!("\"{}\" changed state to \"{value}\"", self.timer.name());
            }
            _ => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
