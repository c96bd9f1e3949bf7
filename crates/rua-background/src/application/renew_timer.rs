//! RenewTimer: a named, restartable periodic task.
//!
//! ```text
//!            start()                     stop()
//! Stopped ─────────────► Running ─────────────────► Stopped
//!                          │  ▲
//!                          └──┘ set_interval(d): restart, first tick at now + d
//! ```
//!
//! Every elapsed period runs the bound action exactly once.  Ticks never
//! overlap: the next period is only awaited after the action has finished.
//!
//! # Stopping (for beginners)
//!
//! Aborting a Tokio task cancels it at its next `.await`, which could cut the
//! action off half-way.  Instead, `stop()` sends a shutdown signal over a
//! `watch` channel and then awaits the task's `JoinHandle`.  The ticker loop
//! only checks the signal between actions, so an in-flight action always
//! completes and no tick can fire once `stop()` has returned.
//!
//! Consequently the action must never call `stop()` or `set_interval()` on
//! its own timer: it would wait for itself forever.
//!
//! `stop()` and `set_interval()` are serialized by an async control lock, so
//! a `stop()` racing a re-time always wins: the timer is stopped when it
//! returns, never restarted behind its back.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

type TimerAction = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Error type for timer configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// A zero period would make the timer spin.
    #[error("timer \"{name}\" period must be greater than zero")]
    ZeroPeriod { name: String },
}

struct Ticker {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct TimerState {
    period: Duration,
    ticker: Option<Ticker>,
}

/// A periodic task that can be started, stopped and re-timed.
pub struct RenewTimer {
    name: String,
    action: TimerAction,
    state: Mutex<TimerState>,
    control: AsyncMutex<()>,
}

impl RenewTimer {
    /// Creates a stopped timer.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::ZeroPeriod`] when `period` is zero.
    pub fn new<F, Fut>(name: impl Into<String>, period: Duration, action: F) -> Result<Self, TimerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        check_period(&name, period)?;
        let action: TimerAction =
            Arc::new(move || -> Pin<Box<dyn Future<Output = ()> + Send>> { Box::pin(action()) });
        Ok(Self {
            name,
            action,
            state: Mutex::new(TimerState {
                period,
                ticker: None,
            }),
            control: AsyncMutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.lock().period
    }

    pub fn is_running(&self) -> bool {
        self.lock().ticker.is_some()
    }

    /// Starts ticking.  The first tick is one full period from now.
    ///
    /// Does nothing when the timer is already running.
    pub fn start(&self) {
        let mut state = self.lock();
        if state.ticker.is_some() {
            debug!("timer \"{}\" already running", self.name);
            return;
        }
        state.ticker = Some(self.spawn_ticker(state.period));
        info!("timer \"{}\" started ({:?})", self.name, state.period);
    }

    /// Cancels future ticks and waits for an in-flight action to finish.
    pub async fn stop(&self) {
        let _control = self.control.lock().await;
        self.stop_ticker().await;
    }

    async fn stop_ticker(&self) {
        let ticker = self.lock().ticker.take();
        if let Some(ticker) = ticker {
            // An error only means the task has already exited.
            let _ = ticker.shutdown.send(true);
            if let Err(e) = ticker.task.await {
                debug!("timer \"{}\" task ended abnormally: {e}", self.name);
            }
            info!("timer \"{}\" stopped", self.name);
        }
    }

    /// Changes the period.
    ///
    /// A running timer is restarted, so its next tick is `period` from now.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::ZeroPeriod`] when `period` is zero; the timer is
    /// left unchanged.
    pub async fn set_interval(&self, period: Duration) -> Result<(), TimerError> {
        check_period(&self.name, period)?;
        let _control = self.control.lock().await;
        let was_running = {
            let mut state = self.lock();
            state.period = period;
            state.ticker.is_some()
        };
        if was_running {
            self.stop_ticker().await;
            self.start();
        }
        debug!("timer \"{}\" period set to {period:?}", self.name);
        Ok(())
    }

    fn spawn_ticker(&self, period: Duration) -> Ticker {
        let (shutdown, mut stopped) = watch::channel(false);
        let action = Arc::clone(&self.action);
        let name = self.name.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the immediate first tick.

            loop {
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {}
                }
                debug!("timer \"{name}\" tick");
                action().await;
            }
        });

        Ticker { shutdown, task }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RenewTimer {
    fn drop(&mut self) {
        if let Some(ticker) = self.lock().ticker.take() {
            ticker.task.abort();
        }
    }
}

fn check_period(name: &str, period: Duration) -> Result<(), TimerError> {
    if period.is_zero() {
        return Err(TimerError::ZeroPeriod {
            name: name.to_string(),
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
