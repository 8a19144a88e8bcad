//! Polling primitives every other component composes on.
//!
//! Nothing in the engine sleeps or spins outside of [`Waiter`]. A wait is
//! expressed as a [`Probe`]: something that inspects the browser and either
//! produces a value (condition met) or `None` (not yet).

use crate::driver::{DocumentNode, Driver, ReadyState};
use crate::error::AutomationError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Default polling interval for probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the resource count must stay unchanged for the network to count as idle.
pub const DEFAULT_NETWORK_QUIET: Duration = Duration::from_millis(500);

/// Longest wait a deadline can express; larger timeouts are clamped to it.
pub const MAX_WAIT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// `Instant::now() + timeout`, clamped to [`MAX_WAIT`] instead of overflowing.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_WAIT)).unwrap_or(now)
}

/// Page load states, in the order a page reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        };
        f.write_str(name)
    }
}

/// A condition that can be polled against a driver.
#[async_trait]
pub trait Probe<D: Driver + ?Sized>: Send {
    type Output: Send;

    /// What is being waited for, used in timeout errors.
    fn describe(&self) -> String;

    /// `Ok(Some(_))` once the condition holds, `Ok(None)` to keep polling.
    /// Errors abort the wait immediately.
    async fn probe(&mut self, driver: &mut D) -> Result<Option<Self::Output>, AutomationError>;
}

#[derive(Debug, Clone)]
pub struct Waiter {
    poll_interval: Duration,
    network_quiet: Duration,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_NETWORK_QUIET)
    }
}

impl Waiter {
    pub fn new(poll_interval: Duration, network_quiet: Duration) -> Self {
        Self {
            poll_interval,
            network_quiet,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll `probe` until it yields a value or `timeout` elapses.
    ///
    /// The probe is evaluated at least once, so a zero timeout still checks
    /// the current state.
    pub async fn await_condition<D, P>(
        &self,
        driver: &mut D,
        probe: &mut P,
        timeout: Duration,
    ) -> Result<P::Output, AutomationError>
    where
        D: Driver + ?Sized,
        P: Probe<D>,
    {
        let started = Instant::now();
        let deadline = deadline_after(timeout);

        loop {
            if let Some(value) = probe.probe(driver).await? {
                return Ok(value);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AutomationError::Timeout {
                    what: probe.describe(),
                    elapsed: now - started,
                });
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Unconditional pause. Only for renders with no observable completion signal.
    pub async fn await_fixed_delay(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tracing::debug!(delay_ms = duration.as_millis() as u64, "Settling");
        tokio::time::sleep(duration).await;
    }

    pub async fn await_load_state<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        document: &DocumentNode,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        match state {
            LoadState::DomContentLoaded => {
                let mut probe = ReadyStateProbe::new(document, ReadyState::Interactive);
                self.await_condition(driver, &mut probe, timeout).await
            }
            LoadState::Load => {
                let mut probe = ReadyStateProbe::new(document, ReadyState::Complete);
                self.await_condition(driver, &mut probe, timeout).await
            }
            LoadState::NetworkIdle => {
                let mut probe = NetworkIdleProbe::new(document, self.network_quiet);
                self.await_condition(driver, &mut probe, timeout).await
            }
        }
    }
}

/// Holds once `document.readyState` reaches at least `min`.
struct ReadyStateProbe<'a> {
    document: &'a DocumentNode,
    min: ReadyState,
}

impl<'a> ReadyStateProbe<'a> {
    fn new(document: &'a DocumentNode, min: ReadyState) -> Self {
        Self { document, min }
    }
}

#[async_trait]
impl<'a, D: Driver + ?Sized> Probe<D> for ReadyStateProbe<'a> {
    type Output = ();

    fn describe(&self) -> String {
        format!("ready state {:?} in {}", self.min, self.document.label())
    }

    async fn probe(&mut self, driver: &mut D) -> Result<Option<()>, AutomationError> {
        match driver.ready_state(self.document).await {
            Ok(state) if state >= self.min => Ok(Some(())),
            Ok(_) => Ok(None),
            // Navigation in flight tears down the execution context; keep polling.
            Err(e) => {
                tracing::debug!(document = self.document.label(), "ready state unavailable: {}", e);
                Ok(None)
            }
        }
    }
}

/// Holds once the document is complete, no request is in flight and the
/// resource count has not changed for `quiet`.
struct NetworkIdleProbe<'a> {
    document: &'a DocumentNode,
    quiet: Duration,
    last_count: Option<usize>,
    stable_since: Instant,
}

impl<'a> NetworkIdleProbe<'a> {
    fn new(document: &'a DocumentNode, quiet: Duration) -> Self {
        Self {
            document,
            quiet,
            last_count: None,
            stable_since: Instant::now(),
        }
    }
}

#[async_trait]
impl<'a, D: Driver + ?Sized> Probe<D> for NetworkIdleProbe<'a> {
    type Output = ();

    fn describe(&self) -> String {
        format!("network idle in {}", self.document.label())
    }

    async fn probe(&mut self, driver: &mut D) -> Result<Option<()>, AutomationError> {
        let complete = matches!(
            driver.ready_state(self.document).await,
            Ok(ReadyState::Complete)
        );
        let count = match driver.resource_count(self.document).await {
            Ok(count) => count,
            Err(e) => {
                tracing::debug!(document = self.document.label(), "resource count unavailable: {}", e);
                self.last_count = None;
                return Ok(None);
            }
        };

        let pending = match driver.pending_requests(self.document).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::debug!(document = self.document.label(), "pending requests unavailable: {}", e);
                usize::MAX
            }
        };

        let now = Instant::now();
        if self.last_count != Some(count) || pending > 0 {
            self.last_count = Some(count);
            self.stable_since = now;
        }

        if complete && now - self.stable_since >= self.quiet {
            Ok(Some(()))
        } else {
            Ok(None)
        }
    }
}
