//! Round-trip latency smoothing per UI element.
//!
//! Same recurrence as the generated `utils.js`: the first sample seeds the
//! running value, later samples fold in as `alpha * old + (1 - alpha) * sample`.
//! Not thread-safe; one tracker belongs to one polling loop.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LatencyError {
    #[error("smoothing factor {0} is outside [0, 1]")]
    InvalidAlpha(f64),
    #[error("latency for '{0}' was never initialized")]
    NotInitialized(String),
    #[error("no call was started for '{0}'")]
    NoCallStarted(String),
}

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

#[derive(Debug, Clone)]
struct ElementLatency {
    alpha: f64,
    running_ms: Option<f64>,
    call_started: Option<Duration>,
}

/// Smoothed latency per element id
#[derive(Debug, Default)]
pub struct LatencyTracker<C: Clock = SystemClock> {
    clock: C,
    elements: HashMap<String, ElementLatency>,
}

impl LatencyTracker<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::default())
    }
}

impl<C: Clock> LatencyTracker<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, elements: HashMap::new() }
    }

    /// Reset `element_id` to "no samples yet" with smoothing factor `alpha`.
    pub fn init(&mut self, element_id: &str, alpha: f64) -> Result<(), LatencyError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(LatencyError::InvalidAlpha(alpha));
        }
        self.elements.insert(
            element_id.to_string(),
            ElementLatency { alpha, running_ms: None, call_started: None },
        );
        Ok(())
    }

    /// Record that a call for `element_id` starts now.
    pub fn mark_call_start(&mut self, element_id: &str) -> Result<(), LatencyError> {
        let now = self.clock.now();
        let element = self
            .elements
            .get_mut(element_id)
            .ok_or_else(|| LatencyError::NotInitialized(element_id.to_string()))?;
        element.call_started = Some(now);
        Ok(())
    }

    /// Fold the time since the marked start into the average; returns it in ms.
    pub fn update(&mut self, element_id: &str) -> Result<f64, LatencyError> {
        let now = self.clock.now();
        let element = self
            .elements
            .get_mut(element_id)
            .ok_or_else(|| LatencyError::NotInitialized(element_id.to_string()))?;
        let started = element
            .call_started
            .ok_or_else(|| LatencyError::NoCallStarted(element_id.to_string()))?;

        let sample_ms = now.saturating_sub(started).as_secs_f64() * 1000.0;
        let running = match element.running_ms {
            None => sample_ms,
            Some(old) => element.alpha * old + (1.0 - element.alpha) * sample_ms,
        };
        element.running_ms = Some(running);
        Ok(running)
    }

    /// Current smoothed latency in ms, `None` before the first sample
    pub fn latency_ms(&self, element_id: &str) -> Option<f64> {
        self.elements.get(element_id).and_then(|e| e.running_ms)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
