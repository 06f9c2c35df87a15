//! Client-side liveness loop.
//!
//! Two states, one rule: probe, then wait `policy.delay`, whatever happened.
//! Failures are logged and swallowed. There is no backoff; a liveness
//! indicator should recover as soon as the link does.

use anyhow::{Context, Result, bail};
use log::{debug, trace, warn};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{CancelToken, HEARTBEAT_PATH};
use crate::latency::{Clock, LatencyTracker, SystemClock};

/// Latency element id used for heartbeat round trips
pub const LATENCY_ELEMENT: &str = "connection-heartbeat";

/// One liveness check
pub trait Probe {
    fn probe(&mut self) -> Result<()>;
}

impl<F: FnMut() -> Result<()>> Probe for F {
    fn probe(&mut self) -> Result<()> {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    RetryingAfterError,
}

/// Why [`HeartbeatPoller::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    Cancelled,
    /// `max_consecutive_failures` was reached
    GaveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between probes, after success and failure alike
    pub delay: Duration,
    /// `None` retries forever
    pub max_consecutive_failures: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            max_consecutive_failures: None,
        }
    }
}

/// Heartbeat loop over any [`Probe`]
pub struct HeartbeatPoller<P: Probe, C: Clock = SystemClock> {
    probe: P,
    policy: RetryPolicy,
    state: PollState,
    calls: u64,
    consecutive_failures: u32,
    latency: LatencyTracker<C>,
}

impl<P: Probe> HeartbeatPoller<P, SystemClock> {
    pub fn new(probe: P, policy: RetryPolicy) -> Self {
        Self::with_clock(probe, policy, SystemClock::default(), 0.99)
    }
}

impl<P: Probe, C: Clock> HeartbeatPoller<P, C> {
    /// Poller with an explicit clock and latency smoothing factor.
    ///
    /// An out-of-range `alpha` falls back to 0.99.
    pub fn with_clock(probe: P, policy: RetryPolicy, clock: C, alpha: f64) -> Self {
        let mut latency = LatencyTracker::with_clock(clock);
        if let Err(e) = latency.init(LATENCY_ELEMENT, alpha) {
            warn!("{}; using 0.99", e);
            let _ = latency.init(LATENCY_ELEMENT, 0.99);
        }
        Self {
            probe,
            policy,
            state: PollState::Polling,
            calls: 0,
            consecutive_failures: 0,
            latency,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Probes issued so far
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Smoothed round-trip time of successful probes
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency.latency_ms(LATENCY_ELEMENT)
    }

    /// Issue exactly one probe and transition.
    pub fn step(&mut self) -> PollState {
        self.calls += 1;
        let _ = self.latency.mark_call_start(LATENCY_ELEMENT);

        match self.probe.probe() {
            Ok(()) => {
                if self.state == PollState::RetryingAfterError {
                    debug!("Heartbeat recovered after {} failures", self.consecutive_failures);
                }
                self.consecutive_failures = 0;
                self.state = PollState::Polling;
                if let Ok(ms) = self.latency.update(LATENCY_ELEMENT) {
                    trace!("Heartbeat ok ({:.0} ms smoothed)", ms);
                }
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.state = PollState::RetryingAfterError;
                warn!("Heartbeat failed ({} in a row): {:#}", self.consecutive_failures, e);
            }
        }
        self.state
    }

    /// Probe and wait until cancelled (or the failure limit is hit).
    pub fn run(&mut self, cancel: &CancelToken) -> PollExit {
        self.run_with(cancel, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_step` after every probe.
    pub fn run_with<F>(&mut self, cancel: &CancelToken, mut on_step: F) -> PollExit
    where
        F: FnMut(&Self),
    {
        loop {
            if cancel.is_cancelled() {
                return PollExit::Cancelled;
            }
            self.step();
            on_step(self);
            if let Some(max) = self.policy.max_consecutive_failures {
                if self.consecutive_failures >= max {
                    return PollExit::GaveUp;
                }
            }
            if cancel.wait(self.policy.delay) {
                return PollExit::Cancelled;
            }
        }
    }
}

/// Plain HTTP/1.1 `GET /connection_heartbeat`; any 2xx is alive.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self { host: host.into(), port, timeout }
    }
}

impl Probe for TcpProbe {
    fn probe(&mut self) -> Result<()> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("No address for {}:{}", self.host, self.port))?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)
            .with_context(|| format!("Failed to connect to {}", addr))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        write!(
            stream,
            "GET {} HTTP/1.1\r\nHost: {}:{}\r\nConnection: close\r\n\r\n",
            HEARTBEAT_PATH, self.host, self.port
        )?;
        stream.flush()?;

        let mut status_line = String::new();
        BufReader::new(stream)
            .read_line(&mut status_line)
            .context("Failed to read heartbeat response")?;

        // "HTTP/1.1 200 OK"
        let code: u16 = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|c| c.parse().ok())
            .with_context(|| format!("Malformed status line: {:?}", status_line.trim_end()))?;
        if !(200..300).contains(&code) {
            bail!("Heartbeat returned HTTP {}", code);
        }
        Ok(())
    }
}
