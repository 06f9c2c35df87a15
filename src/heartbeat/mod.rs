//! Connection heartbeat: client-side liveness polling and server-side
//! blackout monitoring.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   GET /connection_heartbeat   ┌──────────────────────┐
//! │  HeartbeatPoller     │  ──────────────────────────▶  │  ApiServer           │
//! │  (probe, wait, loop) │                               │   └ HeartbeatMonitor │
//! │   └ LatencyTracker   │  ◀──────── 200 / error ─────  │      beat() / watch  │
//! └──────────────────────┘                               └──────────────────────┘
//! ```
//!
//! - [`HeartbeatPoller`] - two-state loop, fixed delay, never gives up by default
//! - [`HeartbeatMonitor`] - records beats, optionally fires a blackout callback
//! - [`CancelToken`] - interruptible wait shared by both loops

pub mod monitor;
pub mod poller;

pub use monitor::HeartbeatMonitor;
pub use poller::{HeartbeatPoller, PollExit, PollState, Probe, RetryPolicy, TcpProbe};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Path of the liveness endpoint
pub const HEARTBEAT_PATH: &str = "/connection_heartbeat";

/// Cloneable stop signal.
///
/// Cancelling drops the only sender, which wakes every pending [`wait`](Self::wait)
/// at once and makes later waits return immediately.
#[derive(Clone)]
pub struct CancelToken {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: rx,
        }
    }

    pub fn cancel(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    /// Sleep for `timeout`; returns `true` if cancelled before or during the wait.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            // Nothing is ever sent, so any other outcome means disconnected.
            _ => true,
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
