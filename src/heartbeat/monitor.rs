//! Server-side record of connection heartbeats.
//!
//! A controlled device (a car, an arm) should stop when the operator's page
//! goes away. The page polls `/connection_heartbeat`; the monitor remembers
//! when that last happened and, if watching, calls `on_blackout` once when
//! the gap exceeds the tolerance.

use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::CancelToken;

#[derive(Debug)]
pub struct HeartbeatMonitor {
    last_beat: Mutex<Instant>,
    beats: AtomicU64,
    watcher: Mutex<Option<CancelToken>>,
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self {
            last_beat: Mutex::new(Instant::now()),
            beats: AtomicU64::new(0),
            watcher: Mutex::new(None),
        }
    }

    /// Record a heartbeat now.
    pub fn beat(&self) {
        *self.last_beat.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
        self.beats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    pub fn since_last_beat(&self) -> Duration {
        self.last_beat.lock().unwrap_or_else(|e| e.into_inner()).elapsed()
    }

    /// Start a watcher thread checking every `tolerance / 4`.
    ///
    /// The clock restarts now, so a page that has not connected yet gets a
    /// full tolerance window. `on_blackout` runs at most once, on the watcher
    /// thread, after which the watcher exits. A previous watcher is stopped.
    pub fn watch<F>(self: &Arc<Self>, tolerance: Duration, on_blackout: F) -> thread::JoinHandle<()>
    where
        F: FnOnce(Duration) + Send + 'static,
    {
        self.stop();
        self.beat_silently();

        let cancel = CancelToken::new();
        *self.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());

        let monitor = Arc::clone(self);
        let interval = (tolerance / 4).max(Duration::from_millis(1));

        info!("Watching connection heartbeat (tolerance {:?})", tolerance);
        thread::Builder::new()
            .name("heartbeat-watch".into())
            .spawn(move || {
                while !cancel.wait(interval) {
                    let gap = monitor.since_last_beat();
                    if gap > tolerance {
                        warn!("No heartbeat for {:?} (tolerance {:?}); connection lost", gap, tolerance);
                        on_blackout(gap);
                        return;
                    }
                }
            })
            .expect("Failed to spawn heartbeat watcher")
    }

    /// Stop the current watcher, if any.
    pub fn stop(&self) {
        if let Some(token) = self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
    }

    /// Reset the clock without counting a beat
    fn beat_silently(&self) {
        *self.last_beat.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_beat_counts() {
        let monitor = HeartbeatMonitor::new();
        monitor.beat();
        monitor.beat();
        assert_eq!(monitor.beats(), 2);
        assert!(monitor.since_last_beat() < Duration::from_secs(5));
    }

    #[test]
    fn test_blackout_fires_once_without_beats() {
        let monitor = Arc::new(HeartbeatMonitor::new());
        let fired = Arc::new(AtomicU64::new(0));
        let f = Arc::clone(&fired);

        let handle = monitor.watch(Duration::from_millis(40), move |gap| {
            assert!(gap > Duration::from_millis(40));
            f.fetch_add(1, Ordering::SeqCst);
        });
        handle.join().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_beats_keep_connection_alive() {
        let monitor = Arc::new(HeartbeatMonitor::new());
        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);

        let handle = monitor.watch(Duration::from_millis(200), move |_| {
            f.store(true, Ordering::SeqCst);
        });
        for _ in 0..10 {
            monitor.beat();
            thread::sleep(Duration::from_millis(20));
        }
        monitor.stop();
        handle.join().unwrap();
        assert!(!fired.load(Ordering::SeqCst));
    }
}
