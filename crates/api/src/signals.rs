//! Liveness signals produced by the direct jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Shared between the dispatcher (which updates it after each direct run) and
/// the metrics endpoint (which reports the elapsed times).
pub struct Signals {
    beat: AtomicBool,
    started: Instant,
    last_heartbeat: Mutex<Option<Instant>>,
    last_control: Mutex<Option<Instant>>,
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

impl Signals {
    pub fn new() -> Self {
        Self {
            beat: AtomicBool::new(false),
            started: Instant::now(),
            last_heartbeat: Mutex::new(None),
            last_control: Mutex::new(None),
        }
    }

    /// The bit sent with the next heartbeat run.
    pub fn beat(&self) -> bool {
        self.beat.load(Ordering::SeqCst)
    }

    /// Flip the heartbeat bit and record the completion time.
    pub fn heartbeat_completed(&self) {
        self.beat.fetch_xor(true, Ordering::SeqCst);
        stamp(&self.last_heartbeat);
    }

    pub fn control_completed(&self) {
        stamp(&self.last_control);
    }

    /// Time since the last heartbeat run finished (or since startup).
    pub fn heartbeat_elapsed(&self) -> Duration {
        self.elapsed(&self.last_heartbeat)
    }

    pub fn control_elapsed(&self) -> Duration {
        self.elapsed(&self.last_control)
    }

    fn elapsed(&self, slot: &Mutex<Option<Instant>>) -> Duration {
        let last = *slot.lock().unwrap_or_else(|p| p.into_inner());
        last.unwrap_or(self.started).elapsed()
    }
}

fn stamp(slot: &Mutex<Option<Instant>>) {
    *slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());
}
