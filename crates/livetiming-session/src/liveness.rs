//! Idle-driven poll of the live connection.
//!
//! The server may sit on buffered data until the client speaks; after a
//! window with no inbound bytes a single probe byte is written. The monitor
//! is a plain state machine; the connection loop owns the timer that drives
//! it.

use std::time::Duration;

use tokio::time::Instant;

/// Byte written to the live connection when it has been idle for a window.
pub const POLL_PROBE: u8 = 0x10;

pub const DEFAULT_POLL_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    window: Duration,
    last_activity: Instant,
    armed: bool,
    probes: u64,
}

impl LivenessMonitor {
    /// A disarmed monitor with the given idle window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_activity: Instant::now(),
            armed: false,
            probes: 0,
        }
    }

    /// Start the idle timer. Has no effect when already armed.
    pub fn arm(&mut self, now: Instant) {
        if !self.armed {
            self.armed = true;
            self.last_activity = now;
        }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Record inbound activity, pushing the deadline out by a full window.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// When the next probe is due, or `None` while disarmed.
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.then(|| self.last_activity + self.window)
    }

    /// Returns `true` exactly once per elapsed window and restarts the timer.
    pub fn poll_elapsed(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_activity = now;
                self.probes += 1;
                true
            }
            _ => false,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Probes requested so far.
    pub fn probes(&self) -> u64 {
        self.probes
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(1000);

    #[test]
    fn disarmed_monitor_never_probes() {
        let mut monitor = LivenessMonitor::new(WINDOW);
        let later = Instant::now() + WINDOW * 10;
        assert!(monitor.deadline().is_none());
        assert!(!monitor.poll_elapsed(later));
        assert_eq!(monitor.probes(), 0);
    }

    #[test]
    fn one_probe_per_idle_window() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(WINDOW);
        monitor.arm(start);
        assert_eq!(monitor.deadline(), Some(start + WINDOW));

        assert!(!monitor.poll_elapsed(start + WINDOW / 2));
        assert!(monitor.poll_elapsed(start + WINDOW));
        assert!(!monitor.poll_elapsed(start + WINDOW));
        assert_eq!(monitor.deadline(), Some(start + WINDOW * 2));
        assert!(monitor.poll_elapsed(start + WINDOW * 2));
        assert_eq!(monitor.probes(), 2);
    }

    #[test]
    fn inbound_byte_suppresses_pending_probe() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(WINDOW);
        monitor.arm(start);

        let activity = start + Duration::from_millis(900);
        monitor.touch(activity);
        assert!(!monitor.poll_elapsed(start + WINDOW));
        assert_eq!(monitor.deadline(), Some(activity + WINDOW));
        assert!(monitor.poll_elapsed(activity + WINDOW));
    }

    #[test]
    fn rearming_keeps_existing_deadline() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(WINDOW);
        monitor.arm(start);
        monitor.arm(start + Duration::from_millis(500));
        assert_eq!(monitor.deadline(), Some(start + WINDOW));

        monitor.disarm();
        assert!(!monitor.is_armed());
        assert!(monitor.deadline().is_none());
    }
}
