//! Per-device background scan scheduling
//!
//! While a device sees no networks the delay between scans grows
//! exponentially from [`SCAN_INITIAL_DELAY`] up to the full scan interval.
//! Once networks are visible the full interval is used.

use tokio::time::{Duration, Instant};
use tracing::debug;

/// First backoff delay (seconds)
pub const SCAN_INITIAL_DELAY: u16 = 10;

/// Delay of a forced rescan after a disconnect (seconds)
pub const SCAN_FORCE_DELAY: u16 = 5;

/// An armed recurring scan timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTimer {
    /// Delay between firings
    pub period: Duration,
    /// Next firing
    pub deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct ScanScheduler {
    scan_interval: u16,
    backoff_interval: u16,
    timer: Option<ScanTimer>,
}

impl ScanScheduler {
    /// `scan_interval == 0` disables periodic scanning
    pub fn new(scan_interval: u16) -> Self {
        Self {
            scan_interval,
            backoff_interval: SCAN_INITIAL_DELAY,
            timer: None,
        }
    }

    pub fn scan_interval(&self) -> u16 {
        self.scan_interval
    }

    pub fn set_scan_interval(&mut self, scan_interval: u16) {
        self.scan_interval = scan_interval;
        if scan_interval > 0 && self.backoff_interval > scan_interval {
            self.backoff_interval = scan_interval;
        }
    }

    pub fn backoff_interval(&self) -> u16 {
        self.backoff_interval
    }

    pub fn reset_backoff(&mut self) {
        self.backoff_interval = SCAN_INITIAL_DELAY;
    }

    pub fn timer(&self) -> Option<ScanTimer> {
        self.timer
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Period of the armed timer
    pub fn armed_interval(&self) -> Option<Duration> {
        self.timer.map(|t| t.period)
    }

    /// Cancel the pending timer
    pub fn clear(&mut self) {
        self.timer = None;
    }

    /// Re-arm according to how many networks the device currently sees
    pub fn reset(&mut self, network_count: usize, now: Instant) -> Option<Duration> {
        self.clear();

        if self.scan_interval == 0 {
            return None;
        }

        let interval = if network_count == 0 {
            if self.backoff_interval >= self.scan_interval {
                self.backoff_interval = SCAN_INITIAL_DELAY;
            }
            self.backoff_interval
        } else {
            self.scan_interval
        };

        debug!("scan interval {}", interval);
        let period = Duration::from_secs(u64::from(interval));
        self.timer = Some(ScanTimer {
            period,
            deadline: now + period,
        });

        self.backoff_interval = self
            .backoff_interval
            .saturating_mul(2)
            .min(self.scan_interval);

        Some(period)
    }

    /// Replace any pending timer with a short retry
    pub fn force(&mut self, now: Instant) {
        let period = Duration::from_secs(u64::from(SCAN_FORCE_DELAY));
        self.timer = Some(ScanTimer {
            period,
            deadline: now + period,
        });
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.timer.map_or(false, |t| t.deadline <= now)
    }

    /// Schedule the next firing of a recurring timer
    pub fn rearm(&mut self, now: Instant) {
        if let Some(timer) = self.timer.as_mut() {
            timer.deadline = now + timer.period;
        }
    }
}
