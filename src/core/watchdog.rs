//! Rendering watchdog - periodic self-healing check for active providers.
//!
//! Some host integrations can drop a provider's rendered artefacts behind its
//! back (a layer removed by another panel, a canvas reset). The watchdog asks
//! the controller at a low, fixed rate to reissue `load` for any active
//! provider whose artefacts for the current year are gone. `load` is
//! idempotent, so a spurious trigger costs nothing.

use std::time::{Duration, Instant};

/// Fixed-interval trigger.
///
/// # Usage
/// ```ignore
/// // In update loop:
/// if watchdog.tick(now) {
///     controller.repair_active();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Watchdog {
    /// None when disabled
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(500)
    }
}

impl Watchdog {
    /// Create with an interval in milliseconds. Zero disables the watchdog.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: (interval_ms > 0).then(|| Duration::from_millis(interval_ms)),
            next_due: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Get current interval in milliseconds (0 when disabled)
    pub fn interval_ms(&self) -> u64 {
        self.interval.map(|d| d.as_millis() as u64).unwrap_or(0)
    }

    /// True once per elapsed interval. The first call only arms the timer.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        match self.next_due {
            None => {
                self.next_due = Some(now + interval);
                false
            }
            Some(due) if now >= due => {
                self.next_due = Some(now + interval);
                log::trace!("Watchdog: check due");
                true
            }
            Some(_) => false,
        }
    }

    /// Re-arm from `now`.
    pub fn reset(&mut self) {
        self.next_due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_arms() {
        let mut watchdog = Watchdog::new(500);
        let t0 = Instant::now();
        assert!(!watchdog.tick(t0));
        assert!(!watchdog.tick(t0 + Duration::from_millis(499)));
        assert!(watchdog.tick(t0 + Duration::from_millis(500)));
        assert!(!watchdog.tick(t0 + Duration::from_millis(700)));
        assert!(watchdog.tick(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn test_zero_disables() {
        let mut watchdog = Watchdog::new(0);
        assert!(!watchdog.is_enabled());
        let t0 = Instant::now();
        assert!(!watchdog.tick(t0));
        assert!(!watchdog.tick(t0 + Duration::from_secs(60)));
        assert_eq!(watchdog.interval_ms(), 0);
    }

    #[test]
    fn test_reset_rearms() {
        let mut watchdog = Watchdog::default();
        let t0 = Instant::now();
        watchdog.tick(t0);
        watchdog.reset();
        assert!(!watchdog.tick(t0 + Duration::from_millis(600)));
        assert!(watchdog.tick(t0 + Duration::from_millis(1100)));
    }
}
