//! Fixed-rate polling schedule.
//!
//! Deadlines advance by whole periods so ticks do not drift. When a tick
//! overruns its deadline, or the period changes, the schedule realigns to
//! `now + period` instead of firing a burst of catch-up ticks.

use std::thread;
use std::time::{Duration, Instant};

/// Shortest allowed polling period.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Cadence {
    period: Duration,
    next: Option<Instant>,
    period_changed: bool,
}

impl Cadence {
    /// Periods below [`MIN_PERIOD`] are raised to it.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            next: None,
            period_changed: false,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn set_period(&mut self, period: Duration) {
        let period = period.max(MIN_PERIOD);
        if period != self.period {
            self.period = period;
            self.period_changed = true;
        }
    }

    /// Deadline of the next tick, `None` before the first one.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next
    }

    /// Record a tick that ran at `now` and return when the next one is due.
    pub fn advance(&mut self, now: Instant) -> Instant {
        let next = match self.next {
            Some(previous) if !self.period_changed => {
                let candidate = previous + self.period;
                if candidate <= now {
                    now + self.period
                } else {
                    candidate
                }
            }
            _ => now + self.period,
        };
        self.period_changed = false;
        self.next = Some(next);
        next
    }

    /// Time left until the next tick; zero when one is due.
    pub fn wait_time(&self, now: Instant) -> Duration {
        self.next
            .map_or(Duration::ZERO, |deadline| deadline.saturating_duration_since(now))
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.wait_time(now).is_zero()
    }

    /// Block the current thread until the next tick is due.
    pub fn sleep_until_next(&self) {
        let wait = self.wait_time(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }

    /// Forget the schedule; the next tick fires immediately.
    pub fn reset(&mut self) {
        self.next = None;
        self.period_changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn test_first_tick_is_immediate() {
        let cadence = Cadence::from_secs(5);
        let now = Instant::now();
        assert!(cadence.is_due(now));
        assert_eq!(cadence.next_deadline(), None);
    }

    #[test]
    fn test_fixed_rate_without_drift() {
        let mut cadence = Cadence::from_secs(5);
        let start = Instant::now();
        let first = cadence.advance(start);
        assert_eq!(first, start + 5 * SEC);

        // Tick ran a little late; deadline still advances from the previous one.
        let second = cadence.advance(first + Duration::from_millis(300));
        assert_eq!(second, start + 10 * SEC);
        assert_eq!(
            cadence.wait_time(first + Duration::from_millis(300)),
            Duration::from_millis(4_700)
        );
    }

    #[test]
    fn test_overrun_realigns() {
        let mut cadence = Cadence::from_secs(5);
        let start = Instant::now();
        cadence.advance(start);
        let late = start + 12 * SEC;
        assert_eq!(cadence.advance(late), late + 5 * SEC);
    }

    #[test]
    fn test_period_change_realigns() {
        let mut cadence = Cadence::from_secs(5);
        let start = Instant::now();
        cadence.advance(start);
        cadence.set_period(2 * SEC);
        let now = start + SEC;
        assert_eq!(cadence.advance(now), now + 2 * SEC);
        // Next tick goes back to fixed rate.
        assert_eq!(cadence.advance(now + 2 * SEC), now + 4 * SEC);
    }

    #[test]
    fn test_minimum_period() {
        assert_eq!(Cadence::new(Duration::ZERO).period(), MIN_PERIOD);
        let mut cadence = Cadence::from_secs(3);
        cadence.set_period(Duration::from_millis(10));
        assert_eq!(cadence.period(), MIN_PERIOD);
    }

    #[test]
    fn test_reset_makes_next_tick_immediate() {
        let mut cadence = Cadence::from_secs(5);
        let now = Instant::now();
        cadence.advance(now);
        assert!(!cadence.is_due(now));
        cadence.reset();
        assert!(cadence.is_due(now));
    }
}
