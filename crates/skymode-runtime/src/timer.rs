//! [`SetpointTimer`] – periodic setpoint deadline.
//!
//! The timer does not own a task; the runner sleeps until
//! [`SetpointTimer::deadline`] and then calls [`SetpointTimer::poll`].

use std::time::Duration;

use tokio::time::Instant;

use crate::setpoint::UPDATE_RATE_EPSILON_HZ;

/// Period for `rate_hz`, truncated to whole milliseconds. `None` when the
/// rate is too low for periodic updates.
pub fn period_for_rate(rate_hz: f32) -> Option<Duration> {
    if rate_hz > UPDATE_RATE_EPSILON_HZ {
        let millis = (1000.0 / rate_hz) as u64;
        Some(Duration::from_millis(millis.max(1)))
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetpointTimer {
    period: Option<Duration>,
    next_due: Option<Instant>,
}

impl SetpointTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start with `period`; the first tick is due one period after `now`.
    pub fn start(&mut self, period: Duration, now: Instant) {
        self.period = Some(period);
        self.next_due = Some(now + period);
    }

    pub fn cancel(&mut self) {
        self.period = None;
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_due
    }

    /// Returns `true` once per elapsed deadline. Missed ticks are skipped,
    /// never replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let (Some(period), Some(due)) = (self.period, self.next_due) else {
            return false;
        };
        if now < due {
            return false;
        }
        let missed = (now - due).as_nanos() / period.as_nanos().max(1);
        let skip = u32::try_from(missed + 1).unwrap_or(u32::MAX);
        let next = due
            .checked_add(period.saturating_mul(skip))
            .unwrap_or(now + period);
        self.next_due = Some(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn period_from_rate() {
        assert_eq!(period_for_rate(10.0), Some(100 * MS));
        assert_eq!(period_for_rate(30.0), Some(33 * MS));
        assert_eq!(period_for_rate(5000.0), Some(MS));
        assert_eq!(period_for_rate(0.0), None);
        assert_eq!(period_for_rate(-3.0), None);
    }

    #[test]
    fn stopped_timer_never_fires() {
        let mut timer = SetpointTimer::new();
        assert!(!timer.is_running());
        assert!(!timer.poll(Instant::now() + 10 * MS));
    }

    #[test]
    fn fires_once_per_deadline() {
        let t0 = Instant::now();
        let mut timer = SetpointTimer::new();
        timer.start(100 * MS, t0);
        assert_eq!(timer.deadline(), Some(t0 + 100 * MS));
        assert!(!timer.poll(t0 + 50 * MS));
        assert!(timer.poll(t0 + 100 * MS));
        assert!(!timer.poll(t0 + 150 * MS));
        assert!(timer.poll(t0 + 200 * MS));
    }

    #[test]
    fn missed_ticks_are_skipped() {
        let t0 = Instant::now();
        let mut timer = SetpointTimer::new();
        timer.start(100 * MS, t0);
        assert!(timer.poll(t0 + 450 * MS));
        assert_eq!(timer.deadline(), Some(t0 + 500 * MS));
        assert!(!timer.poll(t0 + 460 * MS));
    }

    #[test]
    fn long_stall_skips_in_one_step() {
        let t0 = Instant::now();
        let mut timer = SetpointTimer::new();
        timer.start(MS, t0);
        let late = t0 + Duration::from_secs(3600) + MS / 2;
        assert!(timer.poll(late));
        assert_eq!(timer.deadline(), Some(t0 + Duration::from_secs(3600) + MS));
        assert!(!timer.poll(late));
    }

    #[test]
    fn poll_exactly_on_a_later_deadline_moves_past_it() {
        let t0 = Instant::now();
        let mut timer = SetpointTimer::new();
        timer.start(100 * MS, t0);
        assert!(timer.poll(t0 + 300 * MS));
        assert_eq!(timer.deadline(), Some(t0 + 400 * MS));
    }

    #[test]
    fn cancel_clears_deadline() {
        let t0 = Instant::now();
        let mut timer = SetpointTimer::new();
        timer.start(20 * MS, t0);
        timer.cancel();
        assert!(timer.deadline().is_none());
        assert!(timer.period().is_none());
        assert!(!timer.poll(t0 + 100 * MS));
    }
}
