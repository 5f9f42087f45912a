use chrono::{DateTime, Duration, Utc};

use super::Clock;

/// A [`Clock`] which hands out a fixed instant and then moves it forward
/// by `step` on every reading.
///
/// A zero step makes every reading tie, which is how tests pin down the
/// ordering of commits with equal timestamps.
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    next: DateTime<Utc>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self { next: start, step }
    }

    /// Starts at the unix epoch and ticks one second per reading.
    pub fn ticking() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH, Duration::seconds(1))
    }

    /// The instant the next reading will return.
    pub fn peek(&self) -> DateTime<Utc> {
        self.next
    }

    pub fn advance(&mut self, by: Duration) {
        self.next = self.next + by;
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> DateTime<Utc> {
        let now = self.next;
        self.next = self.next + self.step;
        now
    }
}

#[test]
fn test_manual_clock_steps() {
    let mut clock = ManualClock::ticking();
    let first = clock.now();
    let second = clock.now();
    assert_eq!(second - first, Duration::seconds(1));
    assert_eq!(clock.peek() - second, Duration::seconds(1));
}

#[test]
fn test_manual_clock_zero_step_ties() {
    let mut clock = ManualClock::new(DateTime::<Utc>::UNIX_EPOCH, Duration::zero());
    assert_eq!(clock.now(), clock.now());
    clock.advance(Duration::minutes(5));
    assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(5));
}
