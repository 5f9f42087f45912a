use chrono::{DateTime, Utc};

use super::Clock;

/// The wall clock, read through [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[test]
fn test_system_clock_does_not_go_backwards() {
    let mut clock = SystemClock;
    let first = clock.now();
    let second = clock.now();
    assert!(first <= second);
}
