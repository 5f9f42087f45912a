use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::{system::SystemClock, Clock};

/// A single change event in a [`Repository`](crate::repository::Repository).
///
/// Everything but the predecessor link is fixed at creation. The link is
/// the arena index of the chronologically previous commit and is only
/// rewritten by the owning repository.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct Commit {
    id: String,
    message: String,
    timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) predecessor: Option<usize>,
}

impl Commit {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}: {}",
            self.id,
            self.timestamp.format("%Y-%m-%d at %H:%M:%S %Z"),
            self.message
        )
    }
}

/// Hands out commit ids and timestamps.
///
/// Ids come from a counter starting at zero, so every commit made through
/// the same factory has a distinct id no matter which repository it lands
/// in. Tests call [`CommitFactory::reset`] to get predictable ids.
#[derive(Debug, Clone)]
pub struct CommitFactory<C = SystemClock> {
    next_id: u64,
    clock: C,
}

impl CommitFactory<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for CommitFactory<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> CommitFactory<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { next_id: 0, clock }
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Restores the id counter to its initial value.
    pub fn reset(&mut self) {
        log::debug!("resetting commit ids (was at {})", self.next_id);
        self.next_id = 0;
    }

    pub(crate) fn create(&mut self, message: String, predecessor: Option<usize>) -> Commit {
        let id = self.next_id.to_string();
        self.next_id += 1;
        Commit {
            id,
            message,
            timestamp: self.clock.now(),
            predecessor,
        }
    }
}

#[test]
fn test_ids_are_monotonic_and_resettable() {
    let mut factory = CommitFactory::new();
    let first = factory.create(String::from("first"), None);
    let second = factory.create(String::new(), Some(0));
    assert_eq!(first.id(), "0");
    assert_eq!(second.id(), "1");
    assert_eq!(second.predecessor, Some(0));
    assert!(first.timestamp() <= second.timestamp());
    factory.reset();
    assert_eq!(factory.create(String::from("again"), None).id(), "0");
}

#[test]
fn test_commit_display() {
    use crate::clock::manual::ManualClock;
    use chrono::TimeZone;

    let start = Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap();
    let mut factory = CommitFactory::with_clock(ManualClock::new(start, chrono::Duration::zero()));
    let commit = factory.create(String::from("initial import"), None);
    assert_eq!(
        commit.to_string(),
        "0 at 2023-04-05 at 06:07:08 UTC: initial import"
    );
    let empty = factory.create(String::new(), None);
    assert_eq!(empty.to_string(), "1 at 2023-04-05 at 06:07:08 UTC: ");
}

#[test]
fn test_commit_json() {
    use crate::clock::manual::ManualClock;

    let mut factory = CommitFactory::with_clock(ManualClock::ticking());
    let commit = factory.create(String::from("hello"), Some(3));
    let json = serde_json::to_value(&commit).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "id": "0",
            "message": "hello",
            "timestamp": "1970-01-01T00:00:00Z",
        })
    );
}
