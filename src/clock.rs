use chrono::{DateTime, Utc};

pub mod manual;
pub mod system;

/// A source of commit timestamps.
pub trait Clock {
    fn now(&mut self) -> DateTime<Utc>;
}
