//! Unique-id and wall-clock sources
//!
//! The store never mints ids or reads the clock directly; both are injected
//! capabilities so tests can run deterministically.

use chrono::Utc;
use uuid::Uuid;

/// Source of opaque unique identifiers for counters and collections
pub trait IdSource {
    fn next_id(&mut self) -> String;
}

/// Wall-clock timestamp source (epoch milliseconds)
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Default id source: random v4 UUIDs
#[derive(Debug, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Default clock: system time as epoch milliseconds
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{SequentialIds, TickingClock};
    use super::*;

    #[test]
    fn test_uuid_source_yields_distinct_ids() {
        let mut source = UuidSource;
        let a = source.next_id();
        let b = source.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequential_ids_are_ordered() {
        let mut source = SequentialIds::default();
        assert_eq!(source.next_id(), "id-1");
        assert_eq!(source.next_id(), "id-2");
    }

    #[test]
    fn test_ticking_clock_is_strictly_increasing() {
        let clock = TickingClock::default();
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b > a);
    }
}
