//! Time abstraction, allowing for mockable clocks in testing.
//!
//! Wall-clock time is only consulted for context timeout pruning; all other
//! refresh logic is packet-counter driven.

use std::fmt::Debug;
use std::time::Instant;

/// A trait abstracting the concept of "now" to allow for time mocking in tests.
pub trait Clock: Send + Sync + Debug {
    /// Current `Instant`.
    fn now(&self) -> Instant;
}

/// The default system clock implementation using `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test utilities for mocking time.
pub mod mock_clock {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// A mock clock that allows manual control over the current time in tests.
    #[derive(Debug)]
    pub struct MockClock {
        current_time: Mutex<Instant>,
    }

    impl MockClock {
        /// Creates a new `MockClock` starting at the given `start_time`.
        pub fn new(start_time: Instant) -> Self {
            Self {
                current_time: Mutex::new(start_time),
            }
        }

        /// Advances the mock clock's current time by the specified duration.
        pub fn advance(&self, duration: Duration) {
            let mut current = self.current_time.lock().unwrap();
            *current += duration;
        }

        /// Sets the mock clock's current time to a specific instant.
        pub fn set_time(&self, new_time: Instant) {
            let mut current = self.current_time.lock().unwrap();
            *current = new_time;
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::new(Instant::now())
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            *self.current_time.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock_clock::MockClock;
    use super::*;
    use std::time::Duration;

    #[test]
    fn mock_clock_advances_deterministically() {
        let start = Instant::now();
        let clock = MockClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), start + Duration::from_millis(250));

        let later = start + Duration::from_secs(5);
        clock.set_time(later);
        assert_eq!(clock.now(), later);
    }
}
