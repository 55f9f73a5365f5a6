//! Time sources for the frame loop.
//!
//! The viewer measures locomotion frame durations and frame statistics
//! through `Clock` so the simulated runtime and the tests can drive time
//! by hand.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real monotonic time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct TestClock {
    instant: Mutex<Instant>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            instant: Mutex::new(Instant::now()),
        }
    }

    /// Move time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut inst = self.instant.lock().unwrap_or_else(|e| e.into_inner());
        *inst += duration;
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.instant.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Milliseconds between two instants as a float, saturating at zero.
pub fn millis_between(start: Instant, end: Instant) -> f64 {
    end.saturating_duration_since(start).as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let t0 = clock.now();
        assert!(clock.now() >= t0);
    }

    #[test]
    fn test_test_clock_advance() {
        let clock = TestClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(16));
        assert_eq!(clock.now() - t0, Duration::from_millis(16));
    }

    #[test]
    fn test_test_clock_stands_still() {
        let clock = TestClock::new();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_clock_trait_object() {
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
        let t0 = clock.now();
        assert_eq!(millis_between(t0, clock.now()), 0.0);
    }

    #[test]
    fn test_millis_between_saturates() {
        let clock = TestClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(5));
        let t1 = clock.now();
        assert_eq!(millis_between(t1, t0), 0.0);
        assert!((millis_between(t0, t1) - 5.0).abs() < 1e-9);
    }
}
