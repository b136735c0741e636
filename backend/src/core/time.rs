//! Time management for the simulation
//!
//! The warehouse runs in continuous simulated seconds. The clock only moves
//! forward, and only the event kernel moves it.

use serde::{Deserialize, Serialize};

/// Continuous simulated clock
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::SimClock;
///
/// let mut clock = SimClock::new();
/// assert_eq!(clock.now(), 0.0);
///
/// clock.advance_to(12.5);
/// assert_eq!(clock.now(), 12.5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimClock {
    /// Seconds elapsed since simulation start
    now: f64,
}

impl SimClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self { now: 0.0 }
    }

    /// Move the clock to `time`
    ///
    /// # Panics
    /// Panics if `time` lies in the past: the event queue must never
    /// hand out an event earlier than the current instant.
    pub fn advance_to(&mut self, time: f64) {
        assert!(
            time >= self.now,
            "clock cannot move backwards ({} -> {})",
            self.now,
            time
        );
        self.now = time;
    }

    /// Current simulated time (seconds)
    pub fn now(&self) -> f64 {
        self.now
    }
}

/// Index of the control-interval bucket containing `time`.
///
/// Depots sample their queue length per bucket of `interval` seconds.
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::core::time::control_bucket;
///
/// assert_eq!(control_bucket(0.0, 1000.0), 0);
/// assert_eq!(control_bucket(2500.0, 1000.0), 2);
/// ```
pub fn control_bucket(time: f64, interval: f64) -> u64 {
    (time / interval).floor() as u64
}
