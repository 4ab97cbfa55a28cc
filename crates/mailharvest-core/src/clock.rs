//! Wall-clock abstraction for testability.
//!
//! The cutoff and relative UI dates ("Today", "Yesterday") depend on the
//! current local time. This module provides a `Clock` trait so those rules
//! can be tested against a fixed instant.
//!
//! # Example
//!
//! ```
//! use mailharvest_core::clock::{Clock, FixedClock};
//! use chrono::NaiveDate;
//!
//! let noon = NaiveDate::from_ymd_opt(2025, 3, 10)
//!     .and_then(|d| d.and_hms_opt(12, 0, 0))
//!     .unwrap_or_default();
//! let clock = FixedClock::new(noon);
//! assert_eq!(clock.now(), noon);
//! ```

use chrono::{Local, NaiveDateTime};
use std::sync::Arc;

/// Abstraction over the current local date and time.
///
/// In production, use [`SystemClock`]. In tests, use [`FixedClock`].
pub trait Clock: Send + Sync {
    /// Returns the current local time.
    fn now(&self) -> NaiveDateTime;
}

/// System clock that reads the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    /// Creates a clock that always returns `now`.
    #[must_use]
    pub const fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

/// A shared clock for dynamic dispatch.
pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_system_clock_is_close_to_local_now() {
        let before = Local::now().naive_local();
        let from_clock = SystemClock.now();
        let after = Local::now().naive_local();

        assert!(from_clock >= before);
        assert!(from_clock <= after);
    }

    #[test]
    fn test_fixed_clock() {
        let instant = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let clock: SharedClock = Arc::new(FixedClock::new(instant));
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), instant);
    }
}
