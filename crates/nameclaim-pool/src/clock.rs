//! Sources for the per-session logical timestamp.

use std::time::{SystemTime, UNIX_EPOCH};

/// Produces the timestamp a node attaches to its greetings for a session.
///
/// Lower values win contested names, so the only requirement is that a
/// node reading the clock later gets a larger value than one reading it
/// earlier.
pub trait LogicalClock: Send + Sync {
    fn now(&self) -> i64;
}

/// Nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LogicalClock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Always the same value. Used to pin priorities in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl LogicalClock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(a > 0);
        assert!(b >= a);
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(100).now(), 100);
    }
}
