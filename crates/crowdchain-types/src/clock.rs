//! Logical clock abstraction.
//!
//! Snapshots, voting windows and timelock delays all read time through the
//! [`Clock`] trait. Deployments drive a [`ManualClock`] forward explicitly
//! instead of waiting on wall time.

use crate::error::TypesError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Logical time unit (ticks).
pub type Timestamp = u64;

/// Source of monotonically non-decreasing logical time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Clock handle shared between components of one deployment.
pub type SharedClock = Arc<dyn Clock>;

/// Deterministic clock advanced by the caller.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move time forward by `delta` and return the new time.
    pub fn advance(&self, delta: u64) -> Timestamp {
        self.now.fetch_add(delta, Ordering::SeqCst).saturating_add(delta)
    }

    /// Jump to an absolute time. Rewinding is rejected.
    pub fn set(&self, to: Timestamp) -> Result<(), TypesError> {
        let now = self.now.load(Ordering::SeqCst);
        if to < now {
            return Err(TypesError::ClockRewind { now, requested: to });
        }
        self.now.store(to, Ordering::SeqCst);
        Ok(())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now(), 10);
        assert_eq!(clock.advance(5), 15);
        assert_eq!(clock.now(), 15);
    }

    #[test]
    fn test_manual_clock_rejects_rewind() {
        let clock = ManualClock::new(100);
        assert!(clock.set(200).is_ok());
        assert_eq!(
            clock.set(50),
            Err(TypesError::ClockRewind { now: 200, requested: 50 })
        );
        assert_eq!(clock.now(), 200);
    }
}
