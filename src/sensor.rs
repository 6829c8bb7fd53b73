//! Heart rate data sources feeding the notification scheduler.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};

/// Raw heart rate reading in beats per minute, unvalidated. Range checks
/// happen at encode time so a misbehaving source cannot produce a partial
/// value.
pub type Bpm = u32;

/// No reading is available right now. A tick that hits this skips without
/// stopping the schedule.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, thiserror::Error)]
#[error("no heart rate reading available")]
pub struct Unavailable;

/// Source of heart rate samples polled once per notification tick.
pub trait HeartRateSource: Debug + Send + Sync {
    /// Returns the current heart rate.
    fn current_bpm(&self) -> Result<Bpm, Unavailable>;
}

/// Shared cell holding the most recent reading pushed by a sensor driver.
#[derive(Debug)]
pub struct LatestBpm(AtomicU32);

// Outside the encodable UInt16 range, so it never collides with a real
// reading (0 bpm included).
const EMPTY: u32 = u32::MAX;

impl LatestBpm {
    /// Creates an empty cell.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU32::new(EMPTY))
    }

    /// Publishes a new reading.
    #[inline]
    pub fn set(&self, bpm: Bpm) {
        self.0.store(bpm, Ordering::Relaxed);
    }

    /// Clears the current reading.
    #[inline]
    pub fn clear(&self) {
        self.0.store(EMPTY, Ordering::Relaxed);
    }
}

impl Default for LatestBpm {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl HeartRateSource for LatestBpm {
    #[inline]
    fn current_bpm(&self) -> Result<Bpm, Unavailable> {
        match self.0.load(Ordering::Relaxed) {
            EMPTY => Err(Unavailable),
            bpm => Ok(bpm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest() {
        let s = LatestBpm::new();
        assert_eq!(s.current_bpm(), Err(Unavailable));
        s.set(72);
        assert_eq!(s.current_bpm(), Ok(72));
        s.clear();
        assert_eq!(s.current_bpm(), Err(Unavailable));
    }

    #[test]
    fn zero_is_a_reading() {
        let s = LatestBpm::new();
        s.set(0);
        assert_eq!(s.current_bpm(), Ok(0));
    }
}
