// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical timestamps for stale-computation detection.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// A logical timestamp handed out by an [`AgeClock`].
///
/// Ages are totally ordered: an age obtained later from the same clock always
/// compares greater than every age obtained before it. A value whose
/// `last_script_update` age is older than the starting age of an update sweep
/// is stale for that sweep.
///
/// [`Age::BEFORE_TIME`] is reserved: it is older than every age a clock will
/// ever produce and is the age of values that were never computed.
///
/// # Example
///
/// ```
/// use cardscript_dirty::{Age, AgeClock};
///
/// let clock = AgeClock::new();
/// let a = clock.now();
/// let b = clock.now();
///
/// assert!(a < b);
/// assert!(Age::BEFORE_TIME < a);
/// assert!(Age::BEFORE_TIME.is_older_than(b));
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Age(u64);

impl Age {
    /// The age of something that has never been updated.
    pub const BEFORE_TIME: Self = Self(0);

    /// Returns the raw counter value of this age.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns `true` if this age was handed out strictly before `other`.
    #[must_use]
    pub const fn is_older_than(self, other: Self) -> bool {
        self.0 < other.0
    }
}

impl fmt::Debug for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::BEFORE_TIME {
            f.write_str("Age(before time)")
        } else {
            f.debug_tuple("Age").field(&self.0).finish()
        }
    }
}

/// Source of monotonically increasing [`Age`]s.
///
/// The counter is atomic, so ages may be requested from several threads at
/// once (thumbnailers and similar background work stamp their own results),
/// while the update scheduler itself stays single threaded.
///
/// A clock is an explicit service rather than a process-wide global: owners
/// share it by reference (or behind an `Arc`), and tests can create a fresh
/// clock or [`reset`](Self::reset) one between cases.
#[derive(Debug, Default)]
pub struct AgeClock {
    latest: AtomicU64,
}

impl AgeClock {
    /// Creates a clock whose next age is the first one after
    /// [`Age::BEFORE_TIME`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: AtomicU64::new(Age::BEFORE_TIME.0),
        }
    }

    /// Returns a new age, newer than every age returned before.
    pub fn now(&self) -> Age {
        Age(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Returns the most recently handed out age without advancing the clock.
    #[must_use]
    pub fn latest(&self) -> Age {
        Age(self.latest.load(Ordering::Acquire))
    }

    /// Rewinds the clock so the next age is the first one after
    /// [`Age::BEFORE_TIME`].
    ///
    /// Only meaningful when nothing still holds ages from before the reset.
    pub fn reset(&self) {
        self.latest.store(Age::BEFORE_TIME.0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use alloc::vec::Vec;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ages_are_strictly_increasing() {
        let clock = AgeClock::new();
        let a1 = clock.now();
        let a2 = clock.now();
        let a3 = clock.now();
        assert!(a1 < a2, "later age must compare greater");
        assert!(a2 < a3, "later age must compare greater");
        assert_eq!(clock.latest(), a3);
    }

    #[test]
    fn before_time_is_oldest() {
        let clock = AgeClock::new();
        assert_eq!(clock.latest(), Age::BEFORE_TIME);
        assert!(Age::BEFORE_TIME.is_older_than(clock.now()));
        assert_eq!(Age::default(), Age::BEFORE_TIME);
    }

    #[test]
    fn reset_rewinds() {
        let clock = AgeClock::new();
        let first = clock.now();
        let _ = clock.now();
        clock.reset();
        assert_eq!(clock.now(), first);
    }

    #[test]
    fn concurrent_ages_are_unique() {
        let clock = Arc::new(AgeClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..250).map(|_| clock.now().get()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
        assert_eq!(clock.latest().get(), 1000);
    }
}
