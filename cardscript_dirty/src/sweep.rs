// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Breadth-first work queue for one update sweep.

use alloc::collections::VecDeque;

use crate::age::Age;

/// Counters collected during one [`Sweep`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Items pushed onto the queue.
    pub enqueued: usize,
    /// Items whose script was re-run.
    pub evaluated: usize,
    /// Items skipped because they were already fresh in this sweep.
    pub skipped: usize,
    /// Evaluated items whose rendered form changed.
    pub changed: usize,
}

impl SweepStats {
    /// Adds the counters of `other` to `self`.
    pub fn accumulate(&mut self, other: &Self) {
        self.enqueued += other.enqueued;
        self.evaluated += other.evaluated;
        self.skipped += other.skipped;
        self.changed += other.changed;
    }
}

/// The queue of one update sweep together with its starting age.
///
/// Items are processed first in, first out. An item whose age is not older
/// than [`starting_age`](Self::starting_age) was already refreshed during this
/// sweep and must be skipped; this is what keeps diamonds from re-evaluating
/// their apex twice and cycles from looping forever.
///
/// # Example
///
/// ```
/// use cardscript_dirty::{AgeClock, Sweep};
///
/// let clock = AgeClock::new();
/// let stale = clock.now();
///
/// let mut sweep = Sweep::new(clock.now());
/// sweep.push("b");
/// sweep.push("a");
///
/// let mut seen = Vec::new();
/// while let Some(item) = sweep.pop() {
///     seen.push(item);
/// }
/// assert_eq!(seen, ["b", "a"]);
///
/// assert!(!sweep.is_fresh(stale));
/// assert!(sweep.is_fresh(clock.now()));
/// ```
#[derive(Debug)]
pub struct Sweep<T> {
    starting_age: Age,
    queue: VecDeque<T>,
    stats: SweepStats,
}

impl<T> Sweep<T> {
    /// Starts a sweep. `starting_age` must be taken before anything in it is
    /// evaluated.
    #[must_use]
    pub fn new(starting_age: Age) -> Self {
        Self {
            starting_age,
            queue: VecDeque::new(),
            stats: SweepStats::default(),
        }
    }

    /// Returns the age the sweep started at.
    #[must_use]
    pub fn starting_age(&self) -> Age {
        self.starting_age
    }

    /// Returns `true` if something stamped with `age` was refreshed during
    /// this sweep.
    #[must_use]
    pub fn is_fresh(&self, age: Age) -> bool {
        age >= self.starting_age
    }

    /// Appends an item to the back of the queue.
    pub fn push(&mut self, item: T) {
        self.stats.enqueued += 1;
        self.queue.push_back(item);
    }

    /// Takes the item at the front of the queue.
    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    /// Returns the number of pending items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` once the queue has drained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Counts an item whose script was re-run.
    pub fn record_evaluated(&mut self, changed: bool) {
        self.stats.evaluated += 1;
        if changed {
            self.stats.changed += 1;
        }
    }

    /// Counts an item skipped because it was already fresh.
    pub fn record_skipped(&mut self) {
        self.stats.skipped += 1;
    }

    /// Returns the counters collected so far.
    #[must_use]
    pub fn stats(&self) -> SweepStats {
        self.stats
    }
}

impl<T> Extend<T> for Sweep<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
