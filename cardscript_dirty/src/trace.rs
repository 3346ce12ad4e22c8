// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explaining why something was refreshed during a sweep.
//!
//! The scheduler does not store provenance by default. A [`SweepTrace`] hook
//! lets an embedder ask "why was this value re-evaluated?" after the fact;
//! [`OneParentRecorder`] keeps **one plausible cause path** per key (a
//! spanning forest), the first cause observed winning.

use alloc::vec::Vec;
use core::hash::Hash;

use hashbrown::{HashMap, HashSet};

use crate::dependency::Dependency;

/// The recorded cause of a refresh.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateCause<K> {
    /// The key was seeded directly by a mutation.
    Root,
    /// The key was enqueued because `because` changed.
    Because {
        /// The upstream key whose change caused the refresh.
        because: K,
        /// The registered dependency that linked the two.
        via: Dependency,
    },
}

/// A callback sink for sweep tracing.
pub trait SweepTrace<K> {
    /// Called for a key seeded directly by a mutation.
    fn root(&mut self, key: K);

    /// Called when `key` is enqueued because `because` changed.
    fn caused_by(&mut self, key: K, because: K, via: Dependency);
}

/// A trace that records nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTrace;

impl<K> SweepTrace<K> for NoTrace {
    #[inline]
    fn root(&mut self, _key: K) {}

    #[inline]
    fn caused_by(&mut self, _key: K, _because: K, _via: Dependency) {}
}

/// Records one parent pointer per refreshed key.
#[derive(Debug, Clone)]
pub struct OneParentRecorder<K>
where
    K: Copy + Eq + Hash,
{
    causes: HashMap<K, UpdateCause<K>>,
}

impl<K> Default for OneParentRecorder<K>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> OneParentRecorder<K>
where
    K: Copy + Eq + Hash,
{
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            causes: HashMap::new(),
        }
    }

    /// Clears all recorded causes.
    pub fn clear(&mut self) {
        self.causes.clear();
    }

    /// Returns the number of keys with a recorded cause.
    #[must_use]
    pub fn len(&self) -> usize {
        self.causes.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    /// Returns the recorded cause for `key`, if any.
    #[must_use]
    pub fn cause(&self, key: K) -> Option<UpdateCause<K>> {
        self.causes.get(&key).copied()
    }

    /// Returns one plausible path from a root to `key`, root first.
    ///
    /// Returns `None` if `key` has no recorded cause or the recorded parents
    /// loop back on themselves.
    #[must_use]
    pub fn explain_path(&self, key: K) -> Option<Vec<K>> {
        let mut out = Vec::new();
        let mut seen: HashSet<K> = HashSet::new();

        let mut current = key;
        loop {
            if !seen.insert(current) {
                return None;
            }
            out.push(current);

            match self.cause(current)? {
                UpdateCause::Root => break,
                UpdateCause::Because { because, .. } => current = because,
            }
        }

        out.reverse();
        Some(out)
    }
}

impl<K> SweepTrace<K> for OneParentRecorder<K>
where
    K: Copy + Eq + Hash,
{
    fn root(&mut self, key: K) {
        self.causes.entry(key).or_insert(UpdateCause::Root);
    }

    fn caused_by(&mut self, key: K, because: K, via: Dependency) {
        self.causes
            .entry(key)
            .or_insert(UpdateCause::Because { because, via });
    }
}
