// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registries mapping a kind of mutation to the scripts that must be revisited.

use alloc::vec::Vec;
use core::hash::Hash;

use hashbrown::HashMap;

use crate::dependency::{Dependencies, Dependency};

/// A piece of mutable input that scripts can read.
///
/// When the input changes, every [`Dependency`] registered against its source
/// is stale.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencySource {
    /// The content of the card field with this index.
    CardField(u32),
    /// The content of the set field with this index.
    SetField(u32),
    /// The content of a stylesheet-specific card field with this index.
    ExtraCardField(u32),
    /// Membership (and identifying content) of the card list.
    Cards,
    /// The keyword list of the set.
    Keywords,
    /// Which stylesheet is active.
    StyleSheet,
}

impl DependencySource {
    /// Returns `true` if a change to this source is a change to card content.
    #[must_use]
    pub const fn is_card_content(self) -> bool {
        matches!(self, Self::CardField(_) | Self::ExtraCardField(_))
    }
}

/// Receives dependency marks while a script is analysed.
///
/// The analysis pass calls [`mark`](Self::mark) for every external read it
/// discovers, with `dep` naming the script being analysed.
pub trait DependencySink {
    /// Records that the script addressed by `dep` reads `source`.
    fn mark(&mut self, source: DependencySource, dep: Dependency);
}

impl<S: DependencySink + ?Sized> DependencySink for &mut S {
    fn mark(&mut self, source: DependencySource, dep: Dependency) {
        (**self).mark(source, dep);
    }
}

/// Map from [`DependencySource`] to its de-duplicated dependents.
///
/// A registry is built once, by analysing every script of its owner, and is
/// read only afterwards until the owner is reloaded.
///
/// # Example
///
/// ```
/// use cardscript_dirty::{
///     Dependency, DependencyRegistry, DependencySink, DependencySource, DependencyType,
/// };
///
/// let mut registry = DependencyRegistry::new();
/// let f2 = Dependency::new(DependencyType::CardField, 2);
///
/// registry.mark(DependencySource::CardField(1), f2);
/// registry.mark(DependencySource::CardField(1), f2);
///
/// assert_eq!(registry.dependents(DependencySource::CardField(1)), &[f2]);
/// assert!(registry.dependents(DependencySource::Keywords).is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct DependencyRegistry {
    dependents: HashMap<DependencySource, Dependencies>,
}

impl DependencyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dependents: HashMap::new(),
        }
    }

    /// Registers `dep` as a dependent of `source`.
    ///
    /// Returns `true` if this is a new entry. Dummy dependencies are ignored.
    pub fn add(&mut self, source: DependencySource, dep: Dependency) -> bool {
        if dep.is_dummy() {
            return false;
        }
        self.dependents.entry(source).or_default().add(dep)
    }

    /// Returns the dependents of `source`, in registration order.
    #[must_use]
    pub fn dependents(&self, source: DependencySource) -> &[Dependency] {
        self.dependents
            .get(&source)
            .map(Dependencies::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the dependents of `source` as a list, if any were registered.
    #[must_use]
    pub fn get(&self, source: DependencySource) -> Option<&Dependencies> {
        self.dependents.get(&source)
    }

    /// Returns every source with at least one dependent, in sorted order.
    #[must_use]
    pub fn sources(&self) -> Vec<DependencySource> {
        let mut out: Vec<_> = self
            .dependents
            .iter()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(source, _)| *source)
            .collect();
        out.sort_unstable();
        out
    }

    /// Returns the total number of registered `(source, dependent)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependents.values().map(Dependencies::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependents.values().all(Dependencies::is_empty)
    }

    /// Removes every entry, ready for a wholesale rebuild.
    pub fn clear(&mut self) {
        self.dependents.clear();
    }
}

impl DependencySink for DependencyRegistry {
    fn mark(&mut self, source: DependencySource, dep: Dependency) {
        self.add(source, dep);
    }
}

/// A sink that only remembers which sources were read.
///
/// Used to ask "does this script read anything at all?" by analysing it with
/// [`Dependency::dummy`], which registries would drop.
#[derive(Clone, Debug, Default)]
pub struct ProbeSink {
    touched: Vec<DependencySource>,
}

impl ProbeSink {
    /// Creates an empty probe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            touched: Vec::new(),
        }
    }

    /// Returns the sources read so far, without duplicates.
    #[must_use]
    pub fn touched(&self) -> &[DependencySource] {
        &self.touched
    }

    /// Returns `true` if any source was read.
    #[must_use]
    pub fn touched_any(&self) -> bool {
        !self.touched.is_empty()
    }

    /// Returns `true` if any card content was read.
    #[must_use]
    pub fn reads_card_content(&self) -> bool {
        self.touched.iter().any(|s| s.is_card_content())
    }
}

impl DependencySink for ProbeSink {
    fn mark(&mut self, source: DependencySource, _dep: Dependency) {
        if !self.touched.contains(&source) {
            self.touched.push(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::DependencyType;
    use alloc::vec;

    #[test]
    fn marks_are_deduplicated_per_source() {
        let mut r = DependencyRegistry::new();
        let d = Dependency::new(DependencyType::SetField, 0);

        assert!(r.add(DependencySource::Cards, d));
        assert!(!r.add(DependencySource::Cards, d));
        assert!(r.add(DependencySource::Keywords, d));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn dummy_marks_never_stored() {
        let mut r = DependencyRegistry::new();
        r.mark(DependencySource::CardField(0), Dependency::dummy());
        assert!(r.is_empty());
        assert!(r.sources().is_empty());
    }

    #[test]
    fn sources_are_sorted() {
        let mut r = DependencyRegistry::new();
        let d = Dependency::new(DependencyType::CardField, 9);
        r.mark(DependencySource::Keywords, d);
        r.mark(DependencySource::CardField(3), d);
        r.mark(DependencySource::CardField(1), d);

        assert_eq!(
            r.sources(),
            vec![
                DependencySource::CardField(1),
                DependencySource::CardField(3),
                DependencySource::Keywords,
            ]
        );
    }

    #[test]
    fn probe_sees_dummy_reads() {
        let mut probe = ProbeSink::new();
        assert!(!probe.touched_any());

        probe.mark(DependencySource::StyleSheet, Dependency::dummy());
        assert!(probe.touched_any());
        assert!(!probe.reads_card_content());

        probe.mark(DependencySource::CardField(2), Dependency::dummy());
        probe.mark(DependencySource::CardField(2), Dependency::dummy());
        assert!(probe.reads_card_content());
        assert_eq!(probe.touched().len(), 2);
    }

    #[test]
    fn sink_through_mutable_reference() {
        fn analyse(mut sink: impl DependencySink) {
            sink.mark(
                DependencySource::SetField(4),
                Dependency::new(DependencyType::SetField, 5),
            );
        }
        let mut r = DependencyRegistry::new();
        analyse(&mut r);
        assert_eq!(r.dependents(DependencySource::SetField(4)).len(), 1);
    }
}
