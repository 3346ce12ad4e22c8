// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency addresses and de-duplicating dependency lists.

use core::fmt;

use smallvec::SmallVec;

use crate::intern::InternId;

/// Inline capacity of a [`Dependencies`] list.
///
/// Most fields are read by a handful of scripts at most.
const INLINE_CAPACITY: usize = 4;

/// The kind of script a [`Dependency`] points at.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyType {
    /// A script in a card field, for the same card only.
    CardField,
    /// A script in a card field, for every card.
    CardsField,
    /// A script in a set field.
    SetField,
    /// A scriptable property of a style; `data` names the stylesheet.
    Style,
    /// A script in a stylesheet-specific card field; `data` names the stylesheet.
    ExtraCardField,
    /// Copy the dependents of the card field at `index`.
    CardCopyDep,
    /// Copy the dependents of the set field at `index`.
    SetCopyDep,
    /// Only used to ask whether a script depends on anything at all.
    ///
    /// Never stored in a [`Dependencies`] list.
    Dummy,
}

/// Address of a piece of derived state that reads some mutable input.
///
/// Two dependencies are equal when their kind, index and data are all equal.
///
/// # Example
///
/// ```
/// use cardscript_dirty::{Dependency, DependencyType};
///
/// let per_card = Dependency::new(DependencyType::CardField, 3);
/// let all_cards = per_card.make_card_independent();
///
/// assert_eq!(all_cards.kind(), DependencyType::CardsField);
/// assert_eq!(all_cards.index(), 3);
/// assert_ne!(per_card, all_cards);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    kind: DependencyType,
    index: u32,
    data: Option<InternId>,
}

impl Dependency {
    /// Creates a dependency without extra data.
    #[must_use]
    pub const fn new(kind: DependencyType, index: u32) -> Self {
        Self {
            kind,
            index,
            data: None,
        }
    }

    /// Creates a dependency carrying an extra identifier (a stylesheet).
    #[must_use]
    pub const fn with_data(kind: DependencyType, index: u32, data: InternId) -> Self {
        Self {
            kind,
            index,
            data: Some(data),
        }
    }

    /// Creates the probing dependency used to test whether anything is read.
    #[must_use]
    pub const fn dummy() -> Self {
        Self::new(DependencyType::Dummy, 0)
    }

    /// Returns the kind of the dependent script.
    #[must_use]
    pub const fn kind(&self) -> DependencyType {
        self.kind
    }

    /// Returns the index of the dependent field or style.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the extra identifier, if any.
    #[must_use]
    pub const fn data(&self) -> Option<InternId> {
        self.data
    }

    /// Returns `true` for the probing [`DependencyType::Dummy`] kind.
    #[must_use]
    pub const fn is_dummy(&self) -> bool {
        matches!(self.kind, DependencyType::Dummy)
    }

    /// This dependency, but for all cards instead of just one.
    ///
    /// Only [`DependencyType::CardField`] changes; every other kind is already
    /// independent of the card being edited.
    #[must_use]
    pub const fn make_card_independent(self) -> Self {
        Self {
            kind: match self.kind {
                DependencyType::CardField => DependencyType::CardsField,
                other => other,
            },
            index: self.index,
            data: self.data,
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut t = f.debug_tuple("Dependency");
        t.field(&self.kind).field(&self.index);
        if let Some(data) = self.data {
            t.field(&data);
        }
        t.finish()
    }
}

/// A list of [`Dependency`] values without duplicates.
///
/// Insertion order is preserved so iteration is deterministic, but it carries
/// no meaning. [`DependencyType::Dummy`] entries are silently dropped.
///
/// # Example
///
/// ```
/// use cardscript_dirty::{Dependencies, Dependency, DependencyType};
///
/// let mut deps = Dependencies::new();
/// assert!(deps.add(Dependency::new(DependencyType::SetField, 0)));
/// assert!(!deps.add(Dependency::new(DependencyType::SetField, 0)));
/// assert!(!deps.add(Dependency::dummy()));
/// assert_eq!(deps.len(), 1);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    items: SmallVec<[Dependency; INLINE_CAPACITY]>,
}

impl Dependencies {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: SmallVec::new(),
        }
    }

    /// Adds a dependency unless it is already present or a dummy.
    ///
    /// Returns `true` if the list grew.
    pub fn add(&mut self, dep: Dependency) -> bool {
        if dep.is_dummy() || self.items.contains(&dep) {
            return false;
        }
        self.items.push(dep);
        true
    }

    /// Adds every dependency of `other`, keeping the no-duplicates invariant.
    ///
    /// Returns the number of dependencies that were new.
    pub fn merge(&mut self, other: &Self) -> usize {
        other.iter().filter(|dep| self.add(**dep)).count()
    }

    /// Returns `true` if `dep` is in the list.
    #[must_use]
    pub fn contains(&self, dep: &Dependency) -> bool {
        self.items.contains(dep)
    }

    /// Returns the number of dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no dependencies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> core::slice::Iter<'_, Dependency> {
        self.items.iter()
    }

    /// Returns the dependencies as a slice, in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[Dependency] {
        &self.items
    }

    /// Removes every dependency.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a Dependencies {
    type Item = &'a Dependency;
    type IntoIter = core::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Extend<Dependency> for Dependencies {
    fn extend<I: IntoIterator<Item = Dependency>>(&mut self, iter: I) {
        for dep in iter {
            self.add(dep);
        }
    }
}

impl FromIterator<Dependency> for Dependencies {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> Self {
        let mut deps = Self::new();
        deps.extend(iter);
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use alloc::vec::Vec;

    #[test]
    fn equality_uses_all_components() {
        let mut names = Interner::new();
        let a = names.intern("a").unwrap();
        let b = names.intern("b").unwrap();

        let d = Dependency::with_data(DependencyType::Style, 1, a);
        assert_eq!(d, Dependency::with_data(DependencyType::Style, 1, a));
        assert_ne!(d, Dependency::with_data(DependencyType::Style, 1, b));
        assert_ne!(d, Dependency::with_data(DependencyType::Style, 2, a));
        assert_ne!(d, Dependency::new(DependencyType::Style, 1));
    }

    #[test]
    fn duplicates_and_dummies_are_dropped() {
        let mut deps = Dependencies::new();
        let d = Dependency::new(DependencyType::CardField, 2);

        assert!(deps.add(d));
        assert!(!deps.add(d));
        assert_eq!(deps.len(), 1);

        assert!(!deps.add(Dependency::dummy()));
        assert!(!deps.add(Dependency::new(DependencyType::Dummy, 9)));
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn merge_counts_new_entries() {
        let mut a: Dependencies = [
            Dependency::new(DependencyType::SetField, 0),
            Dependency::new(DependencyType::SetField, 1),
        ]
        .into_iter()
        .collect();
        let b: Dependencies = [
            Dependency::new(DependencyType::SetField, 1),
            Dependency::new(DependencyType::CardsField, 4),
        ]
        .into_iter()
        .collect();

        assert_eq!(a.merge(&b), 1);
        assert_eq!(a.len(), 3);
        // Merging again is a no-op.
        assert_eq!(a.merge(&b), 0);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut deps = Dependencies::new();
        for i in [3, 1, 2, 1, 3] {
            deps.add(Dependency::new(DependencyType::CardField, i));
        }
        let order: Vec<u32> = deps.iter().map(Dependency::index).collect();
        assert_eq!(order, [3, 1, 2]);
    }

    #[test]
    fn card_independence_only_touches_card_fields() {
        let card = Dependency::new(DependencyType::CardField, 5);
        assert_eq!(card.make_card_independent().kind(), DependencyType::CardsField);

        let set = Dependency::new(DependencyType::SetField, 5);
        assert_eq!(set.make_card_independent(), set);
    }
}
