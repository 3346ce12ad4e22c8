// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host objects, collections and the iteration protocol.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use cardscript_dirty::{Dependency, DependencySink, DependencySource};

use crate::error::{ScriptError, ScriptResult};
use crate::value::ScriptValue;

/// An object owned by the host application and exposed to scripts.
///
/// Objects are compared by identity. Only [`type_name`](Self::type_name) and
/// [`get_member`](Self::get_member) are required; everything else has a
/// conservative default.
pub trait ScriptObject: fmt::Debug {
    /// Name of the object's type, used in error messages.
    fn type_name(&self) -> &str;

    /// Looks up a named member.
    fn get_member(&self, name: &str) -> ScriptResult<ScriptValue>;

    /// The analysis counterpart of [`get_member`](Self::get_member).
    ///
    /// Registers with `sink` that the script addressed by `dep` reads the
    /// member, and returns an abstract stand-in for it. `name` is `None` when
    /// the member name is only known at run time; implementations must then
    /// assume that every member of this object may be read.
    fn dependency_member(
        &self,
        name: Option<&str>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        let _ = (dep, sink);
        name.and_then(|n| self.get_member(n).ok())
            .unwrap_or_else(ScriptValue::dummy)
    }

    /// Starts iterating over the object, if it is a collection.
    fn make_iterator(&self) -> ScriptResult<ScriptValue> {
        Err(ScriptError::NotIterable(self.type_name().into()))
    }

    /// The analysis counterpart of [`make_iterator`](Self::make_iterator).
    fn dependency_iterator(&self, dep: Dependency, sink: &mut dyn DependencySink) -> ScriptValue {
        let _ = (dep, sink);
        self.make_iterator().unwrap_or_else(|_| ScriptValue::dummy())
    }

    /// Number of items, for collection-like objects.
    fn item_count(&self) -> Option<usize> {
        None
    }

    /// The value this object stands for in conversions, if any.
    fn default_value(&self) -> Option<ScriptValue> {
        None
    }

    /// The host input this object stands for, if it is the analysis result of
    /// reading exactly one field.
    ///
    /// Functions that need to know *which* field an argument came from, not
    /// just its value, use this during analysis.
    fn dependency_source(&self) -> Option<DependencySource> {
        None
    }
}

/// The one-shot "next" protocol shared by every iterator.
pub trait ScriptIterator: fmt::Debug {
    /// Returns the next element, or `None` once exhausted.
    fn next_value(&mut self) -> Option<ScriptValue>;
}

/// Inclusive integer range, produced by `for x from a to b`.
#[derive(Clone, Debug)]
pub struct RangeIterator {
    pos: i64,
    end: i64,
}

impl RangeIterator {
    /// Iterates `start..=end`.
    #[must_use]
    pub fn new(start: i64, end: i64) -> Self {
        Self { pos: start, end }
    }
}

impl ScriptIterator for RangeIterator {
    fn next_value(&mut self) -> Option<ScriptValue> {
        if self.pos > self.end {
            return None;
        }
        let v = self.pos;
        self.pos = self.pos.saturating_add(1);
        if v == i64::MAX {
            self.end = i64::MIN;
        }
        Some(ScriptValue::Int(v))
    }
}

/// Iterates the items of a [`Collection`] in order.
#[derive(Clone, Debug)]
pub struct CollectionIterator {
    items: Rc<Collection>,
    pos: usize,
}

impl CollectionIterator {
    /// Starts at the first item.
    #[must_use]
    pub fn new(items: Rc<Collection>) -> Self {
        Self { items, pos: 0 }
    }
}

impl ScriptIterator for CollectionIterator {
    fn next_value(&mut self) -> Option<ScriptValue> {
        let v = self.items.get(self.pos)?.clone();
        self.pos += 1;
        Some(v)
    }
}

/// Iterates a fixed list of values once; used by host objects.
#[derive(Debug)]
pub struct ValuesIterator {
    items: std::vec::IntoIter<ScriptValue>,
}

impl ValuesIterator {
    /// Wraps `items` as a script iterator value.
    #[must_use]
    pub fn value(items: Vec<ScriptValue>) -> ScriptValue {
        ScriptValue::Iterator(Rc::new(RefCell::new(Self {
            items: items.into_iter(),
        })))
    }
}

impl ScriptIterator for ValuesIterator {
    fn next_value(&mut self) -> Option<ScriptValue> {
        self.items.next()
    }
}

/// An ordered collection whose items may also have keys.
///
/// List literals `[a, b]` produce unkeyed collections; `[k: v]` produces
/// keyed ones. Member access by a number indexes in order, by a name looks up
/// the key.
#[derive(Clone, Debug, Default)]
pub struct Collection {
    items: Vec<ScriptValue>,
    keys: Vec<Option<Rc<str>>>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an unkeyed item.
    pub fn push(&mut self, value: ScriptValue) {
        self.items.push(value);
        self.keys.push(None);
    }

    /// Appends an item under `key`.
    pub fn push_keyed(&mut self, key: impl Into<Rc<str>>, value: ScriptValue) {
        self.items.push(value);
        self.keys.push(Some(key.into()));
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ScriptValue> {
        self.items.get(index)
    }

    /// Returns the item stored under `key`.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&ScriptValue> {
        self.keys
            .iter()
            .position(|k| k.as_deref() == Some(key))
            .map(|i| &self.items[i])
    }

    /// Returns the key of the item at `index`, if it has one.
    #[must_use]
    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys.get(index)?.as_deref()
    }

    /// Iterates over the items in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScriptValue> {
        self.items.iter()
    }

    /// Member access: numbers index, anything else is a key.
    pub fn member(&self, name: &str) -> ScriptResult<ScriptValue> {
        if let Ok(index) = name.trim().parse::<i64>() {
            return usize::try_from(index)
                .ok()
                .and_then(|i| self.items.get(i))
                .cloned()
                .ok_or(ScriptError::IndexOutOfRange {
                    index,
                    len: self.items.len(),
                });
        }
        self.get_key(name)
            .cloned()
            .ok_or_else(|| ScriptError::NoMember {
                type_name: "collection".into(),
                name: name.into(),
            })
    }
}

impl FromIterator<ScriptValue> for Collection {
    fn from_iter<I: IntoIterator<Item = ScriptValue>>(iter: I) -> Self {
        let mut c = Self::new();
        for v in iter {
            c.push(v);
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive_and_one_shot() {
        let mut it = RangeIterator::new(1, 3);
        let got: Vec<_> = core::iter::from_fn(|| it.next_value()).collect();
        assert_eq!(got.len(), 3);
        assert!(matches!(got[2], ScriptValue::Int(3)));
        assert!(it.next_value().is_none());
    }

    #[test]
    fn empty_range() {
        assert!(RangeIterator::new(2, 1).next_value().is_none());
    }

    #[test]
    fn range_ending_at_max_terminates() {
        let mut it = RangeIterator::new(i64::MAX - 1, i64::MAX);
        assert!(it.next_value().is_some());
        assert!(it.next_value().is_some());
        assert!(it.next_value().is_none());
    }

    #[test]
    fn collection_members() {
        let mut c = Collection::new();
        c.push(ScriptValue::from("a"));
        c.push_keyed("name", ScriptValue::Int(7));

        assert!(matches!(c.member("1"), Ok(ScriptValue::Int(7))));
        assert!(matches!(c.member("name"), Ok(ScriptValue::Int(7))));
        assert_eq!(
            c.member("5").unwrap_err(),
            ScriptError::IndexOutOfRange { index: 5, len: 2 }
        );
        assert!(matches!(c.member("nope"), Err(ScriptError::NoMember { .. })));
        assert_eq!(c.key(1), Some("name"));
    }

    #[test]
    fn collection_iterator_yields_items_in_order() {
        let c: Collection = [1, 2, 3].into_iter().map(ScriptValue::Int).collect();
        let mut it = CollectionIterator::new(Rc::new(c));
        let mut sum = 0;
        while let Some(ScriptValue::Int(i)) = it.next_value() {
            sum = sum * 10 + i;
        }
        assert_eq!(sum, 123);
    }
}
