// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interning of owned identities into compact ids.
//!
//! [`Dependency`](crate::Dependency) is `Copy` and compared by value, so the
//! extra data it carries (which stylesheet a style or extra card field lives
//! in) must be a small handle rather than an owned name. An [`Interner`] maps
//! those owned names to [`InternId`]s and back.
//!
//! ## Example
//!
//! ```rust
//! use cardscript_dirty::intern::Interner;
//! use cardscript_dirty::{Dependency, DependencyType};
//!
//! let mut stylesheets = Interner::<String>::new();
//! let normal = stylesheets.intern("normal".to_string()).unwrap();
//! let again = stylesheets.intern("normal".to_string()).unwrap();
//! assert_eq!(normal, again);
//!
//! let dep = Dependency::with_data(DependencyType::Style, 2, normal);
//! assert_eq!(stylesheets.get(dep.data().unwrap()).unwrap(), "normal");
//! ```

use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

use hashbrown::DefaultHashBuilder;
use hashbrown::HashMap;

/// A compact, interned identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct InternId(u32);

impl InternId {
    /// Returns this id as a `usize` index (for tables keyed by intern ids).
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw numeric id.
    #[inline]
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Returned by [`Interner::intern`] once `u32::MAX` keys are stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InternerFull;

impl fmt::Display for InternerFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("too many interned keys for a 32-bit id")
    }
}

impl core::error::Error for InternerFull {}

/// Interns owned keys into compact [`InternId`] handles.
///
/// Keys are stored once. Lookups go through a hash-bucket index
/// (hash -> candidate ids) so no second copy of a key is kept.
#[derive(Debug, Clone)]
pub struct Interner<K> {
    keys: Vec<K>,
    buckets: HashMap<u64, Vec<InternId>>,
    build_hasher: DefaultHashBuilder,
}

impl<K> Default for Interner<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Interner<K>
where
    K: Eq + Hash,
{
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            buckets: HashMap::new(),
            build_hasher: DefaultHashBuilder::default(),
        }
    }

    /// Returns the number of interned keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the interner contains no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the key for an interned id, if the id is in range.
    #[must_use]
    pub fn get(&self, id: InternId) -> Option<&K> {
        self.keys.get(id.as_usize())
    }

    /// Returns the id of an already interned key without inserting it.
    #[must_use]
    pub fn lookup<Q>(&self, key: &Q) -> Option<InternId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.build_hasher.hash_one(key);
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|id| <K as Borrow<Q>>::borrow(&self.keys[id.as_usize()]) == key)
    }

    /// Interns `key` and returns its [`InternId`].
    ///
    /// If an equal key was already interned, the existing id is returned and
    /// `key` is dropped.
    pub fn intern(&mut self, key: K) -> Result<InternId, InternerFull> {
        if let Some(id) = self.lookup(&key) {
            return Ok(id);
        }
        let hash = self.build_hasher.hash_one(&key);
        let id = InternId(u32::try_from(self.keys.len()).map_err(|_| InternerFull)?);
        self.keys.push(key);
        self.buckets.entry(hash).or_default().push(id);
        Ok(id)
    }

    /// Iterates over `(id, key)` pairs in interning order.
    pub fn iter(&self) -> impl Iterator<Item = (InternId, &K)> + '_ {
        self.keys.iter().enumerate().map(|(i, k)| {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "intern refuses to store more than u32::MAX keys"
            )]
            let id = InternId(i as u32);
            (id, k)
        })
    }

    /// Clears all interned keys.
    ///
    /// Every previously returned id becomes invalid.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::{String, ToString};

    #[test]
    fn interns_duplicates_to_same_id() {
        let mut i = Interner::<String>::new();
        let a0 = i.intern("a".to_string()).unwrap();
        let a1 = i.intern("a".to_string()).unwrap();
        let b = i.intern("b".to_string()).unwrap();

        assert_eq!(a0, a1);
        assert_ne!(a0, b);
        assert_eq!(i.len(), 2);
        assert_eq!(i.get(b).map(String::as_str), Some("b"));
    }

    #[test]
    fn lookup_by_borrowed_form() {
        let mut i = Interner::<String>::new();
        let id = i.intern("normal".to_string()).unwrap();
        assert_eq!(i.lookup("normal"), Some(id));
        assert_eq!(i.lookup("missing"), None);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut i = Interner::<String>::new();
        let id = i.intern("x".to_string()).unwrap();
        i.clear();
        assert!(i.is_empty());
        assert!(i.get(id).is_none());
    }
}
