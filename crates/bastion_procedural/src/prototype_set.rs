//! # Candidate Sets
//!
//! Fixed-width bitsets over prototype indices.
//!
//! A cell's candidate set and every precomputed adjacency mask share this
//! representation, so propagation reduces to bitwise OR (union of allowed
//! neighbours) and AND (restricting a neighbour). The set is `Copy` and
//! never touches the heap.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Maximum number of prototypes a catalog may hold.
pub const MAX_PROTOTYPES: usize = 256;

const WORDS: usize = MAX_PROTOTYPES / 64;

/// Dense index of a prototype inside its catalog.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct PrototypeId(pub u16);

impl PrototypeId {
    /// Returns the index as `usize`.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PrototypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A set of prototype indices.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PrototypeSet {
    words: [u64; WORDS],
}

impl PrototypeSet {
    /// The empty set.
    pub const EMPTY: Self = Self { words: [0; WORDS] };

    /// The set `{0, 1, .., count - 1}`.
    #[must_use]
    pub fn first_n(count: usize) -> Self {
        let count = count.min(MAX_PROTOTYPES);
        let mut set = Self::EMPTY;
        for (w, word) in set.words.iter_mut().enumerate() {
            let lo = w * 64;
            if count >= lo + 64 {
                *word = u64::MAX;
            } else if count > lo {
                *word = (1u64 << (count - lo)) - 1;
            }
        }
        set
    }

    /// A set holding exactly `id`.
    #[inline]
    #[must_use]
    pub fn single(id: PrototypeId) -> Self {
        let mut set = Self::EMPTY;
        set.insert(id);
        set
    }

    /// Adds `id` to the set.
    #[inline]
    pub fn insert(&mut self, id: PrototypeId) {
        let i = id.index();
        self.words[i / 64] |= 1u64 << (i % 64);
    }

    /// Removes `id`. Returns true if it was present.
    #[inline]
    pub fn remove(&mut self, id: PrototypeId) -> bool {
        let i = id.index();
        let bit = 1u64 << (i % 64);
        let present = self.words[i / 64] & bit != 0;
        self.words[i / 64] &= !bit;
        present
    }

    /// Returns true if `id` is in the set.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: PrototypeId) -> bool {
        let i = id.index();
        self.words[i / 64] & (1u64 << (i % 64)) != 0
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns true if the set has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Members of `self` that are not in `other`.
    #[inline]
    #[must_use]
    pub fn difference(mut self, other: Self) -> Self {
        for (a, b) in self.words.iter_mut().zip(other.words) {
            *a &= !b;
        }
        self
    }

    /// Lowest member, if any.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<PrototypeId> {
        self.iter().next()
    }

    /// Members in ascending order.
    #[must_use]
    pub fn iter(&self) -> PrototypeIter {
        PrototypeIter {
            words: self.words,
            word: 0,
        }
    }
}

impl BitOr for PrototypeSet {
    type Output = Self;
    fn bitor(mut self, rhs: Self) -> Self {
        self |= rhs;
        self
    }
}

impl BitOrAssign for PrototypeSet {
    fn bitor_assign(&mut self, rhs: Self) {
        for (a, b) in self.words.iter_mut().zip(rhs.words) {
            *a |= b;
        }
    }
}

impl BitAnd for PrototypeSet {
    type Output = Self;
    fn bitand(mut self, rhs: Self) -> Self {
        self &= rhs;
        self
    }
}

impl BitAndAssign for PrototypeSet {
    fn bitand_assign(&mut self, rhs: Self) {
        for (a, b) in self.words.iter_mut().zip(rhs.words) {
            *a &= b;
        }
    }
}

impl FromIterator<PrototypeId> for PrototypeSet {
    fn from_iter<I: IntoIterator<Item = PrototypeId>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl<'a> IntoIterator for &'a PrototypeSet {
    type Item = PrototypeId;
    type IntoIter = PrototypeIter;
    fn into_iter(self) -> PrototypeIter {
        self.iter()
    }
}

impl fmt::Debug for PrototypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.0)).finish()
    }
}

/// Ascending iterator over a [`PrototypeSet`].
#[derive(Clone, Debug)]
pub struct PrototypeIter {
    words: [u64; WORDS],
    word: usize,
}

impl Iterator for PrototypeIter {
    type Item = PrototypeId;

    #[allow(clippy::cast_possible_truncation)]
    fn next(&mut self) -> Option<PrototypeId> {
        while self.word < WORDS {
            let bits = self.words[self.word];
            if bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                self.words[self.word] &= bits - 1;
                // Below MAX_PROTOTYPES, fits in u16.
                return Some(PrototypeId((self.word * 64 + bit) as u16));
            }
            self.word += 1;
        }
        None
    }
}
