//! `ValueSet` — the algebraic container the whole engine computes with.
//!
//! A value set is an immutable, deduplicated, flat collection of value ids
//! representing "all possible values this expression could produce". The
//! empty set is the distinguished "nothing could be inferred" result — it is
//! not an error, and it is different from an inferred `None`.
//!
//! Sets are kept sorted, which gives O(1) equality on identical sets, cheap
//! hashing, and deterministic iteration order for tests and completion
//! output.

use crate::arena::ValueId;
use smallvec::SmallVec;
use std::fmt;

/// An immutable, deduplicated set of values.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ValueSet {
    // Sorted and unique. Most sets carry one or two values.
    elements: SmallVec<[ValueId; 4]>,
}

/// The empty set: "nothing could be inferred".
pub const NO_VALUES: ValueSet = ValueSet {
    elements: SmallVec::new_const(),
};

impl ValueSet {
    pub fn empty() -> Self {
        NO_VALUES
    }

    pub fn single(value: ValueId) -> Self {
        Self {
            elements: SmallVec::from_slice(&[value]),
        }
    }

    /// Build from any iterator of ids; dedupes and sorts.
    ///
    /// The flatness invariant of the original design holds by construction:
    /// elements are ids, a set can never contain a set.
    pub fn from_iter(values: impl IntoIterator<Item = ValueId>) -> Self {
        let mut elements: SmallVec<[ValueId; 4]> = values.into_iter().collect();
        elements.sort_unstable();
        elements.dedup();
        Self { elements }
    }

    /// Flatten an iterable of sets into one (`ValueSet.from_sets`).
    pub fn from_sets(sets: impl IntoIterator<Item = ValueSet>) -> Self {
        Self::from_iter(sets.into_iter().flat_map(|s| s.elements))
    }

    pub fn union(&self, other: &ValueSet) -> ValueSet {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Self::from_iter(self.iter().chain(other.iter()))
    }

    pub fn intersect(&self, other: &ValueSet) -> ValueSet {
        Self::from_iter(self.iter().filter(|v| other.contains(*v)))
    }

    pub fn contains(&self, value: ValueId) -> bool {
        self.elements.binary_search(&value).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.elements.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Keep only elements satisfying the predicate.
    pub fn filter(&self, mut predicate: impl FnMut(ValueId) -> bool) -> ValueSet {
        Self::from_iter(self.iter().filter(|&v| predicate(v)))
    }

    /// Broadcast an operation producing a set per element and re-flatten.
    ///
    /// This is the mechanism that keeps higher-level algorithms set-based
    /// without explicit loops at every call site.
    pub fn map_union(&self, mut op: impl FnMut(ValueId) -> ValueSet) -> ValueSet {
        Self::from_sets(self.iter().map(|v| op(v)))
    }
}

impl FromIterator<ValueId> for ValueSet {
    fn from_iter<T: IntoIterator<Item = ValueId>>(iter: T) -> Self {
        ValueSet::from_iter(iter)
    }
}

impl IntoIterator for &ValueSet {
    type Item = ValueId;
    type IntoIter = smallvec::IntoIter<[ValueId; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.clone().into_iter()
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{{")?;
        for (i, v) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v:?}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u32]) -> ValueSet {
        ValueSet::from_iter(ids.iter().map(|&i| ValueId(i)))
    }

    #[test]
    fn test_union_is_idempotent() {
        let a = set(&[1, 2]);
        let b = set(&[2, 3]);
        let ab = a.union(&b);
        assert_eq!(ab.union(&b), ab);
        assert_eq!(ab, set(&[1, 2, 3]));
    }

    #[test]
    fn test_intersect_self_is_identity() {
        let a = set(&[4, 7, 9]);
        assert_eq!(a.intersect(&a), a);
    }

    #[test]
    fn test_from_sets_flattens_and_dedupes() {
        let merged = ValueSet::from_sets([set(&[1, 2]), set(&[2, 3]), NO_VALUES]);
        assert_eq!(merged, set(&[1, 2, 3]));
    }

    #[test]
    fn test_empty_is_falsy_and_distinct() {
        assert!(NO_VALUES.is_empty());
        assert_ne!(NO_VALUES, set(&[0]));
    }

    #[test]
    fn test_map_union_broadcast() {
        let doubled = set(&[1, 2]).map_union(|v| ValueSet::single(ValueId(v.0 * 10)));
        assert_eq!(doubled, set(&[10, 20]));
    }
}
