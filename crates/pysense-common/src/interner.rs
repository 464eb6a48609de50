//! String interning for identifier deduplication.
//!
//! Identifiers repeat constantly in source code (`self`, `__init__`, common
//! variable names), and name resolution compares them constantly. Interning
//! turns every comparison into a `u32` comparison and every hash into a
//! `u32` hash.
//!
//! The interner is shared between the parser and the inference session so
//! that atoms from different modules compare equal. Writes are idempotent:
//! interning the same string twice always yields the same [`Atom`], which is
//! what makes the shared map safe to use without coordination.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;

/// An interned string handle.
///
/// Atoms are only meaningful together with the [`Interner`] that produced
/// them. `Atom::NONE` is a sentinel for "no text" (e.g. non-leaf tree nodes).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl Atom {
    /// Sentinel for "no interned text".
    pub const NONE: Atom = Atom(u32::MAX);

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Atom(NONE)")
        } else {
            write!(f, "Atom({})", self.0)
        }
    }
}

/// A thread-shareable string interner.
///
/// The lookup map is a `DashMap` and the reverse table an `RwLock<Vec<_>>`;
/// both only ever grow, and an insert for an existing string is a no-op that
/// returns the previously allocated atom.
pub struct Interner {
    map: DashMap<Arc<str>, Atom>,
    strings: RwLock<Vec<Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            strings: RwLock::new(Vec::new()),
        }
    }

    /// Intern a string, returning its atom. Idempotent.
    pub fn intern(&self, text: &str) -> Atom {
        if let Some(existing) = self.map.get(text) {
            return *existing;
        }
        let arc: Arc<str> = Arc::from(text);
        // Entry API re-checks under the shard lock so concurrent interns of
        // the same string agree on one atom.
        *self.map.entry(arc.clone()).or_insert_with(|| {
            let mut strings = self.strings.write().unwrap();
            let atom = Atom(strings.len() as u32);
            strings.push(arc);
            atom
        })
    }

    /// Resolve an atom back to its text.
    ///
    /// Returns a cheap `Arc` clone; atoms from a different interner yield
    /// nonsense or panic, which is a caller bug.
    pub fn resolve(&self, atom: Atom) -> Arc<str> {
        debug_assert!(!atom.is_none(), "resolving Atom::NONE");
        self.strings.read().unwrap()[atom.0 as usize].clone()
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.strings.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let interner = Interner::new();
        let a = interner.intern("append");
        let b = interner.intern("append");
        let c = interner.intern("extend");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_resolve_round_trip() {
        let interner = Interner::new();
        let atom = interner.intern("__init__");
        assert_eq!(&*interner.resolve(atom), "__init__");
    }
}
