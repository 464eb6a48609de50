//! Shared parsed-module cache.
//!
//! Lives for the whole engine lifetime, across queries. Writes are
//! append-only and idempotent: parsing the same (name, source) twice
//! produces equivalent trees, so a lost race simply drops a duplicate.

use crate::parser::parse_module;
use crate::tree::Tree;
use dashmap::DashMap;
use pysense_common::interner::Interner;
use std::sync::Arc;

/// Cache key: the dotted module name.
pub struct SourceCache {
    interner: Arc<Interner>,
    trees: DashMap<String, Arc<Tree>>,
}

impl SourceCache {
    pub fn new(interner: Arc<Interner>) -> Self {
        Self {
            interner,
            trees: DashMap::new(),
        }
    }

    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// Parse (or fetch the cached parse of) a module source.
    pub fn parse(&self, dotted_name: &str, source: &str) -> Arc<Tree> {
        if let Some(existing) = self.trees.get(dotted_name) {
            return existing.clone();
        }
        let tree = Arc::new(parse_module(source, self.interner.clone()));
        self.trees
            .entry(dotted_name.to_string())
            .or_insert(tree)
            .clone()
    }

    pub fn get(&self, dotted_name: &str) -> Option<Arc<Tree>> {
        self.trees.get(dotted_name).map(|t| t.clone())
    }

    /// Drop a cached tree (e.g. the editor buffer changed). The next parse
    /// re-populates the entry.
    pub fn invalidate(&self, dotted_name: &str) {
        self.trees.remove(dotted_name);
    }

    /// Drop every cached tree (e.g. the active language version changed and
    /// version-selected sources may now differ).
    pub fn clear(&self) {
        self.trees.clear();
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_cached() {
        let cache = SourceCache::new(Arc::new(Interner::new()));
        let a = cache.parse("m", "x = 1\n");
        let b = cache.parse("m", "x = 1\n");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate() {
        let cache = SourceCache::new(Arc::new(Interner::new()));
        let a = cache.parse("m", "x = 1\n");
        cache.invalidate("m");
        let b = cache.parse("m", "x = 2\n");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
