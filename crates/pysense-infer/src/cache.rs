//! Per-query memoization.
//!
//! The evaluator memoizes (context, node) -> ValueSet. A key that is begun
//! but not finished marks an in-progress evaluation; re-entering it returns
//! the empty set instead of recursing forever. Both tables are cleared at
//! the start of every top-level query — memoized results depend on the
//! argument bindings and predefined names of that query.
//!
//! The same module hosts the per-(evaluation-function, node) call counters
//! backing the hard circuit breaker of `limits::MAX_VALUE_INFERS`.

use crate::context::ContextId;
use crate::value_set::ValueSet;
use pysense_common::limits;
use pysense_syntax::tree::NodeIndex;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Memoization slot state.
#[derive(Clone, Debug)]
pub enum Memo {
    InProgress,
    Done(ValueSet),
}

/// Which evaluation function a circuit-breaker counter belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EvalTag {
    InferNode,
    ExecuteFunction,
    ExecuteClass,
    GetAttribute,
    Iterate,
    DynamicParams,
    DynamicArrays,
}

#[derive(Default)]
pub struct QueryCache {
    memo: FxHashMap<(ContextId, NodeIndex), Memo>,
    infer_counts: FxHashMap<(EvalTag, u32), u32>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, context: ContextId, node: NodeIndex) -> Option<&Memo> {
        self.memo.get(&(context, node))
    }

    pub fn begin(&mut self, context: ContextId, node: NodeIndex) {
        self.memo.insert((context, node), Memo::InProgress);
    }

    pub fn finish(&mut self, context: ContextId, node: NodeIndex, result: ValueSet) {
        self.memo.insert((context, node), Memo::Done(result));
    }

    /// Drop an in-progress marker without storing a result (used when a
    /// guard denied the evaluation and the empty result must not stick).
    pub fn abandon(&mut self, context: ContextId, node: NodeIndex) {
        self.memo.remove(&(context, node));
    }

    /// Count one call of `tag` on a keyed site (node index or value id);
    /// false once the circuit breaker for that pair has tripped.
    pub fn count_infer(&mut self, tag: EvalTag, key: u32) -> bool {
        let count = self.infer_counts.entry((tag, key)).or_insert(0);
        *count += 1;
        if *count > limits::MAX_VALUE_INFERS {
            debug!(?tag, key, "value-infer circuit breaker tripped");
            return false;
        }
        true
    }

    /// Reset everything at the start of a new top-level query.
    pub fn clear(&mut self) {
        self.memo.clear();
        self.infer_counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_trips_per_node() {
        let mut cache = QueryCache::new();
        for _ in 0..limits::MAX_VALUE_INFERS {
            assert!(cache.count_infer(EvalTag::InferNode, 5));
        }
        assert!(!cache.count_infer(EvalTag::InferNode, 5));
        // A different node is unaffected.
        assert!(cache.count_infer(EvalTag::InferNode, 6));
        // A different evaluation function on the same node is unaffected.
        assert!(cache.count_infer(EvalTag::ExecuteFunction, 5));
    }
}
