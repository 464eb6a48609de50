//! Deferred value producers.
//!
//! A `LazyValue` is a not-yet-materialized `ValueSet`: either something
//! already known, or a (context, node) pair evaluated on demand through the
//! memoized evaluator, or a merge of several lazy values. Cardinality hints
//! (`min`/`max`) propagate through argument unpacking: a `*args` element may
//! stand for zero to unboundedly many positional values.

use crate::context::ContextId;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_syntax::tree::NodeIndex;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LazyKind {
    /// Already-known set.
    Known(ValueSet),
    /// Nothing is known; infers to the empty set.
    Unknown,
    /// Evaluate `node` in `context` on demand (memoized by the evaluator).
    Tree { context: ContextId, node: NodeIndex },
    /// Union of several lazy values.
    Merged(Arc<[LazyValue]>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LazyValue {
    pub kind: LazyKind,
    /// Minimum number of runtime values this stands for.
    pub min: u32,
    /// Maximum number; `u32::MAX` means unbounded.
    pub max: u32,
}

impl LazyValue {
    pub fn known(set: ValueSet) -> Self {
        Self { kind: LazyKind::Known(set), min: 1, max: 1 }
    }

    pub fn unknown() -> Self {
        Self { kind: LazyKind::Unknown, min: 1, max: 1 }
    }

    /// An unknown stretch of values, e.g. what a bare `*args` contributes.
    pub fn unknown_many() -> Self {
        Self { kind: LazyKind::Unknown, min: 0, max: u32::MAX }
    }

    pub fn tree(context: ContextId, node: NodeIndex) -> Self {
        Self { kind: LazyKind::Tree { context, node }, min: 1, max: 1 }
    }

    pub fn merged(parts: impl IntoIterator<Item = LazyValue>) -> Self {
        let parts: Arc<[LazyValue]> = parts.into_iter().collect();
        if parts.len() == 1 {
            return parts[0].clone();
        }
        let min = parts.iter().map(|p| p.min).min().unwrap_or(0);
        let max = parts
            .iter()
            .map(|p| p.max)
            .fold(0u32, |acc, m| acc.saturating_add(m));
        Self { kind: LazyKind::Merged(parts), min, max }
    }

    pub fn with_cardinality(mut self, min: u32, max: u32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Materialize. Idempotent: tree evaluation goes through the memoized
    /// evaluator, so repeated calls return the cached set.
    pub fn infer(&self, state: &mut InferenceState) -> ValueSet {
        match &self.kind {
            LazyKind::Known(set) => set.clone(),
            LazyKind::Unknown => NO_VALUES,
            LazyKind::Tree { context, node } => state.infer_node(*context, *node),
            LazyKind::Merged(parts) => {
                ValueSet::from_sets(parts.iter().map(|p| p.infer(state)).collect::<Vec<_>>())
            }
        }
    }
}
