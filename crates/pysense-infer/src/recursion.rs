//! Recursion and resource guards.
//!
//! Two cooperating mechanisms keep an otherwise-unbounded fixpoint-style
//! analysis terminating in bounded time:
//!
//! 1. **Statement guard** — a visiting set of (module, node) pairs currently
//!    being inferred. Re-entering the same statement on the same path is a
//!    cycle; the re-entrant call yields the empty set instead of looping.
//! 2. **Execution guard** — counters over function executions: a global
//!    budget for the whole query, a per-funcdef execution cap, a
//!    per-funcdef recursion cap, and an overall nesting depth cap.
//!
//! Exceeding any cap short-circuits *that branch only* to "no further
//! results"; sibling branches keep going. None of this is an error (spec
//! category: resource-limit reached).

use crate::arena::ModuleId;
use pysense_common::limits;
use pysense_syntax::tree::NodeIndex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Key of one guarded tree location.
pub type NodeKey = (ModuleId, NodeIndex);

/// Result of attempting to enter a guarded computation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EnterResult {
    /// Proceed; the caller must `leave()` when done.
    Entered,
    /// Already on the evaluation stack — cycle detected.
    Cycle,
    /// A resource cap was hit; yield no further results for this branch.
    LimitReached,
}

impl EnterResult {
    #[inline]
    pub fn is_entered(self) -> bool {
        matches!(self, Self::Entered)
    }
}

// ---------------------------------------------------------------------------
// Statement guard
// ---------------------------------------------------------------------------

/// Detects statement-level self-reference (`x = x`, mutually recursive
/// assignments) by tracking which nodes are on the evaluation stack.
#[derive(Default)]
pub struct RecursionDetector {
    pushed: FxHashSet<NodeKey>,
}

impl RecursionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to enter `key`. On `Entered` the caller must call
    /// [`leave`](Self::leave) with the same key.
    pub fn enter(&mut self, key: NodeKey) -> EnterResult {
        if self.pushed.contains(&key) {
            debug!(?key, "statement recursion detected");
            return EnterResult::Cycle;
        }
        self.pushed.insert(key);
        EnterResult::Entered
    }

    pub fn leave(&mut self, key: NodeKey) {
        let was_present = self.pushed.remove(&key);
        debug_assert!(
            was_present,
            "RecursionDetector::leave() without a matching enter()"
        );
    }

    pub fn is_visiting(&self, key: &NodeKey) -> bool {
        self.pushed.contains(key)
    }

    pub fn clear(&mut self) {
        self.pushed.clear();
    }
}

// ---------------------------------------------------------------------------
// Execution guard
// ---------------------------------------------------------------------------

/// Bounds function executions per query.
#[derive(Default)]
pub struct ExecutionRecursionDetector {
    recursion_level: u32,
    parent_execution_funcs: Vec<NodeKey>,
    funcdef_execution_counts: FxHashMap<NodeKey, u32>,
    execution_count: u32,
}

impl ExecutionRecursionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to enter an execution of `funcdef`.
    ///
    /// `is_builtin` executions (stub/builtin module functions) are exempt
    /// from the per-funcdef cap: they are cheap, widely shared, and capping
    /// them would gut common-type inference.
    pub fn enter(&mut self, funcdef: NodeKey, is_builtin: bool) -> EnterResult {
        self.recursion_level += 1;
        self.parent_execution_funcs.push(funcdef);

        if self.recursion_level > limits::RECURSION_LIMIT {
            debug!(?funcdef, "recursion depth limit reached");
            return EnterResult::LimitReached;
        }
        if self.execution_count >= limits::TOTAL_FUNCTION_EXECUTION_LIMIT {
            return EnterResult::LimitReached;
        }
        self.execution_count += 1;

        let count = self.funcdef_execution_counts.entry(funcdef).or_insert(0);
        if *count >= limits::PER_FUNCTION_EXECUTION_LIMIT {
            if is_builtin {
                return EnterResult::Entered;
            }
            debug!(?funcdef, "per-function execution limit reached");
            return EnterResult::LimitReached;
        }
        *count += 1;

        let recursive_calls = self
            .parent_execution_funcs
            .iter()
            .filter(|&&f| f == funcdef)
            .count() as u32;
        if recursive_calls > limits::PER_FUNCTION_RECURSION_LIMIT {
            debug!(?funcdef, "per-function recursion limit reached");
            return EnterResult::LimitReached;
        }

        EnterResult::Entered
    }

    /// Must be called exactly once after every [`enter`](Self::enter),
    /// whatever it returned.
    pub fn leave(&mut self) {
        debug_assert!(
            !self.parent_execution_funcs.is_empty(),
            "ExecutionRecursionDetector::leave() without a matching enter()"
        );
        self.parent_execution_funcs.pop();
        self.recursion_level = self.recursion_level.saturating_sub(1);
    }

    pub fn clear(&mut self) {
        self.recursion_level = 0;
        self.parent_execution_funcs.clear();
        self.funcdef_execution_counts.clear();
        self.execution_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u32) -> NodeKey {
        (ModuleId(0), NodeIndex(n))
    }

    #[test]
    fn test_statement_cycle_detection() {
        let mut guard = RecursionDetector::new();
        assert!(guard.enter(key(1)).is_entered());
        assert_eq!(guard.enter(key(1)), EnterResult::Cycle);
        guard.leave(key(1));
        assert!(guard.enter(key(1)).is_entered());
        guard.leave(key(1));
    }

    #[test]
    fn test_per_function_execution_cap() {
        let mut guard = ExecutionRecursionDetector::new();
        let mut allowed = 0;
        for _ in 0..10 {
            if guard.enter(key(7), false).is_entered() {
                allowed += 1;
            }
            guard.leave();
        }
        assert_eq!(allowed, limits::PER_FUNCTION_EXECUTION_LIMIT);
    }

    #[test]
    fn test_recursive_nesting_cap() {
        let mut guard = ExecutionRecursionDetector::new();
        let mut depth = 0;
        // Simulate f calling itself without returning.
        while guard.enter(key(3), false).is_entered() {
            depth += 1;
            if depth > 50 {
                break;
            }
        }
        assert!(depth <= limits::PER_FUNCTION_RECURSION_LIMIT);
        for _ in 0..=depth {
            guard.leave();
        }
    }

    #[test]
    fn test_builtin_exemption() {
        let mut guard = ExecutionRecursionDetector::new();
        let mut allowed = 0;
        for _ in 0..20 {
            if guard.enter(key(9), true).is_entered() {
                allowed += 1;
            }
            guard.leave();
        }
        assert_eq!(allowed, 20);
    }
}
