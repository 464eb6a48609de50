//! Centralized limits and thresholds for the inference engine.
//!
//! This module provides shared constants for recursion depths and execution
//! budgets used throughout the codebase. Centralizing these values:
//! - Prevents duplicate definitions with inconsistent values
//! - Documents the rationale for each limit
//!
//! The engine is a best-effort fixpoint-style analysis over arbitrary user
//! code; these limits are what make it terminate in bounded time on
//! self-referential or combinatorial input, at the cost of precision on
//! exactly that input. Exceeding a limit silently truncates results for the
//! affected branch only (spec'd as "resource-limit reached", never an error).

/// Maximum statement-level recursion depth for one inference query.
///
/// Counts nested function executions on the evaluation stack. A chain of
/// calls deeper than this yields no further results for the innermost
/// branch.
///
/// ```python
/// def a(): return b()
/// def b(): return c()   # ... 15 levels of live execution, then empty
/// ```
pub const RECURSION_LIMIT: u32 = 15;

/// Hard budget for non-trivial function executions across one whole query.
///
/// Every tree-defined function execution counts against this; builtin
/// executions do not. Protects against wide fan-out where no single chain is
/// deep but the total amount of executed code explodes.
pub const TOTAL_FUNCTION_EXECUTION_LIMIT: u32 = 200;

/// Maximum number of times one specific `def` may be executed per query.
///
/// Catches functions that are re-executed from many call sites with
/// different argument sets (generic helpers, visitors).
pub const PER_FUNCTION_EXECUTION_LIMIT: u32 = 6;

/// Maximum number of times one specific `def` may appear recursively on the
/// execution stack.
///
/// Two levels is enough to unwind one non-trivial self-call; anything deeper
/// only repeats already-seen value sets.
pub const PER_FUNCTION_RECURSION_LIMIT: u32 = 2;

/// Circuit breaker for a single evaluation function on a single node.
///
/// Each (evaluation function, node) pair is counted per query; past this
/// threshold further calls short-circuit to the empty set. This is the last
/// line of defense against pathological fan-out (deeply self-referential
/// generic container code) that the structural guards above don't catch.
pub const MAX_VALUE_INFERS: u32 = 300;

/// Maximum nesting of dynamic-param call-site searches.
///
/// Searching call sites to infer a parameter can itself trigger inference
/// that searches call sites; one level of nesting is almost always where the
/// signal is.
pub const DYNAMIC_PARAMS_DEPTH_LIMIT: u32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_consistent() {
        // The per-function caps must be strictly tighter than the global
        // ones, otherwise they would never trigger.
        assert!(PER_FUNCTION_EXECUTION_LIMIT < TOTAL_FUNCTION_EXECUTION_LIMIT);
        assert!(PER_FUNCTION_RECURSION_LIMIT < RECURSION_LIMIT);
    }
}
