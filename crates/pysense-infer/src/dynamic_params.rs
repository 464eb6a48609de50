//! Dynamic parameter inference: when nobody handed us call arguments,
//! search the defining module for call sites of the function and union the
//! values each site passes.
//!
//! Bounded to the current module on purpose — a workspace-wide search is
//! not tractable per keystroke. The depth limit stops call-site searches
//! from recursively triggering further call-site searches; the execution
//! guards bound everything else.

use crate::arena::{ValueData, ValueId};
use crate::arguments::Arguments;
use crate::cache::EvalTag;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_common::limits;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::{NodeIndex, Tree};
use std::sync::Arc;
use tracing::debug;

impl InferenceState {
    /// Values for a parameter, unioned over every call site of `function`
    /// found in its module.
    pub(crate) fn dynamic_param_lookup(
        &mut self,
        function: ValueId,
        name_node: NodeIndex,
    ) -> ValueSet {
        if self.dynamic_params_depth >= limits::DYNAMIC_PARAMS_DEPTH_LIMIT {
            return NO_VALUES;
        }
        if !self.cache.count_infer(EvalTag::DynamicParams, function.0) {
            return NO_VALUES;
        }
        let executions = self.search_function_executions(function);
        if executions.is_empty() {
            return NO_VALUES;
        }
        debug!(?function, count = executions.len(), "dynamic param search");
        self.dynamic_params_depth += 1;
        let sets: Vec<ValueSet> = executions
            .iter()
            .map(|args| self.infer_param(function, name_node, Some(args.clone())))
            .collect();
        self.dynamic_params_depth -= 1;
        ValueSet::from_sets(sets)
    }

    /// Call sites in the defining module whose callee infers back to
    /// `function`.
    fn search_function_executions(&mut self, function: ValueId) -> Vec<Arguments> {
        let data = match self.value_data(function) {
            ValueData::Function(data) if !data.is_lambda => data,
            _ => return Vec::new(),
        };
        let Some(module) = self.context_module(data.parent_context) else {
            return Vec::new();
        };
        let tree = self.tree(module);
        let func_name = scope::funcdef_name(&tree, data.funcdef);
        let atom = tree.atom(func_name);
        let usages: Vec<NodeIndex> = tree.used_names(atom).to_vec();

        let mut executions = Vec::new();
        for usage in usages {
            if usage == func_name {
                continue;
            }
            let Some((callee_prefix, arglist)) = call_site_parts(&tree, usage) else {
                continue;
            };
            let usage_ctx = self.create_context(module, usage);
            let key = (module, usage);
            if !self.statement_guard.enter(key).is_entered() {
                continue;
            }
            let callee = self.infer_atom_expr_prefix(usage_ctx, callee_prefix);
            self.statement_guard.leave(key);
            for value in callee.iter() {
                match self.value_data(value) {
                    ValueData::Function(_) | ValueData::Decoratee(_) if value == function => {
                        executions.push(Arguments::Tree { context: usage_ctx, arglist });
                    }
                    ValueData::Decoratee(dec) if dec.original == function => {
                        executions.push(Arguments::Tree { context: usage_ctx, arglist });
                    }
                    ValueData::BoundMethod(bound) if bound.function == function => {
                        executions.push(Arguments::Instance {
                            instance: bound.instance,
                            inner: Arc::new(Arguments::Tree { context: usage_ctx, arglist }),
                        });
                    }
                    _ => {}
                }
            }
        }
        executions
    }
}

/// For a name leaf used as a callee: the AtomExpr prefix ending at the
/// name (inclusive) and the following call trailer's arglist.
///
/// Matches both `f(...)` and `obj.f(...)` shapes.
fn call_site_parts(
    tree: &Tree,
    usage: NodeIndex,
) -> Option<(Vec<NodeIndex>, Option<NodeIndex>)> {
    let parent = tree.parent(usage)?;
    let (atom_expr, usage_position) = match tree.kind(parent) {
        // `f(...)`: the name is the AtomExpr base.
        SyntaxKind::AtomExpr => (parent, 0usize),
        // `obj.f(...)`: the name sits in an attribute trailer.
        SyntaxKind::Trailer => {
            let trailer_children = tree.children(parent);
            if trailer_children.len() != 2 || !tree.leaf_is(trailer_children[0], ".") {
                return None;
            }
            let atom_expr = tree.parent(parent)?;
            if tree.kind(atom_expr) != SyntaxKind::AtomExpr {
                return None;
            }
            let position = tree.children(atom_expr).iter().position(|&c| c == parent)?;
            (atom_expr, position)
        }
        _ => return None,
    };
    let children = tree.children(atom_expr);
    if tree.kind(atom_expr) == SyntaxKind::AtomExpr && children.first() == Some(&usage) {
        // Simple call: next child must be the call trailer.
        let call = children.get(1)?;
        return extract_call(tree, *call).map(|arglist| (vec![usage], arglist));
    }
    let call = children.get(usage_position + 1)?;
    let arglist = extract_call(tree, *call)?;
    Some((children[..=usage_position].to_vec(), arglist))
}

/// The arglist of a `( ... )` trailer, None for an empty call.
fn extract_call(tree: &Tree, trailer: NodeIndex) -> Option<Option<NodeIndex>> {
    if tree.kind(trailer) != SyntaxKind::Trailer {
        return None;
    }
    let children = tree.children(trailer);
    let first = children.first()?;
    if !tree.leaf_is(*first, "(") {
        return None;
    }
    let arglist = children.get(1).copied().filter(|&c| !tree.leaf_is(c, ")"));
    Some(arglist)
}
