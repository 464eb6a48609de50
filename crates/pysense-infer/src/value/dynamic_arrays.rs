//! Dynamic array additions: `arr.append(x)` call sites extend the inferred
//! contents of `arr`.
//!
//! If the contents of a list/set are requested somewhere, the current
//! module is checked for appearances of `.append`, `.insert`, `.extend`,
//! `.add` and `.update` whose receiver infers back to that very array; the
//! added values are folded into iteration results. Deliberately bounded to
//! the current module — this is already the most expensive heuristic in the
//! engine, and the recursion guards are what keep it affordable on slow
//! paths. Removals (`pop` and friends) are ignored.

use crate::arena::{ArrayModificationData, ValueData, ValueId};
use crate::cache::EvalTag;
use crate::context::ContextId;
use crate::lazy::LazyValue;
use crate::state::InferenceState;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::tree::NodeIndex;
use tracing::trace;

const ADDITION_METHODS: &[&str] = &["append", "insert", "extend", "add", "update"];

impl InferenceState {
    /// Lazy values added to `modification`'s wrapped array anywhere in its
    /// module.
    pub(crate) fn array_addition_lazies(&mut self, modification: ValueId) -> Vec<LazyValue> {
        let ValueData::ArrayModification(data) = self.value_data(modification) else {
            return Vec::new();
        };
        self.scan_array_additions(data.context, &[modification, data.inner])
    }

    /// Scan the module of `ctx` for addition call sites whose receiver
    /// infers to one of `targets`.
    pub(crate) fn scan_array_additions(
        &mut self,
        ctx: ContextId,
        targets: &[ValueId],
    ) -> Vec<LazyValue> {
        if !self.settings.dynamic_array_additions {
            return Vec::new();
        }
        let Some(module) = self.context_module(ctx) else {
            return Vec::new();
        };
        let tree = self.tree(module);
        let Some(&representative) = targets.first() else {
            return Vec::new();
        };
        if !self.cache.count_infer(EvalTag::DynamicArrays, representative.0) {
            return Vec::new();
        }

        let mut additions = Vec::new();
        for method in ADDITION_METHODS {
            let atom = self.intern(method);
            let usages: Vec<NodeIndex> = tree.used_names(atom).to_vec();
            for usage in usages {
                let Some((receiver_prefix, call_trailer)) = method_call_parts(&tree, usage)
                else {
                    continue;
                };
                let usage_ctx = self.create_context(module, usage);
                // Re-entrancy: inferring the receiver may iterate the very
                // array we are extending; the statement guard breaks the
                // loop.
                let key = (module, usage);
                if !self.statement_guard.enter(key).is_entered() {
                    continue;
                }
                let receiver = self.infer_atom_expr_prefix(usage_ctx, receiver_prefix);
                self.statement_guard.leave(key);
                if !targets.iter().any(|t| receiver.contains(*t)) {
                    continue;
                }
                trace!(method, ?usage, "found array addition");
                let args = call_argument_nodes(&tree, call_trailer);
                match *method {
                    "append" | "add" => {
                        if let Some(&value) = args.first() {
                            additions.push(LazyValue::tree(usage_ctx, value));
                        }
                    }
                    "insert" => {
                        if let Some(&value) = args.get(1) {
                            additions.push(LazyValue::tree(usage_ctx, value));
                        }
                    }
                    "extend" | "update" => {
                        if let Some(&value) = args.first() {
                            let sources = self.infer_node(usage_ctx, value);
                            let spliced: Vec<LazyValue> =
                                sources.iter().flat_map(|v| self.iterate(v)).collect();
                            if !spliced.is_empty() {
                                additions.push(
                                    LazyValue::merged(spliced).with_cardinality(0, u32::MAX),
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        additions
    }

    /// Wrap a freshly built list/set value so iteration sees tracked
    /// additions.
    pub(crate) fn with_array_modifications(
        &mut self,
        inner: ValueId,
        context: ContextId,
    ) -> ValueId {
        if !self.settings.dynamic_array_additions {
            return inner;
        }
        self.alloc_value(ValueData::ArrayModification(ArrayModificationData {
            inner,
            context,
        }))
    }
}

/// For a `<receiver>.method(...)` usage of a method name leaf: the
/// receiver prefix (AtomExpr children up to but excluding the method
/// trailer) and the call trailer.
///
/// Returns None unless the usage is exactly an attribute access followed
/// by a call.
fn method_call_parts(
    tree: &pysense_syntax::tree::Tree,
    method_name: NodeIndex,
) -> Option<(Vec<NodeIndex>, NodeIndex)> {
    let trailer = tree.parent(method_name)?;
    if tree.kind(trailer) != SyntaxKind::Trailer {
        return None;
    }
    let trailer_children = tree.children(trailer);
    if trailer_children.len() != 2 || !tree.leaf_is(trailer_children[0], ".") {
        return None;
    }
    let atom_expr = tree.parent(trailer)?;
    if tree.kind(atom_expr) != SyntaxKind::AtomExpr {
        return None;
    }
    let children = tree.children(atom_expr);
    let position = children.iter().position(|&c| c == trailer)?;
    let call_trailer = *children.get(position + 1)?;
    let call_children = tree.children(call_trailer);
    if call_children.is_empty() || !tree.leaf_is(call_children[0], "(") {
        return None;
    }
    Some((children[..position].to_vec(), call_trailer))
}

/// Positional argument expression nodes of a call trailer.
fn call_argument_nodes(
    tree: &pysense_syntax::tree::Tree,
    call_trailer: NodeIndex,
) -> Vec<NodeIndex> {
    let children = tree.children(call_trailer);
    let Some(&arglist) = children.get(1) else {
        return Vec::new();
    };
    match tree.kind(arglist) {
        SyntaxKind::Arglist => tree
            .children(arglist)
            .iter()
            .filter_map(|&argument| {
                let argument_children = tree.children(argument);
                match argument_children {
                    [value] => Some(*value),
                    _ => None,
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}
