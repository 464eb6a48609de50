//! Gradual typing: annotation evaluation and generic lowering.
//!
//! Annotations name types, so evaluating one yields classes which are then
//! instantiated. Subscripted annotations (`list[int]`, `Dict[str, int]`)
//! become parameterized classes whose instances iterate/index into their
//! generic arguments; the typing-module capitalized aliases lower onto the
//! builtin containers, and `Union`/`Optional` union their alternatives.

use crate::context::ContextId;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::{NodeIndex, Tree};

impl InferenceState {
    /// Evaluate an annotation expression and instantiate the named types.
    pub fn execute_annotation(&mut self, ctx: ContextId, annotation: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let types = self.infer_annotation_types(ctx, &tree, annotation);
        self.instances_of(&types)
    }

    /// Like [`execute_annotation`](Self::execute_annotation), but keeps the
    /// classes themselves (generics nest: `dict[str, list[int]]`).
    fn infer_annotation_types(
        &mut self,
        ctx: ContextId,
        tree: &Tree,
        annotation: NodeIndex,
    ) -> ValueSet {
        match tree.kind(annotation) {
            // A string annotation is a forward reference.
            SyntaxKind::Str => {
                let dotted = scope::clean_string_literal(&tree.text(annotation));
                self.values_from_dotted_string(ctx, &dotted)
            }
            SyntaxKind::AtomExpr => {
                if let Some(result) = self.typing_subscript(ctx, tree, annotation) {
                    return result;
                }
                self.infer_node(ctx, annotation)
            }
            SyntaxKind::Name => {
                // The capitalized typing aliases without arguments.
                match typing_alias_target(&tree.text(annotation)) {
                    Some(builtin) => {
                        let class = self.builtin_class(builtin);
                        ValueSet::single(class)
                    }
                    None => self.infer_node(ctx, annotation),
                }
            }
            _ => self.infer_node(ctx, annotation),
        }
    }

    /// Handle `Base[args]` annotations with typing-special bases. Returns
    /// None when the base is an ordinary expression.
    fn typing_subscript(
        &mut self,
        ctx: ContextId,
        tree: &Tree,
        atom_expr: NodeIndex,
    ) -> Option<ValueSet> {
        let children = tree.children(atom_expr);
        if children.len() != 2 {
            return None;
        }
        let base = children[0];
        if tree.kind(base) != SyntaxKind::Name {
            return None;
        }
        let trailer = children[1];
        let trailer_children = tree.children(trailer);
        if trailer_children.len() < 2 || !tree.leaf_is(trailer_children[0], "[") {
            return None;
        }
        let subscript = trailer_children[1];
        let base_name = tree.text(base);

        let argument_nodes: Vec<NodeIndex> = match tree.kind(subscript) {
            SyntaxKind::SubscriptList => tree.children(subscript).to_vec(),
            _ => vec![subscript],
        };

        match &*base_name {
            "Optional" => {
                let inner = argument_nodes
                    .first()
                    .map(|&node| self.infer_annotation_types(ctx, tree, node))
                    .unwrap_or(NO_VALUES);
                let none = self.create_simple_object(crate::arena::Literal::None);
                Some(inner.union(&ValueSet::single(none)))
            }
            "Union" => {
                let sets: Vec<ValueSet> = argument_nodes
                    .iter()
                    .map(|&node| self.infer_annotation_types(ctx, tree, node))
                    .collect();
                Some(ValueSet::from_sets(sets))
            }
            "Any" | "Callable" | "Type" => Some(NO_VALUES),
            other => {
                let class = match typing_alias_target(other) {
                    Some(builtin) => self.builtin_class(builtin),
                    None => return None,
                };
                let generics: Vec<ValueSet> = argument_nodes
                    .iter()
                    .map(|&node| self.infer_annotation_types(ctx, tree, node))
                    .collect();
                let applied = self.apply_generics(class, generics);
                Some(ValueSet::single(applied))
            }
        }
    }
}

/// The builtin container a typing alias stands for.
fn typing_alias_target(name: &str) -> Option<&'static str> {
    Some(match name {
        "List" | "MutableSequence" | "Sequence" | "Iterable" | "Iterator" => "list",
        "Dict" | "Mapping" | "MutableMapping" => "dict",
        "Set" | "MutableSet" => "set",
        "FrozenSet" => "frozenset",
        "Tuple" => "tuple",
        "Text" => "str",
        _ => return None,
    })
}
