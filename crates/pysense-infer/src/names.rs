//! Names: identifier bindings with lazy resolution.
//!
//! A `Name` binds a string to a source position and, on demand, to a value
//! set. Variants cover tree-defined names, parameters (with and without
//! call-site arguments), instance-bound names, module attributes, submodule
//! names, compiled members and synthetic/arbitrary names. `string_name` and
//! position are fixed at construction; resolution is deferred and memoized
//! through the evaluator caches.

use crate::arena::{ApiType, ValueData, ValueId};
use crate::arguments::Arguments;
use crate::context::ContextId;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_common::interner::Atom;
use pysense_common::position::Position;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::NodeIndex;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Name {
    /// A name bound somewhere in a syntax tree (assignment, def, class,
    /// import, for-target, ...). `context` owns further lookups.
    Tree { context: ContextId, name: NodeIndex },
    /// A function parameter, resolved against `arguments` when known and
    /// anonymously otherwise.
    Param {
        function: ValueId,
        name: NodeIndex,
        arguments: Option<Arguments>,
    },
    /// The first parameter of a method bound to an instance.
    BoundParam {
        instance: ValueId,
        function: ValueId,
        name: NodeIndex,
    },
    /// An attribute name assigned through `self.<name> = ...`.
    SelfAttr {
        instance: ValueId,
        class_context: ContextId,
        name: NodeIndex,
    },
    /// A class member seen through an instance; delegates to `inner` and
    /// rebinds functions/properties at resolution time.
    InstanceClassName { instance: ValueId, inner: Box<Name> },
    /// A name that points directly at a known value (module names, values
    /// produced by synthesized filters).
    Value {
        value: ValueId,
        string: Atom,
        name_node: Option<NodeIndex>,
    },
    /// `__name__`, `__doc__`, `__package__`, `__file__`.
    ModuleAttribute { module_value: ValueId, name: Atom },
    /// A submodule of a package, importable on access.
    SubModule { parent: ValueId, name: Atom },
    /// A member of a compiled/builtin value.
    Compiled { parent: ValueId, name: Atom },
    /// A synthetic name: keywords, string-derived dict keys.
    Arbitrary { name: Atom, api_type: ApiType },
}

impl InferenceState {
    pub fn name_atom(&self, name: &Name) -> Atom {
        match name {
            Name::Tree { context, name } => self.tree_atom(*context, *name),
            Name::Param { function, name, .. } | Name::BoundParam { function, name, .. } => {
                self.value_tree_atom(*function, *name)
            }
            Name::SelfAttr { class_context, name, .. } => self.tree_atom(*class_context, *name),
            Name::InstanceClassName { inner, .. } => self.name_atom(inner),
            Name::Value { string, .. } => *string,
            Name::ModuleAttribute { name, .. }
            | Name::SubModule { name, .. }
            | Name::Compiled { name, .. }
            | Name::Arbitrary { name, .. } => *name,
        }
    }

    pub fn name_string(&self, name: &Name) -> Arc<str> {
        self.resolve_atom(self.name_atom(name))
    }

    /// Source position of the binding; None for synthetic names, module
    /// start for module-level synthetics.
    pub fn name_start_pos(&self, name: &Name) -> Option<Position> {
        match name {
            Name::Tree { context, name } => {
                self.context_tree(*context).map(|t| t.start_pos(*name))
            }
            Name::Param { function, name, .. } | Name::BoundParam { function, name, .. } => self
                .value_context_tree(*function)
                .map(|t| t.start_pos(*name)),
            Name::SelfAttr { class_context, name, .. } => {
                self.context_tree(*class_context).map(|t| t.start_pos(*name))
            }
            Name::InstanceClassName { inner, .. } => self.name_start_pos(inner),
            Name::Value { name_node: Some(node), value, .. } => self
                .value_context_tree(*value)
                .map(|t| t.start_pos(*node)),
            Name::SubModule { .. } | Name::ModuleAttribute { .. } => {
                Some(Position::MODULE_START)
            }
            _ => None,
        }
    }

    pub fn name_api_type(&mut self, name: &Name) -> ApiType {
        match name {
            Name::Tree { context, name } => {
                let Some(tree) = self.context_tree(*context) else {
                    return ApiType::Statement;
                };
                match scope::get_definition(&tree, *name, false).map(|d| tree.kind(d)) {
                    Some(SyntaxKind::Funcdef) => ApiType::Function,
                    Some(SyntaxKind::Classdef) => ApiType::Class,
                    Some(SyntaxKind::ImportName) | Some(SyntaxKind::ImportFrom) => {
                        ApiType::Module
                    }
                    Some(SyntaxKind::Param) => ApiType::Param,
                    _ => ApiType::Statement,
                }
            }
            Name::Param { .. } | Name::BoundParam { .. } => ApiType::Param,
            Name::SelfAttr { .. } => ApiType::Statement,
            Name::InstanceClassName { inner, .. } => self.name_api_type(inner),
            Name::Value { value, .. } => self.api_type(*value),
            Name::ModuleAttribute { .. } => ApiType::Instance,
            Name::SubModule { .. } => ApiType::Module,
            Name::Compiled { parent, name } => self.compiled_member_api_type(*parent, *name),
            Name::Arbitrary { api_type, .. } => *api_type,
        }
    }

    /// The context further attribute/scope lookups run in.
    pub fn name_parent_context(&self, name: &Name) -> Option<ContextId> {
        match name {
            Name::Tree { context, .. } => Some(*context),
            Name::SelfAttr { class_context, .. } => Some(*class_context),
            Name::InstanceClassName { inner, .. } => self.name_parent_context(inner),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve a name to its value set. Lazy and memoized: tree resolution
    /// routes through the (context, node) evaluator cache.
    pub fn infer_name(&mut self, name: &Name) -> ValueSet {
        match name {
            Name::Tree { context, name } => self.tree_name_to_values(*context, *name),
            Name::Param { function, name, arguments } => {
                self.infer_param(*function, *name, arguments.clone())
            }
            Name::BoundParam { instance, .. } => ValueSet::single(*instance),
            Name::SelfAttr { instance, class_context, name } => {
                self.infer_self_attribute(*instance, *class_context, *name)
            }
            Name::InstanceClassName { instance, inner } => {
                let class_members = self.infer_name(inner);
                self.bind_to_instance(*instance, &class_members)
            }
            Name::Value { value, .. } => ValueSet::single(*value),
            Name::ModuleAttribute { module_value, name } => {
                self.infer_module_attribute(*module_value, *name)
            }
            Name::SubModule { parent, name } => self.infer_sub_module(*parent, *name),
            Name::Compiled { parent, name } => self.infer_compiled_member(*parent, *name),
            Name::Arbitrary { .. } => NO_VALUES,
        }
    }

    // -----------------------------------------------------------------------
    // Small helpers
    // -----------------------------------------------------------------------

    fn tree_atom(&self, ctx: ContextId, node: NodeIndex) -> Atom {
        self.context_tree(ctx)
            .map(|t| t.atom(node))
            .unwrap_or(Atom::NONE)
    }

    fn value_tree_atom(&self, value: ValueId, node: NodeIndex) -> Atom {
        self.value_context_tree(value)
            .map(|t| t.atom(node))
            .unwrap_or(Atom::NONE)
    }

    /// Tree of the module a (tree-backed) value lives in.
    pub(crate) fn value_context_tree(
        &self,
        value: ValueId,
    ) -> Option<Arc<pysense_syntax::tree::Tree>> {
        let ctx = match self.values.get(value) {
            ValueData::Function(data) => data.parent_context,
            ValueData::Class(data) => data.parent_context,
            ValueData::Sequence(data) => data.context,
            ValueData::Comprehension(data) => data.context,
            _ => return None,
        };
        self.context_tree(ctx)
    }

    /// `a, *b, c = ...`: the index chain this name occupies inside nested
    /// tuple-assignment targets, outermost first.
    ///
    /// Each entry is (index-or-star, the containing target node). For the
    /// `b` above: `[(Star(1, 1), targets_node)]` — one leading and one
    /// trailing fixed element around the starred slot.
    pub fn assignment_indexes(
        &self,
        ctx: ContextId,
        name: NodeIndex,
    ) -> Vec<(TargetIndex, NodeIndex)> {
        let Some(tree) = self.context_tree(ctx) else {
            return Vec::new();
        };
        let mut indexes = Vec::new();
        let mut node = name;
        let mut parent = tree.parent(name);
        while let Some(p) = parent {
            match tree.kind(p) {
                SyntaxKind::TestList => {
                    let children = tree.children(p);
                    let position = children.iter().position(|&c| c == node).unwrap_or(0);
                    let star_at = children
                        .iter()
                        .position(|&c| tree.kind(c) == SyntaxKind::StarExpr);
                    match star_at {
                        Some(star) if star == position => {
                            let after = children.len() - position - 1;
                            indexes.push((
                                TargetIndex::Star(position as u32, after as u32),
                                p,
                            ));
                        }
                        Some(star) if position > star => {
                            // Count from the back: the star soaks the middle.
                            let from_end = children.len() - position;
                            indexes.push((TargetIndex::FromEnd(from_end as u32), p));
                        }
                        _ => indexes.push((TargetIndex::Nth(position as u32), p)),
                    }
                }
                SyntaxKind::Atom | SyntaxKind::Trailer | SyntaxKind::AtomExpr => {
                    // Parenthesized sub-patterns and attribute targets
                    // (`self.x`) are transparent; any TestList above records
                    // the index.
                }
                SyntaxKind::StarExpr => {
                    // The star wrapper itself; the TestList above records it.
                }
                SyntaxKind::ExprStmt
                | SyntaxKind::AnnAssign
                | SyntaxKind::AugAssign
                | SyntaxKind::ForStmt
                | SyntaxKind::CompFor => break,
                _ => break,
            }
            node = p;
            parent = tree.parent(p);
        }
        indexes.reverse();
        indexes
    }
}

/// Position of a target inside one level of tuple unpacking.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TargetIndex {
    /// Fixed index from the front.
    Nth(u32),
    /// Fixed index from the end (targets after a starred sibling).
    FromEnd(u32),
    /// The starred slot: `before` fixed targets precede it, `after` follow.
    Star(u32, u32),
}
