//! The syntax-tree evaluator: expression/statement node + context ->
//! ValueSet.
//!
//! `infer_node` is memoized per (context, node). A node whose evaluation is
//! begun but not finished returns the empty set on re-entry instead of
//! recursing forever; per-iteration comprehension bindings bypass the memo
//! because the same (context, node) pair legitimately produces different
//! sets per iteration. Inference never fails for "could not determine
//! type" — that is the empty set; malformed tree shapes are debug-asserted
//! as engine bugs, not results.

use crate::arena::{
    ArrayType, ComprehensionData, ComprehensionKind, Literal, SequenceData, SliceData, Truthiness,
    ValueData, ValueId,
};
use crate::arguments::Arguments;
use crate::cache::{EvalTag, Memo};
use crate::context::ContextId;
use crate::names::TargetIndex;
use crate::state::InferenceState;
use crate::value::iterable::ElementIndex;
use crate::value_set::{NO_VALUES, ValueSet};
use once_cell::sync::Lazy;
use pysense_common::error::ItemNotFound;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::{NodeIndex, Tree};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::trace;

/// Binary operator -> magic method.
static OPERATOR_TO_MAGIC_METHOD: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    FxHashMap::from_iter([
        ("+", "__add__"),
        ("-", "__sub__"),
        ("*", "__mul__"),
        ("@", "__matmul__"),
        ("/", "__truediv__"),
        ("//", "__floordiv__"),
        ("%", "__mod__"),
        ("**", "__pow__"),
        ("<<", "__lshift__"),
        (">>", "__rshift__"),
        ("&", "__and__"),
        ("|", "__or__"),
        ("^", "__xor__"),
    ])
});

impl InferenceState {
    // =========================================================================
    // Entry points
    // =========================================================================

    /// Infer an expression node in a context. Memoized; the cached entry
    /// also serves as the re-entrancy breaker.
    pub fn infer_node(&mut self, ctx: ContextId, node: NodeIndex) -> ValueSet {
        if !self.predefined.is_empty() {
            // Per-iteration bindings are in force; results are not stable
            // for caching.
            return self.infer_node_uncached(ctx, node);
        }
        match self.cache.lookup(ctx, node) {
            Some(Memo::InProgress) => {
                trace!(?ctx, ?node, "re-entrant evaluation; yielding empty set");
                return NO_VALUES;
            }
            Some(Memo::Done(set)) => return set.clone(),
            None => {}
        }
        if !self.cache.count_infer(EvalTag::InferNode, node.0) {
            return NO_VALUES;
        }
        self.cache.begin(ctx, node);
        let result = self.infer_node_uncached(ctx, node);
        self.cache.finish(ctx, node, result.clone());
        result
    }

    /// The raw evaluator, bypassing the memo table.
    pub(crate) fn infer_node_uncached(&mut self, ctx: ContextId, node: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        match tree.kind(node) {
            SyntaxKind::Name => self.infer_name_reference(ctx, &tree, node),
            SyntaxKind::Number | SyntaxKind::Str => {
                match self.literal_of_node(&tree, node) {
                    Some(literal) => {
                        let obj = self.create_simple_object(literal);
                        ValueSet::single(obj)
                    }
                    None => NO_VALUES,
                }
            }
            SyntaxKind::Keyword => match &*tree.text(node) {
                "True" => self.simple_set(Literal::Bool(true)),
                "False" => self.simple_set(Literal::Bool(false)),
                "None" => self.simple_set(Literal::None),
                _ => NO_VALUES,
            },
            SyntaxKind::Atom => self.infer_atom(ctx, &tree, node),
            SyntaxKind::AtomExpr => {
                let children = tree.children(node).to_vec();
                self.infer_trailer_chain(ctx, &children)
            }
            SyntaxKind::TestList => {
                // Bare tuple expression.
                let value = self.alloc_value(ValueData::Sequence(SequenceData {
                    array_type: ArrayType::Tuple,
                    atom_node: node,
                    context: ctx,
                }));
                ValueSet::single(value)
            }
            SyntaxKind::StarExpr => match tree.children(node).get(1) {
                Some(&inner) => self.infer_node(ctx, inner),
                None => NO_VALUES,
            },
            SyntaxKind::BinOp => self.infer_binop(ctx, &tree, node),
            SyntaxKind::Comparison => self.infer_comparison(ctx, &tree, node),
            SyntaxKind::BoolOp => {
                // Children alternate operand, and/or keyword, operand, ...
                // Short-circuiting can surface either side, so the result
                // is the union of the operands.
                let operands: Vec<NodeIndex> =
                    tree.children(node).iter().copied().step_by(2).collect();
                let sets: Vec<ValueSet> =
                    operands.into_iter().map(|c| self.infer_node(ctx, c)).collect();
                ValueSet::from_sets(sets)
            }
            SyntaxKind::NotTest => {
                let operand = match tree.children(node).get(1) {
                    Some(&operand) => operand,
                    None => return NO_VALUES,
                };
                let values = self.infer_node(ctx, operand);
                self.infer_not(&values)
            }
            SyntaxKind::Factor => self.infer_factor(ctx, &tree, node),
            SyntaxKind::Ternary => {
                let children = tree.children(node).to_vec();
                let mut result = self.infer_node(ctx, children[0]);
                if children.len() == 5 {
                    result = result.union(&self.infer_node(ctx, children[4]));
                }
                result
            }
            SyntaxKind::Lambda => {
                let function = self.function_value(ctx, node);
                ValueSet::single(function)
            }
            SyntaxKind::Comprehension | SyntaxKind::DictComp => {
                // A bare generator-argument comprehension.
                self.comprehension_value(ctx, node, ComprehensionKind::Generator)
            }
            SyntaxKind::YieldExpr => NO_VALUES,
            // A slice expression queried directly (`1:` in `seq[1:]`).
            SyntaxKind::Subscript => self.infer_subscript_list(ctx, node),
            SyntaxKind::ExprStmt | SyntaxKind::AnnAssign | SyntaxKind::AugAssign => {
                self.infer_assignment_rhs(ctx, node)
            }
            SyntaxKind::ErrorNode | SyntaxKind::Operator => NO_VALUES,
            _ => NO_VALUES,
        }
    }

    fn simple_set(&mut self, literal: Literal) -> ValueSet {
        let obj = self.create_simple_object(literal);
        ValueSet::single(obj)
    }

    // =========================================================================
    // Names
    // =========================================================================

    fn infer_name_reference(&mut self, ctx: ContextId, tree: &Tree, name: NodeIndex) -> ValueSet {
        let atom = tree.atom(name);
        let position = Some(tree.start_pos(name));
        let result = self.py_getattribute_context(ctx, atom, position, Some(name));
        if !result.is_empty() {
            return result;
        }
        // The node itself may be a definition (goto on a def name).
        if scope::get_definition(tree, name, false).is_some() {
            return self.tree_name_to_values(ctx, name);
        }
        NO_VALUES
    }

    /// Resolve a tree-defined name through its defining statement.
    pub(crate) fn tree_name_to_values(&mut self, ctx: ContextId, name: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let Some(def) = scope::get_definition(&tree, name, false) else {
            return NO_VALUES;
        };
        match tree.kind(def) {
            SyntaxKind::Funcdef | SyntaxKind::Classdef => self.apply_decorators(ctx, def),
            SyntaxKind::ExprStmt | SyntaxKind::AnnAssign | SyntaxKind::AugAssign => {
                self.infer_assignment_definition(ctx, def, name)
            }
            SyntaxKind::ForStmt => self.infer_for_definition(ctx, def, name),
            SyntaxKind::CompFor => self.infer_comp_for_definition(ctx, def, name),
            SyntaxKind::WithItem => self.infer_with_item(ctx, def),
            SyntaxKind::ExceptClause => {
                let Some(&exception_expr) = tree.children(def).first() else {
                    return NO_VALUES;
                };
                let classes = self.infer_node(ctx, exception_expr);
                self.instances_of(&classes)
            }
            SyntaxKind::ImportName | SyntaxKind::ImportFrom => {
                self.infer_import(ctx, def, name)
            }
            SyntaxKind::GlobalStmt => self.infer_global_name(ctx, name),
            SyntaxKind::Param => {
                let Some(funcdef) =
                    tree.search_ancestor(name, &[SyntaxKind::Funcdef, SyntaxKind::Lambda])
                else {
                    return NO_VALUES;
                };
                let Some(module) = self.context_module(ctx) else {
                    return NO_VALUES;
                };
                // The context enclosing the def, not the def's execution.
                let parent_ctx = self.create_context(module, funcdef);
                let function = self.function_value(parent_ctx, funcdef);
                self.infer_param(function, name, None)
            }
            _ => NO_VALUES,
        }
    }

    // =========================================================================
    // Assignments
    // =========================================================================

    /// The raw right-hand side of an assignment-like statement.
    fn infer_assignment_rhs(&mut self, ctx: ContextId, stmt: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let children = tree.children(stmt).to_vec();
        match tree.kind(stmt) {
            SyntaxKind::ExprStmt => match children.last() {
                Some(&rhs) => self.infer_node(ctx, rhs),
                None => NO_VALUES,
            },
            SyntaxKind::AnnAssign => {
                // The annotation decides the shape; the value is the
                // fallback when the annotation resolves to nothing.
                let annotated = self.execute_annotation(ctx, children[1]);
                if !annotated.is_empty() {
                    return annotated;
                }
                match children.get(2) {
                    Some(&value) => self.infer_node(ctx, value),
                    None => NO_VALUES,
                }
            }
            SyntaxKind::AugAssign => {
                let target = children[0];
                let op_text = tree.text(children[1]);
                let value = children[2];
                // `x += y`: resolve x as of just before this statement.
                let previous = match tree.kind(target) {
                    SyntaxKind::Name => self.py_getattribute_context(
                        ctx,
                        tree.atom(target),
                        Some(tree.start_pos(stmt)),
                        Some(target),
                    ),
                    _ => self.infer_node(ctx, target),
                };
                let rhs = self.infer_node(ctx, value);
                let op = op_text.trim_end_matches('=').to_string();
                self.infer_operation(ctx, &previous, &op, &rhs)
            }
            _ => NO_VALUES,
        }
    }

    /// Assignment resolution for one bound name, including nested/starred
    /// tuple target projection.
    pub(crate) fn infer_assignment_definition(
        &mut self,
        ctx: ContextId,
        stmt: NodeIndex,
        name: NodeIndex,
    ) -> ValueSet {
        let Some(module) = self.context_module(ctx) else {
            return NO_VALUES;
        };
        let key = (module, stmt);
        if !self.statement_guard.enter(key).is_entered() {
            return NO_VALUES;
        }
        let values = self.infer_assignment_rhs(ctx, stmt);
        let result = self.check_tuple_assignments(ctx, name, values);
        self.statement_guard.leave(key);
        result
    }

    /// Project a full right-hand-side set onto one tuple-unpacking target.
    pub(crate) fn check_tuple_assignments(
        &mut self,
        ctx: ContextId,
        name: NodeIndex,
        mut values: ValueSet,
    ) -> ValueSet {
        for (index, _node) in self.assignment_indexes(ctx, name) {
            values = match index {
                TargetIndex::Nth(i) => self.element_at(&values, ElementIndex::Nth(i as i64)),
                TargetIndex::FromEnd(i) => {
                    self.element_at(&values, ElementIndex::FromEnd(i as i64))
                }
                TargetIndex::Star(before, after) => {
                    self.unpacked_middle(&values, before as usize, after as usize)
                }
            };
        }
        values
    }

    fn infer_for_definition(
        &mut self,
        ctx: ContextId,
        for_stmt: NodeIndex,
        name: NodeIndex,
    ) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let Some(module) = self.context_module(ctx) else {
            return NO_VALUES;
        };
        let key = (module, for_stmt);
        if !self.statement_guard.enter(key).is_entered() {
            return NO_VALUES;
        }
        let iterated = tree.children(for_stmt)[1];
        let source = self.infer_node(ctx, iterated);
        let lazies: Vec<_> = source.iter().flat_map(|v| self.iterate(v)).collect();
        let sets: Vec<ValueSet> = lazies.iter().map(|l| l.infer(self)).collect();
        let per_iteration_union = ValueSet::from_sets(sets);
        let result = self.check_tuple_assignments(ctx, name, per_iteration_union);
        self.statement_guard.leave(key);
        result
    }

    fn infer_comp_for_definition(
        &mut self,
        ctx: ContextId,
        comp_for: NodeIndex,
        name: NodeIndex,
    ) -> ValueSet {
        // Inside an active comprehension iteration the predefined stack has
        // already answered. This path is the standalone query: union over
        // the full iteration.
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let children = tree.children(comp_for).to_vec();
        if children.len() < 2 {
            return NO_VALUES;
        }
        let parent_ctx = self.context_parent(ctx).unwrap_or(ctx);
        let source = self.infer_node(parent_ctx, children[1]);
        let lazies: Vec<_> = source.iter().flat_map(|v| self.iterate(v)).collect();
        let sets: Vec<ValueSet> = lazies.iter().map(|l| l.infer(self)).collect();
        let union = ValueSet::from_sets(sets);
        self.check_tuple_assignments(ctx, name, union)
    }

    /// `with open(p) as fh`: `fh` is what `__enter__` returns, with the
    /// managed value itself as a fallback.
    fn infer_with_item(&mut self, ctx: ContextId, with_item: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let Some(&expr) = tree.children(with_item).first() else {
            return NO_VALUES;
        };
        let managed = self.infer_node(ctx, expr);
        let enter = self.intern("__enter__");
        let enter_results = managed.map_union(|v| {
            let methods = self.py_getattribute(v, enter);
            methods.map_union(|m| self.execute(m, &Arguments::Anonymous))
        });
        if enter_results.is_empty() {
            managed
        } else {
            enter_results
        }
    }

    /// Names declared `global`: union every assignment to that spelling
    /// that happens at module level or under a matching global
    /// declaration.
    fn infer_global_name(&mut self, ctx: ContextId, name: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let Some(module) = self.context_module(ctx) else {
            return NO_VALUES;
        };
        let atom = tree.atom(name);
        let module_ctx = self.root_context(ctx);
        let root = tree.root();
        let mut sets = Vec::new();
        let candidates: Vec<NodeIndex> = tree.used_names(atom).to_vec();
        for leaf in candidates {
            let Some(def) = scope::get_definition(&tree, leaf, false) else {
                continue;
            };
            if tree.kind(def) == SyntaxKind::GlobalStmt {
                continue;
            }
            let Some(leaf_scope) = scope::get_parent_scope(&tree, leaf) else {
                continue;
            };
            let in_module = leaf_scope == root;
            let under_global_decl = !in_module
                && scope::walk_scope(&tree, leaf_scope, &[SyntaxKind::GlobalStmt])
                    .iter()
                    .any(|&g| tree.children(g).iter().any(|&n| tree.atom(n) == atom));
            if !in_module && !under_global_decl {
                continue;
            }
            let leaf_ctx = if in_module {
                module_ctx
            } else {
                self.create_context(module, leaf)
            };
            sets.push(self.tree_name_to_values(leaf_ctx, leaf));
        }
        ValueSet::from_sets(sets)
    }

    // =========================================================================
    // Decorators
    // =========================================================================

    /// Resolve a def/class to its decorated value.
    ///
    /// Decorators apply innermost-first: the one closest to the def is
    /// called with the function, each result feeds the decorator above it.
    /// A decorator that cannot be resolved falls back to the undecorated
    /// value rather than wiping all information.
    pub(crate) fn apply_decorators(&mut self, ctx: ContextId, def_node: NodeIndex) -> ValueSet {
        if let Some(Memo::Done(set)) = self.cache.lookup(ctx, def_node) {
            return set.clone();
        }
        if let Some(Memo::InProgress) = self.cache.lookup(ctx, def_node) {
            return NO_VALUES;
        }
        self.cache.begin(ctx, def_node);
        let result = self.apply_decorators_uncached(ctx, def_node);
        self.cache.finish(ctx, def_node, result.clone());
        result
    }

    fn apply_decorators_uncached(&mut self, ctx: ContextId, def_node: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let base = match tree.kind(def_node) {
            SyntaxKind::Funcdef => self.function_value(ctx, def_node),
            SyntaxKind::Classdef => self.class_value(ctx, def_node),
            _ => {
                debug_assert!(false, "apply_decorators on non-def node");
                return NO_VALUES;
            }
        };
        let initial = ValueSet::single(base);
        let decorators = scope::get_decorators(&tree, def_node).to_vec();
        if decorators.is_empty() {
            return initial;
        }
        let mut values = initial.clone();
        for &decorator in decorators.iter().rev() {
            let Some(&dec_expr) = tree.children(decorator).first() else {
                continue;
            };
            let dec_values = self.infer_node(ctx, dec_expr);
            if dec_values.is_empty() {
                trace!(?decorator, "unresolvable decorator; keeping undecorated value");
                return initial;
            }
            let arguments = Arguments::values([values.clone()]);
            let applied = dec_values.map_union(|d| self.execute(d, &arguments));
            if applied.is_empty() {
                // The decorator resolved but its application produced
                // nothing; keep what we had instead of losing everything.
                continue;
            }
            values = applied;
        }
        values.map_union(|v| {
            let wrapped = self.decoratee(v, base);
            ValueSet::single(wrapped)
        })
    }

    // =========================================================================
    // Atoms and trailers
    // =========================================================================

    fn infer_atom(&mut self, ctx: ContextId, tree: &Tree, atom: NodeIndex) -> ValueSet {
        let children = tree.children(atom).to_vec();
        let Some(&open) = children.first() else {
            return NO_VALUES;
        };
        let inner: Vec<NodeIndex> = children
            .iter()
            .copied()
            .filter(|&c| !matches!(tree.kind(c), SyntaxKind::Operator))
            .collect();

        if tree.leaf_is(open, "(") {
            match inner.first() {
                None => self.sequence_value(ctx, atom, ArrayType::Tuple),
                Some(&content) => match tree.kind(content) {
                    SyntaxKind::TestList => self.sequence_value(ctx, atom, ArrayType::Tuple),
                    SyntaxKind::Comprehension => {
                        self.comprehension_value(ctx, content, ComprehensionKind::Generator)
                    }
                    _ => self.infer_node(ctx, content),
                },
            }
        } else if tree.leaf_is(open, "[") {
            match inner.first() {
                None => self.sequence_value(ctx, atom, ArrayType::List),
                Some(&content) => match tree.kind(content) {
                    SyntaxKind::Comprehension => {
                        self.comprehension_value(ctx, content, ComprehensionKind::List)
                    }
                    _ => self.sequence_value(ctx, atom, ArrayType::List),
                },
            }
        } else if tree.leaf_is(open, "{") {
            match inner.first() {
                None => self.sequence_value(ctx, atom, ArrayType::Dict),
                Some(&content) => match tree.kind(content) {
                    SyntaxKind::DictMaker => self.sequence_value(ctx, atom, ArrayType::Dict),
                    SyntaxKind::DictComp => {
                        self.comprehension_value(ctx, content, ComprehensionKind::Dict)
                    }
                    SyntaxKind::Comprehension => {
                        self.comprehension_value(ctx, content, ComprehensionKind::Set)
                    }
                    _ => self.sequence_value(ctx, atom, ArrayType::Set),
                },
            }
        } else {
            NO_VALUES
        }
    }

    fn sequence_value(&mut self, ctx: ContextId, node: NodeIndex, array_type: ArrayType) -> ValueSet {
        let value = self.alloc_value(ValueData::Sequence(SequenceData {
            array_type,
            atom_node: node,
            context: ctx,
        }));
        ValueSet::single(value)
    }

    fn comprehension_value(
        &mut self,
        ctx: ContextId,
        comp_node: NodeIndex,
        kind: ComprehensionKind,
    ) -> ValueSet {
        let value = self.alloc_value(ValueData::Comprehension(ComprehensionData {
            kind,
            comp_node,
            context: ctx,
        }));
        ValueSet::single(value)
    }

    /// Fold a trailer chain (`base.attr(args)[index]...`) left to right.
    fn infer_trailer_chain(&mut self, ctx: ContextId, children: &[NodeIndex]) -> ValueSet {
        let Some((&base, trailers)) = children.split_first() else {
            return NO_VALUES;
        };
        let mut values = self.infer_node(ctx, base);
        for &trailer in trailers {
            if values.is_empty() {
                return NO_VALUES;
            }
            values = self.infer_trailer(ctx, &values, trailer);
        }
        values
    }

    /// A prefix of an AtomExpr's children (used by the dynamic-array scan
    /// to type a method receiver).
    pub(crate) fn infer_atom_expr_prefix(
        &mut self,
        ctx: ContextId,
        prefix: Vec<NodeIndex>,
    ) -> ValueSet {
        self.infer_trailer_chain(ctx, &prefix)
    }

    fn infer_trailer(&mut self, ctx: ContextId, values: &ValueSet, trailer: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        let children = tree.children(trailer).to_vec();
        let Some(&first) = children.first() else {
            return NO_VALUES;
        };
        if tree.leaf_is(first, ".") {
            let Some(&attr) = children.get(1) else {
                return NO_VALUES;
            };
            let atom = tree.atom(attr);
            values.map_union(|v| self.py_getattribute(v, atom))
        } else if tree.leaf_is(first, "(") {
            let arglist = children
                .get(1)
                .copied()
                .filter(|&c| !tree.leaf_is(c, ")"));
            let arguments = Arguments::Tree { context: ctx, arglist };
            values.map_union(|v| self.execute(v, &arguments))
        } else if tree.leaf_is(first, "[") {
            let Some(&subscript) = children.get(1).filter(|&&c| !tree.leaf_is(c, "]")) else {
                return NO_VALUES;
            };
            self.infer_subscript(ctx, values, subscript)
        } else {
            NO_VALUES
        }
    }

    // =========================================================================
    // Subscripts and slices
    // =========================================================================

    fn infer_subscript(
        &mut self,
        ctx: ContextId,
        base_values: &ValueSet,
        subscript: NodeIndex,
    ) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        base_values.map_union(|base| {
            match self.value_data(base) {
                // `Foo[int]` — generic application, not item access.
                ValueData::Class(_) | ValueData::CompiledClass(_) | ValueData::GenericClass(_) => {
                    let generics = self.infer_generic_arguments(ctx, &tree, subscript);
                    let applied = self.apply_generics(base, generics);
                    ValueSet::single(applied)
                }
                _ => self.infer_item_access(ctx, &tree, base, subscript),
            }
        })
    }

    pub(crate) fn infer_generic_arguments(
        &mut self,
        ctx: ContextId,
        tree: &Tree,
        subscript: NodeIndex,
    ) -> Vec<ValueSet> {
        let parts: Vec<NodeIndex> = match tree.kind(subscript) {
            SyntaxKind::SubscriptList => tree.children(subscript).to_vec(),
            _ => vec![subscript],
        };
        parts
            .into_iter()
            .map(|part| match tree.kind(part) {
                SyntaxKind::Subscript => NO_VALUES,
                _ => self.infer_node(ctx, part),
            })
            .collect()
    }

    fn infer_item_access(
        &mut self,
        ctx: ContextId,
        tree: &Tree,
        base: ValueId,
        subscript: NodeIndex,
    ) -> ValueSet {
        match tree.kind(subscript) {
            SyntaxKind::Subscript => {
                // A slice keeps the container's shape.
                let _slice = self.infer_subscript_list(ctx, subscript);
                self.sliced_view(base)
            }
            SyntaxKind::SubscriptList => {
                // `a[1, 2]` indexes with a tuple; treat like an unknown
                // index.
                self.all_items_of(base)
            }
            _ => {
                if let Some(literal) = self.literal_of_node(tree, subscript) {
                    match self.simple_getitem(base, &literal) {
                        Ok(set) => return set,
                        Err(ItemNotFound) => return self.all_items_of(base),
                    }
                }
                // Index only known by type: try every literal the index
                // could be, then give up precision.
                let index_values = self.infer_node(ctx, subscript);
                let mut results = Vec::new();
                let mut any_literal = false;
                for index in index_values.iter() {
                    if let Some(literal) = self.number_literal(index) {
                        any_literal = true;
                        if let Ok(set) = self.simple_getitem(base, &literal) {
                            results.push(set);
                        }
                    }
                }
                if any_literal && !results.is_empty() {
                    return ValueSet::from_sets(results);
                }
                self.all_items_of(base)
            }
        }
    }

    /// Union of everything a container could yield (index unknown).
    fn all_items_of(&mut self, base: ValueId) -> ValueSet {
        // Dict-shaped values answer with their values, not their keys.
        match self.value_data(base) {
            ValueData::Sequence(data) if data.array_type == ArrayType::Dict => {
                let items = self.exact_key_items(base);
                let sets: Vec<ValueSet> =
                    items.iter().map(|(_, lazy)| lazy.infer(self)).collect();
                return ValueSet::from_sets(sets);
            }
            ValueData::FakeDict(_) => {
                let items = self.exact_key_items(base);
                let sets: Vec<ValueSet> =
                    items.iter().map(|(_, lazy)| lazy.infer(self)).collect();
                return ValueSet::from_sets(sets);
            }
            ValueData::Comprehension(data) => {
                let Some(tree) = self.context_tree(data.context) else {
                    return NO_VALUES;
                };
                if tree.kind(data.comp_node) == SyntaxKind::DictComp {
                    let lazies = self.comprehension_value_entry(&data);
                    let sets: Vec<ValueSet> = lazies.iter().map(|l| l.infer(self)).collect();
                    return ValueSet::from_sets(sets);
                }
            }
            _ => {}
        }
        let lazies = self.iterate(base);
        let sets: Vec<ValueSet> = lazies.iter().map(|l| l.infer(self)).collect();
        ValueSet::from_sets(sets)
    }

    /// `seq[1:]` — same container shape, same element types.
    fn sliced_view(&mut self, base: ValueId) -> ValueSet {
        match self.value_data(base) {
            ValueData::Sequence(_)
            | ValueData::FakeSequence(_)
            | ValueData::MergedArray(_)
            | ValueData::ArrayModification(_) => ValueSet::single(base),
            ValueData::CompiledInstance(data) if &*data.class_name == "str" => {
                let instance = self.builtin_instance("str");
                ValueSet::single(instance)
            }
            _ => NO_VALUES,
        }
    }

    /// Build the synthetic slice value for a `start:stop:step` subscript;
    /// absent operands stay unset.
    pub(crate) fn infer_subscript_list(&mut self, ctx: ContextId, subscript: NodeIndex) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        if tree.kind(subscript) != SyntaxKind::Subscript {
            return self.infer_node(ctx, subscript);
        }
        let children = tree.children(subscript).to_vec();
        let mut operands: [Option<NodeIndex>; 3] = [None, None, None];
        let mut slot = 0usize;
        for child in children {
            if tree.leaf_is(child, ":") {
                slot += 1;
            } else if slot < 3 {
                operands[slot] = Some(child);
            }
        }
        let value = self.alloc_value(ValueData::Slice(SliceData {
            context: Some(ctx),
            start: operands[0],
            stop: operands[1],
            step: operands[2],
        }));
        ValueSet::single(value)
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn infer_binop(&mut self, ctx: ContextId, tree: &Tree, node: NodeIndex) -> ValueSet {
        let children = tree.children(node).to_vec();
        if children.len() != 3 {
            debug_assert!(false, "BinOp without exactly three children");
            return NO_VALUES;
        }
        let left = self.infer_node(ctx, children[0]);
        let op = tree.text(children[1]);
        let right = self.infer_node(ctx, children[2]);
        self.infer_operation(ctx, &left, &op, &right)
    }

    /// One binary operation over two sets: literal folding for numbers and
    /// strings, magic-method dispatch for instances, operand union as the
    /// undecidable fallback.
    pub(crate) fn infer_operation(
        &mut self,
        _ctx: ContextId,
        left: &ValueSet,
        op: &str,
        right: &ValueSet,
    ) -> ValueSet {
        if left.is_empty() {
            return right.clone();
        }
        if right.is_empty() {
            return left.clone();
        }
        let mut results = Vec::new();
        for l in left.iter() {
            for r in right.iter() {
                results.push(self.infer_operation_part(l, op, r));
            }
        }
        ValueSet::from_sets(results)
    }

    fn infer_operation_part(&mut self, left: ValueId, op: &str, right: ValueId) -> ValueSet {
        // Literal folding.
        if let (Some(l), Some(r)) = (self.number_literal(left), self.number_literal(right)) {
            if let Some(folded) = fold_literals(&l, op, &r) {
                return self.simple_set(folded);
            }
        }
        // Numeric widening without literals.
        if self.is_number(left) && self.is_number(right) && OPERATOR_TO_MAGIC_METHOD.contains_key(op)
        {
            let l_name = self.value_name(left);
            let r_name = self.value_name(right);
            let result_class = match (l_name.as_deref(), r_name.as_deref()) {
                (Some("float"), _) | (_, Some("float")) => "float",
                _ if op == "/" => "float",
                _ => "int",
            };
            let instance = self.builtin_instance(result_class);
            return ValueSet::single(instance);
        }
        // Sequence concatenation keeps both sides' contents.
        if op == "+" {
            let l_is_seq = matches!(
                self.values.get(left),
                ValueData::Sequence(_) | ValueData::FakeSequence(_) | ValueData::MergedArray(_)
            );
            let r_is_seq = matches!(
                self.values.get(right),
                ValueData::Sequence(_) | ValueData::FakeSequence(_) | ValueData::MergedArray(_)
            );
            if l_is_seq && r_is_seq {
                let merged = self.alloc_value(ValueData::MergedArray(
                    crate::arena::MergedArrayData { arrays: Arc::from([left, right]) },
                ));
                return ValueSet::single(merged);
            }
        }
        // Duck-typed dispatch through the magic method.
        if let Some(&method) = OPERATOR_TO_MAGIC_METHOD.get(op) {
            if matches!(self.values.get(left), ValueData::Instance(_)) {
                let atom = self.intern(method);
                let methods = self.py_getattribute(left, atom);
                if !methods.is_empty() {
                    let arguments = Arguments::single(ValueSet::single(right));
                    let result = methods.map_union(|m| self.execute(m, &arguments));
                    if !result.is_empty() {
                        return result;
                    }
                }
                // Reflected operand: `__radd__` and friends.
                let reflected = format!("__r{}", &method[2..]);
                let atom = self.intern(&reflected);
                let methods = self.py_getattribute(right, atom);
                if !methods.is_empty() {
                    let arguments = Arguments::single(ValueSet::single(left));
                    let result = methods.map_union(|m| self.execute(m, &arguments));
                    if !result.is_empty() {
                        return result;
                    }
                }
            }
        }
        // Can't decide: both operands stay possible.
        ValueSet::from_iter([left, right])
    }

    fn infer_comparison(&mut self, ctx: ContextId, tree: &Tree, node: NodeIndex) -> ValueSet {
        // Chains (`a < b < c`) and identity/membership tests all produce a
        // bool; fold it when both sides are known literals.
        let children = tree.children(node).to_vec();
        if children.len() == 3 {
            let op = tree.text(children[1]);
            let left = self.infer_node(ctx, children[0]);
            let right = self.infer_node(ctx, children[2]);
            if let (1, 1) = (left.len(), right.len()) {
                let l = left.iter().next().and_then(|v| self.number_literal(v));
                let r = right.iter().next().and_then(|v| self.number_literal(v));
                if let (Some(l), Some(r)) = (l, r) {
                    if let Some(verdict) = compare_literals(&l, &op, &r) {
                        return self.simple_set(Literal::Bool(verdict));
                    }
                }
            }
        } else {
            for &child in &children {
                if !tree.kind(child).is_leaf() {
                    let _ = self.infer_node(ctx, child);
                }
            }
        }
        let instance = self.builtin_instance("bool");
        ValueSet::single(instance)
    }

    /// Unary `-`, `+`, `~`: evaluate only against numeric values.
    fn infer_factor(&mut self, ctx: ContextId, tree: &Tree, node: NodeIndex) -> ValueSet {
        let children = tree.children(node).to_vec();
        if children.len() != 2 {
            return NO_VALUES;
        }
        let op = tree.text(children[0]);
        let operand = self.infer_node(ctx, children[1]);
        let mut results = Vec::new();
        for value in operand.iter() {
            if !self.is_number(value) {
                continue;
            }
            let set = match (&*op, self.number_literal(value)) {
                ("-", Some(Literal::Int(i))) => self.simple_set(Literal::Int(-i)),
                ("-", Some(Literal::Float(bits))) => {
                    self.simple_set(Literal::float(-f64::from_bits(bits)))
                }
                ("~", Some(Literal::Int(i))) => self.simple_set(Literal::Int(!i)),
                ("~", Some(Literal::Bool(b))) => self.simple_set(Literal::Int(!(b as i64))),
                ("+", _) => ValueSet::single(value),
                (_, None) => ValueSet::single(value),
                _ => ValueSet::single(value),
            };
            results.push(set);
        }
        ValueSet::from_sets(results)
    }

    /// `not x`: the boolean opposite when truthiness is determinable, an
    /// indeterminate bool otherwise.
    pub(crate) fn infer_not(&mut self, operand: &ValueSet) -> ValueSet {
        let mut verdict: Option<Truthiness> = None;
        for value in operand.iter() {
            let t = self.py_bool(value);
            verdict = match (verdict, t) {
                (None, t) => Some(t),
                (Some(prev), t) if prev == t => Some(prev),
                _ => Some(Truthiness::Unknown),
            };
        }
        match verdict {
            Some(Truthiness::True) => self.simple_set(Literal::Bool(false)),
            Some(Truthiness::False) => self.simple_set(Literal::Bool(true)),
            _ => {
                let instance = self.builtin_instance("bool");
                ValueSet::single(instance)
            }
        }
    }
}

fn fold_literals(left: &Literal, op: &str, right: &Literal) -> Option<Literal> {
    // String concatenation and repetition first.
    match (left, op, right) {
        (Literal::Str(a), "+", Literal::Str(b)) => {
            return Some(Literal::Str(format!("{a}{b}").into()));
        }
        (Literal::Str(a), "*", Literal::Int(n)) if *n >= 0 && *n < 4096 => {
            return Some(Literal::Str(a.repeat(*n as usize).into()));
        }
        _ => {}
    }
    let both_int = matches!(
        (left, right),
        (Literal::Int(_) | Literal::Bool(_), Literal::Int(_) | Literal::Bool(_))
    );
    let l = left.as_f64()?;
    let r = right.as_f64()?;
    let result = match op {
        "+" => l + r,
        "-" => l - r,
        "*" => l * r,
        "/" => {
            if r == 0.0 {
                return None;
            }
            return Some(Literal::float(l / r));
        }
        "//" => {
            if r == 0.0 {
                return None;
            }
            (l / r).floor()
        }
        "%" => {
            if r == 0.0 {
                return None;
            }
            l.rem_euclid(r)
        }
        "**" => l.powf(r),
        _ => return None,
    };
    if both_int && result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        Some(Literal::Int(result as i64))
    } else {
        Some(Literal::float(result))
    }
}

fn compare_literals(left: &Literal, op: &str, right: &Literal) -> Option<bool> {
    let l = left.as_f64()?;
    let r = right.as_f64()?;
    Some(match op {
        "==" => l == r,
        "!=" => l != r,
        "<" => l < r,
        ">" => l > r,
        "<=" => l <= r,
        ">=" => l >= r,
        _ => return None,
    })
}

/// Public helper mirroring the original's `infer_expr_stmt` entry: the
/// values a specific bound name receives from an assignment statement.
pub fn infer_expr_stmt(
    state: &mut InferenceState,
    ctx: ContextId,
    stmt: NodeIndex,
    seek_name: Option<NodeIndex>,
) -> ValueSet {
    match seek_name {
        Some(name) => state.infer_assignment_definition(ctx, stmt, name),
        None => state.infer_node(ctx, stmt),
    }
}

