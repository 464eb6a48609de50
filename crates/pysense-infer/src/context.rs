//! Contexts: values wrapped with scope-resolution capability.
//!
//! A context answers "what names are visible from here" by chaining filters
//! from the innermost scope outwards (function execution -> enclosing
//! function -> module -> builtins). Contexts are cheap interned ids; their
//! filter chain is fully determined by the wrapped value's lexical nesting.

use crate::arena::{ModuleId, ValueData, ValueId};
use crate::arguments::Arguments;
use crate::filters::Filter;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_common::interner::Atom;
use pysense_common::position::Position;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope::get_parent_scope;
use pysense_syntax::tree::{NodeIndex, Tree};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Interned context identifier.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl std::fmt::Debug for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContextData {
    Module {
        value: ValueId,
        module: ModuleId,
    },
    Class {
        value: ValueId,
    },
    /// A function body with (possibly absent) bound arguments.
    FunctionExecution {
        function: ValueId,
        arguments: Option<Arguments>,
        instance: Option<ValueId>,
    },
    /// One `for` clause of a comprehension.
    CompFor {
        parent: ContextId,
        comp_for: NodeIndex,
    },
    /// Wraps a compiled/builtin value.
    Compiled {
        value: ValueId,
    },
}

/// Context storage with structural deduplication, mirroring the value arena.
#[derive(Default)]
pub struct ContextArena {
    contexts: Vec<ContextData>,
    dedup: FxHashMap<ContextData, ContextId>,
}

impl ContextArena {
    pub fn alloc(&mut self, data: ContextData) -> ContextId {
        if let Some(&existing) = self.dedup.get(&data) {
            return existing;
        }
        let id = ContextId(self.contexts.len() as u32);
        self.contexts.push(data.clone());
        self.dedup.insert(data, id);
        id
    }

    pub fn get(&self, id: ContextId) -> &ContextData {
        &self.contexts[id.0 as usize]
    }
}

impl InferenceState {
    pub fn context_data(&self, ctx: ContextId) -> ContextData {
        self.contexts.get(ctx).clone()
    }

    pub(crate) fn alloc_context(&mut self, data: ContextData) -> ContextId {
        self.contexts.alloc(data)
    }

    /// The lexical parent of a context, None at module/compiled level.
    pub fn context_parent(&self, ctx: ContextId) -> Option<ContextId> {
        match self.contexts.get(ctx) {
            ContextData::Module { .. } | ContextData::Compiled { .. } => None,
            ContextData::Class { value } => match self.values.get(*value) {
                ValueData::Class(data) => Some(data.parent_context),
                _ => None,
            },
            ContextData::FunctionExecution { function, .. } => {
                match self.values.get(*function) {
                    ValueData::Function(data) => Some(data.parent_context),
                    _ => None,
                }
            }
            ContextData::CompFor { parent, .. } => Some(*parent),
        }
    }

    /// The module a context ultimately lives in.
    pub fn context_module(&self, ctx: ContextId) -> Option<ModuleId> {
        let mut current = ctx;
        loop {
            match self.contexts.get(current) {
                ContextData::Module { module, .. } => return Some(*module),
                _ => current = self.context_parent(current)?,
            }
        }
    }

    pub fn context_tree(&self, ctx: ContextId) -> Option<Arc<Tree>> {
        self.context_module(ctx).map(|m| self.tree(m))
    }

    /// The tree node opening this context's scope.
    pub fn context_scope_node(&self, ctx: ContextId) -> Option<NodeIndex> {
        match self.contexts.get(ctx) {
            ContextData::Module { module, .. } => Some(self.tree(*module).root()),
            ContextData::Class { value } => match self.values.get(*value) {
                ValueData::Class(data) => Some(data.classdef),
                _ => None,
            },
            ContextData::FunctionExecution { function, .. } => match self.values.get(*function) {
                ValueData::Function(data) => Some(data.funcdef),
                _ => None,
            },
            ContextData::CompFor { comp_for, .. } => Some(*comp_for),
            ContextData::Compiled { .. } => None,
        }
    }

    /// Build the context owning `node`, creating the enclosing class /
    /// anonymous-execution chain on demand.
    ///
    /// This is how a cursor position becomes a resolution context: walk the
    /// scope chain up to the module, then wrap back down.
    pub fn create_context(&mut self, module: ModuleId, node: NodeIndex) -> ContextId {
        let tree = self.tree(module);
        // Collect enclosing scope nodes, innermost first.
        let mut scopes = Vec::new();
        let mut current = get_parent_scope(&tree, node);
        while let Some(scope) = current {
            if tree.kind(scope) == SyntaxKind::Module {
                break;
            }
            scopes.push(scope);
            current = get_parent_scope(&tree, scope);
        }
        let mut ctx = self.module_context(module);
        for &scope in scopes.iter().rev() {
            ctx = match tree.kind(scope) {
                SyntaxKind::Classdef => {
                    let class = self.class_value(ctx, scope);
                    self.alloc_context(ContextData::Class { value: class })
                }
                SyntaxKind::Funcdef | SyntaxKind::Lambda => {
                    let function = self.function_value(ctx, scope);
                    self.anonymous_execution_context(function)
                }
                SyntaxKind::CompFor => self.alloc_context(ContextData::CompFor {
                    parent: ctx,
                    comp_for: scope,
                }),
                _ => ctx,
            };
        }
        ctx
    }

    /// An execution context with no known call arguments. Methods get an
    /// anonymous `self` instance so attribute access still works.
    pub(crate) fn anonymous_execution_context(&mut self, function: ValueId) -> ContextId {
        let instance = match self.values.get(function) {
            ValueData::Function(data) => data.class_context.and_then(|class_ctx| {
                match self.contexts.get(class_ctx) {
                    ContextData::Class { value } => Some(*value),
                    _ => None,
                }
            }),
            _ => None,
        };
        let instance = instance.map(|class| self.anonymous_instance(class));
        self.alloc_context(ContextData::FunctionExecution {
            function,
            arguments: None,
            instance,
        })
    }

    // -----------------------------------------------------------------------
    // Name lookup
    // -----------------------------------------------------------------------

    /// Resolve `name` from `ctx`, innermost filter first.
    ///
    /// Shadowing contract: the first filter level yielding a non-empty name
    /// list wins; later scopes are not consulted, let alone unioned.
    pub fn py_getattribute_context(
        &mut self,
        ctx: ContextId,
        name: Atom,
        position: Option<Position>,
        origin_scope: Option<NodeIndex>,
    ) -> ValueSet {
        // Per-iteration bindings (comprehensions, for-loop unpacking)
        // override every filter.
        if let Some(set) = self.lookup_predefined(ctx, name) {
            return set;
        }
        let filters = self.get_global_filters(ctx, position, origin_scope);
        for filter in filters {
            let names = filter.get(self, name);
            if !names.is_empty() {
                let sets: Vec<ValueSet> =
                    names.iter().map(|n| self.infer_name(n)).collect();
                return ValueSet::from_sets(sets);
            }
        }
        NO_VALUES
    }

    pub(crate) fn lookup_predefined(&self, ctx: ContextId, name: Atom) -> Option<ValueSet> {
        self.predefined
            .iter()
            .rev()
            .find_map(|(c, names)| (*c == ctx).then(|| names.get(&name).cloned()).flatten())
    }

    /// The filter chain for global name resolution from `ctx`.
    ///
    /// Order: own scope (merged with global-declared names), each enclosing
    /// function execution, then the module level (tree names + globals,
    /// submodules, module attributes), then builtins. The position bound
    /// applies to the first function-or-module scope only: by the time a
    /// nested function runs, outer bindings are complete.
    pub fn get_global_filters(
        &mut self,
        ctx: ContextId,
        until_position: Option<Position>,
        origin_scope: Option<NodeIndex>,
    ) -> Vec<Filter> {
        let mut filters = Vec::new();
        let mut until = until_position;
        let mut current = Some(ctx);
        while let Some(c) = current {
            self.push_context_filters(&mut filters, c, until, origin_scope);
            if matches!(
                self.contexts.get(c),
                ContextData::FunctionExecution { .. } | ContextData::Module { .. }
            ) {
                // Closure semantics: outer scopes are complete by call time.
                until = None;
            }
            current = self.context_parent(c);
        }
        filters.push(self.builtins_filter());
        filters
    }

    /// Filters of a single context level, innermost ordering preserved.
    pub(crate) fn push_context_filters(
        &mut self,
        filters: &mut Vec<Filter>,
        ctx: ContextId,
        until_position: Option<Position>,
        origin_scope: Option<NodeIndex>,
    ) {
        match self.contexts.get(ctx).clone() {
            ContextData::Module { value, module } => {
                let root = self.tree(module).root();
                filters.push(Filter::merged(vec![
                    Filter::parser_tree(ctx, root, until_position, origin_scope),
                    Filter::global(ctx, root),
                ]));
                filters.push(Filter::sub_modules(value));
                filters.push(Filter::module_attributes(value));
            }
            ContextData::Class { value } => {
                if let Some(scope) = self.context_scope_node(ctx) {
                    filters.push(Filter::class_scope(
                        ctx,
                        value,
                        scope,
                        until_position,
                        origin_scope,
                    ));
                }
            }
            ContextData::FunctionExecution { function, .. } => {
                if let Some(scope) = self.context_scope_node(ctx) {
                    let module_ctx = self.root_context(ctx);
                    let root = self
                        .context_module(ctx)
                        .map(|m| self.tree(m).root());
                    let mut merged = vec![Filter::function_execution(
                        ctx,
                        function,
                        scope,
                        until_position,
                        origin_scope,
                    )];
                    if let Some(root) = root {
                        merged.push(Filter::global(module_ctx, root));
                    }
                    filters.push(Filter::merged(merged));
                }
            }
            ContextData::CompFor { comp_for, .. } => {
                filters.push(Filter::parser_tree(ctx, comp_for, None, origin_scope));
            }
            ContextData::Compiled { value } => {
                filters.push(Filter::compiled(value));
            }
        }
    }

    /// The module context at the root of `ctx`'s chain.
    pub fn root_context(&self, ctx: ContextId) -> ContextId {
        let mut current = ctx;
        while let Some(parent) = self.context_parent(current) {
            current = parent;
        }
        current
    }
}
