//! Filters: position-bounded views yielding visible names at one scope
//! level.
//!
//! A filter answers two questions: "give me every visible spelling of this
//! identifier here" (`get`) and "enumerate everything visible here"
//! (`values`). Callers that resolve a name stop at the first filter level
//! with a non-empty answer — shadowing is a property of the *caller*
//! protocol, filters never merge across scopes on their own. The exception
//! is [`Filter::Merged`], which represents one scope level assembled from
//! several sources (locals + global-declared names).

use crate::arena::{ApiType, ValueData, ValueId};
use crate::arguments::Arguments;
use crate::context::{ContextData, ContextId};
use crate::names::Name;
use crate::state::InferenceState;
use pysense_common::interner::Atom;
use pysense_common::position::Position;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::{NodeIndex, Tree};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub enum Filter {
    /// Tree-defined names of one scope, bounded by `until`.
    ParserTree {
        context: ContextId,
        scope: NodeIndex,
        until: Option<Position>,
        origin_scope: Option<NodeIndex>,
    },
    /// Locals and parameters of a function execution.
    FunctionExecution {
        context: ContextId,
        function: ValueId,
        scope: NodeIndex,
        until: Option<Position>,
        origin_scope: Option<NodeIndex>,
    },
    /// Names declared `global` anywhere in the module — never
    /// position-bounded (`_until_position = None` in the original).
    Global { context: ContextId, scope: NodeIndex },
    /// Class-body names (methods, class attributes).
    ClassScope {
        context: ContextId,
        class: ValueId,
        scope: NodeIndex,
        until: Option<Position>,
        origin_scope: Option<NodeIndex>,
    },
    /// `self.<attr> = ...` assignments found in the class's methods.
    SelfAttributes {
        instance: ValueId,
        class: ValueId,
        class_context: ContextId,
    },
    /// `__name__`, `__doc__`, `__package__`, `__file__`.
    ModuleAttributes { module_value: ValueId },
    /// Direct submodules of a package.
    SubModules { module_value: ValueId },
    /// A fixed name table.
    Dict { names: Arc<[Name]> },
    /// Members of a compiled/builtin value.
    Compiled { value: ValueId },
    /// One scope level merged from several sources.
    Merged(Arc<[Filter]>),
}

impl Filter {
    pub fn parser_tree(
        context: ContextId,
        scope: NodeIndex,
        until: Option<Position>,
        origin_scope: Option<NodeIndex>,
    ) -> Self {
        Self::ParserTree { context, scope, until, origin_scope }
    }

    pub fn function_execution(
        context: ContextId,
        function: ValueId,
        scope: NodeIndex,
        until: Option<Position>,
        origin_scope: Option<NodeIndex>,
    ) -> Self {
        Self::FunctionExecution { context, function, scope, until, origin_scope }
    }

    pub fn global(context: ContextId, scope: NodeIndex) -> Self {
        Self::Global { context, scope }
    }

    pub fn class_scope(
        context: ContextId,
        class: ValueId,
        scope: NodeIndex,
        until: Option<Position>,
        origin_scope: Option<NodeIndex>,
    ) -> Self {
        Self::ClassScope { context, class, scope, until, origin_scope }
    }

    pub fn self_attributes(instance: ValueId, class: ValueId, class_context: ContextId) -> Self {
        Self::SelfAttributes { instance, class, class_context }
    }

    pub fn module_attributes(module_value: ValueId) -> Self {
        Self::ModuleAttributes { module_value }
    }

    pub fn sub_modules(module_value: ValueId) -> Self {
        Self::SubModules { module_value }
    }

    pub fn dict(names: impl IntoIterator<Item = Name>) -> Self {
        Self::Dict { names: names.into_iter().collect() }
    }

    pub fn compiled(value: ValueId) -> Self {
        Self::Compiled { value }
    }

    pub fn merged(filters: Vec<Filter>) -> Self {
        Self::Merged(filters.into())
    }

    /// Visible spellings of `atom` at this level.
    pub fn get(&self, state: &mut InferenceState, atom: Atom) -> Vec<Name> {
        match self {
            Filter::ParserTree { context, scope, until, origin_scope } => {
                tree_scope_names(state, *context, *scope, *until, *origin_scope, Some(atom))
            }
            Filter::FunctionExecution { context, function, scope, until, origin_scope } => {
                let raw =
                    tree_scope_names(state, *context, *scope, *until, *origin_scope, Some(atom));
                convert_param_names(state, *context, *function, raw)
            }
            Filter::Global { context, scope } => global_names(state, *context, *scope, Some(atom)),
            Filter::ClassScope { context, scope, until, origin_scope, class } => {
                class_scope_names(state, *context, *class, *scope, *until, *origin_scope, Some(atom))
            }
            Filter::SelfAttributes { instance, class, class_context } => {
                self_attribute_names(state, *instance, *class, *class_context, Some(atom))
            }
            Filter::ModuleAttributes { module_value } => {
                module_attribute_names(state, *module_value)
                    .into_iter()
                    .filter(|n| state.name_atom(n) == atom)
                    .collect()
            }
            Filter::SubModules { module_value } => sub_module_names(state, *module_value)
                .into_iter()
                .filter(|n| state.name_atom(n) == atom)
                .collect(),
            Filter::Dict { names } => names
                .iter()
                .filter(|n| state.name_atom(n) == atom)
                .cloned()
                .collect(),
            Filter::Compiled { value } => state.compiled_filter_get(*value, atom),
            Filter::Merged(filters) => filters
                .iter()
                .flat_map(|f| f.get(state, atom))
                .collect(),
        }
    }

    /// Everything visible at this level.
    pub fn values(&self, state: &mut InferenceState) -> Vec<Name> {
        match self {
            Filter::ParserTree { context, scope, until, origin_scope } => {
                tree_scope_names(state, *context, *scope, *until, *origin_scope, None)
            }
            Filter::FunctionExecution { context, function, scope, until, origin_scope } => {
                let raw = tree_scope_names(state, *context, *scope, *until, *origin_scope, None);
                convert_param_names(state, *context, *function, raw)
            }
            Filter::Global { context, scope } => global_names(state, *context, *scope, None),
            Filter::ClassScope { context, scope, until, origin_scope, class } => {
                class_scope_names(state, *context, *class, *scope, *until, *origin_scope, None)
            }
            Filter::SelfAttributes { instance, class, class_context } => {
                self_attribute_names(state, *instance, *class, *class_context, None)
            }
            Filter::ModuleAttributes { module_value } => module_attribute_names(state, *module_value),
            Filter::SubModules { module_value } => sub_module_names(state, *module_value),
            Filter::Dict { names } => names.to_vec(),
            Filter::Compiled { value } => state.compiled_filter_values(*value),
            Filter::Merged(filters) => {
                filters.iter().flat_map(|f| f.values(state)).collect()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scan implementations
// ---------------------------------------------------------------------------

/// Definition names of one tree scope, position-bounded.
fn tree_scope_names(
    state: &mut InferenceState,
    context: ContextId,
    scope_node: NodeIndex,
    until: Option<Position>,
    _origin_scope: Option<NodeIndex>,
    only: Option<Atom>,
) -> Vec<Name> {
    let Some(tree) = state.context_tree(context) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    let mut scan = |atom: Atom, occurrences: &[NodeIndex]| {
        for &leaf in occurrences {
            if scope::get_parent_scope(&tree, leaf) != Some(scope_node) {
                continue;
            }
            if scope::get_definition(&tree, leaf, false).is_none() {
                continue;
            }
            if let Some(bound) = until {
                if tree.start_pos(leaf) >= bound {
                    continue;
                }
            }
            names.push((tree.start_pos(leaf), Name::Tree { context, name: leaf }));
        }
    };
    match only {
        Some(atom) => scan(atom, tree.used_names(atom)),
        None => {
            let pairs: Vec<(Atom, Vec<NodeIndex>)> = tree
                .all_used_names()
                .map(|(a, v)| (a, v.to_vec()))
                .collect();
            for (atom, occurrences) in pairs {
                scan(atom, &occurrences);
            }
        }
    }
    names.sort_by_key(|(pos, _)| *pos);
    names.into_iter().map(|(_, n)| n).collect()
}

/// Rewrites parameter definitions of an execution filter into Param /
/// BoundParam names carrying the execution's arguments.
fn convert_param_names(
    state: &mut InferenceState,
    context: ContextId,
    function: ValueId,
    raw: Vec<Name>,
) -> Vec<Name> {
    let ContextData::FunctionExecution { arguments, instance, .. } = state.context_data(context)
    else {
        return raw;
    };
    let Some(tree) = state.context_tree(context) else {
        return raw;
    };
    raw.into_iter()
        .map(|name| {
            let Name::Tree { name: leaf, .. } = name else {
                return name;
            };
            let Some(def) = scope::get_definition(&tree, leaf, false) else {
                return name;
            };
            if tree.kind(def) != SyntaxKind::Param {
                return name;
            }
            if let Some(inst) = instance {
                if is_first_positional_param(&tree, def) && arguments.is_none() {
                    return Name::BoundParam { instance: inst, function, name: leaf };
                }
            }
            Name::Param { function, name: leaf, arguments: arguments.clone() }
        })
        .collect()
}

fn is_first_positional_param(tree: &Tree, param: NodeIndex) -> bool {
    if scope::param_star_count(tree, param) != 0 {
        return false;
    }
    let Some(parameters) = tree.parent(param) else {
        return false;
    };
    tree.children(parameters).first() == Some(&param)
}

/// Names declared `global` anywhere in the module; unbounded by position.
fn global_names(
    state: &mut InferenceState,
    context: ContextId,
    _module_root: NodeIndex,
    only: Option<Atom>,
) -> Vec<Name> {
    let Some(tree) = state.context_tree(context) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    let mut scan = |occurrences: &[NodeIndex]| {
        for &leaf in occurrences {
            let Some(def) = scope::get_definition(&tree, leaf, false) else {
                continue;
            };
            if tree.kind(def) == SyntaxKind::GlobalStmt {
                names.push(Name::Tree { context, name: leaf });
            }
        }
    };
    match only {
        Some(atom) => scan(tree.used_names(atom)),
        None => {
            let all: Vec<Vec<NodeIndex>> =
                tree.all_used_names().map(|(_, v)| v.to_vec()).collect();
            for occurrences in all {
                scan(&occurrences);
            }
        }
    }
    names
}

fn class_scope_names(
    state: &mut InferenceState,
    context: ContextId,
    _class: ValueId,
    scope_node: NodeIndex,
    until: Option<Position>,
    origin_scope: Option<NodeIndex>,
    only: Option<Atom>,
) -> Vec<Name> {
    let names = tree_scope_names(state, context, scope_node, until, origin_scope, only);
    // Leading-double-underscore names are name-mangled and invisible from
    // outside the class body.
    let origin_inside = origin_scope
        .zip(state.context_tree(context))
        .is_some_and(|(origin, tree)| {
            let mut current = Some(origin);
            while let Some(node) = current {
                if node == scope_node {
                    return true;
                }
                current = tree.parent(node);
            }
            false
        });
    if origin_inside {
        return names;
    }
    names
        .into_iter()
        .filter(|n| {
            let text = state.name_string(n);
            !(text.starts_with("__") && !text.ends_with("__"))
        })
        .collect()
}

/// Scan the class's methods for `self.<attr> = ...` targets.
fn self_attribute_names(
    state: &mut InferenceState,
    instance: ValueId,
    class: ValueId,
    class_context: ContextId,
    only: Option<Atom>,
) -> Vec<Name> {
    let ValueData::Class(class_data) = state.value_data(class) else {
        return Vec::new();
    };
    let Some(tree) = state.context_tree(class_context) else {
        return Vec::new();
    };
    let suite = scope::classdef_suite(&tree, class_data.classdef);
    let methods = scope::walk_scope(&tree, suite, &[SyntaxKind::Funcdef]);
    // "Assigned through self" means: the target is an attribute of the
    // method's first positional parameter, whatever it is named.
    let mut names = Vec::new();
    for method in methods {
        let params = scope::funcdef_params(&tree, method);
        let Some(self_param) = params.first().copied() else {
            continue;
        };
        if scope::param_star_count(&tree, self_param) != 0 {
            continue;
        }
        let Some(self_name) = scope::param_name(&tree, self_param) else {
            continue;
        };
        let self_atom = tree.atom(self_name);
        for &self_use in tree.used_names(self_atom) {
            if scope::get_parent_scope(&tree, self_use) != Some(method) || self_use == self_name {
                continue;
            }
            let Some(attr) = attribute_target_of(&tree, self_use) else {
                continue;
            };
            if let Some(filter_atom) = only {
                if tree.atom(attr) != filter_atom {
                    continue;
                }
            }
            if scope::get_definition(&tree, attr, true).is_some() {
                names.push(Name::SelfAttr { instance, class_context, name: attr });
            }
        }
    }
    names
}

/// For a `self` reference, the attribute name of a `self.x` trailer chain,
/// if `self` is the base of exactly one attribute trailer.
fn attribute_target_of(tree: &Tree, base: NodeIndex) -> Option<NodeIndex> {
    let atom_expr = tree.parent(base)?;
    if tree.kind(atom_expr) != SyntaxKind::AtomExpr {
        return None;
    }
    let children = tree.children(atom_expr);
    if children.first() != Some(&base) || children.len() != 2 {
        return None;
    }
    let trailer = children[1];
    let trailer_children = tree.children(trailer);
    if trailer_children.len() == 2 && tree.leaf_is(trailer_children[0], ".") {
        Some(trailer_children[1])
    } else {
        None
    }
}

fn module_attribute_names(state: &mut InferenceState, module_value: ValueId) -> Vec<Name> {
    ["__name__", "__doc__", "__package__", "__file__"]
        .into_iter()
        .map(|attr| Name::ModuleAttribute { module_value, name: state.intern(attr) })
        .collect()
}

fn sub_module_names(state: &mut InferenceState, module_value: ValueId) -> Vec<Name> {
    let package = match state.value_data(module_value) {
        ValueData::Module(data) => state.module_info(data.module).name.clone(),
        ValueData::Namespace(data) => data.fullname.clone(),
        _ => return Vec::new(),
    };
    state
        .project
        .sub_module_names(&package)
        .into_iter()
        .map(|name| Name::SubModule { parent: module_value, name: state.intern(&name) })
        .collect()
}

/// Keyword completions surfaced as arbitrary names.
pub fn keyword_names(state: &mut InferenceState, keywords: &[&str]) -> Vec<Name> {
    keywords
        .iter()
        .map(|kw| Name::Arbitrary { name: state.intern(kw), api_type: ApiType::Keyword })
        .collect()
}

/// Helper carried around by call-signature code: the arguments a filter's
/// params were bound with, if any.
pub fn execution_arguments(state: &InferenceState, context: ContextId) -> Option<Arguments> {
    match state.context_data(context) {
        ContextData::FunctionExecution { arguments, .. } => arguments,
        _ => None,
    }
}
