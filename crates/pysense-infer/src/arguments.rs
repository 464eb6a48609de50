//! Call arguments and parameter binding.
//!
//! `Arguments` is either a syntactic argument list (evaluated lazily in its
//! calling context), a list of already-known value sets, or "anonymous" —
//! the execution nobody called, where parameters fall back to annotations,
//! docstrings, dynamic call-site search and defaults.

use crate::arena::{ArrayType, FakeDictData, FakeSequenceData, Literal, ValueData, ValueId};
use crate::cache::EvalTag;
use crate::context::ContextId;
use crate::lazy::LazyValue;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_common::interner::Atom;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::NodeIndex;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arguments {
    /// An argument list straight from the tree (`f(a, *b, k=1)`).
    Tree {
        context: ContextId,
        arglist: Option<NodeIndex>,
    },
    /// Known value sets, positionally.
    Values { sets: Arc<[ValueSet]> },
    /// A method execution: the bound instance prepended to the real
    /// arguments (the original's `InstanceArguments` wrapper).
    Instance {
        instance: ValueId,
        inner: Arc<Arguments>,
    },
    /// No known call site.
    Anonymous,
}

impl Arguments {
    pub fn values(sets: impl IntoIterator<Item = ValueSet>) -> Self {
        Self::Values { sets: sets.into_iter().collect() }
    }

    pub fn single(set: ValueSet) -> Self {
        Self::values([set])
    }
}

/// One unpacked argument: optional keyword, lazy value.
pub type UnpackedArgument = (Option<Atom>, LazyValue);

impl InferenceState {
    /// Flatten an argument object into (keyword, lazy value) pairs,
    /// expanding `*seq` into its elements (with cardinality hints when the
    /// length is unknown) and `**dict` into keyword entries.
    pub fn unpack_arguments(&mut self, arguments: &Arguments) -> Vec<UnpackedArgument> {
        match arguments {
            Arguments::Anonymous => Vec::new(),
            Arguments::Values { sets } => sets
                .iter()
                .map(|s| (None, LazyValue::known(s.clone())))
                .collect(),
            Arguments::Instance { instance, inner } => {
                let mut unpacked =
                    vec![(None, LazyValue::known(ValueSet::single(*instance)))];
                unpacked.extend(self.unpack_arguments(inner));
                unpacked
            }
            Arguments::Tree { context, arglist } => {
                let Some(arglist) = *arglist else {
                    return Vec::new();
                };
                let Some(tree) = self.context_tree(*context) else {
                    return Vec::new();
                };
                let argument_nodes: Vec<NodeIndex> = match tree.kind(arglist) {
                    SyntaxKind::Arglist => tree.children(arglist).to_vec(),
                    _ => vec![arglist],
                };
                let mut unpacked = Vec::new();
                for arg in argument_nodes {
                    self.unpack_one_argument(*context, arg, &mut unpacked);
                }
                unpacked
            }
        }
    }

    fn unpack_one_argument(
        &mut self,
        context: ContextId,
        arg: NodeIndex,
        out: &mut Vec<UnpackedArgument>,
    ) {
        let Some(tree) = self.context_tree(context) else {
            return;
        };
        if tree.kind(arg) != SyntaxKind::Argument {
            out.push((None, LazyValue::tree(context, arg)));
            return;
        }
        let children = tree.children(arg).to_vec();
        match children.as_slice() {
            [value] => out.push((None, LazyValue::tree(context, *value))),
            [name, eq, value] if tree.leaf_is(*eq, "=") => {
                out.push((Some(tree.atom(*name)), LazyValue::tree(context, *value)));
            }
            [star, value] if tree.leaf_is(*star, "*") => {
                let values = self.infer_node(context, *value);
                let mut elements: Vec<Vec<LazyValue>> =
                    values.iter().map(|v| self.iterate(v)).collect();
                if elements.len() == 1 {
                    let lazies = elements.pop().unwrap_or_default();
                    let exact = lazies.iter().all(|l| l.min == 1 && l.max == 1);
                    if exact {
                        out.extend(lazies.into_iter().map(|l| (None, l)));
                        return;
                    }
                }
                // Length unknown: one merged stretch of 0..unbounded values.
                let merged =
                    LazyValue::merged(elements.into_iter().flatten()).with_cardinality(0, u32::MAX);
                out.push((None, merged));
            }
            [star, value] if tree.leaf_is(*star, "**") => {
                let values = self.infer_node(context, *value);
                for v in values.iter() {
                    for (key, lazy) in self.exact_key_items(v) {
                        if let Literal::Str(s) = key {
                            out.push((Some(self.intern(&s)), lazy));
                        }
                    }
                }
            }
            _ => out.push((None, LazyValue::tree(context, arg))),
        }
    }

    // -----------------------------------------------------------------------
    // Parameter binding
    // -----------------------------------------------------------------------

    /// Infer the values a parameter can take in an execution with
    /// `arguments` (or anonymously when None).
    pub fn infer_param(
        &mut self,
        function: ValueId,
        name_node: NodeIndex,
        arguments: Option<Arguments>,
    ) -> ValueSet {
        let Some(tree) = self.value_context_tree(function) else {
            return NO_VALUES;
        };
        let Some(param) = tree.parent(name_node) else {
            return NO_VALUES;
        };
        if tree.kind(param) != SyntaxKind::Param {
            return NO_VALUES;
        }
        let ValueData::Function(func_data) = self.value_data(function) else {
            return NO_VALUES;
        };
        let func_ctx = func_data.parent_context;

        // An annotation decides the public shape outright.
        if let Some(annotation) = scope::param_annotation(&tree, param) {
            let annotated = self.execute_annotation(func_ctx, annotation);
            if !annotated.is_empty() {
                return annotated;
            }
        }

        if let Some(arguments) = arguments {
            let bound = self.bind_arguments_to_param(function, &tree, param, &arguments);
            if !bound.is_empty() {
                return bound;
            }
        } else {
            // Anonymous execution: gather from every secondary source.
            let mut result = NO_VALUES;
            if let Some(doc_types) = self.infer_param_from_docstring(function, name_node) {
                result = result.union(&doc_types);
            }
            if self.settings.dynamic_params {
                result = result.union(&self.dynamic_param_lookup(function, name_node));
            }
            if !result.is_empty() {
                return result;
            }
        }

        match scope::param_default(&tree, param) {
            Some(default) => self.infer_node(func_ctx, default),
            None => NO_VALUES,
        }
    }

    /// Positional/keyword matching of unpacked arguments against the
    /// function's parameter list, focusing on one parameter.
    fn bind_arguments_to_param(
        &mut self,
        function: ValueId,
        tree: &pysense_syntax::tree::Tree,
        wanted_param: NodeIndex,
        arguments: &Arguments,
    ) -> ValueSet {
        if !self.cache.count_infer(EvalTag::ExecuteFunction, wanted_param.0) {
            return NO_VALUES;
        }
        let ValueData::Function(func_data) = self.value_data(function) else {
            return NO_VALUES;
        };
        let params: Vec<NodeIndex> = if func_data.is_lambda {
            scope::lambda_params(tree, func_data.funcdef).to_vec()
        } else {
            scope::funcdef_params(tree, func_data.funcdef).to_vec()
        };
        let unpacked = self.unpack_arguments(arguments);

        let mut positional: Vec<LazyValue> = Vec::new();
        let mut unbounded_tail: Option<LazyValue> = None;
        let mut keywords: Vec<(Atom, LazyValue)> = Vec::new();
        for (key, lazy) in unpacked {
            match key {
                Some(k) => keywords.push((k, lazy)),
                None if lazy.max == u32::MAX => unbounded_tail = Some(lazy),
                None => positional.push(lazy),
            }
        }

        let mut positional_iter = positional.into_iter();
        let mut result_for_wanted = NO_VALUES;
        for &param in params.iter() {
            let star_count = scope::param_star_count(tree, param);
            let Some(param_name) = scope::param_name(tree, param) else {
                continue; // bare `*` marker
            };
            let param_atom = tree.atom(param_name);
            let is_wanted = param == wanted_param;

            let lazy = match star_count {
                1 => {
                    // `*args`: remaining positionals as a tuple.
                    let rest: Vec<LazyValue> = positional_iter.by_ref().collect();
                    let mut parts = rest;
                    if let Some(tail) = unbounded_tail.clone() {
                        parts.push(tail);
                    }
                    if !is_wanted {
                        continue;
                    }
                    let fake = self.alloc_value(ValueData::FakeSequence(FakeSequenceData {
                        array_type: ArrayType::Tuple,
                        lazy: parts.into(),
                    }));
                    Some(LazyValue::known(ValueSet::single(fake)))
                }
                2 => {
                    // `**kwargs`: remaining keywords as a dict.
                    if !is_wanted {
                        continue;
                    }
                    let entries: Vec<(Literal, LazyValue)> = keywords
                        .iter()
                        .map(|(k, lazy)| {
                            (Literal::Str(self.resolve_atom(*k)), lazy.clone())
                        })
                        .collect();
                    let fake = self.alloc_value(ValueData::FakeDict(FakeDictData {
                        entries: entries.into(),
                    }));
                    Some(LazyValue::known(ValueSet::single(fake)))
                }
                _ => {
                    let by_keyword = keywords
                        .iter()
                        .position(|(k, _)| *k == param_atom)
                        .map(|i| keywords.remove(i).1);
                    by_keyword
                        .or_else(|| positional_iter.next())
                        .or_else(|| unbounded_tail.clone())
                }
            };

            if is_wanted {
                if let Some(lazy) = lazy {
                    result_for_wanted = lazy.infer(self);
                }
                break;
            }
        }
        trace!(?result_for_wanted, "bound parameter");
        result_for_wanted
    }

    /// `dict.items()`-like view of a dict-shaped value with resolvable
    /// keys. Non-dicts yield nothing.
    pub fn exact_key_items(&mut self, value: ValueId) -> Vec<(Literal, LazyValue)> {
        match self.value_data(value) {
            ValueData::FakeDict(data) => data.entries.to_vec(),
            ValueData::Sequence(data) if data.array_type == ArrayType::Dict => {
                let Some(tree) = self.context_tree(data.context) else {
                    return Vec::new();
                };
                let Some(maker) = dict_maker_of(&tree, data.atom_node) else {
                    return Vec::new();
                };
                let children = tree.children(maker).to_vec();
                let mut items = Vec::new();
                let mut i = 0;
                while i + 1 < children.len() {
                    if tree.leaf_is(children[i], "**") {
                        // Spread: recurse into the mapping value.
                        let inner = self.infer_node(data.context, children[i + 1]);
                        for v in inner.iter() {
                            items.extend(self.exact_key_items(v));
                        }
                        i += 2;
                        continue;
                    }
                    if let Some(key) = self.literal_of_node(&tree, children[i]) {
                        items.push((key, LazyValue::tree(data.context, children[i + 1])));
                    }
                    i += 2;
                }
                items
            }
            _ => Vec::new(),
        }
    }
}

/// The DictMaker child of a `{...}` atom, if any.
pub(crate) fn dict_maker_of(
    tree: &pysense_syntax::tree::Tree,
    atom_node: NodeIndex,
) -> Option<NodeIndex> {
    tree.children(atom_node)
        .iter()
        .copied()
        .find(|&c| tree.kind(c) == SyntaxKind::DictMaker)
}
