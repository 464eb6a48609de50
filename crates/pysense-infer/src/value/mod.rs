//! Value variants and their capability dispatch.
//!
//! Every value kind implements the shared capability set — get-attribute,
//! execute, iterate, truthiness, item access — as arms of the dispatch
//! methods here, delegating to the variant modules for the non-trivial
//! behavior. Capabilities a variant has no meaning for default to "not
//! supported" (empty set / unknown), never to an error.

pub mod compiled;
pub mod decorator;
pub mod dynamic_arrays;
pub mod function;
pub mod instance;
pub mod iterable;
pub mod klass;
pub mod module;

use crate::arena::{ApiType, ArrayType, Literal, Truthiness, ValueData, ValueId};
use crate::arguments::Arguments;
use crate::cache::EvalTag;
use crate::lazy::LazyValue;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_common::error::ItemNotFound;
use pysense_common::interner::Atom;
use pysense_syntax::scope;
use std::sync::Arc;
use tracing::trace;

impl InferenceState {
    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    pub fn api_type(&self, value: ValueId) -> ApiType {
        match self.values.get(value) {
            ValueData::Module(_) | ValueData::Namespace(_) => ApiType::Module,
            ValueData::Class(_) | ValueData::GenericClass(_) | ValueData::CompiledClass(_) => {
                ApiType::Class
            }
            ValueData::Function(_)
            | ValueData::BoundMethod(_)
            | ValueData::CompiledFunction(_) => ApiType::Function,
            ValueData::Decoratee(data) => self.api_type(data.inner),
            ValueData::CompiledProxy(data) => {
                if data.access_path.len() == 1 {
                    ApiType::Module
                } else {
                    ApiType::Instance
                }
            }
            ValueData::Keyword(_) => ApiType::Keyword,
            _ => ApiType::Instance,
        }
    }

    /// `py__name__`: the display name of a value, if it has one.
    pub fn value_name(&self, value: ValueId) -> Option<Arc<str>> {
        match self.values.get(value) {
            ValueData::Module(data) => {
                let full = self.module_info(data.module).name.clone();
                Some(match full.rsplit_once('.') {
                    Some((_, last)) => Arc::from(last),
                    None => full,
                })
            }
            ValueData::Namespace(data) => Some(match data.fullname.rsplit_once('.') {
                Some((_, last)) => Arc::from(last),
                None => data.fullname.clone(),
            }),
            ValueData::Class(data) => {
                let tree = self.context_tree(data.parent_context)?;
                Some(tree.text(scope::classdef_name(&tree, data.classdef)))
            }
            ValueData::GenericClass(data) => self.value_name(data.class),
            ValueData::Function(data) => {
                if data.is_lambda {
                    return Some(Arc::from("<lambda>"));
                }
                let tree = self.context_tree(data.parent_context)?;
                Some(tree.text(scope::funcdef_name(&tree, data.funcdef)))
            }
            ValueData::BoundMethod(data) => self.value_name(data.function),
            // Name and classification follow the decorated result; docs and
            // signatures follow the original.
            ValueData::Decoratee(data) => self.value_name(data.inner),
            ValueData::Instance(data) => self.value_name(data.class),
            ValueData::CompiledClass(data) => Some(data.name.clone()),
            ValueData::CompiledInstance(data) => Some(data.class_name.clone()),
            ValueData::CompiledFunction(data) => Some(data.name.clone()),
            ValueData::CompiledProxy(data) => data.access_path.last().cloned(),
            ValueData::Sequence(data) => Some(Arc::from(data.array_type.class_name())),
            ValueData::FakeSequence(data) => Some(Arc::from(data.array_type.class_name())),
            ValueData::FakeDict(_) => Some(Arc::from("dict")),
            ValueData::Generator(_) => Some(Arc::from("generator")),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // getAttribute
    // -----------------------------------------------------------------------

    /// Attribute access on a value; the empty set when nothing is known.
    pub fn py_getattribute(&mut self, value: ValueId, name: Atom) -> ValueSet {
        match self.value_data(value) {
            ValueData::Module(data) => self.module_getattribute(value, &data, name),
            ValueData::Namespace(_) => {
                let names = crate::filters::Filter::sub_modules(value).get(self, name);
                let sets: Vec<ValueSet> = names.iter().map(|n| self.infer_name(n)).collect();
                ValueSet::from_sets(sets)
            }
            ValueData::Class(_) => self.class_getattribute(value, name, false),
            ValueData::GenericClass(data) => self.py_getattribute(data.class, name),
            ValueData::Instance(_) => self.instance_getattribute(value, name),
            ValueData::Decoratee(data) => self.py_getattribute(data.inner, name),
            ValueData::BoundMethod(_) | ValueData::Function(_) => NO_VALUES,
            ValueData::CompiledClass(_)
            | ValueData::CompiledInstance(_)
            | ValueData::CompiledProxy(_) => self.infer_compiled_member(value, name),
            ValueData::Sequence(data) => {
                self.sequence_method(data.array_type, value, name)
            }
            ValueData::FakeSequence(data) => {
                self.sequence_method(data.array_type, value, name)
            }
            ValueData::FakeDict(_) => self.sequence_method(ArrayType::Dict, value, name),
            ValueData::ArrayModification(data) => self.py_getattribute(data.inner, name),
            ValueData::MergedArray(data) => match data.arrays.first() {
                Some(&first) => self.py_getattribute(first, name),
                None => NO_VALUES,
            },
            _ => NO_VALUES,
        }
    }

    /// Methods of literal-backed containers come from the builtin tables.
    fn sequence_method(&mut self, array_type: ArrayType, _value: ValueId, name: Atom) -> ValueSet {
        let class = self.builtin_class(array_type.class_name());
        self.infer_compiled_member(class, name)
    }

    // -----------------------------------------------------------------------
    // execute
    // -----------------------------------------------------------------------

    /// Call a value with arguments; union of everything calling it could
    /// produce.
    pub fn execute(&mut self, value: ValueId, arguments: &Arguments) -> ValueSet {
        trace!(?value, "execute");
        match self.value_data(value) {
            ValueData::Class(_) | ValueData::GenericClass(_) => {
                self.execute_class(value, arguments)
            }
            ValueData::Function(_) => self.execute_function(value, arguments),
            ValueData::BoundMethod(data) => {
                let bound = Arguments::Instance {
                    instance: data.instance,
                    inner: Arc::new(arguments.clone()),
                };
                self.execute_function(data.function, &bound)
            }
            ValueData::Decoratee(data) => self.execute(data.inner, arguments),
            ValueData::CompiledClass(data) => self.execute_compiled_class(&data.name, arguments),
            ValueData::CompiledFunction(data) => {
                let unpacked = self.unpack_arguments(arguments);
                let argument_values: Vec<ValueSet> = unpacked
                    .iter()
                    .map(|(_, lazy)| lazy.infer(self))
                    .collect();
                self.execute_builtin(&data, &argument_values)
            }
            ValueData::CompiledProxy(data) => self.execute_proxy(&data),
            ValueData::Instance(_) => {
                // A callable instance delegates to its `__call__`.
                let call = self.intern("__call__");
                let call_values = self.instance_getattribute(value, call);
                call_values.map_union(|c| self.execute(c, arguments))
            }
            _ => NO_VALUES,
        }
    }

    /// The calling context an argument object carries, if any.
    fn arguments_context(&self, arguments: &Arguments) -> Option<crate::context::ContextId> {
        match arguments {
            Arguments::Tree { context, .. } => Some(*context),
            Arguments::Instance { inner, .. } => self.arguments_context(inner),
            _ => None,
        }
    }

    /// Executing a builtin class constructs an (anonymous) instance; the
    /// container constructors convert their argument's contents.
    fn execute_compiled_class(&mut self, name: &str, arguments: &Arguments) -> ValueSet {
        let unpacked = self.unpack_arguments(arguments);
        match name {
            "list" | "set" | "tuple" | "frozenset" => {
                let array_type = match name {
                    "list" => ArrayType::List,
                    "tuple" => ArrayType::Tuple,
                    _ => ArrayType::Set,
                };
                let lazies: Vec<LazyValue> = match unpacked.first() {
                    Some((_, lazy)) => {
                        let sources = lazy.infer(self);
                        sources.iter().flat_map(|v| self.iterate(v)).collect()
                    }
                    None => Vec::new(),
                };
                let fake = self.alloc_value(ValueData::FakeSequence(
                    crate::arena::FakeSequenceData {
                        array_type,
                        lazy: lazies.into(),
                    },
                ));
                // list()/set() instances may be extended later in the
                // module; wrap so iteration sees tracked additions.
                if matches!(array_type, ArrayType::List | ArrayType::Set) {
                    if let Some(ctx) = self.arguments_context(arguments) {
                        let wrapped = self.with_array_modifications(fake, ctx);
                        return ValueSet::single(wrapped);
                    }
                }
                ValueSet::single(fake)
            }
            "type" => match unpacked.first() {
                // type(x) is x's class.
                Some((_, lazy)) => {
                    let values = lazy.infer(self);
                    values.map_union(|v| self.class_of(v))
                }
                None => NO_VALUES,
            },
            "bool" => {
                let instance = self.builtin_instance("bool");
                ValueSet::single(instance)
            }
            other => {
                let instance = self.builtin_instance(other);
                ValueSet::single(instance)
            }
        }
    }

    // -----------------------------------------------------------------------
    // iterate / truthiness / item access
    // -----------------------------------------------------------------------

    /// The lazy per-iteration values of `value`, in order. Not iterable
    /// values yield nothing.
    pub fn iterate(&mut self, value: ValueId) -> Vec<LazyValue> {
        if !self.cache.count_infer(EvalTag::Iterate, value.0) {
            return Vec::new();
        }
        match self.value_data(value) {
            ValueData::Sequence(data) => {
                let mut lazies = self.iterate_sequence_literal(&data);
                // Literal lists/sets can be extended by tracked call sites
                // elsewhere in their module.
                if matches!(data.array_type, ArrayType::List | ArrayType::Set) {
                    lazies.extend(self.scan_array_additions(data.context, &[value]));
                }
                lazies
            }
            ValueData::FakeSequence(data) => data.lazy.to_vec(),
            ValueData::FakeDict(data) => data
                .entries
                .iter()
                .map(|(key, _)| {
                    let obj = self.create_simple_object(key.clone());
                    LazyValue::known(ValueSet::single(obj))
                })
                .collect(),
            ValueData::Comprehension(data) => self.iterate_comprehension(&data),
            ValueData::Generator(data) => self.iterate_generator(&data),
            ValueData::MergedArray(data) => data
                .arrays
                .iter()
                .flat_map(|&a| self.iterate(a))
                .collect(),
            ValueData::ArrayModification(data) => {
                let mut lazies = self.iterate(data.inner);
                lazies.extend(self.array_addition_lazies(value));
                lazies
            }
            ValueData::Instance(_) | ValueData::CompiledInstance(_) => {
                self.iterate_instance(value)
            }
            _ => Vec::new(),
        }
    }

    pub fn py_bool(&mut self, value: ValueId) -> Truthiness {
        match self.value_data(value) {
            ValueData::CompiledInstance(data) => self.compiled_truthiness(&data),
            ValueData::Sequence(data) => {
                let lazies = self.iterate_sequence_literal(&data);
                if lazies.is_empty() {
                    Truthiness::False
                } else {
                    Truthiness::True
                }
            }
            ValueData::FakeSequence(data) => {
                if data.lazy.is_empty() {
                    Truthiness::False
                } else {
                    Truthiness::True
                }
            }
            ValueData::Instance(_) | ValueData::Comprehension(_) | ValueData::Generator(_) => {
                Truthiness::Unknown
            }
            // Classes, functions and modules are always truthy.
            _ => Truthiness::True,
        }
    }

    /// Direct indexed/keyed access. `Err(ItemNotFound)` tells the caller to
    /// fall back to a full-iteration strategy; it is not a failure.
    pub fn simple_getitem(
        &mut self,
        value: ValueId,
        index: &Literal,
    ) -> Result<ValueSet, ItemNotFound> {
        match self.value_data(value) {
            ValueData::Sequence(data) => self.sequence_simple_getitem(&data, index),
            ValueData::FakeSequence(data) => {
                let i = index.as_index().ok_or(ItemNotFound)?;
                let lazy = nth_signed(&data.lazy, i).ok_or(ItemNotFound)?;
                Ok(lazy.infer(self))
            }
            ValueData::FakeDict(data) => {
                let entry = data
                    .entries
                    .iter()
                    .find(|(k, _)| k == index)
                    .map(|(_, lazy)| lazy.clone())
                    .ok_or(ItemNotFound)?;
                Ok(entry.infer(self))
            }
            ValueData::CompiledInstance(data) => match (&data.literal, index.as_index()) {
                (Some(Literal::Str(s)), Some(i)) => {
                    let chars: Vec<char> = s.chars().collect();
                    let position = if i < 0 { chars.len() as i64 + i } else { i };
                    if position < 0 || position as usize >= chars.len() {
                        return Err(ItemNotFound);
                    }
                    let ch = chars[position as usize].to_string();
                    let obj = self.create_simple_object(Literal::Str(ch.into()));
                    Ok(ValueSet::single(obj))
                }
                _ => Err(ItemNotFound),
            },
            ValueData::Instance(data) => {
                // Parameterized containers answer by position/kind.
                if let ValueData::GenericClass(generic) = self.value_data(data.class) {
                    return self.generic_simple_getitem(&generic, index);
                }
                Err(ItemNotFound)
            }
            ValueData::ArrayModification(data) => self.simple_getitem(data.inner, index),
            _ => Err(ItemNotFound),
        }
    }

    /// The class of an instance-like value.
    pub fn class_of(&mut self, value: ValueId) -> ValueSet {
        match self.value_data(value) {
            ValueData::Instance(data) => ValueSet::single(data.class),
            ValueData::CompiledInstance(data) => {
                let class = self.builtin_class(&data.class_name);
                ValueSet::single(class)
            }
            ValueData::Sequence(data) => {
                let class = self.builtin_class(data.array_type.class_name());
                ValueSet::single(class)
            }
            ValueData::FakeSequence(data) => {
                let class = self.builtin_class(data.array_type.class_name());
                ValueSet::single(class)
            }
            ValueData::FakeDict(_) => {
                let class = self.builtin_class("dict");
                ValueSet::single(class)
            }
            ValueData::ArrayModification(data) => self.class_of(data.inner),
            _ => NO_VALUES,
        }
    }

    /// Is this value an int/float instance (unary numeric ops apply)?
    pub fn is_number(&self, value: ValueId) -> bool {
        matches!(
            self.values.get(value),
            ValueData::CompiledInstance(data)
                if matches!(&*data.class_name, "int" | "float" | "bool")
        )
    }

    pub(crate) fn number_literal(&self, value: ValueId) -> Option<Literal> {
        match self.values.get(value) {
            ValueData::CompiledInstance(data) => data.literal.clone(),
            _ => None,
        }
    }
}

// definition helpers shared by the variant modules live alongside the
// dispatch; nothing below requires state.

/// Python-style index into a slice of lazies (negative from the end).
pub(crate) fn nth_signed(lazies: &[LazyValue], index: i64) -> Option<LazyValue> {
    let len = lazies.len() as i64;
    let position = if index < 0 { len + index } else { index };
    if position < 0 || position >= len {
        return None;
    }
    // Exact indexing is only meaningful while every element stands for
    // exactly one runtime value.
    let exact_prefix = lazies
        .iter()
        .take(position as usize + 1)
        .all(|l| l.min == 1 && l.max == 1);
    if !exact_prefix && index >= 0 {
        return None;
    }
    lazies.get(position as usize).cloned()
}
