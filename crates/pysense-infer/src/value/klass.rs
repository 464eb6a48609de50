//! Tree-defined classes: member lookup along the MRO, instantiation, and
//! generic application (`Foo[int]`).

use crate::arena::{
    ArrayType, ClassData, GenericClassData, InstanceData, Literal, ValueData, ValueId,
};
use crate::arguments::Arguments;
use crate::context::{ContextData, ContextId};
use crate::filters::Filter;
use crate::names::Name;
use crate::state::InferenceState;
use crate::value_set::ValueSet;
use pysense_common::error::ItemNotFound;
use pysense_common::interner::Atom;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::{NodeIndex, Tree};
use std::sync::Arc;

impl InferenceState {
    /// Factory for tree class values (memoized by constructor key).
    pub fn class_value(&mut self, ctx: ContextId, classdef: NodeIndex) -> ValueId {
        self.alloc_value(ValueData::Class(ClassData {
            parent_context: ctx,
            classdef,
        }))
    }

    pub fn class_context(&mut self, class: ValueId) -> ContextId {
        self.alloc_context(ContextData::Class { value: class })
    }

    /// Base classes, in declaration order. Implicit `object` when empty.
    pub fn class_bases(&mut self, class: ValueId) -> Vec<ValueId> {
        let data = match self.value_data(class) {
            ValueData::Class(data) => data,
            ValueData::GenericClass(generic) => return self.class_bases(generic.class),
            _ => return Vec::new(),
        };
        let Some(tree) = self.context_tree(data.parent_context) else {
            return Vec::new();
        };
        let mut bases = Vec::new();
        if let Some(arglist) = scope::classdef_bases(&tree, data.classdef) {
            for &argument in tree.children(arglist) {
                let expr = match tree.kind(argument) {
                    SyntaxKind::Argument => match tree.children(argument).first() {
                        Some(&e) => e,
                        None => continue,
                    },
                    _ => argument,
                };
                let values = self.infer_node(data.parent_context, expr);
                bases.extend(values.iter().filter(|&v| {
                    matches!(
                        self.values.get(v),
                        ValueData::Class(_)
                            | ValueData::GenericClass(_)
                            | ValueData::CompiledClass(_)
                    )
                }));
            }
        }
        if bases.is_empty() {
            bases.push(self.builtin_class("object"));
        }
        bases
    }

    /// Method resolution order: the class, then a left-to-right depth-first
    /// walk of its bases with duplicates removed. Cycles in the base graph
    /// terminate through the seen set.
    pub fn class_mro(&mut self, class: ValueId) -> Vec<ValueId> {
        let mut order = Vec::new();
        let mut stack = vec![class];
        while let Some(current) = stack.pop() {
            // A parameterized class contributes its concrete class.
            let current = match self.value_data(current) {
                ValueData::GenericClass(generic) => generic.class,
                _ => current,
            };
            if order.contains(&current) {
                continue;
            }
            order.push(current);
            let bases = self.class_bases(current);
            for base in bases.into_iter().rev() {
                stack.push(base);
            }
        }
        order
    }

    /// Names of a class member along the MRO, stopping at the first class
    /// that knows the identifier (shadowing between bases).
    pub(crate) fn class_member_names(&mut self, class: ValueId, name: Atom) -> Vec<Name> {
        for mro_class in self.class_mro(class) {
            match self.value_data(mro_class) {
                ValueData::Class(data) => {
                    let class_ctx = self.class_context(mro_class);
                    let filter = Filter::class_scope(
                        class_ctx,
                        mro_class,
                        data.classdef,
                        None,
                        None,
                    );
                    let names = filter.get(self, name);
                    if !names.is_empty() {
                        return names;
                    }
                }
                ValueData::CompiledClass(_) => {
                    let names = self.compiled_filter_get(mro_class, name);
                    if !names.is_empty() {
                        return names;
                    }
                }
                _ => {}
            }
        }
        Vec::new()
    }

    /// All member names visible on the class, outermost MRO entries
    /// shadowed by earlier ones.
    pub(crate) fn class_all_member_names(&mut self, class: ValueId) -> Vec<Name> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut result = Vec::new();
        for mro_class in self.class_mro(class) {
            let names = match self.value_data(mro_class) {
                ValueData::Class(data) => {
                    let class_ctx = self.class_context(mro_class);
                    Filter::class_scope(class_ctx, mro_class, data.classdef, None, None)
                        .values(self)
                }
                ValueData::CompiledClass(_) => self.compiled_filter_values(mro_class),
                _ => Vec::new(),
            };
            for name in names {
                let atom = self.name_atom(&name);
                if seen.insert(atom) {
                    result.push(name);
                }
            }
        }
        result
    }

    /// Attribute access on the class object itself (not an instance).
    pub(crate) fn class_getattribute(
        &mut self,
        class: ValueId,
        name: Atom,
        _is_instance: bool,
    ) -> ValueSet {
        let names = self.class_member_names(class, name);
        let sets: Vec<ValueSet> = names.iter().map(|n| self.infer_name(n)).collect();
        ValueSet::from_sets(sets)
    }

    /// Executing a class constructs an instance memoized by its
    /// constructor-argument key.
    pub(crate) fn execute_class(&mut self, class: ValueId, arguments: &Arguments) -> ValueSet {
        let instance = self.alloc_value(ValueData::Instance(InstanceData {
            class,
            arguments: Some(arguments.clone()),
        }));
        ValueSet::single(instance)
    }

    /// An instance with no known constructor call (`self` in an un-called
    /// method).
    pub fn anonymous_instance(&mut self, class: ValueId) -> ValueId {
        self.alloc_value(ValueData::Instance(InstanceData {
            class,
            arguments: None,
        }))
    }

    /// `Foo[int]` — a parameterized wrapper class, no re-parse involved.
    pub fn apply_generics(&mut self, class: ValueId, generics: Vec<ValueSet>) -> ValueId {
        self.alloc_value(ValueData::GenericClass(GenericClassData {
            class,
            generics: generics.into(),
        }))
    }

    /// Item access driven by a parameterized container's generics.
    pub(crate) fn generic_simple_getitem(
        &mut self,
        generic: &GenericClassData,
        index: &Literal,
    ) -> Result<ValueSet, ItemNotFound> {
        let class_name = self.value_name(generic.class);
        match class_name.as_deref() {
            Some("tuple") => {
                let i = index.as_index().ok_or(ItemNotFound)?;
                let len = generic.generics.len() as i64;
                let position = if i < 0 { len + i } else { i };
                if position < 0 || position >= len {
                    return Err(ItemNotFound);
                }
                Ok(self.instances_of(&generic.generics[position as usize].clone()))
            }
            Some("dict") => match generic.generics.get(1) {
                Some(values) => Ok(self.instances_of(&values.clone())),
                None => Err(ItemNotFound),
            },
            Some("list") => match generic.generics.first() {
                Some(elements) => Ok(self.instances_of(&elements.clone())),
                None => Err(ItemNotFound),
            },
            _ => Err(ItemNotFound),
        }
    }

    /// The element sets a parameterized container iterates over.
    pub(crate) fn generic_iteration_set(&mut self, generic: &GenericClassData) -> ValueSet {
        let class_name = self.value_name(generic.class);
        let sets: Vec<ValueSet> = match class_name.as_deref() {
            // dict iterates its keys.
            Some("dict") => generic.generics.first().cloned().into_iter().collect(),
            Some("tuple") => generic.generics.to_vec(),
            _ => generic.generics.first().cloned().into_iter().collect(),
        };
        let flat = ValueSet::from_sets(sets);
        self.instances_of(&flat)
    }

    /// Classes in a set become instances; instances pass through. Used when
    /// generics/annotations name types rather than values.
    pub fn instances_of(&mut self, set: &ValueSet) -> ValueSet {
        set.map_union(|v| match self.value_data(v) {
            ValueData::Class(_) | ValueData::GenericClass(_) | ValueData::CompiledClass(_) => {
                self.execute(v, &Arguments::Anonymous)
            }
            _ => ValueSet::single(v),
        })
    }

    /// Sequence literals' class counterparts for annotation lowering.
    pub(crate) fn array_type_for_class(&self, class_name: &str) -> Option<ArrayType> {
        match class_name {
            "list" | "List" => Some(ArrayType::List),
            "tuple" | "Tuple" => Some(ArrayType::Tuple),
            "set" | "Set" => Some(ArrayType::Set),
            "dict" | "Dict" => Some(ArrayType::Dict),
            _ => None,
        }
    }
}

/// Decorator spellings applied to a def, for property/staticmethod/
/// classmethod detection.
pub(crate) fn decorator_name_list(tree: &Tree, def_node: NodeIndex) -> Vec<Arc<str>> {
    scope::get_decorators(tree, def_node)
        .iter()
        .filter_map(|&decorator| {
            let &expr = tree.children(decorator).first()?;
            match tree.kind(expr) {
                SyntaxKind::Name => Some(tree.text(expr)),
                SyntaxKind::AtomExpr => {
                    let &base = tree.children(expr).first()?;
                    (tree.kind(base) == SyntaxKind::Name).then(|| tree.text(base))
                }
                _ => None,
            }
        })
        .collect()
}

pub(crate) fn function_is_property(tree: &Tree, funcdef: NodeIndex) -> bool {
    decorator_name_list(tree, funcdef)
        .iter()
        .any(|n| &**n == "property" || &**n == "cached_property")
}

pub(crate) fn function_is_staticmethod(tree: &Tree, funcdef: NodeIndex) -> bool {
    decorator_name_list(tree, funcdef).iter().any(|n| &**n == "staticmethod")
}

pub(crate) fn function_is_classmethod(tree: &Tree, funcdef: NodeIndex) -> bool {
    decorator_name_list(tree, funcdef).iter().any(|n| &**n == "classmethod")
}
