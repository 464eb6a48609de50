//! Instances: attribute lookup through the class MRO, `self` attributes,
//! bound methods, and the `__getattr__` fallbacks.

use crate::arena::{BoundMethodData, Literal, ValueData, ValueId};
use crate::arguments::Arguments;
use crate::context::{ContextData, ContextId};
use crate::filters::Filter;
use crate::lazy::LazyValue;
use crate::names::Name;
use crate::state::InferenceState;
use crate::value::klass::{function_is_classmethod, function_is_property, function_is_staticmethod};
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_common::interner::Atom;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::{NodeIndex, Tree};
use tracing::trace;

impl InferenceState {
    /// Attribute lookup on an instance.
    ///
    /// Order: `self.<attr>` assignments found in the class's methods, then
    /// class members along the MRO (bound to the instance), then the
    /// `__getattr__` / `__getattribute__` fallbacks.
    pub(crate) fn instance_getattribute(&mut self, instance: ValueId, name: Atom) -> ValueSet {
        let ValueData::Instance(data) = self.value_data(instance) else {
            return NO_VALUES;
        };
        let class = self.concrete_class(data.class);

        let mut result = NO_VALUES;
        if let ValueData::Class(_) = self.value_data(class) {
            let class_ctx = self.class_context(class);
            let self_filter = Filter::self_attributes(instance, class, class_ctx);
            let self_names = self_filter.get(self, name);
            let sets: Vec<ValueSet> = self_names.iter().map(|n| self.infer_name(n)).collect();
            result = ValueSet::from_sets(sets);
        }

        let member_names = self.class_member_names(data.class, name);
        let member_sets: Vec<ValueSet> = member_names
            .iter()
            .map(|n| {
                let wrapped = Name::InstanceClassName {
                    instance,
                    inner: Box::new(n.clone()),
                };
                self.infer_name(&wrapped)
            })
            .collect();
        result = result.union(&ValueSet::from_sets(member_sets));

        if result.is_empty() {
            result = self.getattribute_alternatives(instance, class, name);
        }
        result
    }

    /// A generic-applied class's underlying tree/compiled class.
    fn concrete_class(&self, class: ValueId) -> ValueId {
        match self.values.get(class) {
            ValueData::GenericClass(generic) => generic.class,
            _ => class,
        }
    }

    /// Completion view: every attribute an instance exposes.
    pub fn instance_member_names(&mut self, instance: ValueId) -> Vec<Name> {
        let ValueData::Instance(data) = self.value_data(instance) else {
            return Vec::new();
        };
        let class = self.concrete_class(data.class);
        let mut names = Vec::new();
        if let ValueData::Class(_) = self.value_data(class) {
            let class_ctx = self.class_context(class);
            names.extend(Filter::self_attributes(instance, class, class_ctx).values(self));
        }
        names.extend(
            self.class_all_member_names(data.class)
                .into_iter()
                .map(|inner| Name::InstanceClassName { instance, inner: Box::new(inner) }),
        );
        names
    }

    /// Bind class members to an instance: functions become bound methods,
    /// property getters execute, staticmethods pass through unchanged.
    pub(crate) fn bind_to_instance(&mut self, instance: ValueId, members: &ValueSet) -> ValueSet {
        members.map_union(|member| match self.value_data(member) {
            ValueData::Function(func_data) => {
                let Some(tree) = self.context_tree(func_data.parent_context) else {
                    return ValueSet::single(member);
                };
                if func_data.is_lambda {
                    let bound = self.alloc_value(ValueData::BoundMethod(BoundMethodData {
                        instance,
                        function: member,
                    }));
                    return ValueSet::single(bound);
                }
                if function_is_property(&tree, func_data.funcdef) {
                    // Property access runs the getter.
                    let arguments = Arguments::Instance {
                        instance,
                        inner: std::sync::Arc::new(Arguments::Anonymous),
                    };
                    return self.execute_function(member, &arguments);
                }
                if function_is_staticmethod(&tree, func_data.funcdef) {
                    return ValueSet::single(member);
                }
                if function_is_classmethod(&tree, func_data.funcdef) {
                    let class_set = self.class_of(instance);
                    return class_set.map_union(|class| {
                        let bound = self.alloc_value(ValueData::BoundMethod(BoundMethodData {
                            instance: class,
                            function: member,
                        }));
                        ValueSet::single(bound)
                    });
                }
                let bound = self.alloc_value(ValueData::BoundMethod(BoundMethodData {
                    instance,
                    function: member,
                }));
                ValueSet::single(bound)
            }
            _ => ValueSet::single(member),
        })
    }

    /// `self.<attr> = ...` resolution: infer the assignment inside an
    /// anonymous execution of the method it appears in, bound to the
    /// instance.
    pub(crate) fn infer_self_attribute(
        &mut self,
        instance: ValueId,
        class_context: ContextId,
        attr_node: NodeIndex,
    ) -> ValueSet {
        let Some(tree) = self.context_tree(class_context) else {
            return NO_VALUES;
        };
        let Some(def_stmt) = scope::get_definition(&tree, attr_node, true) else {
            return NO_VALUES;
        };
        let Some(method) = tree.search_ancestor(attr_node, &[SyntaxKind::Funcdef]) else {
            return NO_VALUES;
        };
        let function = self.function_value(class_context, method);
        // Constructor parameters bind to the instance's creation arguments;
        // any other method runs anonymously.
        let method_name = scope::funcdef_name(&tree, method);
        let arguments = match self.value_data(instance) {
            ValueData::Instance(data)
                if &*tree.text(method_name) == "__init__" && data.arguments.is_some() =>
            {
                data.arguments.map(|inner| Arguments::Instance {
                    instance,
                    inner: std::sync::Arc::new(inner),
                })
            }
            _ => None,
        };
        let exec_ctx = self.alloc_context(ContextData::FunctionExecution {
            function,
            arguments,
            instance: Some(instance),
        });
        trace!(?instance, ?attr_node, "inferring self attribute");
        self.infer_assignment_definition(exec_ctx, def_stmt, attr_node)
    }

    // -----------------------------------------------------------------------
    // __getattr__ fallbacks
    // -----------------------------------------------------------------------

    /// Nothing was found the direct way; consult `__getattr__` and
    /// `__getattribute__` definitions.
    fn getattribute_alternatives(
        &mut self,
        instance: ValueId,
        class: ValueId,
        name: Atom,
    ) -> ValueSet {
        for hook in ["__getattr__", "__getattribute__"] {
            let hook_atom = self.intern(hook);
            let hooks = self.class_member_names(class, hook_atom);
            for hook_name in hooks {
                let functions = self.infer_name(&hook_name);
                for function in functions.iter() {
                    let ValueData::Function(func_data) = self.value_data(function) else {
                        continue;
                    };
                    let Some(tree) = self.context_tree(func_data.parent_context) else {
                        continue;
                    };
                    // Proxy heuristic: a body that is exactly
                    // `return getattr(x, name)` forwards to x. Intentionally
                    // incomplete; only the single-statement shape matches.
                    if let Some(forward_expr) =
                        getattr_forward_target(&tree, func_data.funcdef)
                    {
                        let exec_ctx = self.alloc_context(ContextData::FunctionExecution {
                            function,
                            arguments: None,
                            instance: Some(instance),
                        });
                        let targets = self.infer_node(exec_ctx, forward_expr);
                        let result = targets.map_union(|t| self.py_getattribute(t, name));
                        if !result.is_empty() {
                            return result;
                        }
                        continue;
                    }
                    // General fallback: execute the hook with the name
                    // string.
                    let name_str = self.resolve_atom(name);
                    let name_obj = self.create_simple_object(Literal::Str(name_str));
                    let arguments = Arguments::Instance {
                        instance,
                        inner: std::sync::Arc::new(Arguments::single(ValueSet::single(
                            name_obj,
                        ))),
                    };
                    let result = self.execute_function(function, &arguments);
                    if !result.is_empty() {
                        return result;
                    }
                }
            }
        }
        NO_VALUES
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    pub(crate) fn iterate_instance(&mut self, value: ValueId) -> Vec<LazyValue> {
        match self.value_data(value) {
            ValueData::CompiledInstance(data) => match &*data.class_name {
                "str" => {
                    let element = self.builtin_instance("str");
                    vec![
                        LazyValue::known(ValueSet::single(element))
                            .with_cardinality(0, u32::MAX),
                    ]
                }
                "bytes" => {
                    let element = self.builtin_instance("int");
                    vec![
                        LazyValue::known(ValueSet::single(element))
                            .with_cardinality(0, u32::MAX),
                    ]
                }
                "range" => {
                    let element = self.builtin_instance("int");
                    vec![
                        LazyValue::known(ValueSet::single(element))
                            .with_cardinality(0, u32::MAX),
                    ]
                }
                _ => Vec::new(),
            },
            ValueData::Instance(data) => {
                if let ValueData::GenericClass(generic) = self.value_data(data.class) {
                    let elements = self.generic_iteration_set(&generic);
                    if elements.is_empty() {
                        return Vec::new();
                    }
                    return vec![
                        LazyValue::known(elements).with_cardinality(0, u32::MAX),
                    ];
                }
                // Duck-typed iteration: __iter__(), then __next__() on what
                // it returns.
                let iter_atom = self.intern("__iter__");
                let iterators = self.instance_getattribute(value, iter_atom);
                let iterators = iterators.map_union(|f| self.execute(f, &Arguments::Anonymous));
                let mut lazies = Vec::new();
                for iterator in iterators.iter() {
                    if let ValueData::Generator(gen_data) = self.value_data(iterator) {
                        lazies.extend(self.iterate_generator(&gen_data));
                        continue;
                    }
                    let next_atom = self.intern("__next__");
                    let next_fns = self.py_getattribute(iterator, next_atom);
                    let elements =
                        next_fns.map_union(|f| self.execute(f, &Arguments::Anonymous));
                    if !elements.is_empty() {
                        lazies.push(
                            LazyValue::known(elements).with_cardinality(0, u32::MAX),
                        );
                    }
                }
                lazies
            }
            _ => Vec::new(),
        }
    }
}

/// Match a `__getattr__` whose body is a single `return getattr(<expr>,
/// name)` statement, returning the forwarded-to expression.
fn getattr_forward_target(tree: &Tree, funcdef: NodeIndex) -> Option<NodeIndex> {
    let suite = scope::funcdef_suite(tree, funcdef);
    let statements: Vec<NodeIndex> = tree
        .children(suite)
        .iter()
        .copied()
        .filter(|&s| {
            // A docstring does not disqualify the single-statement shape.
            !(tree.kind(s) == SyntaxKind::ExprStmt
                && tree.children(s).len() == 1
                && tree
                    .children(s)
                    .first()
                    .is_some_and(|&c| tree.kind(c) == SyntaxKind::Str))
        })
        .collect();
    if statements.len() != 1 {
        return None;
    }
    let return_stmt = statements[0];
    if tree.kind(return_stmt) != SyntaxKind::ReturnStmt {
        return None;
    }
    let &call = tree.children(return_stmt).first()?;
    if tree.kind(call) != SyntaxKind::AtomExpr {
        return None;
    }
    let children = tree.children(call);
    if children.len() != 2 {
        return None;
    }
    let base = children[0];
    if tree.kind(base) != SyntaxKind::Name || &*tree.text(base) != "getattr" {
        return None;
    }
    let trailer = children[1];
    let trailer_children = tree.children(trailer);
    if trailer_children.len() < 2 || !tree.leaf_is(trailer_children[0], "(") {
        return None;
    }
    let arglist = trailer_children[1];
    if tree.kind(arglist) != SyntaxKind::Arglist {
        return None;
    }
    let arguments = tree.children(arglist);
    if arguments.len() != 2 {
        return None;
    }
    tree.children(arguments[0]).first().copied()
}
