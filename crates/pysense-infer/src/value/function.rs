//! Tree-defined functions, lambdas and their executions.
//!
//! Executing a function creates a fresh execution context whose parameter
//! names resolve against the supplied (or anonymous) arguments, then infers
//! the union of its return expressions — or a generator value when the body
//! yields. Return annotations, when present, decide the result without
//! executing the body.

use crate::arena::{
    FunctionData, GeneratorData, Literal, ValueData, ValueId,
};
use crate::arguments::Arguments;
use crate::context::{ContextData, ContextId};
use crate::lazy::LazyValue;
use crate::recursion::EnterResult;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::NodeIndex;
use tracing::{debug, trace};

impl InferenceState {
    /// Factory for tree function values (memoized by constructor key).
    ///
    /// The function's owning context skips class and instance contexts so
    /// closure resolution chains through functions and the module only; the
    /// class is kept separately for method binding.
    pub fn function_value(&mut self, ctx: ContextId, funcdef: NodeIndex) -> ValueId {
        let Some(tree) = self.context_tree(ctx) else {
            // Callers always hand us a tree-backed context.
            unreachable!("function_value without a tree context");
        };
        let is_lambda = tree.kind(funcdef) == SyntaxKind::Lambda;
        let class_context = match self.context_data(ctx) {
            ContextData::Class { .. } => Some(ctx),
            _ => None,
        };
        let mut parent = ctx;
        while matches!(self.context_data(parent), ContextData::Class { .. }) {
            match self.context_parent(parent) {
                Some(p) => parent = p,
                None => break,
            }
        }
        self.alloc_value(ValueData::Function(FunctionData {
            parent_context: parent,
            funcdef,
            is_lambda,
            class_context,
        }))
    }

    /// Execute a tree function with `arguments`.
    pub fn execute_function(&mut self, function: ValueId, arguments: &Arguments) -> ValueSet {
        let ValueData::Function(data) = self.value_data(function) else {
            return NO_VALUES;
        };
        let Some(module) = self.context_module(data.parent_context) else {
            return NO_VALUES;
        };
        let is_builtin = self.module_info(module).is_stub;
        let entered = self.execution_guard.enter((module, data.funcdef), is_builtin);
        let result = if entered.is_entered() {
            self.execute_function_body(function, &data, arguments)
        } else {
            debug!(?function, ?entered, "function execution denied by guard");
            debug_assert!(matches!(
                entered,
                EnterResult::LimitReached | EnterResult::Cycle
            ));
            NO_VALUES
        };
        self.execution_guard.leave();
        result
    }

    fn execute_function_body(
        &mut self,
        function: ValueId,
        data: &FunctionData,
        arguments: &Arguments,
    ) -> ValueSet {
        let Some(tree) = self.context_tree(data.parent_context) else {
            return NO_VALUES;
        };

        // A return annotation decides the result set without executing.
        if !data.is_lambda {
            if let Some(annotation) = scope::funcdef_annotation(&tree, data.funcdef) {
                let annotated = self.execute_annotation(data.parent_context, annotation);
                if !annotated.is_empty() {
                    return annotated;
                }
            }
        }

        let instance = match arguments {
            Arguments::Instance { instance, .. } => Some(*instance),
            _ => None,
        };
        let exec_ctx = self.alloc_context(ContextData::FunctionExecution {
            function,
            arguments: Some(arguments.clone()),
            instance,
        });

        if data.is_lambda {
            let body = *tree.children(data.funcdef).last().expect("lambda without body");
            return self.infer_node(exec_ctx, body);
        }

        // Yields anywhere in the body make the call produce a generator.
        if !scope::walk_scope(&tree, data.funcdef, &[SyntaxKind::YieldExpr]).is_empty() {
            let generator = self.alloc_value(ValueData::Generator(GeneratorData {
                exec_context: exec_ctx,
            }));
            return ValueSet::single(generator);
        }

        let mut result = self.infer_return_values(exec_ctx, &tree, data.funcdef);
        if let Some(doc_types) = self.infer_return_from_docstring(function) {
            result = result.union(&doc_types);
        }
        trace!(?function, ?result, "function executed");
        result
    }

    fn infer_return_values(
        &mut self,
        exec_ctx: ContextId,
        tree: &pysense_syntax::tree::Tree,
        funcdef: NodeIndex,
    ) -> ValueSet {
        let returns = scope::walk_scope(tree, funcdef, &[SyntaxKind::ReturnStmt]);
        if returns.is_empty() {
            // Falling off the end returns None.
            let none = self.create_simple_object(Literal::None);
            return ValueSet::single(none);
        }
        let mut sets = Vec::new();
        for return_stmt in returns {
            match tree.children(return_stmt).first() {
                Some(&expr) => sets.push(self.infer_node(exec_ctx, expr)),
                None => {
                    let none = self.create_simple_object(Literal::None);
                    sets.push(ValueSet::single(none));
                }
            }
        }
        ValueSet::from_sets(sets)
    }

    /// The per-iteration values of a generator: its execution's yields.
    pub(crate) fn iterate_generator(&mut self, data: &GeneratorData) -> Vec<LazyValue> {
        let ContextData::FunctionExecution { function, .. } = self.context_data(data.exec_context)
        else {
            return Vec::new();
        };
        let ValueData::Function(func_data) = self.value_data(function) else {
            return Vec::new();
        };
        let Some(tree) = self.context_tree(func_data.parent_context) else {
            return Vec::new();
        };
        scope::walk_scope(&tree, func_data.funcdef, &[SyntaxKind::YieldExpr])
            .into_iter()
            .filter_map(|yield_expr| {
                tree.children(yield_expr)
                    .first()
                    .map(|&child| LazyValue::tree(data.exec_context, child))
            })
            .collect()
    }
}
