//! Module and namespace-package values.

use crate::arena::{Literal, ModuleData, ValueData, ValueId};
use crate::filters::Filter;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_common::interner::Atom;
use pysense_syntax::scope;

impl InferenceState {
    /// Attribute access on a module: its top-level names (position
    /// unbounded — forward references across module attribute access are
    /// fine), then submodules, then the synthesized module attributes.
    /// Stub-backed modules consult the runtime module for anything the stub
    /// lacks.
    pub(crate) fn module_getattribute(
        &mut self,
        value: ValueId,
        data: &ModuleData,
        name: Atom,
    ) -> ValueSet {
        let ctx = self.alloc_context(crate::context::ContextData::Module {
            value,
            module: data.module,
        });
        let root = self.tree(data.module).root();
        let filters = [
            Filter::merged(vec![
                Filter::parser_tree(ctx, root, None, None),
                Filter::global(ctx, root),
            ]),
            Filter::sub_modules(value),
            Filter::module_attributes(value),
        ];
        for filter in filters {
            let names = filter.get(self, name);
            if !names.is_empty() {
                let sets: Vec<ValueSet> = names.iter().map(|n| self.infer_name(n)).collect();
                return ValueSet::from_sets(sets);
            }
        }
        if let Some(fallback) = data.fallback {
            let fallback_value = self.module_value_for(fallback, None);
            return self.py_getattribute(fallback_value, name);
        }
        NO_VALUES
    }

    /// `__name__`, `__file__`, `__package__`, `__doc__`.
    pub(crate) fn infer_module_attribute(&mut self, module_value: ValueId, name: Atom) -> ValueSet {
        let ValueData::Module(data) = self.value_data(module_value) else {
            return NO_VALUES;
        };
        let info_name = self.module_info(data.module).name.clone();
        let text = self.resolve_atom(name);
        let literal = match &*text {
            "__name__" => Some(Literal::Str(info_name)),
            "__package__" => {
                let package = match info_name.rsplit_once('.') {
                    Some((package, _)) => package.to_string(),
                    None => String::new(),
                };
                Some(Literal::Str(package.into()))
            }
            "__file__" => Some(Literal::Str(
                format!("{}.py", info_name.replace('.', "/")).into(),
            )),
            "__doc__" => {
                let tree = self.tree(data.module);
                match scope::get_docstring(&tree, tree.root()) {
                    Some(doc) => Some(Literal::Str(doc)),
                    None => Some(Literal::None),
                }
            }
            _ => None,
        };
        match literal {
            Some(literal) => {
                let obj = self.create_simple_object(literal);
                ValueSet::single(obj)
            }
            None => NO_VALUES,
        }
    }

    /// Resolve a submodule name to its module value.
    pub(crate) fn infer_sub_module(&mut self, parent: ValueId, name: Atom) -> ValueSet {
        let package = match self.value_data(parent) {
            ValueData::Module(data) => self.module_info(data.module).name.clone(),
            ValueData::Namespace(data) => data.fullname.clone(),
            _ => return NO_VALUES,
        };
        let member = self.resolve_atom(name);
        let dotted = format!("{package}.{member}");
        self.import_module_by_name(&dotted)
    }
}
