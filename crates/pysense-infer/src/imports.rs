//! Import resolution over the project registry.
//!
//! Order: registered stub (type-only shape, runtime module as per-name
//! fallback), registered source module, native/introspected module,
//! namespace package (a dotted prefix with registered submodules),
//! otherwise nothing.

use crate::arena::{NamespaceData, ValueData};
use crate::context::ContextId;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::tree::{NodeIndex, Tree};
use tracing::debug;

impl InferenceState {
    /// Resolve a dotted module path to its value.
    pub fn import_module_by_name(&mut self, dotted: &str) -> ValueSet {
        let stub = self.project.has_stub(dotted).then(|| self.load_stub(dotted)).flatten();
        let runtime = self
            .project
            .has_module(dotted)
            .then(|| self.load_module(dotted))
            .flatten();
        if let Some(stub_module) = stub {
            let value = self.module_value_for(stub_module, runtime);
            return ValueSet::single(value);
        }
        if let Some(runtime_module) = runtime {
            let value = self.module_value_for(runtime_module, None);
            return ValueSet::single(value);
        }
        if self.project.native_provider(dotted).is_some() {
            let value = self.native_module_value(dotted);
            return ValueSet::single(value);
        }
        if self.project.is_package(dotted) {
            let value = self.alloc_value(ValueData::Namespace(NamespaceData {
                fullname: dotted.into(),
            }));
            return ValueSet::single(value);
        }
        debug!(dotted, "unresolvable import");
        NO_VALUES
    }

    /// Resolve the binding a specific name receives from an import
    /// statement.
    pub(crate) fn infer_import(
        &mut self,
        ctx: ContextId,
        stmt: NodeIndex,
        name: NodeIndex,
    ) -> ValueSet {
        let Some(tree) = self.context_tree(ctx) else {
            return NO_VALUES;
        };
        match tree.kind(stmt) {
            SyntaxKind::ImportName => self.infer_import_name(&tree, stmt, name),
            SyntaxKind::ImportFrom => self.infer_import_from(ctx, &tree, stmt, name),
            _ => NO_VALUES,
        }
    }

    fn infer_import_name(&mut self, tree: &Tree, stmt: NodeIndex, name: NodeIndex) -> ValueSet {
        for &item in tree.children(stmt) {
            if tree.kind(item) != SyntaxKind::DottedAsName {
                continue;
            }
            let children = tree.children(item);
            let Some(&dotted_node) = children.first() else {
                continue;
            };
            let alias = children.get(1).copied();
            let segments: Vec<_> = tree
                .children(dotted_node)
                .iter()
                .map(|&s| tree.text(s))
                .collect();
            if segments.is_empty() {
                continue;
            }
            match alias {
                Some(alias_name) if alias_name == name => {
                    // `import a.b as c`: c is the full path's module.
                    let dotted = segments.join(".");
                    return self.import_module_by_name(&dotted);
                }
                None if tree.children(dotted_node).first() == Some(&name) => {
                    // `import a.b`: binds the top-level `a`.
                    return self.import_module_by_name(&segments[0]);
                }
                _ => {}
            }
        }
        NO_VALUES
    }

    fn infer_import_from(
        &mut self,
        ctx: ContextId,
        tree: &Tree,
        stmt: NodeIndex,
        name: NodeIndex,
    ) -> ValueSet {
        let children = tree.children(stmt).to_vec();
        let mut level = 0u32;
        let mut base: Option<NodeIndex> = None;
        for &child in &children {
            if tree.leaf_is(child, ".") {
                level += 1;
            } else if tree.leaf_is(child, "...") {
                level += 3;
            } else if tree.kind(child) == SyntaxKind::DottedName {
                base = Some(child);
            }
        }
        // The imported (pre-alias) spelling for this binding.
        let original = children.iter().find_map(|&item| {
            if tree.kind(item) != SyntaxKind::ImportAsName {
                return None;
            }
            let item_children = tree.children(item);
            let bound = item_children.last()?;
            if *bound == name {
                Some(tree.text(*item_children.first()?))
            } else {
                None
            }
        });
        let Some(original) = original else {
            return NO_VALUES;
        };

        let mut base_path = match base {
            Some(dotted_node) => tree
                .children(dotted_node)
                .iter()
                .map(|&s| tree.text(s).to_string())
                .collect::<Vec<_>>()
                .join("."),
            None => String::new(),
        };
        if level > 0 {
            let Some(module) = self.context_module(ctx) else {
                return NO_VALUES;
            };
            let importer = self.module_info(module).name.clone();
            let mut parts: Vec<&str> = importer.split('.').collect();
            // Level 1 is the containing package.
            for _ in 0..level {
                if parts.pop().is_none() {
                    return NO_VALUES;
                }
            }
            let prefix = parts.join(".");
            base_path = match (prefix.is_empty(), base_path.is_empty()) {
                (true, _) => base_path,
                (false, true) => prefix,
                (false, false) => format!("{prefix}.{base_path}"),
            };
        }
        if base_path.is_empty() {
            return NO_VALUES;
        }

        // Prefer an attribute of the base module, then a submodule.
        let base_values = self.import_module_by_name(&base_path);
        let atom = self.intern(&original);
        let attribute = base_values.map_union(|m| self.py_getattribute(m, atom));
        if !attribute.is_empty() {
            return attribute;
        }
        self.import_module_by_name(&format!("{base_path}.{original}"))
    }
}
