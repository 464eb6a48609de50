//! Docstring-based type hints.
//!
//! Sphinx (`:type foo: str`, `:param str foo:`, `:rtype: str`) and Epydoc
//! (`@type foo: str`, `@rtype: str`) annotations are another source of
//! parameter and return types, much cheaper than call-site search. Type
//! strings are resolved as dotted names in the function's module context;
//! `X or Y` and comma-separated alternatives union.

use crate::arena::{ValueData, ValueId};
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use once_cell::sync::Lazy;
use pysense_syntax::scope;
use pysense_syntax::tree::NodeIndex;
use regex::Regex;
use std::sync::Arc;

static DOCSTRING_RETURN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\s*:rtype:\s*([^\n]+)").expect("static pattern"),
        Regex::new(r"\s*@rtype:\s*([^\n]+)").expect("static pattern"),
    ]
});

static REST_ROLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":[^`]+:`([^`]+)`").expect("static pattern"));

/// Per-parameter patterns; the parameter name is spliced in escaped.
fn param_patterns(param: &str) -> Vec<Regex> {
    let escaped = regex::escape(param);
    [
        format!(r"\s*:type\s+{escaped}:\s*([^\n]+)"),
        format!(r"\s*:param\s+(\w+)\s+{escaped}:[^\n]*"),
        format!(r"\s*@type\s+{escaped}:\s*([^\n]+)"),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

/// `:class:`threading.Thread`` -> `threading.Thread`.
fn strip_rst_role(type_str: &str) -> &str {
    match REST_ROLE_PATTERN.captures(type_str) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(type_str),
        None => type_str,
    }
}

/// Expand `int or str`, `int, str` and parenthesized variants into
/// individual type strings.
fn expand_typestr(type_str: &str) -> Vec<String> {
    let cleaned = type_str.trim().trim_end_matches('.');
    if cleaned.contains(" or ") {
        return cleaned
            .split(" or ")
            .map(|part| part.trim().to_string())
            .collect();
    }
    if cleaned.contains(',') {
        return cleaned
            .split(',')
            .map(|part| part.trim().to_string())
            .collect();
    }
    vec![cleaned.to_string()]
}

impl InferenceState {
    /// Parameter types gleaned from the function's docstring, if any hint
    /// matches.
    pub(crate) fn infer_param_from_docstring(
        &mut self,
        function: ValueId,
        name_node: NodeIndex,
    ) -> Option<ValueSet> {
        let data = match self.value_data(function) {
            ValueData::Function(data) if !data.is_lambda => data,
            _ => return None,
        };
        let tree = self.value_context_tree(function)?;
        let docstring = scope::get_docstring(&tree, data.funcdef)?;
        let param_name = tree.text(name_node);
        let mut type_strings = Vec::new();
        for pattern in param_patterns(&param_name) {
            for captures in pattern.captures_iter(&docstring) {
                if let Some(matched) = captures.get(1) {
                    type_strings.push(matched.as_str().to_string());
                }
            }
        }
        if type_strings.is_empty() {
            return None;
        }
        Some(self.execute_type_strings(data.parent_context, &type_strings))
    }

    /// Return types from `:rtype:`-style annotations.
    pub(crate) fn infer_return_from_docstring(&mut self, function: ValueId) -> Option<ValueSet> {
        let data = match self.value_data(function) {
            ValueData::Function(data) if !data.is_lambda => data,
            _ => return None,
        };
        let tree = self.value_context_tree(function)?;
        let docstring = scope::get_docstring(&tree, data.funcdef)?;
        let mut type_strings = Vec::new();
        for pattern in DOCSTRING_RETURN_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(&docstring) {
                if let Some(matched) = captures.get(1) {
                    type_strings.push(matched.as_str().to_string());
                }
            }
        }
        if type_strings.is_empty() {
            return None;
        }
        Some(self.execute_type_strings(data.parent_context, &type_strings))
    }

    fn execute_type_strings(
        &mut self,
        ctx: crate::context::ContextId,
        type_strings: &[String],
    ) -> ValueSet {
        let mut sets = Vec::new();
        for raw in type_strings {
            for variant in expand_typestr(raw) {
                let stripped = strip_rst_role(&variant).trim().to_string();
                let types = self.values_from_dotted_string(ctx, &stripped);
                sets.push(self.instances_of(&types));
            }
        }
        ValueSet::from_sets(sets)
    }

    /// Resolve `a.b.C`-shaped strings in a context: name lookup for the
    /// first segment, attribute access for the rest.
    pub(crate) fn values_from_dotted_string(
        &mut self,
        ctx: crate::context::ContextId,
        dotted: &str,
    ) -> ValueSet {
        let mut segments = dotted
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_'));
        let Some(first) = segments.next() else {
            return NO_VALUES;
        };
        let atom = self.intern(first);
        let mut values = self.py_getattribute_context(ctx, atom, None, None);
        for segment in segments {
            if values.is_empty() {
                return NO_VALUES;
            }
            let atom = self.intern(segment);
            values = values.map_union(|v| self.py_getattribute(v, atom));
        }
        values
    }
}

/// Shared helper: a docstring's text for a value, for the API layer.
pub fn docstring_of(state: &InferenceState, value: ValueId) -> Option<Arc<str>> {
    match state.value_data(value) {
        ValueData::Function(data) if !data.is_lambda => {
            let tree = state.value_context_tree(value)?;
            scope::get_docstring(&tree, data.funcdef)
        }
        ValueData::Class(data) => {
            let tree = state.value_context_tree(value)?;
            scope::get_docstring(&tree, data.classdef)
        }
        ValueData::Module(data) => {
            let tree = state.tree(data.module);
            scope::get_docstring(&tree, tree.root())
        }
        ValueData::CompiledClass(data) => crate::value::compiled::builtin_class_doc(&data.name)
            .map(Arc::from),
        ValueData::Decoratee(data) => docstring_of(state, data.original),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_pattern_extraction() {
        let doc = "Does things.\n\n:type foo: str\n:param int bar: a count\n";
        let foo: Vec<_> = param_patterns("foo")
            .iter()
            .filter_map(|p| p.captures(doc).and_then(|c| c.get(1).map(|m| m.as_str().to_string())))
            .collect();
        assert_eq!(foo, vec!["str"]);
        let bar: Vec<_> = param_patterns("bar")
            .iter()
            .filter_map(|p| p.captures(doc).and_then(|c| c.get(1).map(|m| m.as_str().to_string())))
            .collect();
        assert_eq!(bar, vec!["int"]);
    }

    #[test]
    fn test_strip_rst_role() {
        assert_eq!(strip_rst_role(":class:`ClassName`"), "ClassName");
        assert_eq!(strip_rst_role(":py:obj:`module.Object`"), "module.Object");
        assert_eq!(strip_rst_role("ClassName"), "ClassName");
    }

    #[test]
    fn test_expand_typestr() {
        assert_eq!(expand_typestr("int or str"), vec!["int", "str"]);
        assert_eq!(expand_typestr("int, str"), vec!["int", "str"]);
        assert_eq!(expand_typestr("int."), vec!["int"]);
    }
}
