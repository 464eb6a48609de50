//! Call signatures.

use crate::arena::{ValueData, ValueId};
use crate::state::InferenceState;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::{NodeIndex, Tree};
use std::fmt;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOrKeyword,
    KeywordOnly,
    VarPositional,
    VarKeyword,
}

#[derive(Clone, Debug)]
pub struct ParamInfo {
    pub name: Arc<str>,
    pub kind: ParamKind,
    /// Source text of the default expression, for display.
    pub default: Option<String>,
    /// Source text of the annotation, for display.
    pub annotation: Option<String>,
}

impl fmt::Display for ParamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParamKind::VarPositional => write!(f, "*")?,
            ParamKind::VarKeyword => write!(f, "**")?,
            _ => {}
        }
        write!(f, "{}", self.name)?;
        if let Some(annotation) = &self.annotation {
            write!(f, ": {annotation}")?;
        }
        if let Some(default) = &self.default {
            write!(f, "={default}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Signature {
    pub name: Arc<str>,
    pub params: Vec<ParamInfo>,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")
    }
}

impl InferenceState {
    /// The call signature of a callable value, if it has one.
    pub fn signature_of(&mut self, value: ValueId) -> Option<Signature> {
        match self.value_data(value) {
            ValueData::Function(data) => {
                let tree = self.value_context_tree(value)?;
                let name = self.value_name(value)?;
                let params = if data.is_lambda {
                    scope::lambda_params(&tree, data.funcdef).to_vec()
                } else {
                    scope::funcdef_params(&tree, data.funcdef).to_vec()
                };
                Some(Signature { name, params: tree_params(&tree, &params) })
            }
            ValueData::BoundMethod(data) => {
                let mut signature = self.signature_of(data.function)?;
                if !signature.params.is_empty() {
                    signature.params.remove(0);
                }
                Some(signature)
            }
            ValueData::Decoratee(data) => self.signature_of(data.original),
            ValueData::Class(_) | ValueData::GenericClass(_) => {
                let name = self.value_name(value)?;
                let init = self.intern("__init__");
                let init_names = self.class_member_names(value, init);
                for init_name in init_names {
                    let functions = self.infer_name(&init_name);
                    for function in functions.iter() {
                        if let Some(mut signature) = self.signature_of(function) {
                            if !signature.params.is_empty() {
                                signature.params.remove(0);
                            }
                            signature.name = name.clone();
                            return Some(signature);
                        }
                    }
                }
                Some(Signature { name, params: Vec::new() })
            }
            ValueData::CompiledFunction(data) => {
                let text = crate::value::compiled::builtin_function_signature(&data.name)?;
                Some(parse_signature_text(&data.name, text))
            }
            ValueData::CompiledClass(data) => {
                Some(Signature { name: data.name.clone(), params: Vec::new() })
            }
            _ => None,
        }
    }
}

/// Build parameter infos from a def's Param nodes.
fn tree_params(tree: &Tree, params: &[NodeIndex]) -> Vec<ParamInfo> {
    let mut result = Vec::new();
    let mut keyword_only = false;
    for &param in params {
        let star_count = scope::param_star_count(tree, param);
        let Some(name_node) = scope::param_name(tree, param) else {
            // A bare `*`: everything after is keyword-only.
            keyword_only = true;
            continue;
        };
        let kind = match star_count {
            1 => {
                keyword_only = true;
                ParamKind::VarPositional
            }
            2 => ParamKind::VarKeyword,
            _ if keyword_only => ParamKind::KeywordOnly,
            _ => ParamKind::PositionalOrKeyword,
        };
        result.push(ParamInfo {
            name: tree.text(name_node),
            kind,
            default: scope::param_default(tree, param).map(|d| node_source(tree, d)),
            annotation: scope::param_annotation(tree, param).map(|a| node_source(tree, a)),
        });
    }
    result
}

/// Reassemble approximate source text from a node's leaves, for display.
pub(crate) fn node_source(tree: &Tree, node: NodeIndex) -> String {
    let mut leaves = Vec::new();
    collect_leaves(tree, node, &mut leaves);
    let mut out = String::new();
    for (i, text) in leaves.iter().enumerate() {
        let tight = matches!(
            &**text,
            "." | "(" | ")" | "[" | "]" | "{" | "}" | "," | ":"
        );
        let prev_tight = i > 0
            && matches!(&*leaves[i - 1], "." | "(" | "[" | "{" | "-" | "~" | "**" | "*");
        if i > 0 && !tight && !prev_tight {
            out.push(' ');
        }
        out.push_str(text);
    }
    out
}

fn collect_leaves(tree: &Tree, node: NodeIndex, out: &mut Vec<Arc<str>>) {
    if tree.kind(node).is_leaf() {
        out.push(tree.text(node));
        return;
    }
    for &child in tree.children(node) {
        collect_leaves(tree, child, out);
    }
}

/// Parse a clinic-style signature string (`"len(obj, /)"`) well enough for
/// display and arity.
fn parse_signature_text(name: &str, text: &str) -> Signature {
    let params = text
        .split_once('(')
        .and_then(|(_, rest)| rest.rsplit_once(')'))
        .map(|(inner, _)| inner)
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "/")
        .map(|p| {
            let (kind, stripped) = if let Some(s) = p.strip_prefix("**") {
                (ParamKind::VarKeyword, s)
            } else if let Some(s) = p.strip_prefix('*') {
                (ParamKind::VarPositional, s)
            } else {
                (ParamKind::PositionalOrKeyword, p)
            };
            let (pname, default) = match stripped.split_once('=') {
                Some((n, d)) => (n.trim(), Some(d.trim().to_string())),
                None => (stripped, None),
            };
            ParamInfo {
                name: Arc::from(pname),
                kind,
                default,
                annotation: None,
            }
        })
        .collect();
    Signature { name: Arc::from(name), params }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signature_text() {
        let signature = parse_signature_text("print", "print(*args, sep=' ', end='\\n')");
        assert_eq!(signature.params.len(), 3);
        assert_eq!(signature.params[0].kind, ParamKind::VarPositional);
        assert_eq!(&*signature.params[1].name, "sep");
        assert!(signature.params[1].default.is_some());
    }
}
