//! Scope and definition queries over the tree.
//!
//! These are pure tree-shape helpers: which enclosing node opens the scope a
//! name lives in, which statement (if any) defines a given Name leaf, where
//! a scope's docstring is. Name *resolution* lives in the inference crate;
//! everything here is position/ancestry bookkeeping.

use crate::kind::SyntaxKind;
use crate::tree::{NodeIndex, Tree};
use std::sync::Arc;

/// The scope node (Module / Funcdef / Classdef / Lambda / CompFor) that owns
/// `node`.
///
/// Subtleties mirroring the source language:
/// - a function's name belongs to the enclosing scope, not the function;
/// - parameter defaults and annotations evaluate in the enclosing scope;
/// - parameter names belong to the function;
/// - decorators hang outside the def they decorate (guaranteed by the tree
///   shape: Decorator nodes are siblings of the Funcdef).
pub fn get_parent_scope(tree: &Tree, node: NodeIndex) -> Option<NodeIndex> {
    let mut prev = node;
    let mut current = tree.parent(node);
    while let Some(scope) = current {
        match tree.kind(scope) {
            SyntaxKind::Module => return Some(scope),
            SyntaxKind::Classdef => {
                // The class name itself belongs outside.
                if tree.children(scope).first() == Some(&prev) {
                    // fall through to the outer scope
                } else {
                    return Some(scope);
                }
            }
            SyntaxKind::Funcdef | SyntaxKind::Lambda => {
                if in_scope_body_or_params(tree, scope, prev, node) {
                    return Some(scope);
                }
                // name / default / annotation: keep walking.
            }
            SyntaxKind::CompFor => {
                // Comprehension targets live in the comprehension scope; the
                // outermost iterated expression evaluates in the enclosing
                // scope.
                let children = tree.children(scope);
                if children.len() >= 2 && children[1] == prev && is_outermost_comp_for(tree, scope) {
                    // fall through: `for x in EXPR` — EXPR is outside.
                } else {
                    return Some(scope);
                }
            }
            SyntaxKind::Comprehension | SyntaxKind::DictComp => {
                // The entry (and dict key/value) expression is a sibling of
                // the comp_for chain but evaluates inside it — in the
                // innermost clause.
                let comp_for = *tree
                    .children(scope)
                    .last()
                    .expect("comprehension without comp_for");
                return Some(innermost_comp_for(tree, comp_for));
            }
            _ => {}
        }
        prev = scope;
        current = tree.parent(scope);
    }
    None
}

/// Follow a comp_for chain to its innermost `for` clause.
fn innermost_comp_for(tree: &Tree, comp_for: NodeIndex) -> NodeIndex {
    let mut innermost = comp_for;
    let mut current = comp_for;
    loop {
        match tree.children(current).last() {
            Some(&next)
                if matches!(tree.kind(next), SyntaxKind::CompFor | SyntaxKind::CompIf) =>
            {
                if tree.kind(next) == SyntaxKind::CompFor {
                    innermost = next;
                }
                current = next;
            }
            _ => return innermost,
        }
    }
}

fn is_outermost_comp_for(tree: &Tree, comp_for: NodeIndex) -> bool {
    tree.parent(comp_for)
        .is_some_and(|p| !matches!(tree.kind(p), SyntaxKind::CompFor | SyntaxKind::CompIf))
}

/// Is `via` (the direct child of `scope` the ancestor chain passes through)
/// the function's suite, or is `node` a parameter name?
fn in_scope_body_or_params(tree: &Tree, scope: NodeIndex, via: NodeIndex, node: NodeIndex) -> bool {
    let children = tree.children(scope);
    let Some(&last) = children.last() else { return false };
    if via == last {
        // Suite for defs, body expression for lambdas.
        return true;
    }
    // Parameter name?
    if tree.kind(node) == SyntaxKind::Name
        && let Some(param) = tree.parent(node)
        && tree.kind(param) == SyntaxKind::Param
        && param_name(tree, param) == Some(node)
    {
        return true;
    }
    false
}

/// The statement/clause node that defines this Name leaf, or None if the
/// name is a plain reference.
///
/// `include_trailer_targets` additionally matches attribute targets like the
/// `x` in `self.x = 1` (used by the instance-attribute scan); plain scope
/// filters pass `false` so only simple names bind locally.
pub fn get_definition(
    tree: &Tree,
    name: NodeIndex,
    include_trailer_targets: bool,
) -> Option<NodeIndex> {
    debug_assert_eq!(tree.kind(name), SyntaxKind::Name, "get_definition of non-name");
    let mut passed_trailer = false;
    let mut prev = name;
    let mut current = tree.parent(name);
    while let Some(node) = current {
        let children = tree.children(node);
        match tree.kind(node) {
            SyntaxKind::Trailer | SyntaxKind::AtomExpr => {
                passed_trailer = true;
            }
            SyntaxKind::ExprStmt => {
                let is_target = children.len() > 1 && children.last() != Some(&prev);
                return (is_target && (!passed_trailer || include_trailer_targets))
                    .then_some(node);
            }
            SyntaxKind::AnnAssign | SyntaxKind::AugAssign => {
                let is_target = children.first() == Some(&prev);
                return (is_target && (!passed_trailer || include_trailer_targets))
                    .then_some(node);
            }
            SyntaxKind::ForStmt | SyntaxKind::CompFor => {
                let is_target = children.first() == Some(&prev);
                return (is_target && !passed_trailer).then_some(node);
            }
            SyntaxKind::WithItem => {
                let is_target = children.len() > 1 && children[1] == prev;
                return (is_target && !passed_trailer).then_some(node);
            }
            SyntaxKind::ExceptClause => {
                // The `as` name is a direct Name child before the suite.
                return (children.contains(&name) && children.first() != Some(&name))
                    .then_some(node);
            }
            SyntaxKind::Funcdef | SyntaxKind::Classdef => {
                return (children.first() == Some(&prev)).then_some(node);
            }
            SyntaxKind::Param => {
                return (param_name(tree, node) == Some(name)).then_some(node);
            }
            SyntaxKind::GlobalStmt => return Some(node),
            SyntaxKind::ImportAsName | SyntaxKind::DottedAsName => {
                // `import a.b as c` / `from m import a as b`: the alias
                // defines; without an alias the (first/only) name defines.
                let defines = if children.len() > 1 {
                    children.last() == Some(&prev)
                } else {
                    true
                };
                let stmt = tree.search_ancestor(
                    node,
                    &[SyntaxKind::ImportName, SyntaxKind::ImportFrom],
                )?;
                return defines.then_some(stmt);
            }
            SyntaxKind::DottedName => {
                // Inside `import a.b` (no alias) only the first segment
                // binds a module name.
                let in_import_name = tree
                    .parent(node)
                    .is_some_and(|p| tree.kind(p) == SyntaxKind::DottedAsName);
                if !in_import_name {
                    return None;
                }
                let aliased = tree
                    .parent(node)
                    .map(|p| tree.children(p).len() > 1)
                    .unwrap_or(false);
                if aliased {
                    return None; // the alias defines instead
                }
                if children.first() != Some(&prev) {
                    return None;
                }
                let stmt = tree.search_ancestor(node, &[SyntaxKind::ImportName])?;
                return Some(stmt);
            }
            SyntaxKind::ImportFrom => {
                // `from x import *` has no name leaves to define;
                // module-path names never define.
                return None;
            }
            // Expression containers the chain may pass through.
            SyntaxKind::TestList
            | SyntaxKind::Atom
            | SyntaxKind::StarExpr => {}
            // Anything else ends the walk: the name is a reference.
            _ => return None,
        }
        prev = node;
        current = tree.parent(node);
    }
    None
}

/// All Name leaves in `scope` (not nested scopes) that are definitions,
/// driven by the used-names index rather than a tree walk.
pub fn scope_definitions<'t>(
    tree: &'t Tree,
    scope: NodeIndex,
    atom: pysense_common::interner::Atom,
) -> impl Iterator<Item = NodeIndex> + 't {
    tree.used_names(atom)
        .iter()
        .copied()
        .filter(move |&name| {
            get_parent_scope(tree, name) == Some(scope)
                && get_definition(tree, name, false).is_some()
        })
}

// ---------------------------------------------------------------------------
// Typed accessors over documented child layouts
// ---------------------------------------------------------------------------

/// `*` count of a Param: 0, 1 (`*args` or keyword-only marker) or 2.
pub fn param_star_count(tree: &Tree, param: NodeIndex) -> u32 {
    match tree.children(param).first() {
        Some(&first) if tree.leaf_is(first, "*") => 1,
        Some(&first) if tree.leaf_is(first, "**") => 2,
        _ => 0,
    }
}

/// The Name leaf of a Param; None for a bare `*` marker.
pub fn param_name(tree: &Tree, param: NodeIndex) -> Option<NodeIndex> {
    tree.children(param)
        .iter()
        .copied()
        .find(|&c| tree.kind(c) == SyntaxKind::Name)
}

/// The annotation expression of a Param (the node following `:`).
pub fn param_annotation(tree: &Tree, param: NodeIndex) -> Option<NodeIndex> {
    child_after_marker(tree, param, ":")
}

/// The default expression of a Param (the node following `=`).
pub fn param_default(tree: &Tree, param: NodeIndex) -> Option<NodeIndex> {
    child_after_marker(tree, param, "=")
}

fn child_after_marker(tree: &Tree, node: NodeIndex, marker: &str) -> Option<NodeIndex> {
    let children = tree.children(node);
    children
        .iter()
        .position(|&c| tree.leaf_is(c, marker))
        .and_then(|i| children.get(i + 1).copied())
}

pub fn funcdef_name(tree: &Tree, funcdef: NodeIndex) -> NodeIndex {
    tree.children(funcdef)[0]
}

pub fn funcdef_params(tree: &Tree, funcdef: NodeIndex) -> &[NodeIndex] {
    let parameters = tree.children(funcdef)[1];
    tree.children(parameters)
}

/// Lambda parameter list (Param children of its Parameters node).
pub fn lambda_params(tree: &Tree, lambda: NodeIndex) -> &[NodeIndex] {
    let parameters = tree.children(lambda)[0];
    tree.children(parameters)
}

pub fn funcdef_suite(tree: &Tree, funcdef: NodeIndex) -> NodeIndex {
    *tree.children(funcdef).last().expect("funcdef without suite")
}

/// Return annotation of a def, if present.
pub fn funcdef_annotation(tree: &Tree, funcdef: NodeIndex) -> Option<NodeIndex> {
    let children = tree.children(funcdef);
    (children.len() == 4).then(|| children[2])
}

pub fn classdef_name(tree: &Tree, classdef: NodeIndex) -> NodeIndex {
    tree.children(classdef)[0]
}

pub fn classdef_suite(tree: &Tree, classdef: NodeIndex) -> NodeIndex {
    *tree.children(classdef).last().expect("classdef without suite")
}

/// The Arglist of base classes, if the class has parentheses with content.
pub fn classdef_bases(tree: &Tree, classdef: NodeIndex) -> Option<NodeIndex> {
    let children = tree.children(classdef);
    (children.len() == 3).then(|| children[1])
}

/// Decorator nodes applied to this def/class, outermost first (source
/// order), if it is wrapped in a Decorated node.
pub fn get_decorators<'t>(tree: &'t Tree, def_node: NodeIndex) -> &'t [NodeIndex] {
    match tree.parent(def_node) {
        Some(parent) if tree.kind(parent) == SyntaxKind::Decorated => {
            let children = tree.children(parent);
            &children[..children.len() - 1]
        }
        _ => &[],
    }
}

/// Collect nodes of `kinds` inside `scope`'s body without entering nested
/// scopes. Used for return/yield discovery and self-attribute scans.
pub fn walk_scope(tree: &Tree, scope: NodeIndex, kinds: &[SyntaxKind]) -> Vec<NodeIndex> {
    let mut result = Vec::new();
    let start: Vec<NodeIndex> = match tree.kind(scope) {
        SyntaxKind::Funcdef | SyntaxKind::Classdef => {
            vec![*tree.children(scope).last().expect("scope without body")]
        }
        _ => tree.children(scope).to_vec(),
    };
    let mut stack = start;
    while let Some(node) = stack.pop() {
        if kinds.contains(&tree.kind(node)) {
            result.push(node);
        }
        if tree.kind(node).is_scope() && node != scope {
            continue; // don't descend into nested scopes
        }
        for &child in tree.children(node).iter().rev() {
            stack.push(child);
        }
    }
    result.sort();
    result
}

/// The docstring of a Module / Funcdef / Classdef scope, cleaned of quotes
/// and prefixes.
pub fn get_docstring(tree: &Tree, scope: NodeIndex) -> Option<Arc<str>> {
    let body = match tree.kind(scope) {
        SyntaxKind::Module => scope,
        SyntaxKind::Funcdef => funcdef_suite(tree, scope),
        SyntaxKind::Classdef => classdef_suite(tree, scope),
        _ => return None,
    };
    let &first = tree.children(body).first()?;
    if tree.kind(first) != SyntaxKind::ExprStmt {
        return None;
    }
    let children = tree.children(first);
    if children.len() != 1 {
        return None;
    }
    let &leaf = children.first()?;
    if tree.kind(leaf) != SyntaxKind::Str {
        return None;
    }
    Some(Arc::from(clean_string_literal(&tree.text(leaf))))
}

/// Strip string prefixes and quotes from a literal's source text.
pub fn clean_string_literal(raw: &str) -> String {
    let trimmed = raw.trim_start_matches(|c: char| "rbfuRBFU".contains(c));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = trimmed.strip_prefix(quote) {
            return inner.strip_suffix(quote).unwrap_or(inner).to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/scope_tests.rs"]
mod scope_tests;
