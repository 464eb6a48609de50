use super::*;
use crate::parser::parse_module;
use pysense_common::interner::Interner;

fn parse(source: &str) -> Tree {
    parse_module(source, Arc::new(Interner::new()))
}

fn name_at(tree: &Tree, text: &str, occurrence: usize) -> NodeIndex {
    let atom = tree.interner().intern(text);
    tree.used_names(atom)[occurrence]
}

#[test]
fn test_parent_scope_module_and_function() {
    let tree = parse("x = 1\ndef f():\n    y = 2\n");
    let x = name_at(&tree, "x", 0);
    assert_eq!(tree.kind(get_parent_scope(&tree, x).unwrap()), SyntaxKind::Module);
    let y = name_at(&tree, "y", 0);
    assert_eq!(tree.kind(get_parent_scope(&tree, y).unwrap()), SyntaxKind::Funcdef);
    // The function's own name belongs to the module.
    let f = name_at(&tree, "f", 0);
    assert_eq!(tree.kind(get_parent_scope(&tree, f).unwrap()), SyntaxKind::Module);
}

#[test]
fn test_param_default_evaluates_outside() {
    let tree = parse("d = 1\ndef f(a=d):\n    pass\n");
    // The `d` in the default belongs to the module scope.
    let d_use = name_at(&tree, "d", 1);
    assert_eq!(
        tree.kind(get_parent_scope(&tree, d_use).unwrap()),
        SyntaxKind::Module
    );
    // The parameter name belongs to the function.
    let a = name_at(&tree, "a", 0);
    assert_eq!(tree.kind(get_parent_scope(&tree, a).unwrap()), SyntaxKind::Funcdef);
}

#[test]
fn test_get_definition_assignment_targets() {
    let tree = parse("x = y\n");
    let x = name_at(&tree, "x", 0);
    let y = name_at(&tree, "y", 0);
    assert!(get_definition(&tree, x, false).is_some());
    assert!(get_definition(&tree, y, false).is_none());
}

#[test]
fn test_get_definition_tuple_targets() {
    let tree = parse("a, (b, c) = value\n");
    for name in ["a", "b", "c"] {
        let leaf = name_at(&tree, name, 0);
        let def = get_definition(&tree, leaf, false).unwrap();
        assert_eq!(tree.kind(def), SyntaxKind::ExprStmt);
    }
}

#[test]
fn test_get_definition_attribute_target_needs_flag() {
    let tree = parse("self.x = 1\n");
    let x = name_at(&tree, "x", 0);
    assert!(get_definition(&tree, x, false).is_none());
    assert!(get_definition(&tree, x, true).is_some());
}

#[test]
fn test_get_definition_imports() {
    let tree = parse("import os.path as p\nfrom sys import argv\n");
    let p = name_at(&tree, "p", 0);
    assert_eq!(tree.kind(get_definition(&tree, p, false).unwrap()), SyntaxKind::ImportName);
    let argv = name_at(&tree, "argv", 0);
    assert_eq!(
        tree.kind(get_definition(&tree, argv, false).unwrap()),
        SyntaxKind::ImportFrom
    );
    // `os` in `import os.path as p` does not bind (the alias does).
    let os = name_at(&tree, "os", 0);
    assert!(get_definition(&tree, os, false).is_none());
}

#[test]
fn test_get_definition_for_and_comprehension() {
    let tree = parse("for v in xs:\n    pass\nys = [i for i in xs]\n");
    let v = name_at(&tree, "v", 0);
    assert_eq!(tree.kind(get_definition(&tree, v, false).unwrap()), SyntaxKind::ForStmt);
    // Occurrence 0 is the comprehension entry (a reference); occurrence 1
    // is the `for i` target.
    let i_entry = name_at(&tree, "i", 0);
    assert!(get_definition(&tree, i_entry, false).is_none());
    let i_target = name_at(&tree, "i", 1);
    assert_eq!(
        tree.kind(get_definition(&tree, i_target, false).unwrap()),
        SyntaxKind::CompFor
    );
}

#[test]
fn test_param_accessors() {
    let tree = parse("def f(a, b: int = 3, *args, **kwargs):\n    pass\n");
    let funcdef = get_definition(&tree, name_at(&tree, "f", 0), false).unwrap();
    let params = funcdef_params(&tree, funcdef);
    assert_eq!(params.len(), 4);
    assert_eq!(param_star_count(&tree, params[0]), 0);
    assert!(param_annotation(&tree, params[0]).is_none());
    assert!(param_default(&tree, params[0]).is_none());
    assert!(param_annotation(&tree, params[1]).is_some());
    assert!(param_default(&tree, params[1]).is_some());
    assert_eq!(param_star_count(&tree, params[2]), 1);
    assert_eq!(param_star_count(&tree, params[3]), 2);
}

#[test]
fn test_docstring() {
    let tree = parse("def f():\n    \"\"\"Doc text.\"\"\"\n    return 1\n");
    let funcdef = get_definition(&tree, name_at(&tree, "f", 0), false).unwrap();
    assert_eq!(&*get_docstring(&tree, funcdef).unwrap(), "Doc text.");
}

#[test]
fn test_walk_scope_skips_nested() {
    let tree = parse("def f():\n    return 1\n    def g():\n        return 2\n");
    let f = get_definition(&tree, name_at(&tree, "f", 0), false).unwrap();
    let returns = walk_scope(&tree, f, &[SyntaxKind::ReturnStmt]);
    assert_eq!(returns.len(), 1);
}

#[test]
fn test_comprehension_iterated_expr_scope() {
    let tree = parse("def f(xs):\n    return [i for i in xs]\n");
    // `xs` inside the comprehension's outermost `in` clause evaluates in
    // the function scope, not the comprehension scope.
    let xs_use = name_at(&tree, "xs", 1);
    assert_eq!(
        tree.kind(get_parent_scope(&tree, xs_use).unwrap()),
        SyntaxKind::Funcdef
    );
    let i = name_at(&tree, "i", 0);
    assert_eq!(tree.kind(get_parent_scope(&tree, i).unwrap()), SyntaxKind::CompFor);
}
