use pysense_common::interner::Interner;
use pysense_common::position::Position;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::parser::parse_module;
use pysense_syntax::tree::{NodeIndex, Tree};
use std::sync::Arc;

fn parse(source: &str) -> Tree {
    parse_module(source, Arc::new(Interner::new()))
}

fn stmt(tree: &Tree, index: usize) -> NodeIndex {
    tree.children(tree.root())[index]
}

#[test]
fn test_module_statements() {
    let tree = parse("x = 1\ny = 2\n\nz = x\n");
    assert_eq!(tree.kind(tree.root()), SyntaxKind::Module);
    assert_eq!(tree.children(tree.root()).len(), 3);
    for &child in tree.children(tree.root()) {
        assert_eq!(tree.kind(child), SyntaxKind::ExprStmt);
    }
}

#[test]
fn test_assignment_shapes() {
    let tree = parse("a = b = rhs\nc += 1\nd: int = 5\n");
    let chain = stmt(&tree, 0);
    assert_eq!(tree.kind(chain), SyntaxKind::ExprStmt);
    assert_eq!(tree.children(chain).len(), 3);

    let aug = stmt(&tree, 1);
    assert_eq!(tree.kind(aug), SyntaxKind::AugAssign);
    assert_eq!(tree.children(aug).len(), 3);
    assert!(tree.leaf_is(tree.children(aug)[1], "+="));

    let ann = stmt(&tree, 2);
    assert_eq!(tree.kind(ann), SyntaxKind::AnnAssign);
    assert_eq!(tree.children(ann).len(), 3);
}

#[test]
fn test_funcdef_shape() {
    let tree = parse("def f(a, b=1) -> int:\n    return a\n");
    let funcdef = stmt(&tree, 0);
    assert_eq!(tree.kind(funcdef), SyntaxKind::Funcdef);
    let children = tree.children(funcdef);
    assert_eq!(children.len(), 4); // name, params, annotation, suite
    assert_eq!(tree.kind(children[0]), SyntaxKind::Name);
    assert_eq!(tree.kind(children[1]), SyntaxKind::Parameters);
    assert_eq!(tree.kind(children[3]), SyntaxKind::Suite);
    assert_eq!(tree.children(children[1]).len(), 2);
}

#[test]
fn test_decorated_def() {
    let tree = parse("@outer\n@inner(arg)\ndef f():\n    pass\n");
    let decorated = stmt(&tree, 0);
    assert_eq!(tree.kind(decorated), SyntaxKind::Decorated);
    let children = tree.children(decorated);
    assert_eq!(children.len(), 3);
    assert_eq!(tree.kind(children[0]), SyntaxKind::Decorator);
    assert_eq!(tree.kind(children[1]), SyntaxKind::Decorator);
    assert_eq!(tree.kind(children[2]), SyntaxKind::Funcdef);
    // The second decorator carries its call trailer.
    let inner_expr = tree.children(children[1])[0];
    assert_eq!(tree.kind(inner_expr), SyntaxKind::AtomExpr);
}

#[test]
fn test_class_with_bases() {
    let tree = parse("class C(Base, Other):\n    attr = 1\n");
    let classdef = stmt(&tree, 0);
    assert_eq!(tree.kind(classdef), SyntaxKind::Classdef);
    assert_eq!(tree.children(classdef).len(), 3);
    assert_eq!(tree.kind(tree.children(classdef)[1]), SyntaxKind::Arglist);
}

#[test]
fn test_trailers() {
    let tree = parse("obj.attr.method(1, k=2)[0]\n");
    let expr = tree.children(stmt(&tree, 0))[0];
    assert_eq!(tree.kind(expr), SyntaxKind::AtomExpr);
    let children = tree.children(expr);
    // base + 4 trailers: .attr .method (..) [..]
    assert_eq!(children.len(), 5);
    for &trailer in &children[1..] {
        assert_eq!(tree.kind(trailer), SyntaxKind::Trailer);
    }
}

#[test]
fn test_slice_shapes() {
    let tree = parse("a[1:]\nb[::2]\nc[1:2:3]\nd[0]\n");
    let subscript_of = |i: usize| {
        let expr = tree.children(stmt(&tree, i))[0];
        let trailer = tree.children(expr)[1];
        tree.children(trailer)[1]
    };
    assert_eq!(tree.kind(subscript_of(0)), SyntaxKind::Subscript);
    assert_eq!(tree.kind(subscript_of(1)), SyntaxKind::Subscript);
    assert_eq!(tree.kind(subscript_of(2)), SyntaxKind::Subscript);
    // A plain index is not wrapped.
    assert_eq!(tree.kind(subscript_of(3)), SyntaxKind::Number);
}

#[test]
fn test_comprehensions_and_literals() {
    let tree = parse("a = [x for x in xs]\nb = {k: v for k, v in items}\nc = {1: 'one'}\nd = {1, 2}\n");
    let inner = |i: usize| {
        let rhs = *tree.children(stmt(&tree, i)).last().unwrap();
        tree.children(rhs)[1]
    };
    assert_eq!(tree.kind(inner(0)), SyntaxKind::Comprehension);
    assert_eq!(tree.kind(inner(1)), SyntaxKind::DictComp);
    assert_eq!(tree.kind(inner(2)), SyntaxKind::DictMaker);
    assert_eq!(tree.kind(inner(3)), SyntaxKind::TestList);
}

#[test]
fn test_operator_precedence() {
    let tree = parse("r = 1 + 2 * 3\n");
    let rhs = *tree.children(stmt(&tree, 0)).last().unwrap();
    assert_eq!(tree.kind(rhs), SyntaxKind::BinOp);
    // Top node is the `+`; its right child is the `*` BinOp.
    let children = tree.children(rhs);
    assert!(tree.leaf_is(children[1], "+"));
    assert_eq!(tree.kind(children[2]), SyntaxKind::BinOp);
}

#[test]
fn test_star_unpacking_targets() {
    let tree = parse("a, *b, c = seq\n");
    let stmt_node = stmt(&tree, 0);
    let targets = tree.children(stmt_node)[0];
    assert_eq!(tree.kind(targets), SyntaxKind::TestList);
    let items = tree.children(targets);
    assert_eq!(items.len(), 3);
    assert_eq!(tree.kind(items[1]), SyntaxKind::StarExpr);
}

#[test]
fn test_imports() {
    let tree = parse("import os.path, sys as system\nfrom ..pkg import name as alias, other\nfrom x import *\n");
    assert_eq!(tree.kind(stmt(&tree, 0)), SyntaxKind::ImportName);
    assert_eq!(tree.children(stmt(&tree, 0)).len(), 2);
    let from_import = stmt(&tree, 1);
    assert_eq!(tree.kind(from_import), SyntaxKind::ImportFrom);
    // Two leading dots for the relative level.
    let dots = tree
        .children(from_import)
        .iter()
        .filter(|&&c| tree.leaf_is(c, ".") || tree.leaf_is(c, ".."))
        .count();
    assert!(dots >= 1);
    let star_import = stmt(&tree, 2);
    assert!(tree.children(star_import).iter().any(|&c| tree.leaf_is(c, "*")));
}

#[test]
fn test_lambda_and_ternary() {
    let tree = parse("f = lambda a, b=2: a\nx = 1 if cond else 2\n");
    let lambda = *tree.children(stmt(&tree, 0)).last().unwrap();
    assert_eq!(tree.kind(lambda), SyntaxKind::Lambda);
    assert_eq!(tree.children(tree.children(lambda)[0]).len(), 2);
    let ternary = *tree.children(stmt(&tree, 1)).last().unwrap();
    assert_eq!(tree.kind(ternary), SyntaxKind::Ternary);
    assert_eq!(tree.children(ternary).len(), 5);
}

#[test]
fn test_error_recovery_keeps_later_statements() {
    let tree = parse("def :bad syntax here\nx = 1\n");
    let statements = tree.children(tree.root());
    assert!(statements.len() >= 2);
    assert_eq!(tree.kind(*statements.last().unwrap()), SyntaxKind::ExprStmt);
}

#[test]
fn test_positions() {
    let tree = parse("x = 1\ndef f():\n    y = 2\n");
    let x = stmt(&tree, 0);
    assert_eq!(tree.start_pos(x), Position::new(1, 0));
    let funcdef = stmt(&tree, 1);
    assert_eq!(tree.start_pos(funcdef).line, 2);
    // `y = 2` starts at column 4 of line 3.
    let suite = *tree.children(funcdef).last().unwrap();
    let y_stmt = tree.children(suite)[0];
    assert_eq!(tree.start_pos(y_stmt), Position::new(3, 4));
}

#[test]
fn test_try_and_with() {
    let tree = parse(
        "try:\n    a = 1\nexcept ValueError as e:\n    b = 2\nfinally:\n    c = 3\nwith open(p) as fh:\n    d = 4\n",
    );
    let try_stmt = stmt(&tree, 0);
    assert_eq!(tree.kind(try_stmt), SyntaxKind::TryStmt);
    assert!(tree
        .children(try_stmt)
        .iter()
        .any(|&c| tree.kind(c) == SyntaxKind::ExceptClause));
    let with_stmt = stmt(&tree, 1);
    assert_eq!(tree.kind(with_stmt), SyntaxKind::WithStmt);
    assert_eq!(tree.kind(tree.children(with_stmt)[0]), SyntaxKind::WithItem);
}

#[test]
fn test_used_names_index() {
    let tree = parse("value = 1\nprint(value)\nvalue = 2\n");
    let atom = tree.interner().intern("value");
    assert_eq!(tree.used_names(atom).len(), 3);
}
