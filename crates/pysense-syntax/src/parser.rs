//! Lenient recursive-descent parser for the supported source subset.
//!
//! The parser never fails: statements it cannot understand become
//! `ErrorNode`s and scanning resynchronizes at the next logical line.
//! Inference quality degrades gracefully on such trees; a broken statement
//! in an editor buffer must not take the rest of the module down with it.

use crate::kind::SyntaxKind;
use crate::scanner::{Scanner, Token, TokenKind};
use crate::tree::{Node, NodeIndex, Tree};
use pysense_common::interner::{Atom, Interner};
use pysense_common::position::{Position, Span};
use std::sync::Arc;
use tracing::trace;

/// Parse a module source into a tree.
pub fn parse_module(source: &str, interner: Arc<Interner>) -> Tree {
    let tokens = Scanner::new(source, interner.clone()).tokenize();
    let mut parser = Parser {
        tokens,
        pos: 0,
        nodes: Vec::new(),
        interner: interner.clone(),
    };
    let root = parser.parse_file();
    trace!(nodes = parser.nodes.len(), "parsed module");
    Tree::new(parser.nodes, root, interner)
}

/// Parse a single expression (used for docstring type strings and
/// annotation re-parsing). Returns the tree and the expression root.
pub fn parse_expression(source: &str, interner: Arc<Interner>) -> (Tree, Option<NodeIndex>) {
    let tree = parse_module(source, interner);
    let root = tree.root();
    let expr = tree.children(root).first().copied().and_then(|stmt| {
        if tree.kind(stmt) == SyntaxKind::ExprStmt {
            tree.children(stmt).first().copied()
        } else {
            None
        }
    });
    (tree, expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nodes: Vec<Node>,
    interner: Arc<Interner>,
}

impl Parser {
    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn text_is(&self, text: &str) -> bool {
        let t = self.current();
        (t.kind == TokenKind::Op || t.kind == TokenKind::Keyword)
            && &*self.interner.resolve(t.text) == text
    }

    fn at_name(&self) -> bool {
        self.kind() == TokenKind::Name
    }

    fn advance(&mut self) -> Token {
        let token = *self.current();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Consume the current token into a leaf node.
    fn leaf(&mut self) -> NodeIndex {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Name => SyntaxKind::Name,
            TokenKind::Number => SyntaxKind::Number,
            TokenKind::Str => SyntaxKind::Str,
            TokenKind::Keyword => SyntaxKind::Keyword,
            _ => SyntaxKind::Operator,
        };
        self.push_leaf(kind, token)
    }

    fn push_leaf(&mut self, kind: SyntaxKind, token: Token) -> NodeIndex {
        let index = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            text: token.text,
            span: Span::new(token.start, token.end),
        });
        index
    }

    /// Consume a token if it matches, building its leaf.
    fn eat(&mut self, text: &str) -> Option<NodeIndex> {
        if self.text_is(text) { Some(self.leaf()) } else { None }
    }

    /// Consume an expected token; on mismatch just record nothing (lenient).
    fn expect(&mut self, text: &str) -> Option<NodeIndex> {
        let got = self.eat(text);
        if got.is_none() {
            trace!(expected = text, "parser: missing expected token");
        }
        got
    }

    fn node(&mut self, kind: SyntaxKind, children: Vec<NodeIndex>) -> NodeIndex {
        let span = self.span_of(&children);
        let index = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children,
            text: Atom::NONE,
            span,
        });
        index
    }

    fn span_of(&self, children: &[NodeIndex]) -> Span {
        match (children.first(), children.last()) {
            (Some(&first), Some(&last)) => Span::new(
                self.nodes[first.0 as usize].span.start,
                self.nodes[last.0 as usize].span.end,
            ),
            _ => {
                let here = self.current().start;
                Span::new(here, here)
            }
        }
    }

    fn skip_newlines(&mut self) {
        while self.kind() == TokenKind::Newline {
            self.advance();
        }
    }

    /// Error recovery: consume to end of the logical line.
    fn recover(&mut self, mut consumed: Vec<NodeIndex>) -> NodeIndex {
        loop {
            match self.kind() {
                TokenKind::Newline => {
                    self.advance();
                    break;
                }
                TokenKind::EndMarker | TokenKind::Dedent => break,
                _ => {
                    let leaf = self.leaf();
                    consumed.push(leaf);
                }
            }
        }
        self.node(SyntaxKind::ErrorNode, consumed)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_file(&mut self) -> NodeIndex {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            match self.kind() {
                TokenKind::EndMarker => break,
                TokenKind::Indent | TokenKind::Dedent => {
                    // Stray indentation at module level: drop it.
                    self.advance();
                }
                _ => {
                    let stmt = self.parse_statement();
                    statements.push(stmt);
                }
            }
        }
        self.node(SyntaxKind::Module, statements)
    }

    fn parse_statement(&mut self) -> NodeIndex {
        if self.kind() == TokenKind::Keyword {
            let text = self.interner.resolve(self.current().text);
            match &*text {
                "def" => return self.parse_funcdef(),
                "class" => return self.parse_classdef(),
                "if" => return self.parse_if(),
                "for" => return self.parse_for(),
                "while" => return self.parse_while(),
                "with" => return self.parse_with(),
                "try" => return self.parse_try(),
                "return" => return self.parse_return(),
                "import" => return self.parse_import_name(),
                "from" => return self.parse_import_from(),
                "global" | "nonlocal" => return self.parse_global(),
                "pass" | "break" | "continue" => {
                    let leaf = self.leaf();
                    self.end_simple_stmt();
                    return leaf;
                }
                "del" | "assert" | "raise" => {
                    // Consume the keyword, keep the expressions so the
                    // used-names index sees them.
                    self.advance();
                    if self.kind() == TokenKind::Newline {
                        self.advance();
                        return self.node(SyntaxKind::ExprStmt, vec![]);
                    }
                    let expr = self.parse_testlist(true);
                    let stmt = self.node(SyntaxKind::ExprStmt, vec![expr]);
                    self.end_simple_stmt();
                    return stmt;
                }
                "async" => {
                    // `async def` / `async for` / `async with`: drop the
                    // marker and parse the underlying statement.
                    self.advance();
                    return self.parse_statement();
                }
                "yield" => {
                    let expr = self.parse_yield_expr();
                    let stmt = self.node(SyntaxKind::ExprStmt, vec![expr]);
                    self.end_simple_stmt();
                    return stmt;
                }
                _ => {}
            }
        }
        if self.text_is("@") {
            return self.parse_decorated();
        }
        self.parse_expr_stmt()
    }

    fn end_simple_stmt(&mut self) {
        // `a = 1; b = 2` — the caller loops, we just consume separators.
        if self.text_is(";") {
            self.advance();
            return;
        }
        if self.kind() == TokenKind::Newline {
            self.advance();
        }
    }

    fn parse_expr_stmt(&mut self) -> NodeIndex {
        let first = self.parse_testlist(true);

        if self.text_is(":") && self.nodes[first.0 as usize].kind != SyntaxKind::TestList {
            // Annotated assignment: `target: annotation [= value]`.
            self.advance();
            let annotation = self.parse_test();
            let mut children = vec![first, annotation];
            if self.eat("=").is_some() {
                children.push(self.parse_testlist(true));
            }
            let stmt = self.node(SyntaxKind::AnnAssign, children);
            self.end_simple_stmt();
            return stmt;
        }

        if self.kind() == TokenKind::Op {
            let text = self.interner.resolve(self.current().text);
            if text.len() >= 2
                && text.ends_with('=')
                && !matches!(&*text, "==" | "!=" | "<=" | ">=" | ":=")
            {
                let op = self.leaf();
                let value = self.parse_testlist(true);
                let stmt = self.node(SyntaxKind::AugAssign, vec![first, op, value]);
                self.end_simple_stmt();
                return stmt;
            }
        }

        let mut children = vec![first];
        while self.text_is("=") {
            self.advance();
            if self.text_is("yield") {
                children.push(self.parse_yield_expr());
            } else {
                children.push(self.parse_testlist(true));
            }
        }
        let stmt = self.node(SyntaxKind::ExprStmt, children);
        self.end_simple_stmt();
        stmt
    }

    fn parse_return(&mut self) -> NodeIndex {
        self.advance();
        let mut children = Vec::new();
        if self.kind() != TokenKind::Newline && !self.text_is(";") {
            children.push(self.parse_testlist(true));
        }
        let stmt = self.node(SyntaxKind::ReturnStmt, children);
        self.end_simple_stmt();
        stmt
    }

    fn parse_yield_expr(&mut self) -> NodeIndex {
        self.advance();
        // `yield from x` surfaces as a plain yield of x's elements; the
        // evaluator treats them alike.
        let _ = self.eat("from");
        let mut children = Vec::new();
        if self.kind() != TokenKind::Newline
            && !self.text_is(")")
            && !self.text_is(";")
            && self.kind() != TokenKind::EndMarker
        {
            children.push(self.parse_testlist(true));
        }
        self.node(SyntaxKind::YieldExpr, children)
    }

    fn parse_global(&mut self) -> NodeIndex {
        let is_global = self.text_is("global");
        self.advance();
        let mut names = Vec::new();
        while self.at_name() {
            names.push(self.leaf());
            if self.eat(",").is_none() {
                break;
            }
        }
        // `nonlocal` resolves lexically through parent filters anyway; it is
        // parsed for the used-names index but produces no global marker.
        let kind = if is_global { SyntaxKind::GlobalStmt } else { SyntaxKind::ErrorNode };
        let stmt = self.node(kind, names);
        self.end_simple_stmt();
        stmt
    }

    fn parse_funcdef(&mut self) -> NodeIndex {
        self.advance(); // def
        if !self.at_name() {
            return self.recover(vec![]);
        }
        let name = self.leaf();
        let params = self.parse_parameters(true);
        let mut children = vec![name, params];
        if self.eat("->").is_some() {
            children.push(self.parse_test());
        }
        self.expect(":");
        children.push(self.parse_suite());
        self.node(SyntaxKind::Funcdef, children)
    }

    fn parse_classdef(&mut self) -> NodeIndex {
        self.advance(); // class
        if !self.at_name() {
            return self.recover(vec![]);
        }
        let name = self.leaf();
        let mut children = vec![name];
        if self.text_is("(") {
            self.advance();
            if !self.text_is(")") {
                children.push(self.parse_arglist());
            }
            self.expect(")");
        }
        self.expect(":");
        children.push(self.parse_suite());
        self.node(SyntaxKind::Classdef, children)
    }

    fn parse_decorated(&mut self) -> NodeIndex {
        let mut children = Vec::new();
        while self.text_is("@") {
            self.advance();
            let expr = self.parse_atom_expr();
            children.push(self.node(SyntaxKind::Decorator, vec![expr]));
            self.skip_newlines();
        }
        let decorated = if self.text_is("def") {
            self.parse_funcdef()
        } else if self.text_is("class") {
            self.parse_classdef()
        } else if self.text_is("async") {
            self.advance();
            self.parse_funcdef()
        } else {
            self.recover(vec![])
        };
        children.push(decorated);
        self.node(SyntaxKind::Decorated, children)
    }

    /// Parse `(params)` for defs, or a bare varargslist for lambdas.
    fn parse_parameters(&mut self, parenthesized: bool) -> NodeIndex {
        if parenthesized && self.expect("(").is_none() {
            return self.node(SyntaxKind::Parameters, vec![]);
        }
        let mut params = Vec::new();
        loop {
            if parenthesized && self.text_is(")") {
                break;
            }
            if !parenthesized && self.text_is(":") {
                break;
            }
            if self.kind() == TokenKind::Newline || self.kind() == TokenKind::EndMarker {
                break;
            }
            let mut children = Vec::new();
            if let Some(star) = self.eat("*").or_else(|| self.eat("**")) {
                children.push(star);
            }
            if self.at_name() {
                children.push(self.leaf());
                // Annotations only exist in parenthesized parameter lists;
                // in a lambda the colon ends the parameters.
                if parenthesized {
                    if let Some(colon) = self.eat(":") {
                        children.push(colon);
                        children.push(self.parse_test());
                    }
                }
                if let Some(eq) = self.eat("=") {
                    children.push(eq);
                    children.push(self.parse_test());
                }
            }
            if children.is_empty() {
                // Unparsable parameter junk: drop one token and continue.
                self.advance();
                continue;
            }
            params.push(self.node(SyntaxKind::Param, children));
            if self.eat(",").is_none() {
                break;
            }
        }
        if parenthesized {
            self.expect(")");
        }
        self.node(SyntaxKind::Parameters, params)
    }

    fn parse_suite(&mut self) -> NodeIndex {
        if self.kind() == TokenKind::Newline {
            self.advance();
            if self.kind() != TokenKind::Indent {
                // Empty body (broken source): produce an empty suite.
                return self.node(SyntaxKind::Suite, vec![]);
            }
            self.advance();
            let mut statements = Vec::new();
            loop {
                self.skip_newlines();
                match self.kind() {
                    TokenKind::Dedent => {
                        self.advance();
                        break;
                    }
                    TokenKind::EndMarker => break,
                    _ => statements.push(self.parse_statement()),
                }
            }
            self.node(SyntaxKind::Suite, statements)
        } else {
            // Inline suite: `def f(): return x`.
            let mut statements = Vec::new();
            loop {
                statements.push(self.parse_statement());
                if self.kind() == TokenKind::Newline {
                    self.advance();
                    break;
                }
                if self.kind() == TokenKind::EndMarker || self.kind() == TokenKind::Dedent {
                    break;
                }
                if !self.text_is(";") && statements.len() > 64 {
                    break;
                }
            }
            self.node(SyntaxKind::Suite, statements)
        }
    }

    fn parse_if(&mut self) -> NodeIndex {
        self.advance(); // if
        let mut children = vec![self.parse_test()];
        self.expect(":");
        children.push(self.parse_suite());
        loop {
            if self.text_is("elif") {
                self.advance();
                children.push(self.parse_test());
                self.expect(":");
                children.push(self.parse_suite());
            } else if self.text_is("else") {
                self.advance();
                self.expect(":");
                children.push(self.parse_suite());
                break;
            } else {
                break;
            }
        }
        self.node(SyntaxKind::IfStmt, children)
    }

    fn parse_for(&mut self) -> NodeIndex {
        self.advance(); // for
        let targets = self.parse_testlist(false);
        self.expect("in");
        let iterated = self.parse_testlist(true);
        self.expect(":");
        let mut children = vec![targets, iterated, self.parse_suite()];
        if self.text_is("else") {
            self.advance();
            self.expect(":");
            children.push(self.parse_suite());
        }
        self.node(SyntaxKind::ForStmt, children)
    }

    fn parse_while(&mut self) -> NodeIndex {
        self.advance(); // while
        let cond = self.parse_test();
        self.expect(":");
        let mut children = vec![cond, self.parse_suite()];
        if self.text_is("else") {
            self.advance();
            self.expect(":");
            children.push(self.parse_suite());
        }
        self.node(SyntaxKind::WhileStmt, children)
    }

    fn parse_with(&mut self) -> NodeIndex {
        self.advance(); // with
        let mut children = Vec::new();
        loop {
            let expr = self.parse_test();
            let mut item = vec![expr];
            if self.text_is("as") {
                self.advance();
                item.push(self.parse_atom_expr());
            }
            children.push(self.node(SyntaxKind::WithItem, item));
            if self.eat(",").is_none() {
                break;
            }
        }
        self.expect(":");
        children.push(self.parse_suite());
        self.node(SyntaxKind::WithStmt, children)
    }

    fn parse_try(&mut self) -> NodeIndex {
        self.advance(); // try
        self.expect(":");
        let mut children = vec![self.parse_suite()];
        loop {
            if self.text_is("except") {
                self.advance();
                let mut clause = Vec::new();
                if !self.text_is(":") {
                    let _ = self.eat("*");
                    clause.push(self.parse_test());
                    if self.text_is("as") {
                        self.advance();
                        if self.at_name() {
                            clause.push(self.leaf());
                        }
                    }
                }
                self.expect(":");
                clause.push(self.parse_suite());
                children.push(self.node(SyntaxKind::ExceptClause, clause));
            } else if self.text_is("else") || self.text_is("finally") {
                self.advance();
                self.expect(":");
                children.push(self.parse_suite());
            } else {
                break;
            }
        }
        self.node(SyntaxKind::TryStmt, children)
    }

    fn parse_import_name(&mut self) -> NodeIndex {
        self.advance(); // import
        let mut children = Vec::new();
        loop {
            let dotted = self.parse_dotted_name();
            let mut item = vec![dotted];
            if self.text_is("as") {
                self.advance();
                if self.at_name() {
                    item.push(self.leaf());
                }
            }
            children.push(self.node(SyntaxKind::DottedAsName, item));
            if self.eat(",").is_none() {
                break;
            }
        }
        let stmt = self.node(SyntaxKind::ImportName, children);
        self.end_simple_stmt();
        stmt
    }

    fn parse_import_from(&mut self) -> NodeIndex {
        self.advance(); // from
        let mut children = Vec::new();
        while self.text_is(".") || self.text_is("...") {
            children.push(self.leaf());
        }
        if self.at_name() {
            children.push(self.parse_dotted_name());
        }
        self.expect("import");
        if let Some(star) = self.eat("*") {
            children.push(star);
        } else {
            let parenthesized = self.eat("(").is_some();
            loop {
                if !self.at_name() {
                    break;
                }
                let name = self.leaf();
                let mut item = vec![name];
                if self.text_is("as") {
                    self.advance();
                    if self.at_name() {
                        item.push(self.leaf());
                    }
                }
                children.push(self.node(SyntaxKind::ImportAsName, item));
                if self.eat(",").is_none() {
                    break;
                }
            }
            if parenthesized {
                self.expect(")");
            }
        }
        let stmt = self.node(SyntaxKind::ImportFrom, children);
        self.end_simple_stmt();
        stmt
    }

    fn parse_dotted_name(&mut self) -> NodeIndex {
        let mut names = Vec::new();
        while self.at_name() {
            names.push(self.leaf());
            if self.text_is(".") {
                self.advance();
            } else {
                break;
            }
        }
        self.node(SyntaxKind::DottedName, names)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// `test (',' test)*`, collapsing a single element to itself.
    /// `allow_star` admits `*expr` items (assignment rhs/targets).
    fn parse_testlist(&mut self, allow_star: bool) -> NodeIndex {
        let first = self.parse_test_or_star(allow_star);
        if !self.text_is(",") {
            return first;
        }
        let mut items = vec![first];
        while self.eat(",").is_some() {
            if self.expression_ahead() {
                items.push(self.parse_test_or_star(allow_star));
            } else {
                break;
            }
        }
        self.node(SyntaxKind::TestList, items)
    }

    fn parse_test_or_star(&mut self, allow_star: bool) -> NodeIndex {
        if allow_star && self.text_is("*") {
            let star = self.leaf();
            let expr = self.parse_atom_expr();
            return self.node(SyntaxKind::StarExpr, vec![star, expr]);
        }
        self.parse_test()
    }

    fn expression_ahead(&self) -> bool {
        match self.kind() {
            TokenKind::Name | TokenKind::Number | TokenKind::Str => true,
            TokenKind::Keyword => {
                let text = self.interner.resolve(self.current().text);
                matches!(&*text, "True" | "False" | "None" | "not" | "lambda" | "await")
            }
            TokenKind::Op => {
                let text = self.interner.resolve(self.current().text);
                matches!(&*text, "(" | "[" | "{" | "-" | "+" | "~" | "*" | "**" | "...")
            }
            _ => false,
        }
    }

    fn parse_test(&mut self) -> NodeIndex {
        if self.text_is("lambda") {
            return self.parse_lambda();
        }
        let then = self.parse_or_test();
        if self.text_is("if") {
            let if_kw = self.leaf();
            let cond = self.parse_or_test();
            if self.text_is("else") {
                let else_kw = self.leaf();
                let orelse = self.parse_test();
                return self.node(SyntaxKind::Ternary, vec![then, if_kw, cond, else_kw, orelse]);
            }
            return self.node(SyntaxKind::Ternary, vec![then, if_kw, cond]);
        }
        then
    }

    fn parse_lambda(&mut self) -> NodeIndex {
        self.advance(); // lambda
        let params = self.parse_parameters(false);
        self.expect(":");
        let body = self.parse_test();
        self.node(SyntaxKind::Lambda, vec![params, body])
    }

    fn parse_or_test(&mut self) -> NodeIndex {
        let mut children = vec![self.parse_and_test()];
        while self.text_is("or") {
            children.push(self.leaf());
            children.push(self.parse_and_test());
        }
        if children.len() == 1 { children[0] } else { self.node(SyntaxKind::BoolOp, children) }
    }

    fn parse_and_test(&mut self) -> NodeIndex {
        let mut children = vec![self.parse_not_test()];
        while self.text_is("and") {
            children.push(self.leaf());
            children.push(self.parse_not_test());
        }
        if children.len() == 1 { children[0] } else { self.node(SyntaxKind::BoolOp, children) }
    }

    fn parse_not_test(&mut self) -> NodeIndex {
        if self.text_is("not") {
            let not_kw = self.leaf();
            let operand = self.parse_not_test();
            return self.node(SyntaxKind::NotTest, vec![not_kw, operand]);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> NodeIndex {
        let first = self.parse_binary(0);
        let mut children = vec![first];
        loop {
            let is_comp = matches!(self.kind(), TokenKind::Op | TokenKind::Keyword) && {
                let text = self.interner.resolve(self.current().text);
                matches!(&*text, "<" | ">" | "==" | ">=" | "<=" | "!=" | "in" | "is" | "not")
            };
            if !is_comp {
                break;
            }
            // `not in` / `is not` produce two leaves.
            let op = self.leaf();
            children.push(op);
            if self.text_is("in") || self.text_is("not") {
                children.push(self.leaf());
            }
            children.push(self.parse_binary(0));
        }
        if children.len() == 1 { children[0] } else { self.node(SyntaxKind::Comparison, children) }
    }

    /// Binary operator precedence ladder, lowest first.
    const BINARY_LEVELS: &'static [&'static [&'static str]] = &[
        &["|"],
        &["^"],
        &["&"],
        &["<<", ">>"],
        &["+", "-"],
        &["*", "@", "/", "%", "//"],
    ];

    fn parse_binary(&mut self, level: usize) -> NodeIndex {
        if level >= Self::BINARY_LEVELS.len() {
            return self.parse_factor();
        }
        let mut left = self.parse_binary(level + 1);
        loop {
            let matched = self.kind() == TokenKind::Op && {
                let text = self.interner.resolve(self.current().text);
                Self::BINARY_LEVELS[level].contains(&&*text)
            };
            if !matched {
                return left;
            }
            let op = self.leaf();
            let right = self.parse_binary(level + 1);
            left = self.node(SyntaxKind::BinOp, vec![left, op, right]);
        }
    }

    fn parse_factor(&mut self) -> NodeIndex {
        if self.text_is("-") || self.text_is("+") || self.text_is("~") {
            let op = self.leaf();
            let operand = self.parse_factor();
            return self.node(SyntaxKind::Factor, vec![op, operand]);
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> NodeIndex {
        let base = self.parse_atom_expr();
        if self.text_is("**") {
            let op = self.leaf();
            let exp = self.parse_factor();
            return self.node(SyntaxKind::BinOp, vec![base, op, exp]);
        }
        base
    }

    fn parse_atom_expr(&mut self) -> NodeIndex {
        if self.text_is("await") {
            self.advance();
        }
        let base = self.parse_atom();
        let mut trailers = Vec::new();
        loop {
            if self.text_is(".") {
                let dot = self.leaf();
                if self.at_name() {
                    let name = self.leaf();
                    trailers.push(self.node(SyntaxKind::Trailer, vec![dot, name]));
                } else {
                    trailers.push(self.node(SyntaxKind::Trailer, vec![dot]));
                    break;
                }
            } else if self.text_is("(") {
                let open = self.leaf();
                let mut children = vec![open];
                if !self.text_is(")") {
                    children.push(self.parse_arglist());
                }
                if let Some(close) = self.expect(")") {
                    children.push(close);
                }
                trailers.push(self.node(SyntaxKind::Trailer, children));
            } else if self.text_is("[") {
                let open = self.leaf();
                let mut children = vec![open];
                children.push(self.parse_subscriptlist());
                if let Some(close) = self.expect("]") {
                    children.push(close);
                }
                trailers.push(self.node(SyntaxKind::Trailer, children));
            } else {
                break;
            }
        }
        if trailers.is_empty() {
            return base;
        }
        let mut children = vec![base];
        children.extend(trailers);
        self.node(SyntaxKind::AtomExpr, children)
    }

    fn parse_arglist(&mut self) -> NodeIndex {
        let mut args = Vec::new();
        loop {
            if self.text_is(")") || self.kind() == TokenKind::Newline {
                break;
            }
            let arg = if self.text_is("*") || self.text_is("**") {
                let star = self.leaf();
                let value = self.parse_test();
                self.node(SyntaxKind::Argument, vec![star, value])
            } else {
                let value = self.parse_test();
                if self.text_is("=") && self.nodes[value.0 as usize].kind == SyntaxKind::Name {
                    let eq = self.leaf();
                    let actual = self.parse_test();
                    self.node(SyntaxKind::Argument, vec![value, eq, actual])
                } else if self.text_is("for") || self.text_is("async") {
                    // Generator argument: f(x for x in xs)
                    let comp_for = self.parse_comp_for();
                    let comp = self.node(SyntaxKind::Comprehension, vec![value, comp_for]);
                    self.node(SyntaxKind::Argument, vec![comp])
                } else {
                    self.node(SyntaxKind::Argument, vec![value])
                }
            };
            args.push(arg);
            if self.eat(",").is_none() {
                break;
            }
        }
        self.node(SyntaxKind::Arglist, args)
    }

    fn parse_subscriptlist(&mut self) -> NodeIndex {
        let first = self.parse_subscript();
        if !self.text_is(",") {
            return first;
        }
        let mut items = vec![first];
        while self.eat(",").is_some() {
            if self.text_is("]") {
                break;
            }
            items.push(self.parse_subscript());
        }
        self.node(SyntaxKind::SubscriptList, items)
    }

    fn parse_subscript(&mut self) -> NodeIndex {
        let mut children = Vec::new();
        if !self.text_is(":") {
            let index = self.parse_test();
            if !self.text_is(":") {
                return index; // plain index
            }
            children.push(index);
        }
        if let Some(colon) = self.eat(":") {
            children.push(colon);
        }
        if !self.text_is("]") && !self.text_is(":") && !self.text_is(",") {
            children.push(self.parse_test());
        }
        if let Some(colon) = self.eat(":") {
            children.push(colon);
            if !self.text_is("]") && !self.text_is(",") {
                children.push(self.parse_test());
            }
        }
        self.node(SyntaxKind::Subscript, children)
    }

    fn parse_comp_for(&mut self) -> NodeIndex {
        if self.text_is("async") {
            self.advance();
        }
        self.expect("for");
        let targets = self.parse_testlist(false);
        self.expect("in");
        let iterated = self.parse_or_test();
        let mut children = vec![targets, iterated];
        if self.text_is("for") || self.text_is("async") {
            children.push(self.parse_comp_for());
        } else if self.text_is("if") {
            children.push(self.parse_comp_if());
        }
        self.node(SyntaxKind::CompFor, children)
    }

    fn parse_comp_if(&mut self) -> NodeIndex {
        self.advance(); // if
        let cond = self.parse_or_test();
        let mut children = vec![cond];
        if self.text_is("for") || self.text_is("async") {
            children.push(self.parse_comp_for());
        } else if self.text_is("if") {
            children.push(self.parse_comp_if());
        }
        self.node(SyntaxKind::CompIf, children)
    }

    fn parse_atom(&mut self) -> NodeIndex {
        match self.kind() {
            TokenKind::Name | TokenKind::Number => self.leaf(),
            TokenKind::Str => {
                // Adjacent string literals concatenate; keep the first, the
                // rest still enter the arena for positions.
                let first = self.leaf();
                while self.kind() == TokenKind::Str {
                    self.leaf();
                }
                first
            }
            TokenKind::Keyword => {
                let text = self.interner.resolve(self.current().text);
                match &*text {
                    "True" | "False" | "None" => self.leaf(),
                    "lambda" => self.parse_lambda(),
                    "yield" => self.parse_yield_expr(),
                    "not" => self.parse_not_test(),
                    _ => {
                        // A keyword where an expression belongs: surface it
                        // as a keyword leaf so completion can still work.
                        self.leaf()
                    }
                }
            }
            _ => {
                if self.text_is("(") {
                    self.parse_bracketed("(", ")")
                } else if self.text_is("[") {
                    self.parse_bracketed("[", "]")
                } else if self.text_is("{") {
                    self.parse_braced()
                } else if self.text_is("...") {
                    self.leaf()
                } else {
                    // Not an expression start: one-token error leaf.
                    let leaf = self.leaf();
                    self.node(SyntaxKind::ErrorNode, vec![leaf])
                }
            }
        }
    }

    fn parse_bracketed(&mut self, open: &str, close: &str) -> NodeIndex {
        let _ = open; // caller has already checked the opening bracket
        let open_leaf = self.leaf();
        let mut children = vec![open_leaf];
        if !self.text_is(close) {
            let first = self.parse_test_or_star(true);
            if self.text_is("for") || self.text_is("async") {
                let comp_for = self.parse_comp_for();
                children.push(self.node(SyntaxKind::Comprehension, vec![first, comp_for]));
            } else if self.text_is(",") {
                let mut items = vec![first];
                while self.eat(",").is_some() {
                    if self.text_is(close) {
                        break;
                    }
                    items.push(self.parse_test_or_star(true));
                }
                children.push(self.node(SyntaxKind::TestList, items));
            } else {
                children.push(first);
            }
        }
        if let Some(close_leaf) = self.expect(close) {
            children.push(close_leaf);
        }
        self.node(SyntaxKind::Atom, children)
    }

    fn parse_braced(&mut self) -> NodeIndex {
        let open_leaf = self.leaf();
        let mut children = vec![open_leaf];
        if self.text_is("}") {
            // {} is an empty dict.
            children.push(self.node(SyntaxKind::DictMaker, vec![]));
        } else if self.text_is("**") {
            let mut items = Vec::new();
            loop {
                if let Some(star) = self.eat("**") {
                    items.push(star);
                    items.push(self.parse_test());
                } else {
                    items.push(self.parse_test());
                    self.expect(":");
                    items.push(self.parse_test());
                }
                if self.eat(",").is_none() {
                    break;
                }
                if self.text_is("}") {
                    break;
                }
            }
            children.push(self.node(SyntaxKind::DictMaker, items));
        } else {
            let first = self.parse_test_or_star(true);
            if self.text_is(":") {
                self.advance();
                let value = self.parse_test();
                if self.text_is("for") || self.text_is("async") {
                    let comp_for = self.parse_comp_for();
                    children.push(self.node(SyntaxKind::DictComp, vec![first, value, comp_for]));
                } else {
                    let mut items = vec![first, value];
                    while self.eat(",").is_some() {
                        if self.text_is("}") {
                            break;
                        }
                        if let Some(star) = self.eat("**") {
                            items.push(star);
                            items.push(self.parse_test());
                            continue;
                        }
                        items.push(self.parse_test());
                        self.expect(":");
                        items.push(self.parse_test());
                    }
                    children.push(self.node(SyntaxKind::DictMaker, items));
                }
            } else if self.text_is("for") || self.text_is("async") {
                let comp_for = self.parse_comp_for();
                children.push(self.node(SyntaxKind::Comprehension, vec![first, comp_for]));
            } else {
                // Set literal.
                let mut items = vec![first];
                while self.eat(",").is_some() {
                    if self.text_is("}") {
                        break;
                    }
                    items.push(self.parse_test_or_star(true));
                }
                children.push(self.node(SyntaxKind::TestList, items));
            }
        }
        if let Some(close_leaf) = self.expect("}") {
            children.push(close_leaf);
        }
        self.node(SyntaxKind::Atom, children)
    }
}
