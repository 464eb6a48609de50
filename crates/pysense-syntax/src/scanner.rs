//! Indentation-aware tokenizer.
//!
//! Produces a flat token stream with synthetic `Newline` / `Indent` /
//! `Dedent` tokens, the way the source language's grammar expects. Brackets
//! suspend indentation handling (implicit line joining); comments and blank
//! lines produce nothing.
//!
//! The scanner is lenient: unknown characters become one-character operator
//! tokens and bad indentation is flattened to the nearest known level, so
//! the parser always sees a well-formed stream and inference can proceed on
//! broken files.

use pysense_common::interner::{Atom, Interner};
use pysense_common::position::Position;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Keyword,
    Number,
    Str,
    Op,
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

#[derive(Copy, Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Atom,
    pub start: Position,
    pub end: Position,
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

/// Multi-character operators, longest first so greedy matching works.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "!=", ">=", "<=", "==", "->", ":=", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "@=", "**", "//", "<<", ">>", "+", "-", "*", "/", "%", "@", "<", ">",
    "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "&", "|", "^", "~",
];

pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    paren_depth: u32,
    indents: Vec<u32>,
    pending: Vec<Token>,
    at_line_start: bool,
    interner: Arc<Interner>,
}

impl Scanner {
    pub fn new(source: &str, interner: Arc<Interner>) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
            paren_depth: 0,
            indents: vec![0],
            pending: Vec::new(),
            at_line_start: true,
            interner,
        }
    }

    /// Tokenize the whole source.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::EndMarker;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn make(&self, kind: TokenKind, text: &str, start: Position) -> Token {
        Token {
            kind,
            text: self.interner.intern(text),
            start,
            end: self.position(),
        }
    }

    fn next_token(&mut self) -> Token {
        if let Some(token) = self.pending.pop() {
            return token;
        }

        if self.at_line_start && self.paren_depth == 0 {
            if let Some(token) = self.handle_indentation() {
                return token;
            }
        }

        // Skip horizontal whitespace, comments and escaped newlines.
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                _ => break,
            }
        }

        let start = self.position();
        let Some(c) = self.peek() else {
            return self.finish(start);
        };

        if c == '\n' {
            self.bump();
            if self.paren_depth > 0 {
                // Implicit line joining: no Newline token inside brackets.
                return self.next_token();
            }
            self.at_line_start = true;
            return self.make(TokenKind::Newline, "\n", start);
        }

        if c.is_alphabetic() || c == '_' {
            return self.scan_name(start);
        }
        if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            return self.scan_number(start);
        }
        if c == '"' || c == '\'' {
            return self.scan_string(start, String::new());
        }

        self.scan_operator(start)
    }

    fn finish(&mut self, start: Position) -> Token {
        // Close any open indentation before the end marker. `pending` is a
        // LIFO stack, so the end marker goes in first.
        if self.indents.len() > 1 {
            self.pending.push(self.make(TokenKind::EndMarker, "", start));
            while self.indents.len() > 2 {
                self.indents.pop();
                self.pending.push(self.make(TokenKind::Dedent, "", start));
            }
            self.indents.pop();
            return self.make(TokenKind::Dedent, "", start);
        }
        self.make(TokenKind::EndMarker, "", start)
    }

    /// Measure leading whitespace of a fresh logical line and emit
    /// Indent/Dedent tokens as needed. Blank and comment-only lines are
    /// consumed without producing indentation tokens.
    fn handle_indentation(&mut self) -> Option<Token> {
        loop {
            let start = self.position();
            let mut width = 0u32;
            loop {
                match self.peek() {
                    Some(' ') => {
                        width += 1;
                        self.bump();
                    }
                    Some('\t') => {
                        width += 8 - (width % 8);
                        self.bump();
                    }
                    _ => break,
                }
            }
            match self.peek() {
                Some('\n') => {
                    self.bump();
                    continue;
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
                None => {
                    self.at_line_start = false;
                    return None;
                }
                _ => {}
            }
            self.at_line_start = false;

            let current = *self.indents.last().unwrap();
            if width > current {
                self.indents.push(width);
                return Some(self.make(TokenKind::Indent, "", start));
            }
            if width < current {
                let mut dedents = 0;
                while *self.indents.last().unwrap() > width {
                    self.indents.pop();
                    dedents += 1;
                }
                // Bad dedent levels flatten to the nearest known level.
                for _ in 1..dedents {
                    self.pending.push(self.make(TokenKind::Dedent, "", start));
                }
                return Some(self.make(TokenKind::Dedent, "", start));
            }
            return None;
        }
    }

    fn scan_name(&mut self, start: Position) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        // String prefixes: r"", b'', f"..." etc.
        if text.len() <= 2
            && text.chars().all(|c| "rbfuRBFU".contains(c))
            && matches!(self.peek(), Some('"') | Some('\''))
        {
            return self.scan_string(start, text);
        }
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Name
        };
        self.make(kind, &text, start)
    }

    fn scan_number(&mut self, start: Position) -> Token {
        let mut text = String::new();
        let mut seen_dot = false;
        if self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x') | Some('X') | Some('o') | Some('b'))
        {
            text.push(self.bump().unwrap());
            text.push(self.bump().unwrap());
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            return self.make(TokenKind::Number, &text, start);
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                text.push(c);
                self.bump();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                text.push(c);
                self.bump();
            } else if (c == 'e' || c == 'E')
                && self
                    .peek_at(1)
                    .is_some_and(|d| d.is_ascii_digit() || d == '+' || d == '-')
            {
                text.push(c);
                self.bump();
                text.push(self.bump().unwrap());
            } else if c == 'j' || c == 'J' {
                text.push(c);
                self.bump();
                break;
            } else {
                break;
            }
        }
        self.make(TokenKind::Number, &text, start)
    }

    fn scan_string(&mut self, start: Position, prefix: String) -> Token {
        let mut text = prefix;
        let quote = self.peek().unwrap();
        let raw = text.chars().any(|c| c == 'r' || c == 'R');
        text.push(quote);
        self.bump();
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            text.push(self.bump().unwrap());
            text.push(self.bump().unwrap());
        }
        loop {
            match self.peek() {
                None => break,
                Some('\\') if !raw => {
                    text.push(self.bump().unwrap());
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                }
                Some('\n') if !triple => break,
                Some(c) if c == quote => {
                    text.push(self.bump().unwrap());
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        text.push(self.bump().unwrap());
                        text.push(self.bump().unwrap());
                        break;
                    }
                }
                Some(_) => {
                    text.push(self.bump().unwrap());
                }
            }
        }
        self.make(TokenKind::Str, &text, start)
    }

    fn scan_operator(&mut self, start: Position) -> Token {
        let remaining: String = self.chars[self.pos..(self.pos + 3).min(self.chars.len())]
            .iter()
            .collect();
        for op in OPERATORS {
            if remaining.starts_with(op) {
                for _ in 0..op.chars().count() {
                    self.bump();
                }
                match *op {
                    "(" | "[" | "{" => self.paren_depth += 1,
                    ")" | "]" | "}" => self.paren_depth = self.paren_depth.saturating_sub(1),
                    _ => {}
                }
                return self.make(TokenKind::Op, op, start);
            }
        }
        // Unknown character: emit it as a one-character operator.
        let c = self.bump().unwrap();
        self.make(TokenKind::Op, &c.to_string(), start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<(TokenKind, String)> {
        let interner = Arc::new(Interner::new());
        Scanner::new(source, interner.clone())
            .tokenize()
            .into_iter()
            .map(|t| (t.kind, interner.resolve(t.text).to_string()))
            .collect()
    }

    #[test]
    fn test_simple_assignment() {
        let tokens = scan("x = 1\n");
        let kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Name,
                TokenKind::Op,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::EndMarker,
            ]
        );
    }

    #[test]
    fn test_indentation() {
        let tokens = scan("def f():\n    pass\nx = 1\n");
        let kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
        assert!(kinds.contains(&TokenKind::Indent));
        assert!(kinds.contains(&TokenKind::Dedent));
        // Dedent arrives before the trailing assignment's name token.
        let dedent = kinds.iter().position(|k| *k == TokenKind::Dedent).unwrap();
        let x = tokens.iter().position(|(k, t)| *k == TokenKind::Name && t == "x");
        assert!(dedent < x.unwrap());
    }

    #[test]
    fn test_implicit_line_joining() {
        let tokens = scan("x = [1,\n     2]\n");
        let newlines = tokens
            .iter()
            .filter(|(k, _)| *k == TokenKind::Newline)
            .count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_keywords_and_operators() {
        let tokens = scan("a **= not b\n");
        assert_eq!(tokens[0].0, TokenKind::Name);
        assert_eq!(tokens[1], (TokenKind::Op, "**=".to_string()));
        assert_eq!(tokens[2], (TokenKind::Keyword, "not".to_string()));
    }

    #[test]
    fn test_string_prefixes_and_triple_quotes() {
        let tokens = scan("s = r'a\\b'\nd = \"\"\"x\ny\"\"\"\n");
        let strings: Vec<_> = tokens
            .iter()
            .filter(|(k, _)| *k == TokenKind::Str)
            .collect();
        assert_eq!(strings.len(), 2);
        assert!(strings[0].1.starts_with('r'));
        assert!(strings[1].1.contains('\n'));
    }

    #[test]
    fn test_positions_are_one_based_lines() {
        let interner = Arc::new(Interner::new());
        let tokens = Scanner::new("x = 1\ny = 2\n", interner).tokenize();
        assert_eq!(tokens[0].start, Position::new(1, 0));
        let y = &tokens[4];
        assert_eq!(y.start, Position::new(2, 0));
    }
}
