//! Syntax tree, tokenizer and parser for the pysense inference engine.
//!
//! This crate provides the lexical and syntactic phase:
//! - `SyntaxKind` - node and leaf kinds
//! - `Scanner` - indentation-aware tokenizer
//! - `Tree` / `Node` / `NodeIndex` - arena-backed homogeneous syntax tree
//!   with parent links, positions, ancestor search and a per-module
//!   used-names index
//! - `Parser` - lenient recursive-descent parser for the supported subset
//! - scope helpers (parent scope, definition-of-name)
//! - `SourceCache` - shared, idempotent parsed-module cache
//!
//! The inference engine consumes the tree through position and ancestor
//! queries only; nothing here executes or interprets the source.

pub mod kind;
pub use kind::SyntaxKind;

pub mod scanner;
pub use scanner::{Scanner, Token, TokenKind};

pub mod tree;
pub use tree::{Node, NodeIndex, Tree};

pub mod parser;
pub use parser::parse_module;

pub mod scope;

pub mod cache;
pub use cache::SourceCache;
