//! Position types for line/column source locations.
//!
//! The whole engine uses the source language's editor convention: lines start
//! at 1, columns start at 0. Position-bounded name filters compare these
//! values directly, so the convention is load-bearing, not cosmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A line/column position. Line is 1-based, column is 0-based.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// The position of the first character of a module.
    pub const MODULE_START: Position = Position { line: 1, column: 0 };
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range `[start, end)`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos < self.end
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering_line_major() {
        assert!(Position::new(2, 0) > Position::new(1, 80));
        assert!(Position::new(3, 4) < Position::new(3, 5));
    }

    #[test]
    fn test_span_contains_is_half_open() {
        let span = Span::new(Position::new(1, 0), Position::new(2, 0));
        assert!(span.contains(Position::new(1, 10)));
        assert!(!span.contains(Position::new(2, 0)));
    }
}
