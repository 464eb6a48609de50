//! Common types and utilities for the pysense inference engine.
//!
//! This crate provides foundational types used across all pysense crates:
//! - String interning (`Atom`, `Interner`)
//! - Source positions (`Position`, `Span`) with line/column conventions
//! - Centralized resource limits and thresholds
//! - Runtime settings (`Settings`)
//! - The public error taxonomy (`EnvironmentError`, `ItemNotFound`)

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Position/Span types for line/column source locations
pub mod position;
pub use position::{Position, Span};

// Centralized limits and thresholds
pub mod limits;

// Runtime configuration
pub mod settings;
pub use settings::Settings;

// Error taxonomy
pub mod error;
pub use error::{EnvironmentError, ItemNotFound};
