//! The public error taxonomy.
//!
//! Most "failures" in this engine are not errors: ambiguous inference
//! degrades to the empty value set and resource exhaustion silently
//! truncates. Only two conditions are represented as values:
//!
//! - [`ItemNotFound`] — a distinguishable signal from direct indexed/keyed
//!   access, so callers can fall back to full iteration instead of treating
//!   "key absent" like "nothing inferable".
//! - [`EnvironmentError`] — foreign-interpreter or stub-path
//!   misconfiguration. User-actionable; propagated to the outermost API
//!   boundary unmodified.

use std::error::Error;
use std::fmt;

/// Direct `simple_getitem` access did not find the index/key.
///
/// Propagates exactly one level: the immediate caller either falls back to a
/// general iteration strategy or converts the miss into an empty set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ItemNotFound;

impl fmt::Display for ItemNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("item not found in direct getitem access")
    }
}

impl Error for ItemNotFound {}

/// The external environment (foreign interpreter, stub source) is unusable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvironmentError {
    /// The configured foreign interpreter or project environment is invalid.
    InvalidEnvironment(String),
    /// An introspection call into the foreign interpreter timed out.
    IntrospectionTimeout(String),
}

impl fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(msg) => write!(f, "invalid environment: {msg}"),
            Self::IntrospectionTimeout(what) => {
                write!(f, "introspection timed out while inspecting {what}")
            }
        }
    }
}

impl Error for EnvironmentError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = EnvironmentError::InvalidEnvironment("missing interpreter".into());
        assert_eq!(e.to_string(), "invalid environment: missing interpreter");
        assert!(ItemNotFound.to_string().contains("not found"));
    }
}
