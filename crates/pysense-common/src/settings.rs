//! Runtime configuration for the inference engine.
//!
//! Settings toggle the expensive or unsafe heuristics; the hard resource
//! limits live in [`crate::limits`] and are not user-configurable.

use serde::{Deserialize, Serialize};

/// Engine settings. One instance per inference session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Infer parameter types from call sites found elsewhere in the same
    /// module when no arguments are known at the query site.
    pub dynamic_params: bool,

    /// Track `.append` / `.insert` / `.extend` / `.add` / `.update` call
    /// sites in the current module and fold the added values into inferred
    /// list/set contents.
    pub dynamic_array_additions: bool,

    /// Use isinstance-style checks and loop information when narrowing
    /// names.
    pub dynamic_flow_information: bool,

    /// Allow evaluating descriptors on introspected foreign objects.
    ///
    /// Off by default: descriptor evaluation can run arbitrary getter code
    /// in the foreign interpreter.
    pub allow_descriptor_getattr: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dynamic_params: true,
            dynamic_array_additions: true,
            dynamic_flow_information: true,
            allow_descriptor_getattr: false,
        }
    }
}

impl Settings {
    /// Load settings from a JSON document, filling omitted fields with
    /// defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.dynamic_params);
        assert!(s.dynamic_array_additions);
        assert!(!s.allow_descriptor_getattr);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s = Settings::from_json(r#"{"dynamic_params": false}"#).unwrap();
        assert!(!s.dynamic_params);
        assert!(s.dynamic_array_additions);
    }
}
