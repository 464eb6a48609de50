//! Type inference and name resolution for dynamically typed, duck-typed
//! source code.
//!
//! Given a parsed syntax tree (from `pysense-syntax`) and a position, this
//! crate answers: what values can this expression hold, where was this name
//! defined, what is visible here, what is the call signature. Nothing is
//! executed; analysis is lazy, set-based and bounded by hard resource
//! guards, so it stays interactive on arbitrary — including pathological —
//! real-world code.
//!
//! Key types:
//! - [`InferenceState`] — one inference session: arenas, caches, guards
//! - [`ValueSet`] / `ValueId` — deduplicated sets of inferred values
//! - [`Name`] — an identifier binding, lazily resolvable
//! - [`Filter`] — position-bounded visible-name views per scope
//! - `ContextId` — a value wrapped with scope-resolution capability
//!
//! The public query surface is on [`InferenceState`]: `infer_expression`,
//! `resolve_name`, `visible_names`, `definition_of`, `signatures`.

pub mod arena;
pub mod arguments;
pub mod cache;
pub mod context;
pub mod docstrings;
pub mod dynamic_params;
pub mod evaluate;
pub mod filters;
pub mod gradual;
pub mod imports;
pub mod lazy;
pub mod names;
pub mod project;
pub mod recursion;
pub mod signature;
pub mod state;
pub mod value;
pub mod value_set;

pub use arena::{ApiType, ArrayType, Literal, ModuleId, Truthiness, ValueData, ValueId};
pub use arguments::Arguments;
pub use cache::QueryCache;
pub use context::{ContextData, ContextId};
pub use docstrings::docstring_of;
pub use evaluate::infer_expr_stmt;
pub use filters::Filter;
pub use lazy::{LazyKind, LazyValue};
pub use names::{Name, TargetIndex};
pub use project::{LanguageVersion, Project};
pub use recursion::{EnterResult, ExecutionRecursionDetector, RecursionDetector};
pub use signature::{ParamInfo, ParamKind, Signature};
pub use state::{InferenceState, ModuleInfo};
pub use value::compiled::{CompiledInfo, IntrospectionProvider};
pub use value_set::{NO_VALUES, ValueSet};
