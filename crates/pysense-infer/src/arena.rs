//! Value identifiers and storage for the inference session.
//!
//! A `ValueId` is the session-owned identity of one inferred value. Values
//! are immutable records in a per-session arena; equality of ids is equality
//! of values, which is what makes [`crate::value_set::ValueSet`] dedup and
//! memoization keys cheap.
//!
//! Construction goes through factory methods that consult a keyed cache
//! (constructor-argument key -> existing id), so building "the class value
//! for this classdef in this context" twice yields the same id on every
//! recursive path. This replaces the original's caching-metaclass trick with
//! an explicit, factory-owned table.

use crate::arguments::Arguments;
use crate::context::ContextId;
use crate::lazy::LazyValue;
use crate::value_set::ValueSet;
use pysense_common::interner::Atom;
use pysense_syntax::tree::NodeIndex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Session-owned value identifier.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl std::fmt::Debug for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of a loaded module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

impl std::fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// The API-visible classification of a value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ApiType {
    Module,
    Class,
    Function,
    Instance,
    Param,
    Path,
    Keyword,
    Property,
    Statement,
}

/// Three-valued truthiness.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Truthiness {
    True,
    False,
    Unknown,
}

impl Truthiness {
    pub fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

/// Which container a sequence-like value models.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayType {
    List,
    Tuple,
    Set,
    Dict,
}

impl ArrayType {
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Dict => "dict",
        }
    }
}

/// A known literal carried by a compiled instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    /// Bit pattern of an `f64`; stored as bits so literals stay hashable.
    Float(u64),
    Str(Arc<str>),
    Bytes(Arc<str>),
    Bool(bool),
    None,
}

impl Literal {
    pub fn float(value: f64) -> Self {
        Self::Float(value.to_bits())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// The builtin class this literal is an instance of.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Bool(_) => "bool",
            Self::None => "NoneType",
        }
    }
}

// =============================================================================
// Value payloads
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleData {
    pub module: ModuleId,
    /// Runtime module consulted for names a stub module lacks.
    pub fallback: Option<ModuleId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamespaceData {
    /// Dotted package path this namespace stands for.
    pub fullname: Arc<str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassData {
    pub parent_context: ContextId,
    pub classdef: NodeIndex,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericClassData {
    pub class: ValueId,
    /// One set per generic argument, in subscript order.
    pub generics: Arc<[ValueSet]>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionData {
    /// Owning context; class/instance contexts are skipped so closures
    /// resolve through functions and the module only.
    pub parent_context: ContextId,
    pub funcdef: NodeIndex,
    pub is_lambda: bool,
    /// Set for functions defined in a class body.
    pub class_context: Option<ContextId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoundMethodData {
    pub instance: ValueId,
    pub function: ValueId,
}

/// The result of a decorator application, delegating to the decorated
/// result while remembering the original definition for goto/signatures.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecorateeData {
    pub inner: ValueId,
    pub original: ValueId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceData {
    pub class: ValueId,
    /// None for anonymous instances (`self` in a method nobody called).
    pub arguments: Option<Arguments>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompiledClassData {
    /// Name in the builtin registry.
    pub name: Arc<str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompiledInstanceData {
    pub class_name: Arc<str>,
    pub literal: Option<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompiledFunctionData {
    pub name: Arc<str>,
    /// Dotted owner path, e.g. `str` for `str.upper`.
    pub owner: Option<Arc<str>>,
}

/// A foreign object reached through the introspection provider, addressed
/// by an allow-listed attribute path rooted at a registered native module.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompiledProxyData {
    pub access_path: Arc<[Arc<str>]>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SequenceData {
    pub array_type: ArrayType,
    /// The literal atom / testlist node backing this sequence.
    pub atom_node: NodeIndex,
    pub context: ContextId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FakeSequenceData {
    pub array_type: ArrayType,
    pub lazy: Arc<[LazyValue]>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FakeDictData {
    pub entries: Arc<[(Literal, LazyValue)]>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComprehensionData {
    pub kind: ComprehensionKind,
    /// The Comprehension / DictComp node.
    pub comp_node: NodeIndex,
    pub context: ContextId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GeneratorData {
    /// The function execution whose yields this generator produces.
    pub exec_context: ContextId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MergedArrayData {
    pub arrays: Arc<[ValueId]>,
}

/// A list/set/dict value extended by tracked `.append`-style call sites.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayModificationData {
    pub inner: ValueId,
    /// Context whose module is scanned for additions.
    pub context: ContextId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SliceData {
    pub context: Option<ContextId>,
    pub start: Option<NodeIndex>,
    pub stop: Option<NodeIndex>,
    pub step: Option<NodeIndex>,
}

/// One inferred value. Immutable after construction; wrappers delegate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueData {
    Module(ModuleData),
    Namespace(NamespaceData),
    Class(ClassData),
    GenericClass(GenericClassData),
    Function(FunctionData),
    BoundMethod(BoundMethodData),
    Decoratee(DecorateeData),
    Instance(InstanceData),
    CompiledClass(CompiledClassData),
    CompiledInstance(CompiledInstanceData),
    CompiledFunction(CompiledFunctionData),
    CompiledProxy(CompiledProxyData),
    Sequence(SequenceData),
    FakeSequence(FakeSequenceData),
    FakeDict(FakeDictData),
    Comprehension(ComprehensionData),
    Generator(GeneratorData),
    MergedArray(MergedArrayData),
    ArrayModification(ArrayModificationData),
    Slice(SliceData),
    /// A keyword like `pass` surfacing as a completion target.
    Keyword(Atom),
}

// =============================================================================
// Arena
// =============================================================================

/// Value storage with constructor-key deduplication.
#[derive(Default)]
pub struct ValueArena {
    values: Vec<ValueData>,
    dedup: FxHashMap<ValueData, ValueId>,
}

impl ValueArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a value, returning the existing id when an identical value
    /// was already constructed this session.
    pub fn alloc(&mut self, data: ValueData) -> ValueId {
        if let Some(&existing) = self.dedup.get(&data) {
            return existing;
        }
        let id = ValueId(self.values.len() as u32);
        self.values.push(data.clone());
        self.dedup.insert(data, id);
        id
    }

    pub fn get(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_deduplicates_by_constructor_key() {
        let mut arena = ValueArena::new();
        let a = arena.alloc(ValueData::CompiledInstance(CompiledInstanceData {
            class_name: "int".into(),
            literal: Some(Literal::Int(1)),
        }));
        let b = arena.alloc(ValueData::CompiledInstance(CompiledInstanceData {
            class_name: "int".into(),
            literal: Some(Literal::Int(1)),
        }));
        let c = arena.alloc(ValueData::CompiledInstance(CompiledInstanceData {
            class_name: "int".into(),
            literal: Some(Literal::Int(2)),
        }));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(arena.len(), 2);
    }
}
