//! Compiled values: the builtins bridge and the foreign-introspection
//! proxy.
//!
//! Builtins (int, str, list, ...) are served by an in-process registry —
//! static method tables good enough for attribute completion and
//! return-type inference of the common methods. Arbitrary native modules go
//! through an [`IntrospectionProvider`], which may run out-of-process;
//! access is restricted to identifier-shaped attribute paths of bounded
//! depth rooted at a registered module, and descriptor evaluation is gated
//! by `Settings::allow_descriptor_getattr` because it can run arbitrary
//! getter code.

use crate::arena::{
    ApiType, CompiledClassData, CompiledFunctionData, CompiledInstanceData, CompiledProxyData,
    Literal, Truthiness, ValueData, ValueId,
};
use crate::names::Name;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use once_cell::sync::Lazy;
use pysense_common::error::EnvironmentError;
use pysense_common::interner::Atom;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Longest allow-listed introspection path.
const MAX_ACCESS_PATH: usize = 10;

/// What one introspected attribute looks like.
#[derive(Clone, Debug)]
pub struct CompiledInfo {
    pub api_type: ApiType,
    /// Class name of the value a call (or the attribute itself, for
    /// non-callables) produces, when known.
    pub return_class: Option<String>,
    /// Clinic-style signature text, when derivable.
    pub signature: Option<String>,
    pub doc: Option<String>,
    /// Attribute is a descriptor; reading it may execute getter code.
    pub is_descriptor: bool,
}

/// The foreign-object introspection service (spec §6). Implementations may
/// talk to a separate interpreter process; every method can fail with an
/// environment error, which the engine surfaces unmodified at the API
/// boundary.
pub trait IntrospectionProvider: Send + Sync {
    /// Cheap upfront validation of the environment.
    fn validate(&self) -> Result<(), EnvironmentError> {
        Ok(())
    }

    /// Describe the attribute at `path` (`["mod", "attr", ...]`), or None
    /// if it does not exist.
    fn describe(&self, path: &[&str]) -> Result<Option<CompiledInfo>, EnvironmentError>;

    /// Enumerable sub-attributes at `path`.
    fn members(&self, path: &[&str]) -> Result<Vec<String>, EnvironmentError>;
}

// =============================================================================
// Builtin registry
// =============================================================================

/// How a builtin method's return type is described in the tables.
#[derive(Copy, Clone, Debug)]
enum Ret {
    /// Instance of a named builtin class.
    Instance(&'static str),
    /// A list whose elements are instances of the named class.
    ListOf(&'static str),
    /// An instance of the receiver's own class.
    SelfClass,
    /// Nothing inferable.
    Unknown,
}

struct BuiltinClass {
    name: &'static str,
    doc: &'static str,
    methods: &'static [(&'static str, Ret)],
}

macro_rules! methods {
    ($(($name:literal, $ret:expr)),* $(,)?) => {
        &[$(($name, $ret)),*]
    };
}

static BUILTIN_CLASSES: &[BuiltinClass] = &[
    BuiltinClass {
        name: "object",
        doc: "The base class of the class hierarchy.",
        methods: methods![
            ("__init__", Ret::Instance("NoneType")),
            ("__str__", Ret::Instance("str")),
            ("__repr__", Ret::Instance("str")),
            ("__eq__", Ret::Instance("bool")),
            ("__ne__", Ret::Instance("bool")),
            ("__hash__", Ret::Instance("int")),
            ("__dir__", Ret::ListOf("str")),
            ("__sizeof__", Ret::Instance("int")),
        ],
    },
    BuiltinClass {
        name: "type",
        doc: "type(object) -> the object's type",
        methods: methods![("mro", Ret::ListOf("type"))],
    },
    BuiltinClass {
        name: "int",
        doc: "int([x]) -> integer",
        methods: methods![
            ("bit_length", Ret::Instance("int")),
            ("bit_count", Ret::Instance("int")),
            ("conjugate", Ret::Instance("int")),
            ("to_bytes", Ret::Instance("bytes")),
            ("as_integer_ratio", Ret::Instance("tuple")),
        ],
    },
    BuiltinClass {
        name: "float",
        doc: "Convert a string or number to a floating point number.",
        methods: methods![
            ("is_integer", Ret::Instance("bool")),
            ("hex", Ret::Instance("str")),
            ("conjugate", Ret::Instance("float")),
            ("as_integer_ratio", Ret::Instance("tuple")),
        ],
    },
    BuiltinClass {
        name: "bool",
        doc: "bool(x) -> True when the argument is truthy.",
        methods: methods![],
    },
    BuiltinClass {
        name: "str",
        doc: "str(object='') -> str",
        methods: methods![
            ("capitalize", Ret::Instance("str")),
            ("casefold", Ret::Instance("str")),
            ("center", Ret::Instance("str")),
            ("count", Ret::Instance("int")),
            ("encode", Ret::Instance("bytes")),
            ("endswith", Ret::Instance("bool")),
            ("find", Ret::Instance("int")),
            ("format", Ret::Instance("str")),
            ("index", Ret::Instance("int")),
            ("isalpha", Ret::Instance("bool")),
            ("isdigit", Ret::Instance("bool")),
            ("isidentifier", Ret::Instance("bool")),
            ("islower", Ret::Instance("bool")),
            ("isupper", Ret::Instance("bool")),
            ("join", Ret::Instance("str")),
            ("ljust", Ret::Instance("str")),
            ("lower", Ret::Instance("str")),
            ("lstrip", Ret::Instance("str")),
            ("partition", Ret::Instance("tuple")),
            ("replace", Ret::Instance("str")),
            ("rjust", Ret::Instance("str")),
            ("rsplit", Ret::ListOf("str")),
            ("rstrip", Ret::Instance("str")),
            ("split", Ret::ListOf("str")),
            ("splitlines", Ret::ListOf("str")),
            ("startswith", Ret::Instance("bool")),
            ("strip", Ret::Instance("str")),
            ("title", Ret::Instance("str")),
            ("upper", Ret::Instance("str")),
            ("zfill", Ret::Instance("str")),
        ],
    },
    BuiltinClass {
        name: "bytes",
        doc: "bytes(iterable_of_ints) -> bytes",
        methods: methods![
            ("decode", Ret::Instance("str")),
            ("hex", Ret::Instance("str")),
            ("split", Ret::ListOf("bytes")),
        ],
    },
    BuiltinClass {
        name: "list",
        doc: "Built-in mutable sequence.",
        methods: methods![
            ("append", Ret::Instance("NoneType")),
            ("clear", Ret::Instance("NoneType")),
            ("copy", Ret::SelfClass),
            ("count", Ret::Instance("int")),
            ("extend", Ret::Instance("NoneType")),
            ("index", Ret::Instance("int")),
            ("insert", Ret::Instance("NoneType")),
            ("pop", Ret::Unknown),
            ("remove", Ret::Instance("NoneType")),
            ("reverse", Ret::Instance("NoneType")),
            ("sort", Ret::Instance("NoneType")),
        ],
    },
    BuiltinClass {
        name: "tuple",
        doc: "Built-in immutable sequence.",
        methods: methods![
            ("count", Ret::Instance("int")),
            ("index", Ret::Instance("int")),
        ],
    },
    BuiltinClass {
        name: "set",
        doc: "set() -> new empty set object",
        methods: methods![
            ("add", Ret::Instance("NoneType")),
            ("clear", Ret::Instance("NoneType")),
            ("copy", Ret::SelfClass),
            ("difference", Ret::SelfClass),
            ("discard", Ret::Instance("NoneType")),
            ("intersection", Ret::SelfClass),
            ("pop", Ret::Unknown),
            ("remove", Ret::Instance("NoneType")),
            ("union", Ret::SelfClass),
            ("update", Ret::Instance("NoneType")),
        ],
    },
    BuiltinClass {
        name: "frozenset",
        doc: "frozenset() -> empty frozenset object",
        methods: methods![
            ("copy", Ret::SelfClass),
            ("difference", Ret::SelfClass),
            ("intersection", Ret::SelfClass),
            ("union", Ret::SelfClass),
        ],
    },
    BuiltinClass {
        name: "dict",
        doc: "dict() -> new empty dictionary",
        methods: methods![
            ("clear", Ret::Instance("NoneType")),
            ("copy", Ret::SelfClass),
            ("get", Ret::Unknown),
            ("items", Ret::ListOf("tuple")),
            ("keys", Ret::ListOf("object")),
            ("pop", Ret::Unknown),
            ("popitem", Ret::Instance("tuple")),
            ("setdefault", Ret::Unknown),
            ("update", Ret::Instance("NoneType")),
            ("values", Ret::ListOf("object")),
        ],
    },
    BuiltinClass {
        name: "slice",
        doc: "slice(start, stop[, step])",
        methods: methods![("indices", Ret::Instance("tuple"))],
    },
    BuiltinClass {
        name: "range",
        doc: "range(stop) -> range object",
        methods: methods![
            ("count", Ret::Instance("int")),
            ("index", Ret::Instance("int")),
        ],
    },
    BuiltinClass {
        name: "NoneType",
        doc: "The type of the None singleton.",
        methods: methods![],
    },
    BuiltinClass {
        name: "BaseException",
        doc: "Common base class for all exceptions.",
        methods: methods![("with_traceback", Ret::SelfClass)],
    },
    BuiltinClass {
        name: "Exception",
        doc: "Common base class for all non-exit exceptions.",
        methods: methods![("with_traceback", Ret::SelfClass)],
    },
    BuiltinClass {
        name: "ValueError",
        doc: "Inappropriate argument value (of correct type).",
        methods: methods![],
    },
    BuiltinClass {
        name: "TypeError",
        doc: "Inappropriate argument type.",
        methods: methods![],
    },
    BuiltinClass {
        name: "KeyError",
        doc: "Mapping key not found.",
        methods: methods![],
    },
    BuiltinClass {
        name: "IndexError",
        doc: "Sequence index out of range.",
        methods: methods![],
    },
    BuiltinClass {
        name: "AttributeError",
        doc: "Attribute not found.",
        methods: methods![],
    },
    BuiltinClass {
        name: "StopIteration",
        doc: "Signal the end from iterator.__next__().",
        methods: methods![],
    },
];

/// Builtin functions: name -> (signature text, return spec).
static BUILTIN_FUNCTIONS: &[(&str, &str, Ret)] = &[
    ("abs", "abs(x, /)", Ret::Unknown),
    ("callable", "callable(obj, /)", Ret::Instance("bool")),
    ("chr", "chr(i, /)", Ret::Instance("str")),
    ("dir", "dir(object=<unrepresentable>, /)", Ret::ListOf("str")),
    ("getattr", "getattr(object, name, default=None, /)", Ret::Unknown),
    ("hasattr", "hasattr(obj, name, /)", Ret::Instance("bool")),
    ("hash", "hash(obj, /)", Ret::Instance("int")),
    ("id", "id(obj, /)", Ret::Instance("int")),
    ("input", "input(prompt='', /)", Ret::Instance("str")),
    ("isinstance", "isinstance(obj, class_or_tuple, /)", Ret::Instance("bool")),
    ("issubclass", "issubclass(cls, class_or_tuple, /)", Ret::Instance("bool")),
    ("iter", "iter(iterable, /)", Ret::Unknown),
    ("len", "len(obj, /)", Ret::Instance("int")),
    ("max", "max(iterable, /)", Ret::Unknown),
    ("min", "min(iterable, /)", Ret::Unknown),
    ("next", "next(iterator, /)", Ret::Unknown),
    ("ord", "ord(c, /)", Ret::Instance("int")),
    ("print", "print(*args, sep=' ', end='\\n')", Ret::Instance("NoneType")),
    ("repr", "repr(obj, /)", Ret::Instance("str")),
    ("setattr", "setattr(obj, name, value, /)", Ret::Instance("NoneType")),
    ("sorted", "sorted(iterable, /, *, key=None, reverse=False)", Ret::ListOf("object")),
    ("sum", "sum(iterable, /, start=0)", Ret::Unknown),
    ("vars", "vars(object=<unrepresentable>, /)", Ret::Instance("dict")),
];

static BUILTIN_CLASS_INDEX: Lazy<FxHashMap<&'static str, &'static BuiltinClass>> =
    Lazy::new(|| BUILTIN_CLASSES.iter().map(|c| (c.name, c)).collect());

static BUILTIN_FUNCTION_INDEX: Lazy<FxHashMap<&'static str, (&'static str, Ret)>> =
    Lazy::new(|| {
        BUILTIN_FUNCTIONS
            .iter()
            .map(|&(name, sig, ret)| (name, (sig, ret)))
            .collect()
    });

/// Constants living in the builtins namespace.
static BUILTIN_CONSTANTS: &[(&str, Literal)] = &[
    ("None", Literal::None),
    ("True", Literal::Bool(true)),
    ("False", Literal::Bool(false)),
];

pub(crate) fn builtin_class_exists(name: &str) -> bool {
    BUILTIN_CLASS_INDEX.contains_key(name)
}

pub(crate) fn builtin_class_doc(name: &str) -> Option<&'static str> {
    BUILTIN_CLASS_INDEX.get(name).map(|c| c.doc)
}

pub(crate) fn builtin_function_signature(name: &str) -> Option<&'static str> {
    BUILTIN_FUNCTION_INDEX.get(name).map(|&(sig, _)| sig)
}

// =============================================================================
// State capabilities
// =============================================================================

impl InferenceState {
    /// A literal constant as a compiled instance (`create_simple_object`).
    pub fn create_simple_object(&mut self, literal: Literal) -> ValueId {
        let class_name: Arc<str> = Arc::from(literal.class_name());
        self.alloc_value(ValueData::CompiledInstance(CompiledInstanceData {
            class_name,
            literal: Some(literal),
        }))
    }

    /// An anonymous instance of a builtin class ("some str").
    pub fn builtin_instance(&mut self, class_name: &str) -> ValueId {
        self.alloc_value(ValueData::CompiledInstance(CompiledInstanceData {
            class_name: Arc::from(class_name),
            literal: None,
        }))
    }

    pub fn builtin_class(&mut self, name: &str) -> ValueId {
        self.alloc_value(ValueData::CompiledClass(CompiledClassData {
            name: Arc::from(name),
        }))
    }

    /// The synthetic builtins module value.
    pub fn builtins_value(&mut self) -> ValueId {
        self.alloc_value(ValueData::CompiledProxy(CompiledProxyData {
            access_path: Arc::from([Arc::from("builtins")]),
        }))
    }

    pub fn builtins_filter(&mut self) -> crate::filters::Filter {
        let builtins = self.builtins_value();
        crate::filters::Filter::compiled(builtins)
    }

    // -----------------------------------------------------------------------
    // Member lookup
    // -----------------------------------------------------------------------

    pub(crate) fn compiled_filter_get(&mut self, value: ValueId, atom: Atom) -> Vec<Name> {
        let text = self.resolve_atom(atom);
        if self.compiled_member_exists(value, &text) {
            vec![Name::Compiled { parent: value, name: atom }]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn compiled_filter_values(&mut self, value: ValueId) -> Vec<Name> {
        let members = self.compiled_member_list(value);
        members
            .into_iter()
            .map(|m| Name::Compiled { parent: value, name: self.intern(&m) })
            .collect()
    }

    fn compiled_member_exists(&mut self, value: ValueId, member: &str) -> bool {
        match self.value_data(value) {
            ValueData::CompiledClass(data) => class_has_method(&data.name, member),
            ValueData::CompiledInstance(data) => class_has_method(&data.class_name, member),
            ValueData::CompiledProxy(data) => {
                if is_builtins_root(&data.access_path) {
                    builtins_namespace_has(member)
                } else {
                    self.proxy_member_exists(&data.access_path, member)
                }
            }
            _ => false,
        }
    }

    fn compiled_member_list(&mut self, value: ValueId) -> Vec<String> {
        match self.value_data(value) {
            ValueData::CompiledClass(data) => class_method_names(&data.name),
            ValueData::CompiledInstance(data) => class_method_names(&data.class_name),
            ValueData::CompiledProxy(data) => {
                if is_builtins_root(&data.access_path) {
                    builtins_namespace_names()
                } else {
                    let path: Vec<&str> = data.access_path.iter().map(|s| &**s).collect();
                    let provider = self.provider_for(&data.access_path);
                    match provider.map(|p| p.members(&path)) {
                        Some(Ok(members)) => members,
                        Some(Err(error)) => {
                            self.report_external_error(error);
                            Vec::new()
                        }
                        None => Vec::new(),
                    }
                }
            }
            _ => Vec::new(),
        }
    }

    /// Resolve one member of a compiled value to values.
    pub(crate) fn infer_compiled_member(&mut self, parent: ValueId, atom: Atom) -> ValueSet {
        let member = self.resolve_atom(atom);
        match self.value_data(parent) {
            ValueData::CompiledClass(data) => self.builtin_method_value(&data.name, &member),
            ValueData::CompiledInstance(data) => {
                self.builtin_method_value(&data.class_name, &member)
            }
            ValueData::CompiledProxy(data) => {
                if is_builtins_root(&data.access_path) {
                    self.infer_builtins_namespace_member(&member)
                } else {
                    self.infer_proxy_member(&data.access_path, &member)
                }
            }
            _ => NO_VALUES,
        }
    }

    pub(crate) fn compiled_member_api_type(&mut self, parent: ValueId, atom: Atom) -> ApiType {
        let member = self.resolve_atom(atom);
        match self.value_data(parent) {
            ValueData::CompiledProxy(data) if is_builtins_root(&data.access_path) => {
                if BUILTIN_CLASS_INDEX.contains_key(&*member) {
                    ApiType::Class
                } else if BUILTIN_FUNCTION_INDEX.contains_key(&*member) {
                    ApiType::Function
                } else {
                    ApiType::Instance
                }
            }
            ValueData::CompiledClass(_) | ValueData::CompiledInstance(_) => ApiType::Function,
            _ => ApiType::Instance,
        }
    }

    fn infer_builtins_namespace_member(&mut self, member: &str) -> ValueSet {
        if BUILTIN_CLASS_INDEX.contains_key(member) {
            let class = self.builtin_class(member);
            return ValueSet::single(class);
        }
        if BUILTIN_FUNCTION_INDEX.contains_key(member) {
            let function = self.alloc_value(ValueData::CompiledFunction(CompiledFunctionData {
                name: Arc::from(member),
                owner: None,
            }));
            return ValueSet::single(function);
        }
        if let Some((_, literal)) = BUILTIN_CONSTANTS.iter().find(|(n, _)| *n == member) {
            let constant = self.create_simple_object(literal.clone());
            return ValueSet::single(constant);
        }
        NO_VALUES
    }

    fn builtin_method_value(&mut self, class_name: &str, member: &str) -> ValueSet {
        if class_has_method(class_name, member) {
            let function = self.alloc_value(ValueData::CompiledFunction(CompiledFunctionData {
                name: Arc::from(member),
                owner: Some(Arc::from(class_name)),
            }));
            ValueSet::single(function)
        } else {
            NO_VALUES
        }
    }

    // -----------------------------------------------------------------------
    // Foreign proxies
    // -----------------------------------------------------------------------

    /// The provider registered for the root module of an access path.
    fn provider_for(
        &self,
        access_path: &[Arc<str>],
    ) -> Option<Arc<dyn IntrospectionProvider>> {
        let root = access_path.first()?;
        self.project.native_provider(root)
    }

    /// Create a proxy value for a registered native module.
    pub fn native_module_value(&mut self, dotted_name: &str) -> ValueId {
        self.alloc_value(ValueData::CompiledProxy(CompiledProxyData {
            access_path: Arc::from([Arc::from(dotted_name)]),
        }))
    }

    fn proxy_member_exists(&mut self, access_path: &[Arc<str>], member: &str) -> bool {
        if !allowed_path_segment(member) || access_path.len() >= MAX_ACCESS_PATH {
            return false;
        }
        let mut path: Vec<&str> = access_path.iter().map(|s| &**s).collect();
        path.push(member);
        let Some(provider) = self.provider_for(access_path) else {
            return false;
        };
        match provider.describe(&path) {
            Ok(info) => info.is_some(),
            Err(error) => {
                self.report_external_error(error);
                false
            }
        }
    }

    fn infer_proxy_member(&mut self, access_path: &[Arc<str>], member: &str) -> ValueSet {
        if !allowed_path_segment(member) || access_path.len() >= MAX_ACCESS_PATH {
            return NO_VALUES;
        }
        let Some(provider) = self.provider_for(access_path) else {
            return NO_VALUES;
        };
        let mut path: Vec<&str> = access_path.iter().map(|s| &**s).collect();
        path.push(member);
        let info = match provider.describe(&path) {
            Ok(Some(info)) => info,
            Ok(None) => return NO_VALUES,
            Err(error) => {
                self.report_external_error(error);
                return NO_VALUES;
            }
        };
        if info.is_descriptor && !self.settings.allow_descriptor_getattr {
            // Reading the descriptor would execute getter code.
            return NO_VALUES;
        }
        let mut extended: Vec<Arc<str>> = access_path.to_vec();
        extended.push(Arc::from(member));
        let proxy = self.alloc_value(ValueData::CompiledProxy(CompiledProxyData {
            access_path: extended.into(),
        }));
        ValueSet::single(proxy)
    }

    /// Executing a proxy: the provider's return class decides.
    pub(crate) fn execute_proxy(&mut self, data: &CompiledProxyData) -> ValueSet {
        let Some(provider) = self.provider_for(&data.access_path) else {
            return NO_VALUES;
        };
        let path: Vec<&str> = data.access_path.iter().map(|s| &**s).collect();
        match provider.describe(&path) {
            Ok(Some(info)) => match info.return_class.as_deref() {
                Some(class) => {
                    let instance = self.builtin_instance(class);
                    ValueSet::single(instance)
                }
                None => NO_VALUES,
            },
            Ok(None) => NO_VALUES,
            Err(error) => {
                self.report_external_error(error);
                NO_VALUES
            }
        }
    }

    /// Executing a builtin function or method from the tables.
    pub(crate) fn execute_builtin(
        &mut self,
        data: &CompiledFunctionData,
        argument_values: &[ValueSet],
    ) -> ValueSet {
        let ret = match &data.owner {
            Some(owner) => BUILTIN_CLASS_INDEX
                .get(&**owner)
                .and_then(|c| c.methods.iter().find(|(m, _)| *m == &*data.name))
                .map(|&(_, ret)| ret),
            None => {
                // iter()/next() pass values through instead of naming types.
                match &*data.name {
                    "iter" | "next" => {
                        let Some(first) = argument_values.first().cloned() else {
                            return NO_VALUES;
                        };
                        let lazies: Vec<_> =
                            first.iter().flat_map(|v| self.iterate(v)).collect();
                        let sets: Vec<ValueSet> =
                            lazies.iter().map(|l| l.infer(self)).collect();
                        return ValueSet::from_sets(sets);
                    }
                    _ => BUILTIN_FUNCTION_INDEX.get(&*data.name).map(|&(_, ret)| ret),
                }
            }
        };
        match ret {
            Some(Ret::Instance(class)) => {
                let instance = self.builtin_instance(class);
                ValueSet::single(instance)
            }
            Some(Ret::ListOf(element)) => {
                let element_instance = self.builtin_instance(element);
                let lazy = crate::lazy::LazyValue::known(ValueSet::single(element_instance));
                let fake = self.alloc_value(ValueData::FakeSequence(
                    crate::arena::FakeSequenceData {
                        array_type: crate::arena::ArrayType::List,
                        lazy: Arc::from([lazy]),
                    },
                ));
                ValueSet::single(fake)
            }
            Some(Ret::SelfClass) => match &data.owner {
                Some(owner) => {
                    let instance = self.builtin_instance(owner);
                    ValueSet::single(instance)
                }
                None => NO_VALUES,
            },
            Some(Ret::Unknown) | None => NO_VALUES,
        }
    }

    /// Truthiness of compiled instances: known literals decide, anything
    /// else is unknown.
    pub(crate) fn compiled_truthiness(&self, data: &CompiledInstanceData) -> Truthiness {
        match &data.literal {
            Some(Literal::Bool(b)) => {
                if *b {
                    Truthiness::True
                } else {
                    Truthiness::False
                }
            }
            Some(Literal::None) => Truthiness::False,
            Some(Literal::Int(i)) => {
                if *i != 0 {
                    Truthiness::True
                } else {
                    Truthiness::False
                }
            }
            Some(Literal::Str(s)) | Some(Literal::Bytes(s)) => {
                if s.is_empty() {
                    Truthiness::False
                } else {
                    Truthiness::True
                }
            }
            Some(Literal::Float(_)) => match data.literal.as_ref().and_then(|l| l.as_f64()) {
                Some(f) if f == 0.0 => Truthiness::False,
                Some(_) => Truthiness::True,
                None => Truthiness::Unknown,
            },
            None => Truthiness::Unknown,
        }
    }
}

fn class_has_method(class_name: &str, member: &str) -> bool {
    BUILTIN_CLASS_INDEX
        .get(class_name)
        .map(|c| c.methods.iter().any(|(m, _)| *m == member))
        .unwrap_or(false)
        // Everything inherits object's protocol methods.
        || BUILTIN_CLASS_INDEX
            .get("object")
            .map(|c| c.methods.iter().any(|(m, _)| *m == member))
            .unwrap_or(false)
}

fn class_method_names(class_name: &str) -> Vec<String> {
    let mut names: Vec<String> = BUILTIN_CLASS_INDEX
        .get(class_name)
        .map(|c| c.methods.iter().map(|(m, _)| m.to_string()).collect())
        .unwrap_or_default();
    if class_name != "object" {
        if let Some(object) = BUILTIN_CLASS_INDEX.get("object") {
            names.extend(object.methods.iter().map(|(m, _)| m.to_string()));
        }
    }
    names.sort();
    names.dedup();
    names
}

fn builtins_namespace_has(member: &str) -> bool {
    BUILTIN_CLASS_INDEX.contains_key(member)
        || BUILTIN_FUNCTION_INDEX.contains_key(member)
        || BUILTIN_CONSTANTS.iter().any(|(n, _)| *n == member)
}

fn builtins_namespace_names() -> Vec<String> {
    let mut names: Vec<String> = BUILTIN_CLASSES.iter().map(|c| c.name.to_string()).collect();
    names.extend(BUILTIN_FUNCTIONS.iter().map(|&(n, _, _)| n.to_string()));
    names.extend(BUILTIN_CONSTANTS.iter().map(|(n, _)| n.to_string()));
    names.sort();
    names.dedup();
    names
}

fn is_builtins_root(access_path: &[Arc<str>]) -> bool {
    access_path.len() == 1 && &*access_path[0] == "builtins"
}

/// Identifier-shaped segments only; anything else is off the allow-list.
fn allowed_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !segment.chars().next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookups() {
        assert!(builtin_class_exists("str"));
        assert!(class_has_method("str", "upper"));
        assert!(class_has_method("list", "__repr__")); // inherited
        assert!(!class_has_method("int", "upper"));
        assert!(builtins_namespace_has("len"));
        assert!(builtins_namespace_has("None"));
    }

    #[test]
    fn test_allowed_path_segments() {
        assert!(allowed_path_segment("ndarray"));
        assert!(allowed_path_segment("_private"));
        assert!(!allowed_path_segment("0abc"));
        assert!(!allowed_path_segment("a.b"));
        assert!(!allowed_path_segment(""));
    }
}
