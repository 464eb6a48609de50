//! Name resolution, imports, stubs, secondary heuristics and the exposed
//! API surface.

use pysense_common::error::EnvironmentError;
use pysense_common::position::Position;
use pysense_common::settings::Settings;
use pysense_infer::value::compiled::{CompiledInfo, IntrospectionProvider};
use pysense_infer::{
    ApiType, InferenceState, ModuleId, Name, Project, ValueData, ValueSet,
};
use pysense_syntax::scope;
use pysense_syntax::tree::NodeIndex;
use std::sync::Arc;

fn setup(source: &str) -> (InferenceState, ModuleId) {
    let mut project = Project::new();
    project.add_module("m", source);
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").expect("registered module");
    (state, module)
}

fn name_node(state: &InferenceState, module: ModuleId, text: &str, occurrence: usize) -> NodeIndex {
    let tree = state.tree(module);
    let atom = state.intern(text);
    tree.used_names(atom)[occurrence]
}

fn infer_at(
    state: &mut InferenceState,
    module: ModuleId,
    text: &str,
    occurrence: usize,
) -> ValueSet {
    let node = name_node(state, module, text, occurrence);
    let ctx = state.create_context(module, node);
    state.infer_expression(ctx, node).expect("no environment error")
}

fn type_names(state: &mut InferenceState, set: &ValueSet) -> Vec<String> {
    let mut names: Vec<String> = set
        .iter()
        .map(|v| {
            let v = match state.value_data(v) {
                ValueData::Decoratee(data) => data.inner,
                _ => v,
            };
            state
                .value_name(v)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string())
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

#[test]
fn test_import_module_attribute() {
    let mut project = Project::new();
    project.add_module("lib", "value = 'exported'\n");
    project.add_module("m", "import lib\nr = lib.value\n");
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").unwrap();
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["str"]);
}

#[test]
fn test_from_import_and_alias() {
    let mut project = Project::new();
    project.add_module("pkg.inner", "flag = True\n");
    project.add_module(
        "m",
        "from pkg.inner import flag as f\nimport pkg.inner as direct\nr = f\nd = direct.flag\n",
    );
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").unwrap();
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["bool"]);
    let d = infer_at(&mut state, module, "d", 0);
    assert_eq!(type_names(&mut state, &d), vec!["bool"]);
}

#[test]
fn test_package_binding_and_namespace() {
    let mut project = Project::new();
    project.add_module("pkg.sub", "x = 1\n");
    project.add_module("m", "import pkg.sub\nr = pkg.sub.x\n");
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").unwrap();
    // `import pkg.sub` binds `pkg`, a namespace package.
    let pkg = infer_at(&mut state, module, "pkg", 1);
    assert_eq!(pkg.len(), 1);
    assert_eq!(state.api_type(pkg.iter().next().unwrap()), ApiType::Module);
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["int"]);
}

#[test]
fn test_relative_import() {
    let mut project = Project::new();
    project.add_module("pkg.a", "shared = 1.5\n");
    project.add_module("pkg.b", "from . import a\nfrom .a import shared\nr = shared\n");
    let mut state = InferenceState::new(project);
    let module = state.load_module("pkg.b").unwrap();
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["float"]);
}

#[test]
fn test_unresolvable_import_is_empty() {
    let (mut state, module) = setup("import nothing_here\nr = nothing_here\n");
    let r = infer_at(&mut state, module, "r", 0);
    assert!(r.is_empty());
}

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

#[test]
fn test_stub_preferred_with_runtime_fallback() {
    let mut project = Project::new();
    project.add_module("lib", "def api():\n    return 1\nsecret = 2\n");
    project.add_stub("lib", "def api() -> str: ...\n");
    project.add_module("m", "import lib\nr = lib.api()\ns = lib.secret\n");
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").unwrap();
    // The stub's annotation shapes the public API.
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["str"]);
    // A name the stub lacks falls back to the runtime module.
    let s = infer_at(&mut state, module, "s", 0);
    assert_eq!(type_names(&mut state, &s), vec!["int"]);
}

#[test]
fn test_version_pinned_stub_selection() {
    let mut project = Project::new();
    project.add_module("lib", "def api():\n    return 1\n");
    project.add_stub("lib", "def api() -> str: ...\n");
    project.add_stub_for_version("lib", (3, 8), "def api() -> bytes: ...\n");
    project.set_language_version((3, 8));
    project.add_module("m", "import lib\nr = lib.api()\n");
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").unwrap();
    // The exact version pin beats the wildcard stub.
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["bytes"]);
}

// ---------------------------------------------------------------------------
// Annotations and generics
// ---------------------------------------------------------------------------

#[test]
fn test_parameter_and_return_annotations() {
    let source = "def f(a: int) -> bool:\n    return a\nr = f('ignored')\np = f\n";
    let (mut state, module) = setup(source);
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["bool"]);

    // The annotated parameter resolves to int even with junk arguments.
    let f_set = infer_at(&mut state, module, "p", 0);
    let function = f_set.iter().next().unwrap();
    let tree = state.tree(module);
    let funcdef = match state.value_data(function) {
        ValueData::Function(data) => data.funcdef,
        other => panic!("expected function, got {other:?}"),
    };
    let param = scope::funcdef_params(&tree, funcdef)[0];
    let a_name = scope::param_name(&tree, param).unwrap();
    let values = state
        .resolve_name(&Name::Param { function, name: a_name, arguments: None })
        .unwrap();
    assert_eq!(type_names(&mut state, &values), vec!["int"]);
}

#[test]
fn test_builtin_generics() {
    let source = "def f(xs: list[int]):\n    return xs[0]\nr = f(None)\n";
    let (mut state, module) = setup(source);
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["int"]);
}

#[test]
fn test_typing_aliases_and_optional() {
    let source = "\
def f(xs: List[str]):
    return xs[0]
def g(x: Optional[int]):
    return x
r = f(None)
o = g(None)
";
    let (mut state, module) = setup(source);
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["str"]);
    let o = infer_at(&mut state, module, "o", 0);
    assert_eq!(type_names(&mut state, &o), vec!["NoneType", "int"]);
}

#[test]
fn test_annotation_iteration() {
    let source = "def f(xs: dict[str, int]):\n    for k in xs:\n        return k\nr = f(None)\n";
    let (mut state, module) = setup(source);
    let r = infer_at(&mut state, module, "r", 0);
    // Iterating a dict yields its keys.
    assert_eq!(type_names(&mut state, &r), vec!["str"]);
}

// ---------------------------------------------------------------------------
// Docstrings
// ---------------------------------------------------------------------------

#[test]
fn test_docstring_param_types() {
    let source = "\
def f(p):
    \"\"\"Frobnicate.

    :type p: str
    \"\"\"
    return p
h = f
";
    let (mut state, module) = setup(source);
    let f_set = infer_at(&mut state, module, "h", 0);
    let function = f_set.iter().next().unwrap();
    let tree = state.tree(module);
    let funcdef = match state.value_data(function) {
        ValueData::Function(data) => data.funcdef,
        other => panic!("expected function, got {other:?}"),
    };
    let param = scope::funcdef_params(&tree, funcdef)[0];
    let p_name = scope::param_name(&tree, param).unwrap();
    let values = state
        .resolve_name(&Name::Param { function, name: p_name, arguments: None })
        .unwrap();
    assert_eq!(type_names(&mut state, &values), vec!["str"]);
}

#[test]
fn test_docstring_rtype() {
    let source = "\
def f():
    \"\"\":rtype: int\"\"\"
r = f()
";
    let (mut state, module) = setup(source);
    let r = infer_at(&mut state, module, "r", 0);
    // The docstring's int unions with the implicit None return.
    assert_eq!(type_names(&mut state, &r), vec!["NoneType", "int"]);
}

// ---------------------------------------------------------------------------
// Dynamic parameter search
// ---------------------------------------------------------------------------

#[test]
fn test_dynamic_params_from_call_sites() {
    let source = "\
def f(a):
    return a
f(1)
f('two')
h = f
";
    let (mut state, module) = setup(source);
    let f_set = infer_at(&mut state, module, "h", 0);
    let function = f_set.iter().next().unwrap();
    let tree = state.tree(module);
    let funcdef = match state.value_data(function) {
        ValueData::Function(data) => data.funcdef,
        other => panic!("expected function, got {other:?}"),
    };
    let param = scope::funcdef_params(&tree, funcdef)[0];
    let a_name = scope::param_name(&tree, param).unwrap();
    let values = state
        .resolve_name(&Name::Param { function, name: a_name, arguments: None })
        .unwrap();
    assert_eq!(type_names(&mut state, &values), vec!["int", "str"]);
}

#[test]
fn test_dynamic_params_disabled_by_settings() {
    let mut project = Project::new();
    project.add_module("m", "def f(a):\n    return a\nf(1)\nh = f\n");
    let mut settings = Settings::default();
    settings.dynamic_params = false;
    let mut state = InferenceState::with_settings(project, settings);
    let module = state.load_module("m").unwrap();
    let f_set = infer_at(&mut state, module, "h", 0);
    let function = f_set.iter().next().unwrap();
    let tree = state.tree(module);
    let funcdef = match state.value_data(function) {
        ValueData::Function(data) => data.funcdef,
        _ => unreachable!(),
    };
    let param = scope::funcdef_params(&tree, funcdef)[0];
    let a_name = scope::param_name(&tree, param).unwrap();
    let values = state
        .resolve_name(&Name::Param { function, name: a_name, arguments: None })
        .unwrap();
    assert!(values.is_empty());
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

#[test]
fn test_signature_of_function() {
    let (mut state, module) = setup("def f(a, b=1, *args, **kw):\n    pass\n");
    let node = name_node(&state, module, "f", 0);
    let ctx = state.create_context(module, node);
    let signatures = state.signatures(ctx, node).unwrap();
    assert_eq!(signatures.len(), 1);
    let signature = &signatures[0];
    assert_eq!(&*signature.name, "f");
    let rendered = signature.to_string();
    assert_eq!(rendered, "f(a, b=1, *args, **kw)");
    assert!(signature.params[0].default.is_none());
    assert_eq!(signature.params[1].default.as_deref(), Some("1"));
}

#[test]
fn test_signature_of_class_uses_init() {
    let source = "\
class C:
    def __init__(self, a, b):
        pass
ref = C
";
    let (mut state, module) = setup(source);
    let node = name_node(&state, module, "ref", 0);
    let ctx = state.create_context(module, node);
    let signatures = state.signatures(ctx, node).unwrap();
    assert_eq!(signatures.len(), 1);
    // `self` is hidden; the class name labels the signature.
    assert_eq!(signatures[0].to_string(), "C(a, b)");
}

#[test]
fn test_signature_of_bound_method_hides_self() {
    let source = "\
class C:
    def m(self, x):
        pass
ref = C().m
";
    let (mut state, module) = setup(source);
    let node = name_node(&state, module, "ref", 0);
    let ctx = state.create_context(module, node);
    let signatures = state.signatures(ctx, node).unwrap();
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].to_string(), "m(x)");
}

#[test]
fn test_builtin_signature() {
    let (mut state, module) = setup("ref = len\n");
    let node = name_node(&state, module, "ref", 0);
    let ctx = state.create_context(module, node);
    let signatures = state.signatures(ctx, node).unwrap();
    assert_eq!(signatures.len(), 1);
    assert_eq!(&*signatures[0].name, "len");
    assert_eq!(signatures[0].params.len(), 1);
}

// ---------------------------------------------------------------------------
// Visible names / completion
// ---------------------------------------------------------------------------

#[test]
fn test_visible_names_at_position() {
    let source = "alpha = 1\ndef beta():\n    pass\ngamma = 2\n";
    let (mut state, module) = setup(source);
    let ctx = state.module_context(module);
    // Query between `beta` and `gamma`: gamma is not yet visible.
    let names = state.visible_names(ctx, Position::new(3, 0)).unwrap();
    let spelled: Vec<String> = names
        .iter()
        .map(|n| state.name_string(n).to_string())
        .collect();
    assert!(spelled.contains(&"alpha".to_string()));
    assert!(spelled.contains(&"beta".to_string()));
    assert!(!spelled.contains(&"gamma".to_string()));
    // Builtins ride along at the end of the chain.
    assert!(spelled.contains(&"len".to_string()));
    assert!(spelled.contains(&"str".to_string()));
}

#[test]
fn test_visible_names_shadowing_dedup() {
    let source = "x = 1\ndef f():\n    x = 'local'\n    y = 2\n";
    let (mut state, module) = setup(source);
    let y_node = name_node(&state, module, "y", 0);
    let ctx = state.create_context(module, y_node);
    let names = state.visible_names(ctx, Position::new(4, 10)).unwrap();
    let xs: Vec<&Name> = names
        .iter()
        .filter(|&n| &*state.name_string(n) == "x")
        .collect();
    // One x: the local one shadows the module-level one.
    assert_eq!(xs.len(), 1);
    let local_x: Name = xs[0].clone();
    let values = state.resolve_name(&local_x).unwrap();
    assert_eq!(type_names(&mut state, &values), vec!["str"]);
}

#[test]
fn test_definition_of_unwraps_instance_wrappers() {
    let source = "\
class C:
    def m(self):
        pass
obj = C()
";
    let (mut state, module) = setup(source);
    let obj = infer_at(&mut state, module, "obj", 0);
    let instance = obj.iter().next().unwrap();
    let members = state.instance_member_names(instance);
    let m: Name = members
        .iter()
        .find(|&n| &*state.name_string(n) == "m")
        .expect("m is visible on the instance")
        .clone();
    let definition = state.definition_of(&m);
    assert!(matches!(definition, Name::Tree { .. }));
    let pos = state.name_start_pos(&definition).unwrap();
    assert_eq!(pos.line, 2);
}

// ---------------------------------------------------------------------------
// Introspection provider (environment errors, native modules)
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FakeNative;

impl IntrospectionProvider for FakeNative {
    fn describe(&self, path: &[&str]) -> Result<Option<CompiledInfo>, EnvironmentError> {
        match path {
            ["native", "get_num"] => Ok(Some(CompiledInfo {
                api_type: ApiType::Function,
                return_class: Some("int".to_string()),
                signature: Some("get_num()".to_string()),
                doc: None,
                is_descriptor: false,
            })),
            ["native", "lazy_attr"] => Ok(Some(CompiledInfo {
                api_type: ApiType::Instance,
                return_class: None,
                signature: None,
                doc: None,
                is_descriptor: true,
            })),
            _ => Ok(None),
        }
    }

    fn members(&self, path: &[&str]) -> Result<Vec<String>, EnvironmentError> {
        match path {
            ["native"] => Ok(vec!["get_num".to_string(), "lazy_attr".to_string()]),
            _ => Ok(Vec::new()),
        }
    }
}

#[derive(Debug)]
struct BrokenNative;

impl IntrospectionProvider for BrokenNative {
    fn validate(&self) -> Result<(), EnvironmentError> {
        Err(EnvironmentError::InvalidEnvironment("no interpreter".into()))
    }

    fn describe(&self, _path: &[&str]) -> Result<Option<CompiledInfo>, EnvironmentError> {
        Err(EnvironmentError::IntrospectionTimeout("native".into()))
    }

    fn members(&self, _path: &[&str]) -> Result<Vec<String>, EnvironmentError> {
        Err(EnvironmentError::IntrospectionTimeout("native".into()))
    }
}

#[test]
fn test_native_module_call_result() {
    let mut project = Project::new();
    project.add_native_module("native", Arc::new(FakeNative));
    project.add_module("m", "import native\nr = native.get_num()\n");
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").unwrap();
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(type_names(&mut state, &r), vec!["int"]);
}

#[test]
fn test_descriptor_access_gated_by_settings() {
    let mut project = Project::new();
    project.add_native_module("native", Arc::new(FakeNative));
    project.add_module("m", "import native\nr = native.lazy_attr\n");
    // Default settings: descriptor evaluation is off, the attribute yields
    // nothing rather than running getter code.
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").unwrap();
    let r = infer_at(&mut state, module, "r", 0);
    assert!(r.is_empty());

    let mut project = Project::new();
    project.add_native_module("native", Arc::new(FakeNative));
    project.add_module("m", "import native\nr = native.lazy_attr\n");
    let mut settings = Settings::default();
    settings.allow_descriptor_getattr = true;
    let mut state = InferenceState::with_settings(project, settings);
    let module = state.load_module("m").unwrap();
    let r = infer_at(&mut state, module, "r", 0);
    assert_eq!(r.len(), 1);
}

#[test]
fn test_environment_error_surfaces_at_api_boundary() {
    let mut project = Project::new();
    project.add_native_module("native", Arc::new(BrokenNative));
    project.add_module("m", "import native\nr = native.anything\n");
    assert!(matches!(
        project.validate(),
        Err(EnvironmentError::InvalidEnvironment(_))
    ));
    let mut state = InferenceState::new(project);
    let module = state.load_module("m").unwrap();
    let node = name_node(&state, module, "r", 0);
    let ctx = state.create_context(module, node);
    let result = state.infer_expression(ctx, node);
    assert!(matches!(
        result,
        Err(EnvironmentError::IntrospectionTimeout(_))
    ));
}

// ---------------------------------------------------------------------------
// Module attributes
// ---------------------------------------------------------------------------

#[test]
fn test_module_attributes() {
    let (mut state, module) = setup("n = __name__\n");
    let n = infer_at(&mut state, module, "n", 0);
    assert_eq!(type_names(&mut state, &n), vec!["str"]);
}
