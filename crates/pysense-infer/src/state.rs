//! The inference session.
//!
//! `InferenceState` owns everything with query-scoped or session-scoped
//! lifetime: the value and context arenas, the per-query memoization
//! tables, the recursion guards, the loaded-module registry and the
//! settings. It is deliberately single-threaded: caches and recursion
//! counters are session-global mutable state, so concurrent queries over
//! one state would corrupt each other (spec'd; not a TODO).
//!
//! All capability dispatch is implemented as `impl InferenceState` blocks
//! spread over the modules that own each concern, the same way the
//! binder/checker state types of the reference stack split their impls.

use crate::arena::{ModuleId, ValueArena, ValueData, ValueId};
use crate::cache::QueryCache;
use crate::context::{ContextArena, ContextData, ContextId};
use crate::names::Name;
use crate::project::Project;
use crate::recursion::{ExecutionRecursionDetector, RecursionDetector};
use crate::signature::Signature;
use crate::value_set::ValueSet;
use indexmap::IndexMap;
use pysense_common::error::EnvironmentError;
use pysense_common::interner::{Atom, Interner};
use pysense_common::position::Position;
use pysense_common::settings::Settings;
use pysense_syntax::tree::{NodeIndex, Tree};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// A loaded (parsed) module.
pub struct ModuleInfo {
    pub name: Arc<str>,
    pub tree: Arc<Tree>,
    pub is_stub: bool,
    pub is_package: bool,
}

pub struct InferenceState {
    pub settings: Settings,
    pub(crate) project: Project,
    interner: Arc<Interner>,
    modules: Vec<ModuleInfo>,
    module_ids: FxHashMap<(String, bool), ModuleId>,
    pub(crate) values: ValueArena,
    pub(crate) contexts: ContextArena,
    pub(crate) cache: QueryCache,
    pub(crate) statement_guard: RecursionDetector,
    pub(crate) execution_guard: ExecutionRecursionDetector,
    /// Per-iteration name bindings, innermost last. Consulted before any
    /// filter during name lookup.
    pub(crate) predefined: Vec<(ContextId, FxHashMap<Atom, ValueSet>)>,
    /// First environment error reported during the current query.
    pub(crate) external_error: Option<EnvironmentError>,
    pub(crate) dynamic_params_depth: u32,
}

impl InferenceState {
    pub fn new(project: Project) -> Self {
        Self::with_settings(project, Settings::default())
    }

    pub fn with_settings(project: Project, settings: Settings) -> Self {
        let interner = project.interner().clone();
        Self {
            settings,
            project,
            interner,
            modules: Vec::new(),
            module_ids: FxHashMap::default(),
            values: ValueArena::new(),
            contexts: ContextArena::default(),
            cache: QueryCache::new(),
            statement_guard: RecursionDetector::new(),
            execution_guard: ExecutionRecursionDetector::new(),
            predefined: Vec::new(),
            external_error: None,
            dynamic_params_depth: 0,
        }
    }

    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn intern(&self, text: &str) -> Atom {
        self.interner.intern(text)
    }

    pub fn resolve_atom(&self, atom: Atom) -> Arc<str> {
        self.interner.resolve(atom)
    }

    // -----------------------------------------------------------------------
    // Modules
    // -----------------------------------------------------------------------

    pub fn tree(&self, module: ModuleId) -> Arc<Tree> {
        self.modules[module.0 as usize].tree.clone()
    }

    pub fn module_info(&self, module: ModuleId) -> &ModuleInfo {
        &self.modules[module.0 as usize]
    }

    /// Load (and cache) the parsed runtime module for a dotted name.
    pub fn load_module(&mut self, dotted_name: &str) -> Option<ModuleId> {
        self.load_module_inner(dotted_name, false)
    }

    /// Load (and cache) the stub module for a dotted name.
    pub fn load_stub(&mut self, dotted_name: &str) -> Option<ModuleId> {
        self.load_module_inner(dotted_name, true)
    }

    fn load_module_inner(&mut self, dotted_name: &str, stub: bool) -> Option<ModuleId> {
        let key = (dotted_name.to_string(), stub);
        if let Some(&existing) = self.module_ids.get(&key) {
            return Some(existing);
        }
        let tree = if stub {
            self.project.parse_stub(dotted_name)?
        } else {
            self.project.parse(dotted_name)?
        };
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(ModuleInfo {
            name: Arc::from(dotted_name),
            tree,
            is_stub: stub,
            is_package: self.project.is_package(dotted_name),
        });
        self.module_ids.insert(key, id);
        debug!(name = dotted_name, stub, ?id, "loaded module");
        Some(id)
    }

    /// Register a source and load it in one step (test/embedding helper).
    pub fn add_module(&mut self, dotted_name: &str, source: &str) -> ModuleId {
        self.project.add_module(dotted_name, source);
        self.load_module(dotted_name)
            .expect("module was just registered")
    }

    // -----------------------------------------------------------------------
    // Query lifecycle
    // -----------------------------------------------------------------------

    /// Reset query-scoped state. Every public query entry point calls this;
    /// longer-lived caches (parsed trees, arenas) survive.
    pub fn begin_query(&mut self) {
        self.cache.clear();
        self.statement_guard.clear();
        self.execution_guard.clear();
        self.predefined.clear();
        self.external_error = None;
        self.dynamic_params_depth = 0;
    }

    pub(crate) fn report_external_error(&mut self, error: EnvironmentError) {
        if self.external_error.is_none() {
            self.external_error = Some(error);
        }
    }

    fn finish_query<T>(&mut self, result: T) -> Result<T, EnvironmentError> {
        match self.external_error.take() {
            Some(error) => Err(error),
            None => Ok(result),
        }
    }

    // -----------------------------------------------------------------------
    // Public API surface
    // -----------------------------------------------------------------------

    /// Infer the possible values of an expression node.
    ///
    /// Never fails for syntactically valid input except on environment
    /// errors; "could not determine" is the empty set.
    pub fn infer_expression(
        &mut self,
        context: ContextId,
        node: NodeIndex,
    ) -> Result<ValueSet, EnvironmentError> {
        self.begin_query();
        let result = self.infer_node(context, node);
        self.finish_query(result)
    }

    /// Resolve a name to its value set.
    pub fn resolve_name(&mut self, name: &Name) -> Result<ValueSet, EnvironmentError> {
        self.begin_query();
        let result = self.infer_name(name);
        self.finish_query(result)
    }

    /// All names visible from `context` at `position`, innermost scope
    /// first; shadowed names are filtered out. The map keeps insertion
    /// order, so completions come out innermost-scope-first.
    pub fn visible_names(
        &mut self,
        context: ContextId,
        position: Position,
    ) -> Result<Vec<Name>, EnvironmentError> {
        self.begin_query();
        let filters = self.get_global_filters(context, Some(position), None);
        let mut visible: IndexMap<Atom, Name> = IndexMap::new();
        for filter in filters {
            for name in filter.values(self) {
                let atom = self.name_atom(&name);
                visible.entry(atom).or_insert(name);
            }
        }
        self.finish_query(visible.into_values().collect())
    }

    /// The defining name of `name`, unwrapping delegating wrappers.
    pub fn definition_of(&mut self, name: &Name) -> Name {
        match name {
            Name::InstanceClassName { inner, .. } => self.definition_of(inner),
            other => other.clone(),
        }
    }

    /// Call signatures of whatever `node` evaluates to.
    pub fn signatures(
        &mut self,
        context: ContextId,
        node: NodeIndex,
    ) -> Result<Vec<Signature>, EnvironmentError> {
        self.begin_query();
        let values = self.infer_node(context, node);
        let sigs = values
            .iter()
            .filter_map(|v| self.signature_of(v))
            .collect();
        self.finish_query(sigs)
    }

    // -----------------------------------------------------------------------
    // Value helpers shared across modules
    // -----------------------------------------------------------------------

    pub fn value_data(&self, id: ValueId) -> ValueData {
        self.values.get(id).clone()
    }

    pub(crate) fn alloc_value(&mut self, data: ValueData) -> ValueId {
        self.values.alloc(data)
    }

    /// The module context for a loaded module, creating its value on first
    /// use.
    pub fn module_context(&mut self, module: ModuleId) -> ContextId {
        let value = self.module_value_for(module, None);
        self.alloc_context(ContextData::Module { value, module })
    }

    pub(crate) fn module_value_for(
        &mut self,
        module: ModuleId,
        fallback: Option<ModuleId>,
    ) -> ValueId {
        self.alloc_value(ValueData::Module(crate::arena::ModuleData {
            module,
            fallback,
        }))
    }
}
