//! The project: registered module sources, stubs and native modules.
//!
//! The engine never touches the filesystem; an embedder registers sources
//! under dotted names (`"pkg.mod"`). Stub sources are type-only shadows
//! preferred for public API shape. Native modules are reached through an
//! [`IntrospectionProvider`] instead of source.

use crate::value::compiled::IntrospectionProvider;
use pysense_common::error::EnvironmentError;
use pysense_common::interner::Interner;
use pysense_syntax::cache::SourceCache;
use pysense_syntax::tree::Tree;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A source-language version, for version-keyed stub selection.
pub type LanguageVersion = (u32, u32);

/// One registered stub source, optionally pinned to a version.
struct StubSource {
    version: Option<LanguageVersion>,
    source: String,
}

pub struct Project {
    interner: Arc<Interner>,
    cache: SourceCache,
    stub_cache: SourceCache,
    sources: FxHashMap<String, String>,
    stubs: FxHashMap<String, Vec<StubSource>>,
    natives: FxHashMap<String, Arc<dyn IntrospectionProvider>>,
    language_version: LanguageVersion,
}

impl Project {
    pub fn new() -> Self {
        let interner = Arc::new(Interner::new());
        Self {
            cache: SourceCache::new(interner.clone()),
            stub_cache: SourceCache::new(interner.clone()),
            sources: FxHashMap::default(),
            stubs: FxHashMap::default(),
            natives: FxHashMap::default(),
            language_version: (3, 12),
            interner,
        }
    }

    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// The active source-language version used to select stubs.
    pub fn language_version(&self) -> LanguageVersion {
        self.language_version
    }

    /// Switch the active language version. Cached stub parses are dropped:
    /// version-pinned stubs may now resolve differently.
    pub fn set_language_version(&mut self, version: LanguageVersion) {
        if self.language_version != version {
            self.language_version = version;
            self.stub_cache.clear();
        }
    }

    /// Register a module source under its dotted name.
    pub fn add_module(&mut self, dotted_name: &str, source: &str) {
        self.cache.invalidate(dotted_name);
        self.sources.insert(dotted_name.to_string(), source.to_string());
    }

    /// Register a type-only stub for a dotted name, valid for every
    /// language version.
    pub fn add_stub(&mut self, dotted_name: &str, source: &str) {
        self.add_stub_entry(dotted_name, None, source);
    }

    /// Register a stub that only applies to one language version.
    pub fn add_stub_for_version(
        &mut self,
        dotted_name: &str,
        version: LanguageVersion,
        source: &str,
    ) {
        self.add_stub_entry(dotted_name, Some(version), source);
    }

    fn add_stub_entry(
        &mut self,
        dotted_name: &str,
        version: Option<LanguageVersion>,
        source: &str,
    ) {
        self.stub_cache.invalidate(dotted_name);
        self.stubs
            .entry(dotted_name.to_string())
            .or_default()
            .push(StubSource { version, source: source.to_string() });
    }

    /// The stub source matching the active version: an exact version pin
    /// wins over a wildcard entry.
    fn stub_source(&self, dotted_name: &str) -> Option<&str> {
        let entries = self.stubs.get(dotted_name)?;
        entries
            .iter()
            .find(|s| s.version == Some(self.language_version))
            .or_else(|| entries.iter().find(|s| s.version.is_none()))
            .map(|s| s.source.as_str())
    }

    /// Register a native/compiled module served by introspection.
    pub fn add_native_module(&mut self, dotted_name: &str, provider: Arc<dyn IntrospectionProvider>) {
        self.natives.insert(dotted_name.to_string(), provider);
    }

    pub fn has_module(&self, dotted_name: &str) -> bool {
        self.sources.contains_key(dotted_name)
    }

    pub fn has_stub(&self, dotted_name: &str) -> bool {
        self.stub_source(dotted_name).is_some()
    }

    pub fn native_provider(&self, dotted_name: &str) -> Option<Arc<dyn IntrospectionProvider>> {
        self.natives.get(dotted_name).cloned()
    }

    /// Validate the project configuration.
    ///
    /// Surfaced once, up front, so a broken environment is a distinct
    /// user-actionable error instead of a sea of empty results.
    pub fn validate(&self) -> Result<(), EnvironmentError> {
        for (name, provider) in &self.natives {
            provider.validate().map_err(|e| match e {
                EnvironmentError::InvalidEnvironment(msg) => {
                    EnvironmentError::InvalidEnvironment(format!("{name}: {msg}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    pub(crate) fn parse(&self, dotted_name: &str) -> Option<Arc<Tree>> {
        let source = self.sources.get(dotted_name)?;
        Some(self.cache.parse(dotted_name, source))
    }

    pub(crate) fn parse_stub(&self, dotted_name: &str) -> Option<Arc<Tree>> {
        let source = self.stub_source(dotted_name)?;
        Some(self.stub_cache.parse(dotted_name, source))
    }

    /// Dotted names of direct submodules of `package`.
    pub fn sub_module_names(&self, package: &str) -> Vec<String> {
        let prefix = format!("{package}.");
        let mut names: Vec<String> = self
            .sources
            .keys()
            .chain(self.stubs.keys())
            .chain(self.natives.keys())
            .filter_map(|name| {
                let rest = name.strip_prefix(&prefix)?;
                let first = rest.split('.').next()?;
                Some(first.to_string())
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Is `dotted_name` a package (has submodules but may lack a source)?
    pub fn is_package(&self, dotted_name: &str) -> bool {
        let prefix = format!("{dotted_name}.");
        self.sources.keys().chain(self.stubs.keys()).any(|k| k.starts_with(&prefix))
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}
