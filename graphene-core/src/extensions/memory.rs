//! In-memory module collaborators
//!
//! [`MemorySource`] and [`MemoryLoader`] stand in for the extensions
//! directory and the native loader. Hosts use them for modules linked
//! statically into the binary; tests use them to script discovery results,
//! load failures and slow loads.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use graphene_extension_api::{ExportedType, ModuleManifest};

use super::discovery::ModuleSource;
use super::index::ModuleIdentity;
use super::module::{DependencyResolver, LoadedModule, ModuleLoader, resolve_dependencies};
use crate::error::ResolveError;

/// Scripted description of one module
#[derive(Debug, Clone)]
pub struct MemoryModule {
    manifest: ModuleManifest,
    exports: Vec<ExportedType>,
    failure: Option<String>,
    panics: bool,
    load_delay: Option<Duration>,
}

impl MemoryModule {
    pub fn new(name: &str) -> Self {
        Self {
            manifest: ModuleManifest {
                name: name.to_string(),
                ..Default::default()
            },
            exports: Vec::new(),
            failure: None,
            panics: false,
            load_delay: None,
        }
    }

    pub fn depends_on(mut self, identity: &str) -> Self {
        self.manifest.dependencies.push(identity.to_string());
        self
    }

    pub fn exporting(mut self, ty: ExportedType) -> Self {
        self.exports.push(ty);
        self
    }

    /// Make every load of this module fail with `cause`
    pub fn failing(mut self, cause: &str) -> Self {
        self.failure = Some(cause.to_string());
        self
    }

    /// Make every load of this module panic
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Sleep for `delay` inside every load
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }
}

/// Shared view of how many times each identity was loaded
#[derive(Debug, Clone, Default)]
pub struct LoadCounts(Arc<Mutex<HashMap<ModuleIdentity, usize>>>);

impl LoadCounts {
    pub fn count(&self, identity: &str) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .copied()
            .unwrap_or(0)
    }

    fn bump(&self, identity: &ModuleIdentity) {
        *self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(identity.clone())
            .or_default() += 1;
    }
}

/// Loader backed by a path → [`MemoryModule`] table
#[derive(Debug, Default)]
pub struct MemoryLoader {
    modules: HashMap<PathBuf, MemoryModule>,
    counts: LoadCounts,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, path: impl Into<PathBuf>, module: MemoryModule) -> Self {
        self.modules.insert(path.into(), module);
        self
    }

    /// Handle for observing load attempts after the loader is moved
    pub fn load_counts(&self) -> LoadCounts {
        self.counts.clone()
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(
        &self,
        identity: &ModuleIdentity,
        path: &Path,
        resolver: &dyn DependencyResolver,
    ) -> Result<LoadedModule, ResolveError> {
        self.counts.bump(identity);

        let Some(spec) = self.modules.get(path) else {
            return Err(ResolveError::load_failure(path, "no such module"));
        };
        if let Some(delay) = spec.load_delay {
            std::thread::sleep(delay);
        }
        if spec.panics {
            panic!("module {identity} panicked while loading");
        }
        if let Some(cause) = &spec.failure {
            return Err(ResolveError::load_failure(path, cause.clone()));
        }

        let dependencies = resolve_dependencies(identity, &spec.manifest, resolver)?;
        Ok(LoadedModule::new(
            identity.clone(),
            path,
            spec.manifest.clone(),
            spec.exports.clone(),
        )
        .with_dependencies(dependencies))
    }
}

/// Discovery source backed by a fixed candidate list
#[derive(Debug, Default)]
pub struct MemorySource {
    candidates: Vec<(PathBuf, Option<ModuleIdentity>)>,
    failure: Option<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidate(mut self, path: impl Into<PathBuf>, identity: &str) -> Self {
        self.candidates.push((path.into(), Some(identity.into())));
        self
    }

    /// A candidate whose identity cannot be read
    pub fn with_malformed(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidates.push((path.into(), None));
        self
    }

    /// Make `candidates()` fail with `cause`
    pub fn failing(mut self, cause: &str) -> Self {
        self.failure = Some(cause.to_string());
        self
    }
}

impl ModuleSource for MemorySource {
    fn candidates(&self) -> io::Result<Vec<PathBuf>> {
        if let Some(cause) = &self.failure {
            return Err(io::Error::other(cause.clone()));
        }
        Ok(self.candidates.iter().map(|(p, _)| p.clone()).collect())
    }

    fn identity_of(&self, path: &Path) -> Option<ModuleIdentity> {
        self.candidates
            .iter()
            .find(|(p, _)| p == path)
            .and_then(|(_, id)| id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDeps;

    impl DependencyResolver for NoDeps {
        fn resolve_dependency(
            &self,
            identity: &ModuleIdentity,
        ) -> Result<Arc<LoadedModule>, ResolveError> {
            Err(ResolveError::UnresolvedDependency {
                identity: identity.clone(),
            })
        }
    }

    #[test]
    fn test_memory_loader_counts_attempts() {
        let loader = MemoryLoader::new().with_module("/m/core", MemoryModule::new("Core"));
        let counts = loader.load_counts();

        loader.load(&"Core".into(), Path::new("/m/core"), &NoDeps).unwrap();
        loader.load(&"Core".into(), Path::new("/m/core"), &NoDeps).unwrap();

        assert_eq!(counts.count("Core"), 2);
        assert_eq!(counts.count("Other"), 0);
    }

    #[test]
    fn test_memory_loader_unknown_path_fails() {
        let loader = MemoryLoader::new();
        let err = loader
            .load(&"Core".into(), Path::new("/m/none"), &NoDeps)
            .unwrap_err();
        assert!(matches!(err, ResolveError::LoadFailure { .. }));
    }

    #[test]
    fn test_memory_source_failure() {
        let source = MemorySource::new().failing("disk gone");
        assert_eq!(source.candidates().unwrap_err().to_string(), "disk gone");
    }

    #[test]
    fn test_memory_source_malformed_candidate_has_no_identity() {
        let source = MemorySource::new()
            .with_candidate("/m/core", "Core")
            .with_malformed("/m/junk");

        assert_eq!(source.candidates().unwrap().len(), 2);
        assert_eq!(
            source.identity_of(Path::new("/m/core")),
            Some(ModuleIdentity::from("Core"))
        );
        assert!(source.identity_of(Path::new("/m/junk")).is_none());
    }
}
