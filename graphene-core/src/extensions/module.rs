//! LoadedModule handle and the loader seam

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use graphene_extension_api::{ExportedType, Module, ModuleManifest};
use libloading::Library;

use super::index::ModuleIdentity;
use crate::error::ResolveError;

/// A module resident in the host process.
///
/// Created once per identity by the [`ResolutionCache`](super::ResolutionCache)
/// and shared by `Arc`. There is no unload: the handle, its module instance
/// and the underlying library stay alive until the last reference is gone,
/// which in practice is process exit.
pub struct LoadedModule {
    identity: ModuleIdentity,
    path: PathBuf,
    manifest: ModuleManifest,
    exports: Vec<ExportedType>,
    /// Modules this one resolved while loading; kept alive alongside it
    dependencies: Vec<Arc<LoadedModule>>,
    // Field order matters: the instance must drop before its library.
    instance: Option<Box<dyn Module>>,
    _library: Option<Library>,
}

impl LoadedModule {
    /// A module with no backing library, e.g. one linked into the host
    pub fn new(
        identity: ModuleIdentity,
        path: impl Into<PathBuf>,
        manifest: ModuleManifest,
        exports: Vec<ExportedType>,
    ) -> Self {
        Self {
            identity,
            path: path.into(),
            manifest,
            exports,
            dependencies: Vec::new(),
            instance: None,
            _library: None,
        }
    }

    pub(crate) fn native(
        identity: ModuleIdentity,
        path: &Path,
        instance: Box<dyn Module>,
        library: Library,
    ) -> Self {
        let manifest = instance.manifest();
        let exports = instance.exported_types();
        Self {
            identity,
            path: path.to_path_buf(),
            manifest,
            exports,
            dependencies: Vec::new(),
            instance: Some(instance),
            _library: Some(library),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Arc<LoadedModule>>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    /// Exported types, in the module's declaration order
    pub fn exports(&self) -> &[ExportedType] {
        &self.exports
    }

    pub fn dependencies(&self) -> &[Arc<LoadedModule>] {
        &self.dependencies
    }

    /// The live module instance, for natively loaded modules
    pub fn instance(&self) -> Option<&dyn Module> {
        self.instance.as_deref()
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("identity", &self.identity)
            .field("path", &self.path)
            .field("version", &self.manifest.version)
            .field("exports", &self.exports.len())
            .field(
                "dependencies",
                &self
                    .dependencies
                    .iter()
                    .map(|d| d.identity.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("native", &self._library.is_some())
            .finish()
    }
}

/// Resolves dependency references raised while a module is loading
pub trait DependencyResolver {
    fn resolve_dependency(&self, identity: &ModuleIdentity)
    -> Result<Arc<LoadedModule>, ResolveError>;
}

/// Turns a module path into a [`LoadedModule`].
///
/// Implementations resolve the module's dependencies through `resolver`,
/// which re-enters the resolution cache.
pub trait ModuleLoader: Send + Sync {
    fn load(
        &self,
        identity: &ModuleIdentity,
        path: &Path,
        resolver: &dyn DependencyResolver,
    ) -> Result<LoadedModule, ResolveError>;
}

/// Resolve every dependency named in `manifest`, in order.
///
/// The first failure aborts and is wrapped as
/// [`ResolveError::DependencyFailed`] for `identity`.
pub fn resolve_dependencies(
    identity: &ModuleIdentity,
    manifest: &ModuleManifest,
    resolver: &dyn DependencyResolver,
) -> Result<Vec<Arc<LoadedModule>>, ResolveError> {
    manifest
        .dependencies
        .iter()
        .map(|name| {
            let dependency = ModuleIdentity::from(name.as_str());
            resolver
                .resolve_dependency(&dependency)
                .map_err(|source| ResolveError::DependencyFailed {
                    identity: identity.clone(),
                    dependency,
                    source: Box::new(source),
                })
        })
        .collect()
}
