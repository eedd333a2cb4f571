//! Native module loader for .so/.dylib/.dll files

use std::path::Path;
use std::sync::Arc;

use graphene_extension_api::{API_VERSION, API_VERSION_SYMBOL, CREATE_SYMBOL, Module};
use libloading::{Library, Symbol};

use super::index::ModuleIdentity;
use super::module::{DependencyResolver, LoadedModule, ModuleLoader, resolve_dependencies};
use crate::error::ResolveError;
use crate::logging::LogSink;

/// Loads modules built with `graphene_extension_api::export_module!`.
///
/// The library is opened once, its API version checked, the module instance
/// created, its dependencies resolved through the cache, and finally the
/// instance initialized. Both the instance and the library then live inside
/// the returned [`LoadedModule`].
pub struct NativeLoader {
    log: Arc<dyn LogSink>,
}

impl NativeLoader {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self { log }
    }
}

impl ModuleLoader for NativeLoader {
    fn load(
        &self,
        identity: &ModuleIdentity,
        path: &Path,
        resolver: &dyn DependencyResolver,
    ) -> Result<LoadedModule, ResolveError> {
        // SAFETY: the path was discovered in the configured extensions
        // directory; modules there are trusted to follow the Module contract.
        let library =
            unsafe { Library::new(path) }.map_err(|e| ResolveError::load_failure(path, e))?;

        let found = {
            // SAFETY: the symbol is generated by export_module! with this signature.
            let version_fn: Symbol<extern "C" fn() -> u32> = unsafe {
                library.get(API_VERSION_SYMBOL)
            }
            .map_err(|e| ResolveError::load_failure(path, e))?;
            version_fn()
        };
        check_api_version(path, found)?;

        let mut instance: Box<dyn Module> = {
            // SAFETY: the symbol is generated by export_module! with this signature.
            let create_fn: Symbol<extern "C" fn() -> *mut dyn Module> =
                unsafe { library.get(CREATE_SYMBOL) }
                    .map_err(|e| ResolveError::load_failure(path, e))?;
            // SAFETY: export_module! returns a pointer from Box::into_raw,
            // and this is the only place it is taken back.
            unsafe { take_instance(path, create_fn())? }
        };

        let dependencies = prepare_instance(identity, path, instance.as_mut(), resolver)?;

        self.log.log(format!(
            "Loaded module {} {} from {}",
            identity,
            instance.manifest().version,
            path.display()
        ));

        Ok(LoadedModule::native(identity.clone(), path, instance, library)
            .with_dependencies(dependencies))
    }
}

fn check_api_version(path: &Path, found: u32) -> Result<(), ResolveError> {
    if found != API_VERSION {
        return Err(ResolveError::ApiVersionMismatch {
            path: path.to_path_buf(),
            expected: API_VERSION,
            found,
        });
    }
    Ok(())
}

/// Take ownership of the instance returned by a module constructor.
///
/// # Safety
///
/// `raw` must be null or come from `Box::into_raw`, and must not be used
/// again by the caller.
unsafe fn take_instance(
    path: &Path,
    raw: *mut dyn Module,
) -> Result<Box<dyn Module>, ResolveError> {
    if raw.is_null() {
        return Err(ResolveError::load_failure(
            path,
            "module constructor returned null",
        ));
    }
    Ok(unsafe { Box::from_raw(raw) })
}

/// Check the instance's identity, resolve its dependencies, then initialize it
fn prepare_instance(
    identity: &ModuleIdentity,
    path: &Path,
    instance: &mut dyn Module,
    resolver: &dyn DependencyResolver,
) -> Result<Vec<Arc<LoadedModule>>, ResolveError> {
    let manifest = instance.manifest();
    if manifest.name != identity.as_str() {
        return Err(ResolveError::load_failure(
            path,
            format!(
                "module declares identity {} but was registered as {}",
                manifest.name, identity
            ),
        ));
    }

    let dependencies = resolve_dependencies(identity, &manifest, resolver)?;

    instance
        .initialize()
        .map_err(|e| ResolveError::load_failure(path, e))?;

    Ok(dependencies)
}
