//! LifecycleController - the load/unload/reload state machine
//!
//! ```text
//! Unloaded ──load()──▶ Loading ──ok──▶ Loaded
//!     ▲                   │              │ │
//!     │                 error            │ └─reload()─▶ Reloading ─▶ Loaded
//!     │                   ▼              │
//!     └──────────────── Unloading ◀──unload()
//! ```
//!
//! Every transition fires its events through a [`SafeDispatcher`], so a
//! failing subscriber never blocks the transition or the other subscribers.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::HostConfig;
use crate::dispatch::SafeDispatcher;
use crate::error::LifecycleError;
use crate::extensions::{
    Capability, DirectorySource, ExtensionRegistry, ModuleSource, NameIndex, NativeLoader,
    ResolutionCache,
};
use crate::logging::{LogSink, TracingSink};

/// State of the extension system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
    Reloading,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The lifecycle event surface; each event is subscribed independently
pub struct LifecycleEvents {
    pub loading: SafeDispatcher<()>,
    pub loaded: SafeDispatcher<()>,
    pub loading_error: SafeDispatcher<LifecycleError>,
    pub unloading: SafeDispatcher<()>,
    pub unloaded: SafeDispatcher<()>,
    pub unloading_error: SafeDispatcher<LifecycleError>,
    pub reloading: SafeDispatcher<()>,
    pub reloaded: SafeDispatcher<()>,
    pub reloading_error: SafeDispatcher<LifecycleError>,
}

impl LifecycleEvents {
    pub fn new(log: &Arc<dyn LogSink>) -> Self {
        Self {
            loading: SafeDispatcher::new("Loading", log.clone()),
            loaded: SafeDispatcher::new("Loaded", log.clone()),
            loading_error: SafeDispatcher::new("LoadingError", log.clone()),
            unloading: SafeDispatcher::new("Unloading", log.clone()),
            unloaded: SafeDispatcher::new("Unloaded", log.clone()),
            unloading_error: SafeDispatcher::new("UnloadingError", log.clone()),
            reloading: SafeDispatcher::new("Reloading", log.clone()),
            reloaded: SafeDispatcher::new("Reloaded", log.clone()),
            reloading_error: SafeDispatcher::new("ReloadingError", log.clone()),
        }
    }
}

/// Drives discovery → resolution → registration → dispatch.
///
/// `load`, `unload` and `reload` take `&mut self`, so transitions cannot
/// interleave. Calls from the wrong state are rejected with
/// [`LifecycleError::InvalidState`]; that includes `reload` while already
/// reloading and `unload` while loading.
pub struct LifecycleController {
    state: LifecycleState,
    source: Box<dyn ModuleSource>,
    cache: Arc<ResolutionCache>,
    registry: ExtensionRegistry,
    events: LifecycleEvents,
    log: Arc<dyn LogSink>,
}

impl LifecycleController {
    pub fn new(
        source: Box<dyn ModuleSource>,
        cache: Arc<ResolutionCache>,
        registry: ExtensionRegistry,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let events = LifecycleEvents::new(&log);
        Self {
            state: LifecycleState::Unloaded,
            source,
            cache,
            registry,
            events,
            log,
        }
    }

    /// Wire up the native loader, directory discovery and tracing output
    /// described by `config`.
    pub fn from_config(config: &HostConfig) -> Self {
        let log: Arc<dyn LogSink> = Arc::new(TracingSink);
        let index = Arc::new(NameIndex::new());
        let cache = Arc::new(ResolutionCache::new(
            index,
            Box::new(NativeLoader::new(log.clone())),
            log.clone(),
        ));
        let registry =
            ExtensionRegistry::new(Box::new(Capability::new(&config.capability)), log.clone());
        let source = Box::new(DirectorySource::new(&config.extensions_dir));
        Self::new(source, cache, registry, log)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn events(&self) -> &LifecycleEvents {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut LifecycleEvents {
        &mut self.events
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn index(&self) -> &Arc<NameIndex> {
        self.cache.index()
    }

    fn expect_state(&self, expected: LifecycleState) -> Result<(), LifecycleError> {
        if self.state != expected {
            return Err(LifecycleError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Discover, resolve and register every module, then load extensions.
    ///
    /// On failure `LoadingError` fires and the system unloads back to
    /// `Unloaded`. Modules already resolved stay in the cache, so a retry
    /// does not load them again.
    pub fn load(&mut self) -> Result<(), LifecycleError> {
        self.expect_state(LifecycleState::Unloaded)?;

        self.state = LifecycleState::Loading;
        self.events.loading.dispatch(&());

        match self.run_load() {
            Ok(()) => {
                self.state = LifecycleState::Loaded;
                self.log.important(format!(
                    "Loaded {} module(s) with {} extension(s)",
                    self.registry.module_count(),
                    self.registry.extensions().count()
                ));
                self.events.loaded.dispatch(&());
                Ok(())
            }
            Err(e) => {
                self.log.error_with("Failed to load extensions", &e, true);
                self.events.loading_error.dispatch(&e);
                // The rollback's own failure is already reported through
                // UnloadingError; the load error is what the caller needs.
                let _ = self.unload_inner();
                Err(e)
            }
        }
    }

    fn run_load(&mut self) -> Result<(), LifecycleError> {
        let index = Arc::clone(self.cache.index());

        for path in self.source.candidates().map_err(LifecycleError::Discovery)? {
            let Some(identity) = self.source.identity_of(&path) else {
                tracing::debug!(path = %path.display(), "Skipping candidate without identity");
                continue;
            };
            if !index.register(identity.clone(), &path) {
                tracing::debug!(
                    module = %identity,
                    path = %path.display(),
                    "Identity already registered, ignoring duplicate"
                );
            }
        }

        let report = self.cache.resolve_all_known();
        tracing::debug!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Resolution pass finished"
        );

        // Includes modules resolved by an earlier, failed load.
        for module in self.cache.loaded() {
            if self.registry.is_registered(module.identity().as_str()) {
                continue;
            }
            let extensions = self.registry.discover(&module);
            self.registry.register_loaded(&module, extensions);
        }

        if !report.failed.is_empty() {
            return Err(LifecycleError::ModulesFailed(
                report.failed.into_iter().map(|(_, e)| e).collect(),
            ));
        }

        let failures = self.registry.load_extensions();
        if !failures.is_empty() {
            return Err(LifecycleError::ExtensionsFailed(failures));
        }

        Ok(())
    }

    /// Signal unload to every extension. Module code stays resident.
    ///
    /// Always ends in `Unloaded`; parser failures fire `UnloadingError`
    /// instead of `Unloaded` and are returned.
    pub fn unload(&mut self) -> Result<(), LifecycleError> {
        self.expect_state(LifecycleState::Loaded)?;
        self.unload_inner()
    }

    fn unload_inner(&mut self) -> Result<(), LifecycleError> {
        self.state = LifecycleState::Unloading;
        self.events.unloading.dispatch(&());

        let failures = self.registry.unload_extensions();
        self.registry.clear();
        self.state = LifecycleState::Unloaded;

        if failures.is_empty() {
            self.log.important("Unloaded extensions");
            self.events.unloaded.dispatch(&());
            Ok(())
        } else {
            let e = LifecycleError::ExtensionsFailed(failures);
            self.log.error_with("Failed to unload extensions", &e, true);
            self.events.unloading_error.dispatch(&e);
            Err(e)
        }
    }

    /// Re-drive every active extension through its parser.
    ///
    /// Fires only `Reloading` and then `Reloaded` or `ReloadingError`; no
    /// discovery or resolution runs.
    pub fn reload(&mut self) -> Result<(), LifecycleError> {
        self.expect_state(LifecycleState::Loaded)?;

        self.state = LifecycleState::Reloading;
        self.events.reloading.dispatch(&());

        let failures = self.registry.reload_extensions();
        self.state = LifecycleState::Loaded;

        if failures.is_empty() {
            self.log.important("Reloaded extensions");
            self.events.reloaded.dispatch(&());
            Ok(())
        } else {
            let e = LifecycleError::ExtensionsFailed(failures);
            self.log.error_with("Failed to reload extensions", &e, true);
            self.events.reloading_error.dispatch(&e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::memory::{MemoryLoader, MemoryModule, MemorySource};
    use crate::logging::MemorySink;
    use graphene_extension_api::{EXTENSION_CAPABILITY, ExportedType};
    use std::sync::Mutex;

    fn controller(source: MemorySource, loader: MemoryLoader) -> LifecycleController {
        let log: Arc<dyn LogSink> = Arc::new(MemorySink::new());
        let cache = Arc::new(ResolutionCache::new(
            Arc::new(NameIndex::new()),
            Box::new(loader),
            log.clone(),
        ));
        let registry = ExtensionRegistry::new(Box::new(Capability::default()), log.clone());
        LifecycleController::new(Box::new(source), cache, registry, log)
    }

    /// Subscribe a recorder to every lifecycle event
    fn record_events(c: &mut LifecycleController) -> Arc<Mutex<Vec<&'static str>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let events = c.events_mut();
        for d in [
            &mut events.loading,
            &mut events.loaded,
            &mut events.unloading,
            &mut events.unloaded,
            &mut events.reloading,
            &mut events.reloaded,
        ] {
            let seen = seen.clone();
            let name = d.event();
            d.subscribe(move |_: &()| {
                seen.lock().unwrap().push(name);
                Ok(())
            });
        }
        for d in [
            &mut events.loading_error,
            &mut events.unloading_error,
            &mut events.reloading_error,
        ] {
            let seen = seen.clone();
            let name = d.event();
            d.subscribe(move |_: &LifecycleError| {
                seen.lock().unwrap().push(name);
                Ok(())
            });
        }
        seen
    }

    fn single_module() -> (MemorySource, MemoryLoader) {
        (
            MemorySource::new().with_candidate("/ext/core.so", "Core"),
            MemoryLoader::new().with_module(
                "/ext/core.so",
                MemoryModule::new("Core")
                    .exporting(ExportedType::new("core::Hud").with_capability(EXTENSION_CAPABILITY)),
            ),
        )
    }

    #[test]
    fn test_new_controller_is_unloaded() {
        let (source, loader) = single_module();
        let c = controller(source, loader);
        assert_eq!(c.state(), LifecycleState::Unloaded);
    }

    #[test]
    fn test_load_then_unload() {
        let (source, loader) = single_module();
        let mut c = controller(source, loader);
        let seen = record_events(&mut c);

        c.load().unwrap();
        assert_eq!(c.state(), LifecycleState::Loaded);
        assert_eq!(c.registry().extensions().count(), 1);

        c.unload().unwrap();
        assert_eq!(c.state(), LifecycleState::Unloaded);
        assert_eq!(c.registry().module_count(), 0);
        assert_eq!(c.cache().len(), 1);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Loading", "Loaded", "Unloading", "Unloaded"]
        );
    }

    #[test]
    fn test_reload_fires_only_reload_events() {
        let (source, loader) = single_module();
        let mut c = controller(source, loader);
        c.load().unwrap();
        let seen = record_events(&mut c);

        c.reload().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["Reloading", "Reloaded"]);
        assert_eq!(c.state(), LifecycleState::Loaded);
    }

    #[test]
    fn test_wrong_state_transitions_are_rejected() {
        let (source, loader) = single_module();
        let mut c = controller(source, loader);

        assert!(matches!(
            c.unload(),
            Err(LifecycleError::InvalidState {
                expected: LifecycleState::Loaded,
                actual: LifecycleState::Unloaded,
            })
        ));
        assert!(matches!(
            c.reload(),
            Err(LifecycleError::InvalidState { .. })
        ));

        c.load().unwrap();
        assert!(matches!(
            c.load(),
            Err(LifecycleError::InvalidState {
                expected: LifecycleState::Unloaded,
                actual: LifecycleState::Loaded,
            })
        ));
    }

    #[test]
    fn test_discovery_failure_rolls_back() {
        let mut c = controller(MemorySource::new().failing("disk gone"), MemoryLoader::new());
        let seen = record_events(&mut c);

        let err = c.load().unwrap_err();

        assert!(matches!(err, LifecycleError::Discovery(_)));
        assert_eq!(c.state(), LifecycleState::Unloaded);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Loading", "LoadingError", "Unloading", "Unloaded"]
        );
    }

    #[test]
    fn test_malformed_and_duplicate_candidates_are_skipped() {
        let source = MemorySource::new()
            .with_candidate("/ext/a/core.so", "Core")
            .with_candidate("/ext/b/core.so", "Core")
            .with_malformed("/ext/junk.so");
        let loader = MemoryLoader::new()
            .with_module("/ext/a/core.so", MemoryModule::new("Core"))
            .with_module("/ext/b/core.so", MemoryModule::new("Core").failing("wrong copy"));
        let mut c = controller(source, loader);

        c.load().unwrap();

        assert_eq!(c.index().len(), 1);
        assert_eq!(
            c.index().lookup("Core").unwrap(),
            std::path::PathBuf::from("/ext/a/core.so")
        );
    }

    #[test]
    fn test_failing_subscriber_does_not_block_transition() {
        let (source, loader) = single_module();
        let mut c = controller(source, loader);
        c.events_mut()
            .loading
            .subscribe_named("broken", |_: &()| Err("subscriber bug".into()));
        let seen = record_events(&mut c);

        c.load().unwrap();

        assert_eq!(c.state(), LifecycleState::Loaded);
        assert_eq!(*seen.lock().unwrap(), vec!["Loading", "Loaded"]);
    }
}
