//! End-to-end lifecycle scenarios over the in-memory collaborators

use std::sync::{Arc, Mutex};

use graphene_core::extensions::memory::{LoadCounts, MemoryLoader, MemoryModule, MemorySource};
use graphene_core::extensions::{
    Capability, ExtensionParser, ExtensionRegistry, ExtensionType, NameIndex, ResolutionCache,
};
use graphene_core::logging::MemorySink;
use graphene_core::{
    HandlerError, LifecycleController, LifecycleError, LifecycleState, LogSink, ResolveError,
    Severity,
};
use graphene_extension_api::{EXTENSION_CAPABILITY, ExportedType};

type Journal = Arc<Mutex<Vec<String>>>;

/// Parser that records every call, optionally failing its first `load`
struct RecordingParser {
    journal: Journal,
    fail_first_load: bool,
}

impl ExtensionParser for RecordingParser {
    fn name(&self) -> &str {
        "recording"
    }

    fn accepts(&self, _extension: &ExtensionType) -> bool {
        true
    }

    fn load(&mut self, extension: &ExtensionType) -> Result<(), HandlerError> {
        if std::mem::take(&mut self.fail_first_load) {
            return Err(format!("cannot load {}", extension.name).into());
        }
        self.journal.lock().unwrap().push(format!("load {}", extension.name));
        Ok(())
    }

    fn unload(&mut self, extension: &ExtensionType) -> Result<(), HandlerError> {
        self.journal.lock().unwrap().push(format!("unload {}", extension.name));
        Ok(())
    }

    fn reload(&mut self, extension: &ExtensionType) -> Result<(), HandlerError> {
        self.journal.lock().unwrap().push(format!("reload {}", extension.name));
        Ok(())
    }
}

struct Harness {
    controller: LifecycleController,
    sink: Arc<MemorySink>,
    counts: LoadCounts,
    events: Journal,
    parser_calls: Journal,
}

fn extension(name: &str) -> ExportedType {
    ExportedType::new(name).with_capability(EXTENSION_CAPABILITY)
}

fn harness(source: MemorySource, loader: MemoryLoader, fail_first_load: bool) -> Harness {
    let sink = Arc::new(MemorySink::new());
    let log: Arc<dyn LogSink> = sink.clone();
    let counts = loader.load_counts();

    let cache = Arc::new(ResolutionCache::new(
        Arc::new(NameIndex::new()),
        Box::new(loader),
        log.clone(),
    ));
    let parser_calls = Journal::default();
    let mut registry = ExtensionRegistry::new(Box::new(Capability::default()), log.clone());
    registry.add_parser(Box::new(RecordingParser {
        journal: parser_calls.clone(),
        fail_first_load,
    }));

    let mut controller = LifecycleController::new(Box::new(source), cache, registry, log);

    let events = Journal::default();
    let lifecycle = controller.events_mut();
    for dispatcher in [
        &mut lifecycle.loading,
        &mut lifecycle.loaded,
        &mut lifecycle.unloading,
        &mut lifecycle.unloaded,
        &mut lifecycle.reloading,
        &mut lifecycle.reloaded,
    ] {
        let events = events.clone();
        let name = dispatcher.event();
        dispatcher.subscribe(move |_: &()| {
            events.lock().unwrap().push(name.to_string());
            Ok(())
        });
    }
    for dispatcher in [
        &mut lifecycle.loading_error,
        &mut lifecycle.unloading_error,
        &mut lifecycle.reloading_error,
    ] {
        let events = events.clone();
        let name = dispatcher.event();
        dispatcher.subscribe(move |_: &LifecycleError| {
            events.lock().unwrap().push(name.to_string());
            Ok(())
        });
    }

    Harness {
        controller,
        sink,
        counts,
        events,
        parser_calls,
    }
}

fn taken(journal: &Journal) -> Vec<String> {
    std::mem::take(&mut *journal.lock().unwrap())
}

#[test]
fn test_nested_dependency_resolves_once() {
    // Plugin is discovered first and pulls Core in as a dependency.
    let source = MemorySource::new()
        .with_candidate("/ext/libplugin.so", "Plugin")
        .with_candidate("/ext/libcore.so", "Core");
    let loader = MemoryLoader::new()
        .with_module(
            "/ext/libplugin.so",
            MemoryModule::new("Plugin")
                .depends_on("Core")
                .exporting(extension("plugin::Weapon")),
        )
        .with_module(
            "/ext/libcore.so",
            MemoryModule::new("Core").exporting(extension("core::Hud")),
        );
    let mut h = harness(source, loader, false);

    h.controller.load().unwrap();

    assert_eq!(h.controller.state(), LifecycleState::Loaded);
    assert_eq!(h.counts.count("Core"), 1);
    assert_eq!(h.counts.count("Plugin"), 1);

    let cache = h.controller.cache();
    let order: Vec<_> = cache
        .loaded()
        .iter()
        .map(|m| m.identity().to_string())
        .collect();
    assert_eq!(order, vec!["Core", "Plugin"]);

    let plugin = cache.get("Plugin").unwrap();
    let core = cache.get("Core").unwrap();
    assert!(Arc::ptr_eq(&plugin.dependencies()[0], &core));

    let mut loaded = taken(&h.parser_calls);
    loaded.sort();
    assert_eq!(loaded, vec!["load core::Hud", "load plugin::Weapon"]);
}

#[test]
fn test_one_failing_module_among_three() {
    let source = MemorySource::new()
        .with_candidate("/ext/liba.so", "A")
        .with_candidate("/ext/libb.so", "B")
        .with_candidate("/ext/libc.so", "C");
    let loader = MemoryLoader::new()
        .with_module("/ext/liba.so", MemoryModule::new("A").exporting(extension("a::Ext")))
        .with_module("/ext/libb.so", MemoryModule::new("B").failing("bad ELF header"))
        .with_module("/ext/libc.so", MemoryModule::new("C").exporting(extension("c::Ext")));
    let mut h = harness(source, loader, false);

    let err = h.controller.load().unwrap_err();

    match err {
        LifecycleError::ModulesFailed(failures) => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures[0], ResolveError::LoadFailure { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    let cache = h.controller.cache();
    assert_eq!(cache.len(), 2);
    assert!(cache.contains("A"));
    assert!(cache.contains("C"));
    assert!(!cache.contains("B"));

    // A and C were still scanned for extensions before the rollback.
    let discovered: Vec<String> = h
        .sink
        .with_severity(Severity::Important)
        .into_iter()
        .map(|r| r.message)
        .filter(|m| m.starts_with("Loaded extension:"))
        .collect();
    assert_eq!(
        discovered,
        vec!["Loaded extension: A", "Loaded extension: C"]
    );

    assert_eq!(
        taken(&h.events),
        vec!["Loading", "LoadingError", "Unloading", "Unloaded"]
    );
    assert_eq!(h.controller.state(), LifecycleState::Unloaded);
}

#[test]
fn test_reload_fires_reloading_then_reloaded() {
    let source = MemorySource::new().with_candidate("/ext/libcore.so", "Core");
    let loader = MemoryLoader::new().with_module(
        "/ext/libcore.so",
        MemoryModule::new("Core").exporting(extension("core::Hud")),
    );
    let mut h = harness(source, loader, false);
    h.controller.load().unwrap();
    taken(&h.events);
    taken(&h.parser_calls);

    h.controller.reload().unwrap();

    assert_eq!(taken(&h.events), vec!["Reloading", "Reloaded"]);
    assert_eq!(taken(&h.parser_calls), vec!["reload core::Hud"]);
    assert_eq!(h.controller.state(), LifecycleState::Loaded);
    assert_eq!(h.counts.count("Core"), 1);
}

#[test]
fn test_unload_keeps_modules_resident() {
    let source = MemorySource::new().with_candidate("/ext/libcore.so", "Core");
    let loader = MemoryLoader::new().with_module(
        "/ext/libcore.so",
        MemoryModule::new("Core").exporting(extension("core::Hud")),
    );
    let mut h = harness(source, loader, false);
    h.controller.load().unwrap();
    taken(&h.parser_calls);

    h.controller.unload().unwrap();

    assert_eq!(taken(&h.parser_calls), vec!["unload core::Hud"]);
    assert_eq!(h.controller.registry().module_count(), 0);
    assert!(h.controller.cache().contains("Core"));

    // A second load reuses the cached module.
    h.controller.load().unwrap();
    assert_eq!(h.counts.count("Core"), 1);
    assert_eq!(taken(&h.parser_calls), vec!["load core::Hud"]);
}

#[test]
fn test_retry_after_failed_load() {
    let source = MemorySource::new().with_candidate("/ext/libcore.so", "Core");
    let loader = MemoryLoader::new().with_module(
        "/ext/libcore.so",
        MemoryModule::new("Core").exporting(extension("core::Hud")),
    );
    let mut h = harness(source, loader, true);

    let err = h.controller.load().unwrap_err();
    assert!(matches!(err, LifecycleError::ExtensionsFailed(ref f) if f.len() == 1));
    assert_eq!(h.controller.state(), LifecycleState::Unloaded);

    h.controller.load().unwrap();

    assert_eq!(h.controller.state(), LifecycleState::Loaded);
    assert_eq!(h.controller.registry().active_count(), 1);
    assert_eq!(h.counts.count("Core"), 1);
}

#[test]
fn test_zero_subscribers_and_many_subscribers() {
    let source = MemorySource::new().with_candidate("/ext/libcore.so", "Core");
    let loader = MemoryLoader::new().with_module("/ext/libcore.so", MemoryModule::new("Core"));
    let log: Arc<dyn LogSink> = Arc::new(MemorySink::new());
    let cache = Arc::new(ResolutionCache::new(
        Arc::new(NameIndex::new()),
        Box::new(loader),
        log.clone(),
    ));
    let registry = ExtensionRegistry::new(Box::new(Capability::default()), log.clone());
    let mut controller = LifecycleController::new(Box::new(source), cache, registry, log);

    // No subscribers anywhere: transitions still complete.
    controller.load().unwrap();
    controller.unload().unwrap();

    let hits = Arc::new(Mutex::new(0usize));
    for _ in 0..5 {
        let hits = hits.clone();
        controller.events_mut().loaded.subscribe(move |_: &()| {
            *hits.lock().unwrap() += 1;
            Ok(())
        });
    }
    controller
        .events_mut()
        .loaded
        .subscribe_named("panicky", |_: &()| panic!("subscriber bug"));

    controller.load().unwrap();

    assert_eq!(*hits.lock().unwrap(), 5);
    assert_eq!(controller.state(), LifecycleState::Loaded);
}
