//! ResolutionCache - module identity to loaded module, single-flight

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use super::index::{ModuleIdentity, NameIndex};
use super::module::{DependencyResolver, LoadedModule, ModuleLoader};
use crate::dispatch::panic_message;
use crate::error::ResolveError;
use crate::logging::LogSink;

enum Slot {
    /// A load is in flight on the given thread
    Loading(ThreadId),
    Ready(Arc<LoadedModule>),
}

#[derive(Default)]
struct Slots {
    slots: HashMap<ModuleIdentity, Slot>,
    /// Identities in the order their loads completed
    order: Vec<ModuleIdentity>,
    /// Identity each blocked thread is waiting for
    waiting: HashMap<ThreadId, ModuleIdentity>,
    /// Number of `resolve_all_known` passes in progress
    passes: usize,
    /// Causes of loads that failed during the current passes
    failed: HashMap<ModuleIdentity, String>,
}

impl Slots {
    /// Whether waiting on `owner` would close a wait-for cycle back to `me`
    fn waits_on(&self, me: ThreadId, mut owner: ThreadId) -> bool {
        for _ in 0..=self.waiting.len() {
            if owner == me {
                return true;
            }
            match self
                .waiting
                .get(&owner)
                .and_then(|identity| self.slots.get(identity))
            {
                Some(Slot::Loading(next)) => owner = *next,
                _ => return false,
            }
        }
        false
    }
}

/// Outcome of [`ResolutionCache::resolve_all_known`]
#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Modules that were not cached when the pass started, in resolution order
    pub loaded: Vec<Arc<LoadedModule>>,
    /// Identities that failed, with the reason
    pub failed: Vec<(ModuleIdentity, ResolveError)>,
}

/// Maps module identities to their loaded handles.
///
/// At most one [`LoadedModule`] is ever created per identity. The slot table
/// is locked only to check and to publish results, never across a load, so a
/// loader may resolve other modules reentrantly. A concurrent caller asking
/// for an identity that is mid-load on another thread waits for that load and
/// reuses its result.
pub struct ResolutionCache {
    index: Arc<NameIndex>,
    loader: Box<dyn ModuleLoader>,
    log: Arc<dyn LogSink>,
    slots: Mutex<Slots>,
    settled: Condvar,
}

impl ResolutionCache {
    pub fn new(index: Arc<NameIndex>, loader: Box<dyn ModuleLoader>, log: Arc<dyn LogSink>) -> Self {
        Self {
            index,
            loader,
            log,
            slots: Mutex::new(Slots::default()),
            settled: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve `identity` to its loaded module, loading it on first use.
    pub fn resolve(&self, identity: &ModuleIdentity) -> Result<Arc<LoadedModule>, ResolveError> {
        let me = thread::current().id();

        let path = {
            let mut table = self.lock();
            loop {
                if let Some(cause) = table.failed.get(identity) {
                    return Err(ResolveError::AlreadyFailed {
                        identity: identity.clone(),
                        cause: cause.clone(),
                    });
                }
                let owner = match table.slots.get(identity) {
                    Some(Slot::Ready(module)) => return Ok(Arc::clone(module)),
                    Some(Slot::Loading(owner)) => *owner,
                    None => break,
                };
                // Covers a thread re-entering its own load as well as a cycle
                // split across threads.
                if table.waits_on(me, owner) {
                    return Err(ResolveError::CyclicDependency {
                        identity: identity.clone(),
                    });
                }
                table.waiting.insert(me, identity.clone());
                table = self
                    .settled
                    .wait(table)
                    .unwrap_or_else(PoisonError::into_inner);
                table.waiting.remove(&me);
            }

            let Some(path) = self.index.lookup(identity.as_str()) else {
                return Err(ResolveError::UnresolvedDependency {
                    identity: identity.clone(),
                });
            };
            table.slots.insert(identity.clone(), Slot::Loading(me));
            path
        };

        tracing::debug!(module = %identity, path = %path.display(), "Loading module");

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.loader.load(identity, &path, self)
        }))
        .unwrap_or_else(|panic| {
            Err(ResolveError::load_failure(
                &path,
                format!("module loader panicked: {}", panic_message(panic.as_ref())),
            ))
        });

        let result = {
            let mut table = self.lock();
            match outcome {
                Ok(module) => {
                    let module = Arc::new(module);
                    table
                        .slots
                        .insert(identity.clone(), Slot::Ready(Arc::clone(&module)));
                    table.order.push(identity.clone());
                    Ok(module)
                }
                Err(e) => {
                    // Failed loads are not cached; a later pass may retry.
                    table.slots.remove(identity);
                    if table.passes > 0 {
                        table.failed.insert(identity.clone(), e.to_string());
                    }
                    Err(e)
                }
            }
        };
        self.settled.notify_all();
        result
    }

    /// Resolve every identity in the name index that is not cached yet.
    ///
    /// One module failing does not stop the others. Modules pulled in as
    /// dependencies of an earlier entry are reported as loaded too. Each
    /// identity gets at most one load attempt per pass: once it has failed,
    /// later requests in the same pass get [`ResolveError::AlreadyFailed`].
    pub fn resolve_all_known(&self) -> ResolveReport {
        let cached: HashSet<ModuleIdentity> = {
            let mut table = self.lock();
            table.passes += 1;
            table.order.iter().cloned().collect()
        };
        let mut report = ResolveReport::default();

        for identity in self.index.identities() {
            if cached.contains(&identity) {
                continue;
            }
            match self.resolve(&identity) {
                Ok(module) => report.loaded.push(module),
                Err(e) => {
                    self.log
                        .error_with(format!("Failed to load module {identity}"), &e, true);
                    report.failed.push((identity, e));
                }
            }
        }

        let mut table = self.lock();
        table.passes -= 1;
        if table.passes == 0 {
            table.failed.clear();
        }
        drop(table);

        report
    }

    /// The cached module for `identity`, without loading it
    pub fn get(&self, identity: &str) -> Option<Arc<LoadedModule>> {
        match self.lock().slots.get(identity) {
            Some(Slot::Ready(module)) => Some(Arc::clone(module)),
            _ => None,
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.get(identity).is_some()
    }

    /// Every cached module, in the order its load completed
    pub fn loaded(&self) -> Vec<Arc<LoadedModule>> {
        let table = self.lock();
        table
            .order
            .iter()
            .filter_map(|id| match table.slots.get(id) {
                Some(Slot::Ready(module)) => Some(Arc::clone(module)),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self) -> &Arc<NameIndex> {
        &self.index
    }
}

impl DependencyResolver for ResolutionCache {
    fn resolve_dependency(
        &self,
        identity: &ModuleIdentity,
    ) -> Result<Arc<LoadedModule>, ResolveError> {
        self.resolve(identity).inspect_err(|e| {
            if matches!(e, ResolveError::UnresolvedDependency { .. }) {
                self.log.error(format!(
                    "Unable to resolve the dependency/extension {identity}, make sure it is in your extensions directory!"
                ));
            }
        })
    }
}
