//! ExtensionRegistry - loaded modules and the extension types they export

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use graphene_extension_api::{EXTENSION_CAPABILITY, ExportedType};
use serde::Serialize;

use super::index::ModuleIdentity;
use super::module::LoadedModule;
use super::parser::ExtensionParser;
use crate::dispatch::{HandlerError, SafeDispatcher, panic_message};
use crate::logging::LogSink;

/// A type inside a loaded module recognised as an extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionType {
    /// Module that exports the type
    pub module: ModuleIdentity,
    pub name: String,
    pub capabilities: Vec<String>,
}

impl ExtensionType {
    pub fn from_export(module: &ModuleIdentity, export: &ExportedType) -> Self {
        Self {
            module: module.clone(),
            name: export.name.clone(),
            capabilities: export.capabilities.clone(),
        }
    }

    pub fn implements(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Decides whether an exported type is an extension
pub trait CapabilityPredicate: Send + Sync {
    fn is_extension(&self, ty: &ExportedType) -> bool;
}

impl<F> CapabilityPredicate for F
where
    F: Fn(&ExportedType) -> bool + Send + Sync,
{
    fn is_extension(&self, ty: &ExportedType) -> bool {
        self(ty)
    }
}

/// Matches types that declare a given capability tag
#[derive(Debug, Clone)]
pub struct Capability(pub String);

impl Capability {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl Default for Capability {
    fn default() -> Self {
        Self::new(EXTENSION_CAPABILITY)
    }
}

impl CapabilityPredicate for Capability {
    fn is_extension(&self, ty: &ExportedType) -> bool {
        ty.implements(&self.0)
    }
}

/// A parser that failed on one extension
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionFailure {
    pub parser: String,
    pub extension: ExtensionType,
    pub cause: String,
}

impl fmt::Display for ExtensionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed on {} ({}): {}",
            self.parser, self.extension.name, self.extension.module, self.cause
        )
    }
}

/// Per-extension status events
pub struct ExtensionEvents {
    pub loaded: SafeDispatcher<ExtensionType>,
    pub unloaded: SafeDispatcher<ExtensionType>,
    pub reloaded: SafeDispatcher<ExtensionType>,
}

impl ExtensionEvents {
    fn new(log: &Arc<dyn LogSink>) -> Self {
        Self {
            loaded: SafeDispatcher::new("ExtensionLoaded", log.clone()),
            unloaded: SafeDispatcher::new("ExtensionUnloaded", log.clone()),
            reloaded: SafeDispatcher::new("ExtensionReloaded", log.clone()),
        }
    }
}

#[derive(Clone, Copy)]
enum ParserOp {
    Load,
    Unload,
    Reload,
}

/// Owns the module → extension types association and the parsers that act
/// on those types.
pub struct ExtensionRegistry {
    predicate: Box<dyn CapabilityPredicate>,
    log: Arc<dyn LogSink>,
    /// One entry per module, in registration order
    modules: Vec<(ModuleIdentity, Vec<ExtensionType>)>,
    parsers: Vec<Box<dyn ExtensionParser>>,
    /// (parser index, extension) pairs whose `load` succeeded
    active: Vec<(usize, ExtensionType)>,
    events: ExtensionEvents,
}

impl ExtensionRegistry {
    pub fn new(predicate: Box<dyn CapabilityPredicate>, log: Arc<dyn LogSink>) -> Self {
        let events = ExtensionEvents::new(&log);
        Self {
            predicate,
            log,
            modules: Vec::new(),
            parsers: Vec::new(),
            active: Vec::new(),
            events,
        }
    }

    pub fn add_parser(&mut self, parser: Box<dyn ExtensionParser>) {
        self.parsers.push(parser);
    }

    pub fn events(&self) -> &ExtensionEvents {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut ExtensionEvents {
        &mut self.events
    }

    /// Scan a module's exports for extension types, in export order.
    ///
    /// Read-only with respect to the name index and the resolution cache.
    pub fn discover(&self, module: &LoadedModule) -> Vec<ExtensionType> {
        let name = module.identity();
        self.log.important(format!("Loading extension: {name}"));

        let found: Vec<ExtensionType> = module
            .exports()
            .iter()
            .filter(|ty| self.predicate.is_extension(ty))
            .map(|ty| ExtensionType::from_export(name, ty))
            .collect();

        self.log.important(format!("Loaded extension: {name}"));
        found
    }

    /// Store the extension types of `module`, replacing any earlier entry
    pub fn register_loaded(&mut self, module: &LoadedModule, extensions: Vec<ExtensionType>) {
        let identity = module.identity();
        match self.modules.iter_mut().find(|(id, _)| id == identity) {
            Some(entry) => entry.1 = extensions,
            None => self.modules.push((identity.clone(), extensions)),
        }
    }

    pub fn is_registered(&self, identity: &str) -> bool {
        self.modules.iter().any(|(id, _)| id.as_str() == identity)
    }

    /// Extension types of one module
    pub fn extensions_of(&self, identity: &str) -> Option<&[ExtensionType]> {
        self.modules
            .iter()
            .find(|(id, _)| id.as_str() == identity)
            .map(|(_, exts)| exts.as_slice())
    }

    /// Every registered extension type, grouped by module registration order
    pub fn extensions(&self) -> impl Iterator<Item = &ExtensionType> {
        self.modules.iter().flat_map(|(_, exts)| exts.iter())
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Number of (parser, extension) pairs currently loaded
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Load every registered extension into each parser that accepts it
    pub fn load_extensions(&mut self) -> Vec<ExtensionFailure> {
        let mut failures = Vec::new();
        let pending: Vec<ExtensionType> = self.extensions().cloned().collect();

        for extension in pending {
            for idx in 0..self.parsers.len() {
                if !self.parsers[idx].accepts(&extension) {
                    continue;
                }
                match self.run_parser(idx, &extension, ParserOp::Load) {
                    Ok(()) => {
                        self.active.push((idx, extension.clone()));
                        self.events.loaded.dispatch(&extension);
                    }
                    Err(failure) => failures.push(failure),
                }
            }
        }

        failures
    }

    /// Unload active extensions in reverse load order and forget them
    pub fn unload_extensions(&mut self) -> Vec<ExtensionFailure> {
        let mut failures = Vec::new();

        while let Some((idx, extension)) = self.active.pop() {
            match self.run_parser(idx, &extension, ParserOp::Unload) {
                Ok(()) => {
                    self.events.unloaded.dispatch(&extension);
                }
                Err(failure) => failures.push(failure),
            }
        }

        failures
    }

    /// Re-drive every active extension through its parser's `reload`.
    ///
    /// An extension whose reload fails is no longer considered active, so a
    /// later unload does not reach it again.
    pub fn reload_extensions(&mut self) -> Vec<ExtensionFailure> {
        let mut failures = Vec::new();

        for (idx, extension) in std::mem::take(&mut self.active) {
            match self.run_parser(idx, &extension, ParserOp::Reload) {
                Ok(()) => {
                    self.events.reloaded.dispatch(&extension);
                    self.active.push((idx, extension));
                }
                Err(failure) => failures.push(failure),
            }
        }

        failures
    }

    /// Drop every module entry. Active extensions must be unloaded first.
    pub fn clear(&mut self) {
        self.modules.clear();
    }

    fn run_parser(
        &mut self,
        idx: usize,
        extension: &ExtensionType,
        op: ParserOp,
    ) -> Result<(), ExtensionFailure> {
        let parser = &mut self.parsers[idx];
        let result = std::panic::catch_unwind(AssertUnwindSafe(
            || -> Result<(), HandlerError> {
                match op {
                    ParserOp::Load => parser.load(extension),
                    ParserOp::Unload => parser.unload(extension),
                    ParserOp::Reload => parser.reload(extension),
                }
            },
        ));

        let cause = match result {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };

        let failure = ExtensionFailure {
            parser: parser.name().to_string(),
            extension: extension.clone(),
            cause,
        };
        self.log.error_with(
            format!(
                "Extension parser {} failed on {}",
                failure.parser, failure.extension.name
            ),
            &failure.cause,
            true,
        );
        Err(failure)
    }
}
