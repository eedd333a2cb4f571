//! Extension module resolution
//!
//! - [`NameIndex`]: module identity → path, filled at discovery time
//! - [`ResolutionCache`]: module identity → [`LoadedModule`], at most one load
//!   per identity, and the resolver for dependency references raised while
//!   other modules load
//! - [`ExtensionRegistry`]: the extension types found in each loaded module,
//!   and the [`ExtensionParser`]s that act on them
//!
//! # Module Layout
//!
//! Modules live in a single extensions directory:
//! - `lib<name>.so` (or `.dylib`/`.dll`) - the module binary
//! - `lib<name>.toml` (optional) - sidecar manifest whose `name` is the
//!   module identity; without it the identity is `<name>`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use graphene_core::extensions::{NameIndex, NativeLoader, ResolutionCache};
//! use graphene_core::logging::{LogSink, TracingSink};
//!
//! let log: Arc<dyn LogSink> = Arc::new(TracingSink);
//! let index = Arc::new(NameIndex::new());
//! index.register("Core".into(), "/opt/game/extensions/libcore.so");
//!
//! let cache = ResolutionCache::new(index, Box::new(NativeLoader::new(log.clone())), log);
//! let core = cache.resolve(&"Core".into())?;
//! # Ok::<(), graphene_core::ResolveError>(())
//! ```

mod cache;
mod discovery;
mod index;
pub mod memory;
mod module;
mod native;
mod parser;
mod registry;

pub use cache::{ResolutionCache, ResolveReport};
pub use discovery::{DirectorySource, LIBRARY_EXTENSIONS, ModuleSource, is_library};
pub use index::{ModuleIdentity, NameIndex};
pub use module::{DependencyResolver, LoadedModule, ModuleLoader, resolve_dependencies};
pub use native::NativeLoader;
pub use parser::ExtensionParser;
pub use registry::{
    Capability, CapabilityPredicate, ExtensionEvents, ExtensionFailure, ExtensionRegistry,
    ExtensionType,
};
