//! graphene-core: runtime extension loading for graphene hosts
//!
//! This crate discovers extension modules on disk, loads each of them at
//! most once, and drives the extension types they export through a
//! load/unload/reload lifecycle:
//!
//! - **Resolution** - [`extensions::NameIndex`] and
//!   [`extensions::ResolutionCache`] map identities to paths and loaded
//!   modules, resolving nested dependencies single-flight
//! - **Extensions** - [`extensions::ExtensionRegistry`] finds extension types
//!   by capability and hands them to registered parsers
//! - **Dispatch** - [`SafeDispatcher`] multicasts events, isolating failing
//!   subscribers
//! - **Lifecycle** - [`LifecycleController`] sequences all of the above
//!
//! # Quick Start
//!
//! ```no_run
//! use graphene_core::{HostConfig, LifecycleController};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HostConfig::load(&HostConfig::default_path())?;
//!     let mut controller = LifecycleController::from_config(&config);
//!
//!     controller.events_mut().loaded.subscribe(|_: &()| {
//!         println!("extensions ready");
//!         Ok(())
//!     });
//!
//!     controller.load()?;
//!     controller.reload()?;
//!     controller.unload()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extensions;
pub mod lifecycle;
pub mod logging;

pub use config::HostConfig;
pub use dispatch::{HandlerError, HandlerFailure, SafeDispatcher};
pub use error::{ConfigError, LifecycleError, ResolveError};
pub use lifecycle::{LifecycleController, LifecycleEvents, LifecycleState};
pub use logging::{LogRecord, LogSink, Severity};
