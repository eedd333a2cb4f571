//! Error types for graphene-core

use std::path::PathBuf;

use thiserror::Error;

use crate::extensions::{ExtensionFailure, ModuleIdentity};
use crate::lifecycle::LifecycleState;

/// Boxed cause carried by load failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while turning a module identity into a loaded module
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No path is known for the identity
    #[error("Unresolved dependency: {identity}")]
    UnresolvedDependency { identity: ModuleIdentity },

    /// The module binary could not be loaded
    #[error("Failed to load module {}: {source}", .path.display())]
    LoadFailure {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// API version mismatch between graphene and the module
    #[error(
        "API version mismatch in {}: graphene expects {expected}, module has {found}",
        .path.display()
    )]
    ApiVersionMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// The identity is already being loaded further up the same call chain
    #[error("Cyclic dependency on {identity}")]
    CyclicDependency { identity: ModuleIdentity },

    /// The module already failed earlier in the same resolution pass
    #[error("Module {identity} already failed to load: {cause}")]
    AlreadyFailed {
        identity: ModuleIdentity,
        cause: String,
    },

    /// A dependency of the module failed to resolve
    #[error("Module {identity} could not resolve dependency {dependency}: {source}")]
    DependencyFailed {
        identity: ModuleIdentity,
        dependency: ModuleIdentity,
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    pub fn load_failure(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::LoadFailure {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Errors raised by the lifecycle state machine
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The requested transition is not allowed from the current state
    #[error("Invalid state: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: LifecycleState,
        actual: LifecycleState,
    },

    /// The discovery collaborator could not enumerate candidates
    #[error("Module discovery failed: {0}")]
    Discovery(#[source] std::io::Error),

    /// One or more modules failed to resolve
    #[error("{} module(s) failed to load", .0.len())]
    ModulesFailed(Vec<ResolveError>),

    /// One or more extension parsers failed
    #[error("{} extension(s) failed", .0.len())]
    ExtensionsFailed(Vec<ExtensionFailure>),
}

/// Errors reading or writing the host configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
