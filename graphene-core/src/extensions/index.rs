//! NameIndex - module identity to on-disk path

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Stable logical name of a module, independent of its file path.
///
/// Equality is exact string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleIdentity(String);

impl ModuleIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleIdentity {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ModuleIdentity {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for ModuleIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default)]
struct Entries {
    paths: HashMap<ModuleIdentity, PathBuf>,
    order: Vec<ModuleIdentity>,
}

/// Append-only map from module identity to the path it was discovered at.
///
/// The first registration of an identity wins; later registrations of the
/// same identity are ignored. Paths are not validated here.
#[derive(Debug, Default)]
pub struct NameIndex {
    entries: RwLock<Entries>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity` at `path`.
    ///
    /// Returns `false` when the identity was already registered, in which
    /// case the existing path is kept.
    pub fn register(&self, identity: ModuleIdentity, path: impl Into<PathBuf>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.paths.contains_key(&identity) {
            return false;
        }
        entries.order.push(identity.clone());
        entries.paths.insert(identity, path.into());
        true
    }

    pub fn lookup(&self, identity: &str) -> Option<PathBuf> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
            .get(identity)
            .cloned()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
            .contains_key(identity)
    }

    /// Registered identities, in registration order
    pub fn identities(&self) -> Vec<ModuleIdentity> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
