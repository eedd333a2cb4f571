//! Module metadata structures

use serde::{Deserialize, Serialize};

use crate::API_VERSION;

/// Manifest describing a module and the modules it depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module identity, unique across the extensions directory
    pub name: String,
    /// Module version (semver)
    #[serde(default)]
    pub version: String,
    /// API version this module was built against
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Module author
    #[serde(default)]
    pub author: String,
    /// Identities of modules that must be resolved before this one initializes
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_api_version() -> u32 {
    API_VERSION
}

impl Default for ModuleManifest {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            api_version: API_VERSION,
            description: String::new(),
            author: String::new(),
            dependencies: Vec::new(),
        }
    }
}

/// A type exported by a module, together with the capabilities it implements.
///
/// The host decides which of these count as extensions by checking the
/// capability list, never the type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedType {
    /// Fully qualified type name, e.g. `my_mod::Renderer`
    pub name: String,
    /// Capability tags implemented by the type
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ExportedType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
        }
    }

    /// Declare that the type implements `capability`
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn implements(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}
