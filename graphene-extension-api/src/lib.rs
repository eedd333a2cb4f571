//! graphene-extension-api - the module ABI for the graphene extension loader
//!
//! An extension module is a native dynamic library that exports a
//! [`Module`] implementation. The host loads it once, resolves the modules
//! named in its manifest, initializes it, and scans [`Module::exported_types`]
//! for types carrying the [`EXTENSION_CAPABILITY`] tag.
//!
//! # Example
//!
//! ```ignore
//! use graphene_extension_api::{
//!     export_module, ExportedType, Module, ModuleManifest, EXTENSION_CAPABILITY,
//! };
//!
//! #[derive(Default)]
//! pub struct Minimap;
//!
//! impl Module for Minimap {
//!     fn manifest(&self) -> ModuleManifest {
//!         ModuleManifest {
//!             name: "Minimap".to_string(),
//!             version: "0.1.0".to_string(),
//!             dependencies: vec!["Core".to_string()],
//!             ..Default::default()
//!         }
//!     }
//!
//!     fn exported_types(&self) -> Vec<ExportedType> {
//!         vec![ExportedType::new("minimap::Overlay").with_capability(EXTENSION_CAPABILITY)]
//!     }
//! }
//!
//! export_module!(Minimap);
//! ```

pub mod error;
pub mod types;

pub use error::ExtensionError;
pub use types::{ExportedType, ModuleManifest};

/// Current module API version. Modules must match this exactly.
pub const API_VERSION: u32 = 1;

/// Capability tag marking an exported type as an extension.
pub const EXTENSION_CAPABILITY: &str = "graphene::extension";

/// Symbol returning the module's [`API_VERSION`].
pub const API_VERSION_SYMBOL: &[u8] = b"_graphene_api_version";

/// Symbol creating the boxed [`Module`] instance.
pub const CREATE_SYMBOL: &[u8] = b"_graphene_module_create";

/// The trait every extension module implements.
pub trait Module: Send + Sync {
    /// Return module metadata, including its dependencies
    fn manifest(&self) -> ModuleManifest;

    /// Types exported by this module, in declaration order
    fn exported_types(&self) -> Vec<ExportedType>;

    /// Called exactly once, after every dependency has been resolved.
    fn initialize(&mut self) -> Result<(), ExtensionError> {
        Ok(())
    }
}

/// Export a module type for dynamic loading.
///
/// Generates the C ABI entry points the host looks up:
///
/// - `_graphene_module_create()`: creates the module instance
/// - `_graphene_api_version()`: returns the API version
#[macro_export]
macro_rules! export_module {
    ($module_type:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _graphene_module_create() -> *mut dyn $crate::Module {
            let module: Box<dyn $crate::Module> = Box::new(<$module_type>::default());
            Box::into_raw(module)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _graphene_api_version() -> u32 {
            $crate::API_VERSION
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Empty;

    impl Module for Empty {
        fn manifest(&self) -> ModuleManifest {
            ModuleManifest {
                name: "Empty".to_string(),
                ..Default::default()
            }
        }

        fn exported_types(&self) -> Vec<ExportedType> {
            Vec::new()
        }
    }

    #[test]
    fn test_module_trait_is_object_safe() {
        fn _takes_boxed_module(_: Box<dyn Module>) {}
    }

    #[test]
    fn test_manifest_default_has_correct_api_version() {
        assert_eq!(ModuleManifest::default().api_version, API_VERSION);
    }

    #[test]
    fn test_default_initialize_succeeds() {
        let mut module = Empty;
        assert!(module.initialize().is_ok());
        assert_eq!(module.manifest().name, "Empty");
    }
}
