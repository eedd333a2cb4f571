//! Candidate discovery - where module binaries come from

use std::io;
use std::path::{Path, PathBuf};

use graphene_extension_api::ModuleManifest;

use super::index::ModuleIdentity;

/// Supplies candidate module paths and derives their identities
pub trait ModuleSource: Send {
    /// Every candidate path, in a stable order
    fn candidates(&self) -> io::Result<Vec<PathBuf>>;

    /// Identity of the module at `path`, or `None` if it cannot be read.
    ///
    /// Candidates without an identity are skipped silently.
    fn identity_of(&self, path: &Path) -> Option<ModuleIdentity>;
}

/// File extensions of loadable libraries on this platform
#[cfg(target_os = "macos")]
pub const LIBRARY_EXTENSIONS: &[&str] = &["dylib", "so"];
#[cfg(target_os = "windows")]
pub const LIBRARY_EXTENSIONS: &[&str] = &["dll"];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const LIBRARY_EXTENSIONS: &[&str] = &["so"];

/// Whether `path` names a loadable library file
pub fn is_library(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| LIBRARY_EXTENSIONS.contains(&ext))
}

/// Scans one directory (non-recursively) for module libraries.
///
/// A module's identity comes from a sidecar manifest next to the library
/// (`libminimap.so` → `libminimap.toml`). Without one, the file stem is used
/// with any `lib` prefix stripped.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn sidecar_identity(sidecar: &Path) -> Option<ModuleIdentity> {
        let content = match std::fs::read_to_string(sidecar) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %sidecar.display(), error = %e, "Unreadable module manifest");
                return None;
            }
        };
        match toml::from_str::<ModuleManifest>(&content) {
            Ok(manifest) if !manifest.name.is_empty() => Some(manifest.name.into()),
            Ok(_) => {
                tracing::debug!(path = %sidecar.display(), "Module manifest has an empty name");
                None
            }
            Err(e) => {
                tracing::debug!(path = %sidecar.display(), error = %e, "Invalid module manifest");
                None
            }
        }
    }
}

impl ModuleSource for DirectorySource {
    fn candidates(&self) -> io::Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            tracing::debug!(dir = %self.dir.display(), "Extensions directory does not exist");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if is_library(&path) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    fn identity_of(&self, path: &Path) -> Option<ModuleIdentity> {
        if !is_library(path) {
            return None;
        }

        let sidecar = path.with_extension("toml");
        if sidecar.is_file() {
            return Self::sidecar_identity(&sidecar);
        }

        let stem = path.file_stem()?.to_str()?;
        let name = stem.strip_prefix("lib").unwrap_or(stem);
        (!name.is_empty()).then(|| ModuleIdentity::from(name))
    }
}
