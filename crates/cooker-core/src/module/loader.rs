//! Plugin loader: opens candidate binaries and matches them by declared name.
//!
//! Units that were opened stay mapped for the life of the process, including
//! candidates that turned out to declare a different name. Unmapping a
//! dynamic library that may still have live code or data in use is not
//! reliable, so nothing is ever closed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cooker_module_sdk::{INIT_MODULE_SYMBOL, InitModuleFn, MODULE_NAME_SYMBOL, ModuleNameDecl};
use libloading::{Library, Symbol};

use super::record::ModuleRecord;
use crate::error::{Error, Result};

/// An opened module binary.
pub trait LoadedUnit: Send + Sync {
    /// The name the unit declares for itself.
    fn declared_name(&self) -> Result<String>;

    /// The unit's exported initializer.
    fn initializer(&self) -> Result<InitModuleFn>;
}

/// Opens module binaries.
///
/// [`NativeUnitOpener`] is the production implementation; hosts that link
/// modules statically or tests can supply their own.
pub trait UnitOpener: Send + Sync {
    /// Open `path` as a module unit.
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedUnit>>;

    /// Whether `path` looks like a unit this opener handles.
    fn is_unit_file(&self, path: &Path) -> bool {
        is_module_file(path)
    }
}

/// Check if a file has the platform's dynamic library extension.
pub fn is_module_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext == std::env::consts::DLL_EXTENSION)
        .unwrap_or(false)
}

/// Opener for native shared libraries (.so/.dylib/.dll).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeUnitOpener;

impl UnitOpener for NativeUnitOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedUnit>> {
        // SAFETY: loading a module runs its initialisation routines; modules
        // share the host's address space by contract.
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::invalid_unit(path, format!("Failed to load library: {}", e)))?;

        Ok(Box::new(NativeUnit {
            path: path.to_path_buf(),
            library: Box::leak(Box::new(library)),
        }))
    }
}

/// A native library that is never unmapped.
struct NativeUnit {
    path: PathBuf,
    library: &'static Library,
}

impl LoadedUnit for NativeUnit {
    fn declared_name(&self) -> Result<String> {
        // SAFETY: the symbol is declared as a `ModuleNameDecl` static by the export macro.
        let symbol: Symbol<*const ModuleNameDecl> = unsafe { self.library.get(MODULE_NAME_SYMBOL) }
            .map_err(|e| Error::invalid_unit(&self.path, format!("Missing module name: {}", e)))?;

        let decl_ptr = *symbol;
        if decl_ptr.is_null() {
            return Err(Error::invalid_unit(&self.path, "Module name symbol is null"));
        }

        // SAFETY: non-null, points into a library that is never unmapped.
        let decl = unsafe { &*decl_ptr };
        let name = unsafe { decl.declared_name() }
            .map_err(|e| Error::invalid_unit(&self.path, e))?;
        Ok(name.to_string())
    }

    fn initializer(&self) -> Result<InitModuleFn> {
        // SAFETY: the symbol is declared with the `InitModuleFn` signature by the export macro.
        let symbol: Symbol<InitModuleFn> = unsafe { self.library.get(INIT_MODULE_SYMBOL) }
            .map_err(|e| Error::invalid_unit(&self.path, e))?;
        Ok(*symbol)
    }
}

/// A loadable unit found while scanning a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUnit {
    pub path: PathBuf,
    /// Declared name, or why it could not be read.
    pub declared_name: std::result::Result<String, String>,
}

/// Scans search paths and opens candidate units.
#[derive(Clone)]
pub struct ModuleLoader {
    opener: Arc<dyn UnitOpener>,
}

impl ModuleLoader {
    /// Loader backed by [`NativeUnitOpener`].
    pub fn native() -> Self {
        Self::with_opener(Arc::new(NativeUnitOpener))
    }

    /// Loader backed by a custom opener.
    pub fn with_opener(opener: Arc<dyn UnitOpener>) -> Self {
        Self { opener }
    }

    /// Candidate unit files in `dir`, non-recursive.
    ///
    /// Entries are sorted by file name so that duplicate declarations inside
    /// one directory resolve the same way on every filesystem.
    pub fn candidates(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|source| Error::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.opener.is_unit_file(path))
            .collect();
        candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(candidates)
    }

    /// Find the unit in `search_path` that declares `module_name`.
    ///
    /// Candidates that fail to open or carry no readable name are skipped.
    /// The first exact, case-sensitive match wins.
    pub fn find(&self, module_name: &str, search_path: &Path) -> Result<ModuleRecord> {
        tracing::debug!("Scanning {}", search_path.display());

        for path in self.candidates(search_path)? {
            let unit = match self.opener.open(&path) {
                Ok(unit) => unit,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let declared = match unit.declared_name() {
                Ok(name) => name,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if declared != module_name {
                tracing::trace!("{} declares {}, not {}", path.display(), declared, module_name);
                continue;
            }

            return Ok(ModuleRecord::new(declared, path, unit));
        }

        Err(Error::ModuleNotFound(module_name.to_string()))
    }

    /// Open every candidate in `dir` and report what it declares.
    pub fn scan(&self, dir: &Path) -> Result<Vec<DiscoveredUnit>> {
        let discovered = self
            .candidates(dir)?
            .into_iter()
            .map(|path| {
                let declared_name = self
                    .opener
                    .open(&path)
                    .and_then(|unit| unit.declared_name())
                    .map_err(|e| e.to_string());
                DiscoveredUnit {
                    path,
                    declared_name,
                }
            })
            .collect();
        Ok(discovered)
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib_name(stem: &str) -> String {
        format!("{}.{}", stem, std::env::consts::DLL_EXTENSION)
    }

    #[test]
    fn test_is_module_file() {
        assert!(is_module_file(Path::new(&lib_name("libauth"))));
        assert!(!is_module_file(Path::new("auth.rs")));
        assert!(!is_module_file(Path::new("auth.txt")));
        assert!(!is_module_file(Path::new("auth")));
    }

    #[test]
    fn test_candidates_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in [lib_name("zeta"), lib_name("alpha"), "notes.txt".to_string()] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join(lib_name("nested"))).unwrap();

        let loader = ModuleLoader::native();
        let candidates = loader.candidates(dir.path()).unwrap();

        assert_eq!(
            candidates,
            vec![dir.path().join(lib_name("alpha")), dir.path().join(lib_name("zeta"))]
        );
    }

    #[test]
    fn test_unreadable_directory() {
        let loader = ModuleLoader::native();
        let err = loader.candidates(Path::new("/nonexistent/cooker/modules")).unwrap_err();
        assert!(matches!(err, Error::DirectoryUnreadable { .. }));
    }

    #[test]
    fn test_garbage_library_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(lib_name("broken")), b"not a shared object").unwrap();

        let loader = ModuleLoader::native();
        let err = loader.find("broken", dir.path()).unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(name) if name == "broken"));

        let scanned = loader.scan(dir.path()).unwrap();
        assert_eq!(scanned.len(), 1);
        assert!(scanned[0].declared_name.is_err());
    }
}
