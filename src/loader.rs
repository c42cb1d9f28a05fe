//! Loading module images from disk.
//!
//! The [`Loader`] opens a module image, parses it into a mutable
//! [`crate::metadata::Module`], and resolves every external module reference
//! against its configured search directories. Resolution is eager: a
//! reference whose file cannot be located in any search directory fails the
//! load, never silently skips.

use std::path::{Path, PathBuf};

use crate::{image::read::read_module, metadata::Module, Error, File, Result};

/// Loads module images, resolving external references against a configurable
/// set of search directories.
///
/// # Examples
///
/// ```rust,no_run
/// use cilpatch::Loader;
/// use std::path::Path;
///
/// let mut loader = Loader::new();
/// loader.add_search_directory(Path::new("/opt/compiler/tools"));
///
/// // Read-only load for inspection; pass `true` to allow patching.
/// let module = loader.load(Path::new("/opt/compiler/tools/options.dll"), false)?;
/// println!("{} types", module.types.len());
/// # Ok::<(), cilpatch::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Loader {
    search_dirs: Vec<PathBuf>,
}

impl Loader {
    /// Create a loader with no search directories.
    #[must_use]
    pub fn new() -> Self {
        Loader {
            search_dirs: Vec::new(),
        }
    }

    /// Append a directory to consult when resolving external references.
    ///
    /// Directories are searched in insertion order; the first hit wins.
    pub fn add_search_directory(&mut self, directory: &Path) {
        self.search_dirs.push(directory.to_path_buf());
    }

    /// Load the module image at `path`.
    ///
    /// `writable` controls whether the loaded representation may be mutated
    /// and re-serialized; read-only loads are used for inspection. The file
    /// handle is held only while parsing and released on every path out of
    /// this function.
    ///
    /// External references of the loaded module are resolved here by file
    /// name lookup across the search directories; each referenced module is
    /// parsed read-only and attached for base-type resolution. References of
    /// those external modules are not followed further.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] / [`crate::Error::Malformed`] /
    /// [`crate::Error::NotSupported`] for unreadable or damaged images, and
    /// [`crate::Error::UnresolvedReference`] when an external reference is
    /// not found in any search directory.
    pub fn load(&self, path: &Path, writable: bool) -> Result<Module> {
        let mut module = {
            let file = File::open(path)?;
            read_module(file.data())?
        };
        module.set_writable(writable);
        module.set_source_path(path);

        for index in 0..module.extern_modules().len() {
            let reference = module.extern_modules()[index].name.clone();
            let resolved_path = self
                .locate(&reference)
                .ok_or_else(|| Error::UnresolvedReference(reference.clone()))?;

            log::debug!(
                "resolved external module {} -> {}",
                reference,
                resolved_path.display()
            );

            let mut external = {
                let file = File::open(&resolved_path)?;
                read_module(file.data())?
            };
            external.set_writable(false);
            external.set_source_path(&resolved_path);
            module.attach_resolved(index, external);
        }

        Ok(module)
    }

    fn locate(&self, file_name: &str) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .map(|directory| directory.join(file_name))
            .find(|candidate| candidate.is_file())
    }
}
