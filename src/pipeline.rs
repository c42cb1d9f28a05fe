//! End-to-end enable/disable pipelines over one module file.
//!
//! A pipeline invocation exclusively owns its module for the whole
//! Load-Resolve-Patch-Write sequence; nothing is shared across threads.
//! Distinct files may be processed in parallel, but never two attempts on the
//! same file: the swap protocol's renames are the only writer gate.

use std::path::{Path, PathBuf};

use crate::{
    image::write::write_module,
    loader::Loader,
    patch::{self, TargetSignature, DEFAULT_FLAG},
    swap, Result,
};

/// Configuration consumed by the enable pipeline.
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// The 32-bit flag literal stored into the flag field and OR'd into the
    /// flag property. The default corresponds to "ignore accessibility
    /// checks".
    pub flag: u32,
    /// Structural signature of the patch target.
    pub signature: TargetSignature,
    /// Extra directories to consult when resolving external module
    /// references. The module's own directory is always searched first.
    pub search_dirs: Vec<PathBuf>,
}

impl Default for PatchOptions {
    fn default() -> Self {
        PatchOptions {
            flag: DEFAULT_FLAG,
            signature: TargetSignature::default(),
            search_dirs: Vec::new(),
        }
    }
}

/// Enable the patch on the module at `path`.
///
/// Runs Prepare, loads the (now pristine) module writable, resolves the
/// target, applies the patch, writes the result to the staged `.copy` path,
/// and exchanges the staged output into place. On any error before the
/// exchange, the active file is left as it was after Prepare; a partial patch
/// is never promoted.
///
/// # Errors
/// Propagates load, resolution, patch, write and swap errors; see
/// [`crate::Error`].
pub fn enable(path: &Path, options: &PatchOptions) -> Result<()> {
    log::info!("enable: {}", path.display());

    swap::prepare(path)?;

    let mut loader = Loader::new();
    if let Some(parent) = path.parent() {
        loader.add_search_directory(parent);
    }
    for directory in &options.search_dirs {
        loader.add_search_directory(directory);
    }

    let mut module = loader.load(path, true)?;
    let target = patch::resolve(&mut module, &options.signature)?;
    patch::apply(&mut module, &target, &options.signature, options.flag)?;

    let staged = swap::staged_path(path);
    write_module(&module, &staged)?;
    drop(module);

    swap::exchange(path)?;

    log::info!("enable done: {}", path.display());
    Ok(())
}

/// Disable the patch on the module at `path`, restoring the pristine backup.
///
/// # Errors
/// Returns [`crate::Error::FileState`] if there is nothing to restore, and
/// [`crate::Error::Io`] on file-system failure.
pub fn disable(path: &Path) -> Result<()> {
    log::info!("disable: {}", path.display());

    swap::restore(path)?;

    log::info!("disable done: {}", path.display());
    Ok(())
}
