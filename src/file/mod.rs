//! Memory-mapped file access for module images.
//!
//! This module provides the raw-byte layer underneath the image parser. A
//! [`crate::file::File`] maps a module image from disk into the process's
//! address space, so parsing works over a borrowed byte slice without loading
//! the file content into an owned buffer first. The handle follows scoped
//! acquisition: it is released when the value is dropped, which the loader
//! does as soon as the module is fully parsed or on any failure path.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - Memory-mapped, read-only view of a file on disk
//! - [`crate::file::parser::Parser`] - Bounds-checked cursor over a byte slice
//! - [`crate::file::writer::ByteWriter`] - Growable little-endian output buffer
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilpatch::File;
//! use std::path::Path;
//!
//! let file = File::open(Path::new("module.dll"))?;
//! println!("{} bytes", file.len());
//! # Ok::<(), cilpatch::Error>(())
//! ```

pub(crate) mod parser;
pub(crate) mod writer;

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::Result;

/// A read-only, memory-mapped view of a file on disk.
///
/// Only requested portions are loaded into physical memory, and the operating
/// system's page cache is shared across invocations. The mapping is dropped
/// together with the value, releasing the underlying file handle.
///
/// # Examples
///
/// ```rust,no_run
/// use cilpatch::File;
/// use std::path::Path;
///
/// let file = File::open(Path::new("module.dll"))?;
/// let magic = &file.data()[..4];
/// # Ok::<(), cilpatch::Error>(())
/// ```
#[derive(Debug)]
pub struct File {
    mmap: Mmap,
}

impl File {
    /// Map the file at `path` into memory.
    ///
    /// # Arguments
    /// * `path` - The file to map
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] with the failing path if the file cannot
    /// be opened or mapped, and [`crate::Error::Empty`] for zero-length files.
    pub fn open(path: &Path) -> Result<File> {
        let handle = fs::File::open(path).map_err(|source| io_error!(path, source))?;

        // Mapping a zero-length file is platform-dependent; reject it up front.
        let len = handle
            .metadata()
            .map_err(|source| io_error!(path, source))?
            .len();
        if len == 0 {
            return Err(crate::Error::Empty);
        }

        // SAFETY: the mapping is read-only and lives no longer than `File`.
        let mmap =
            unsafe { Mmap::map(&handle) }.map_err(|source| io_error!(path, source))?;
        Ok(File { mmap })
    }

    /// The complete mapped file content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.mmap
    }

    /// Total size of the mapped file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns `true` if the mapped file is empty.
    ///
    /// [`File::open`] rejects empty files, so this is only `false` in
    /// practice; provided for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_maps_content() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"CMOD test content").unwrap();
        tmp.flush().unwrap();

        let file = File::open(tmp.path()).unwrap();
        assert_eq!(file.len(), 17);
        assert_eq!(&file.data()[..4], b"CMOD");
    }

    #[test]
    fn open_rejects_empty_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(File::open(tmp.path()), Err(crate::Error::Empty)));
    }

    #[test]
    fn open_missing_file_reports_path() {
        let err = File::open(Path::new("/nonexistent/module.dll")).unwrap_err();
        match err {
            crate::Error::Io { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/module.dll"));
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
