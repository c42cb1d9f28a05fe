//! The rename-based file-state swap protocol.
//!
//! Enabling and disabling the patch are made idempotent and crash-tolerant by
//! a small file-system state machine over three sibling paths:
//!
//! - `<name>` - the active module consumed by the host runtime
//! - `<name>.bytes` - the pristine backup
//! - `<name>.copy` - transient staged patched output
//!
//! State is never persisted separately; it is inferred from file presence at
//! every invocation ([`FilePatchState::inspect`]).
//!
//! The transitions:
//!
//! - [`prepare`] (entry to both enable and disable): whenever a backup
//!   exists, the pristine module is restored to the active name, deleting the
//!   active file first if present. A repeated enable therefore always patches
//!   a pristine module, never an already-patched one.
//! - [`exchange`] (end of enable): delete any stale backup, rename the active
//!   file to the backup name, and promote the staged output to the active
//!   name, strictly in that order. A failure partway leaves the file
//!   recoverable-but-inactive (no file at the active name) rather than ever
//!   exposing a half-written module under the active name.
//! - [`restore`] (disable): prepare alone, after checking that there is
//!   anything to restore.
//!
//! The rename-based transition doubles as the single-writer gate: no other
//! locking is used.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{Error, Result};

/// Suffix of the pristine backup file.
pub const BACKUP_SUFFIX: &str = ".bytes";

/// Suffix of the transient staged output file.
pub const STAGED_SUFFIX: &str = ".copy";

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut joined = path.as_os_str().to_os_string();
    joined.push(suffix);
    PathBuf::from(joined)
}

/// The `<name>.bytes` sibling of an active file path.
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    append_suffix(path, BACKUP_SUFFIX)
}

/// The `<name>.copy` sibling of an active file path.
#[must_use]
pub fn staged_path(path: &Path) -> PathBuf {
    append_suffix(path, STAGED_SUFFIX)
}

/// Presence of the three swap protocol files, inferred from the file system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilePatchState {
    /// The active file exists.
    pub active: bool,
    /// The pristine backup exists.
    pub backup: bool,
    /// A staged output exists (normally only mid-enable, or after a crash).
    pub staged: bool,
}

impl FilePatchState {
    /// Inspect the file system around `path`.
    #[must_use]
    pub fn inspect(path: &Path) -> FilePatchState {
        FilePatchState {
            active: path.is_file(),
            backup: backup_path(path).is_file(),
            staged: staged_path(path).is_file(),
        }
    }

    /// Human-readable summary of the state.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match (self.backup, self.active) {
            (false, false) => "missing",
            (false, true) => "active, no backup",
            (true, true) => "patched, pristine backup present",
            (true, false) => "inactive, pristine backup present",
        }
    }
}

fn remove(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|source| io_error!(path, source))
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|source| io_error!(from, source))
}

/// Restore the pristine backup to the active name, if a backup exists.
///
/// Runs at the entry of both enable and disable. When `<name>.bytes` exists,
/// any file at the active name is deleted and the backup is renamed into its
/// place; without a backup this is a no-op. Repeated invocations are
/// idempotent.
///
/// # Errors
/// Returns [`crate::Error::Io`] with the failing path on delete or rename
/// failure.
pub fn prepare(path: &Path) -> Result<()> {
    let backup = backup_path(path);
    if !backup.is_file() {
        return Ok(());
    }

    if path.is_file() {
        remove(path)?;
    }
    rename(&backup, path)?;

    log::debug!("restored pristine module to {}", path.display());
    Ok(())
}

/// Promote the staged output to the active name, preserving the pristine
/// module as `<name>.bytes`.
///
/// The three file-system operations execute strictly in order: delete any
/// stale backup, rename the active file to the backup name, rename the staged
/// output to the active name. A failure after the backup rename leaves no
/// file at the active name, which [`prepare`] recovers from on the next run;
/// a half-written module is never left active.
///
/// # Errors
/// Returns [`crate::Error::Io`] with the failing path on delete or rename
/// failure.
pub fn exchange(path: &Path) -> Result<()> {
    let backup = backup_path(path);
    let staged = staged_path(path);

    if backup.is_file() {
        remove(&backup)?;
    }
    rename(path, &backup)?;
    rename(&staged, path)?;

    log::debug!("promoted staged module to {}", path.display());
    Ok(())
}

/// Restore the pristine module (the disable operation).
///
/// # Errors
/// Returns [`crate::Error::FileState`] if neither a backup nor an active file
/// exists, and [`crate::Error::Io`] on file-system failure.
pub fn restore(path: &Path) -> Result<()> {
    let state = FilePatchState::inspect(path);
    if !state.backup && !state.active {
        return Err(Error::FileState {
            path: path.to_path_buf(),
            message: format!(
                "neither an active file nor a {BACKUP_SUFFIX} backup exists"
            ),
        });
    }

    prepare(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn state_inference() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("m.dll");

        let state = FilePatchState::inspect(&active);
        assert_eq!(state.describe(), "missing");

        write(&active, "pristine");
        assert_eq!(FilePatchState::inspect(&active).describe(), "active, no backup");

        write(&backup_path(&active), "pristine");
        let state = FilePatchState::inspect(&active);
        assert!(state.active && state.backup && !state.staged);
        assert_eq!(state.describe(), "patched, pristine backup present");
    }

    #[test]
    fn prepare_without_backup_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("m.dll");
        write(&active, "original");

        prepare(&active).unwrap();
        assert_eq!(read(&active), "original");
    }

    #[test]
    fn prepare_restores_backup_over_active() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("m.dll");
        write(&active, "patched");
        write(&backup_path(&active), "pristine");

        prepare(&active).unwrap();

        assert_eq!(read(&active), "pristine");
        assert!(!backup_path(&active).exists());
    }

    #[test]
    fn prepare_restores_backup_when_active_missing() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("m.dll");
        write(&backup_path(&active), "pristine");

        prepare(&active).unwrap();

        assert_eq!(read(&active), "pristine");
    }

    #[test]
    fn exchange_swaps_staged_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("m.dll");
        write(&active, "pristine");
        write(&staged_path(&active), "patched");
        write(&backup_path(&active), "stale");

        exchange(&active).unwrap();

        assert_eq!(read(&active), "patched");
        assert_eq!(read(&backup_path(&active)), "pristine");
        assert!(!staged_path(&active).exists());
    }

    #[test]
    fn restore_requires_something_to_restore() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("m.dll");

        assert!(matches!(
            restore(&active),
            Err(Error::FileState { .. })
        ));
    }

    #[test]
    fn restore_with_only_active_keeps_it() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("m.dll");
        write(&active, "original");

        restore(&active).unwrap();
        assert_eq!(read(&active), "original");
    }
}
