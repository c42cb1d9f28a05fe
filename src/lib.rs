// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # cilpatch
//!
//! A reversible bytecode patcher for managed compiler modules.
//!
//! `cilpatch` rewrites one structurally matched type inside a compact module
//! image so that the compiler it belongs to stops enforcing its internal
//! accessibility check. The patch is applied at the CIL instruction level and
//! is fully reversible: a pristine backup of the module is kept next to the
//! active file, and a rename-based swap protocol guarantees that a half-written
//! module is never promoted to the active file name.
//!
//! ## How a patch run works
//!
//! 1. **Prepare** - if a `<name>.bytes` backup exists, the pristine module is
//!    restored to the active file name, making repeated runs idempotent.
//! 2. **Load** - the module image is memory-mapped and parsed into a mutable
//!    [`metadata::Module`]; external module references are resolved against
//!    the configured search directories.
//! 3. **Resolve** - the target type, flag field, import-mode property and
//!    constructor set are located by structural signature
//!    ([`patch::resolve`]), never by positional metadata offsets.
//! 4. **Patch** - the flag store and import-mode setter call are spliced into
//!    every constructor, and the flag property setter is rewritten to OR every
//!    incoming value with the configured flag ([`patch::apply`]).
//! 5. **Write + Exchange** - the mutated module is serialized to a staged
//!    `<name>.copy` file, the pristine original is renamed to `<name>.bytes`,
//!    and the staged output is promoted to the active name ([`swap`]).
//!
//! Disabling the patch is the Prepare step alone: the pristine backup is moved
//! back to the active file name.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cilpatch::pipeline::{self, PatchOptions};
//! use std::path::Path;
//!
//! let options = PatchOptions::default();
//! pipeline::enable(Path::new("Microsoft.CodeAnalysis.CSharp.dll"), &options)?;
//! pipeline::disable(Path::new("Microsoft.CodeAnalysis.CSharp.dll"))?;
//! # Ok::<(), cilpatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`File`] / [`Parser`] - Memory-mapped input and bounds-checked cursor
//!   parsing
//! - [`image`] - The compact module image container format (read and write)
//! - [`metadata`] - The mutable in-memory module model
//! - [`cil`] - CIL instruction model, decoder and assembler
//! - [`patch`] - Structural signature resolution and instruction patching
//! - [`swap`] - The rename-based file-state swap protocol
//! - [`pipeline`] - One-call enable/disable pipelines over a module file
//! - [`Error`] and [`Result`] - Error handling across all of the above

#[macro_use]
pub(crate) mod error;

pub(crate) mod file;

pub mod cil;
pub mod image;
pub mod loader;
pub mod metadata;
pub mod patch;
pub mod pipeline;
pub mod prelude;
pub mod swap;

/// `cilpatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. Used consistently throughout the crate for all fallible
/// operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `cilpatch` Error type
///
/// The main error type for all operations in this crate. Covers image parsing,
/// structural resolution, instruction patching and the file swap protocol.
pub use error::Error;

/// Provides access to low-level parsing utilities.
///
/// The [`Parser`] type is a bounds-checked cursor over a byte slice, used for
/// decoding both the module image container and CIL bytecode.
///
/// # Example
///
/// ```rust
/// use cilpatch::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_le::<u32>()?, 0x0403_0201);
/// # Ok::<(), cilpatch::Error>(())
/// ```
pub use file::{parser::Parser, File};

/// Entry point for loading module images from disk.
///
/// See [`loader::Loader`] for search-directory configuration and read-only
/// versus writable loads.
pub use loader::Loader;
