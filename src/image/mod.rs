//! The compact module image container format.
//!
//! A module image is a single-file container holding everything the patch
//! engine needs from a managed module: the module header, the reference
//! tables, the type definitions with their members, and the encoded CIL
//! method bodies. [`crate::image::read::read_module`] parses an image into a
//! mutable [`crate::metadata::Module`];
//! [`crate::image::write::write_module`] serializes a module back out.
//!
//! # Layout
//!
//! All multi-byte integers are little-endian. Counts, ordinals and string
//! lengths use the standard compressed unsigned encoding; strings are
//! length-prefixed UTF-8.
//!
//! ```text
//! header:
//!   magic       "CMOD" (4 bytes)
//!   version     u16 (currently 1)
//!   attributes  u32 (module attribute flags)
//!   name        string
//! extern modules:
//!   count, then per entry: name
//! member refs:
//!   count, then per entry:
//!     kind           u8 (0 = field, 1 = method)
//!     module         compressed extern-module index
//!     type namespace string
//!     type name      string
//!     member name    string
//! user strings:
//!   count, then per entry: string (backs `ldstr` token operands)
//! types:
//!   count, then per type:
//!     namespace, name   strings
//!     base tag          u8 (0 = none, 1 = internal, 2 = external)
//!       internal: compressed type index
//!       external: compressed extern-module index, namespace, name
//!     fields            count, then per field: name, element-type name
//!     properties        count, then per property:
//!                         name, element-type name,
//!                         getter ordinal + 1 (0 = none),
//!                         setter ordinal + 1 (0 = none)
//!     methods           count, then per method:
//!                         name, flags u32,
//!                         max stack u16,
//!                         code length, code bytes,
//!                         exception count, then per region:
//!                           kind u8, class token u32,
//!                           try offset u32, try length u32,
//!                           handler offset u32, handler length u32
//! ```
//!
//! Field and method rows are flattened across types in declaration order for
//! token assignment; see [`crate::metadata::Module::field_token`].

pub mod read;
pub mod write;

/// Magic bytes at the start of every module image.
pub const MAGIC: [u8; 4] = *b"CMOD";

/// The container version this crate reads and writes.
pub const VERSION: u16 = 1;
