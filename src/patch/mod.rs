//! Structural signature resolution and instruction patching.
//!
//! This module is the engine core. [`resolve`] locates the patch target
//! inside a loaded module by structural signature: declaring type name,
//! member kind and declared element-type name, never positional metadata
//! offsets. Matching by shape survives reordering of unrelated members across
//! releases of the target module, at the cost of failing loudly when the
//! one-field/one-property uniqueness assumption breaks.
//!
//! [`apply`] then splices the patch into the resolved target:
//!
//! - every constructor stores the configured flag into the flag field and
//!   forces the import mode to its most permissive value before each of its
//!   returns, and
//! - the flag property setter is rewritten so every incoming value is OR'd
//!   with the configured flag, which keeps the flag set even when later code
//!   paths reassign the property.
//!
//! # Example
//!
//! ```rust,no_run
//! use cilpatch::{patch, Loader};
//! use std::path::Path;
//!
//! let mut module = Loader::new().load(Path::new("options.dll"), true)?;
//! let signature = patch::TargetSignature::default();
//! let target = patch::resolve(&mut module, &signature)?;
//! patch::apply(&mut module, &target, &signature, patch::DEFAULT_FLAG)?;
//! # Ok::<(), cilpatch::Error>(())
//! ```

mod patcher;
mod signature;

pub use patcher::{
    apply, normalize_attributes, patch_constructors, patch_flag_setter, CONSTRUCTOR_BLOCK_LEN,
    DEFAULT_FLAG,
};
pub use signature::{resolve, PatchTarget, TargetSignature};
