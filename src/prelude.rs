//! Convenient re-exports of the most commonly used types.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilpatch::prelude::*;
//! use std::path::Path;
//!
//! let options = PatchOptions::default();
//! enable(Path::new("module.dll"), &options)?;
//! # Ok::<(), cilpatch::Error>(())
//! ```

pub use crate::{
    cil::{InstrId, Instruction, OpCode, Operand},
    loader::Loader,
    metadata::{
        query::Lookup, Field, MemberRef, MemberRefKind, Method, MethodAttributes, MethodBody,
        Module, ModuleAttributes, Property, Token, TypeDef, TypeRef,
    },
    patch::{apply, resolve, PatchTarget, TargetSignature, CONSTRUCTOR_BLOCK_LEN, DEFAULT_FLAG},
    pipeline::{disable, enable, PatchOptions},
    swap::FilePatchState,
    Error, File, Parser, Result,
};
