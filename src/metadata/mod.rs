//! Mutable in-memory model of a managed module.
//!
//! This module defines the metadata half of a loaded module image: the module
//! itself, its type definitions, their members, and the token scheme that ties
//! instruction operands back to members. The model is exclusively owned by one
//! patch pipeline invocation for its entire lifetime and is mutated in place
//! by the signature resolver (which imports member references) and the
//! instruction patcher (which splices into method bodies).
//!
//! # Key Types
//!
//! - [`crate::metadata::Module`] - The loaded binary unit, owning all types
//! - [`crate::metadata::TypeDef`] - A type with ordered fields, properties and
//!   methods
//! - [`crate::metadata::Method`] / [`crate::metadata::method::MethodBody`] -
//!   Methods and their decoded instruction sequences
//! - [`crate::metadata::Token`] - 32-bit metadata token (table kind in the
//!   high byte, row in the low 24 bits)
//! - [`crate::metadata::query::Lookup`] - Sum type for structural member
//!   queries (found / not found / ambiguous)

pub mod method;
pub mod module;
pub mod query;
pub mod token;
pub mod types;

pub use method::{ExceptionKind, ExceptionRegion, Method, MethodAttributes, MethodBody};
pub use module::{ExternModule, MemberRef, MemberRefKind, Module, ModuleAttributes};
pub use token::Token;
pub use types::{Field, Property, TypeDef, TypeRef};
