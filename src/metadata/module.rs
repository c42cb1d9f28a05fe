//! The loaded module and its reference tables.

use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::metadata::{token::Token, types::TypeDef};

bitflags! {
    /// Attribute flags of a module image.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleAttributes: u32 {
        /// The module contains only managed code.
        const IL_ONLY = 0x0001;
        /// The module requires a 32-bit process.
        const REQUIRED_32BIT = 0x0002;
        /// The module is a library of managed code with native entry stubs.
        const IL_LIBRARY = 0x0004;
        /// The module carries a strong name signature.
        const STRONG_NAME_SIGNED = 0x0008;
    }
}

/// Kind of member a [`MemberRef`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRefKind {
    /// Reference to a field.
    Field,
    /// Reference to a method.
    Method,
}

/// A reference to a member declared in an external module.
///
/// Internal members are addressed by definition token directly; member
/// references exist so instruction operands can name members of types that
/// live in a different module (e.g. an accessor on a base type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Whether this references a field or a method.
    pub kind: MemberRefKind,
    /// Index into the owning module's external-module table.
    pub module: usize,
    /// Namespace of the declaring type.
    pub type_namespace: String,
    /// Name of the declaring type.
    pub type_name: String,
    /// Name of the referenced member.
    pub name: String,
}

/// An entry of the external-module table.
///
/// Only the module name is persisted in the image; the loader attaches the
/// parsed module after locating the file in its search directories.
#[derive(Debug)]
pub struct ExternModule {
    /// File name of the referenced module.
    pub name: String,
    resolved: Option<Box<Module>>,
}

impl ExternModule {
    /// Create an unresolved entry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ExternModule {
            name: name.into(),
            resolved: None,
        }
    }

    /// The parsed module, once the loader has resolved the reference.
    #[must_use]
    pub fn resolved(&self) -> Option<&Module> {
        self.resolved.as_deref()
    }
}

/// The loaded binary unit: module attributes, type definitions and reference
/// tables.
///
/// A `Module` is exclusively owned by one pipeline invocation for its entire
/// lifetime and passed by unique ownership through Load, Resolve, Patch and
/// Write. Mutation is only permitted for writable loads.
#[derive(Debug)]
pub struct Module {
    /// Module (file) name.
    pub name: String,
    /// Module attribute flags.
    pub attributes: ModuleAttributes,
    /// Type definitions, in metadata order.
    pub types: Vec<TypeDef>,
    extern_modules: Vec<ExternModule>,
    member_refs: Vec<MemberRef>,
    user_strings: Vec<String>,
    writable: bool,
    source_path: Option<PathBuf>,
}

impl Module {
    /// Create an empty, writable module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            attributes: ModuleAttributes::IL_ONLY,
            types: Vec::new(),
            extern_modules: Vec::new(),
            member_refs: Vec::new(),
            user_strings: Vec::new(),
            writable: true,
            source_path: None,
        }
    }

    /// Returns `true` if this module may be mutated and re-serialized.
    #[must_use]
    pub fn writable(&self) -> bool {
        self.writable
    }

    pub(crate) fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    /// The file the module was loaded from, if any.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub(crate) fn set_source_path(&mut self, path: &Path) {
        self.source_path = Some(path.to_path_buf());
    }

    /// The external-module table.
    #[must_use]
    pub fn extern_modules(&self) -> &[ExternModule] {
        &self.extern_modules
    }

    /// Add an external-module entry, returning its index.
    ///
    /// An entry with the same name is reused rather than duplicated.
    pub fn add_extern_module(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(index) = self
            .extern_modules
            .iter()
            .position(|entry| entry.name == name)
        {
            return index;
        }
        self.extern_modules.push(ExternModule::new(name));
        self.extern_modules.len() - 1
    }

    pub(crate) fn attach_resolved(&mut self, index: usize, module: Module) {
        self.extern_modules[index].resolved = Some(Box::new(module));
    }

    /// The member-reference table.
    #[must_use]
    pub fn member_refs(&self) -> &[MemberRef] {
        &self.member_refs
    }

    pub(crate) fn push_member_ref(&mut self, member_ref: MemberRef) -> Token {
        self.member_refs.push(member_ref);
        Token::member_ref(self.member_refs.len() as u32)
    }

    /// Import a member reference into this module's reference table.
    ///
    /// Returns the token of the (possibly pre-existing) reference; importing
    /// the same member twice yields the same token.
    pub fn import_member(&mut self, member_ref: MemberRef) -> Token {
        if let Some(index) = self
            .member_refs
            .iter()
            .position(|existing| *existing == member_ref)
        {
            return Token::member_ref(index as u32 + 1);
        }
        self.push_member_ref(member_ref)
    }

    /// The user-string table backing `ldstr` operands.
    #[must_use]
    pub fn user_strings(&self) -> &[String] {
        &self.user_strings
    }

    /// Intern a string literal, returning its user-string token.
    ///
    /// Interning the same literal twice yields the same token.
    pub fn add_user_string(&mut self, value: impl Into<String>) -> Token {
        let value = value.into();
        if let Some(index) = self.user_strings.iter().position(|existing| *existing == value) {
            return Token::user_string(index as u32 + 1);
        }
        self.user_strings.push(value);
        Token::user_string(self.user_strings.len() as u32)
    }

    pub(crate) fn push_user_string(&mut self, value: String) {
        self.user_strings.push(value);
    }

    /// Find a type definition by exact namespace and name.
    #[must_use]
    pub fn type_index(&self, namespace: &str, name: &str) -> Option<usize> {
        self.types
            .iter()
            .position(|type_def| type_def.namespace == namespace && type_def.name == name)
    }

    /// The token of the type definition at `type_index`.
    #[must_use]
    pub fn type_token(&self, type_index: usize) -> Token {
        Token::type_def(type_index as u32 + 1)
    }

    /// The token of a field, addressed by declaring type and field ordinal.
    ///
    /// Field rows are flattened across types in declaration order, exactly as
    /// the image serializes them.
    #[must_use]
    pub fn field_token(&self, type_index: usize, field_index: usize) -> Token {
        let preceding: usize = self.types[..type_index]
            .iter()
            .map(|type_def| type_def.fields.len())
            .sum();
        Token::field((preceding + field_index) as u32 + 1)
    }

    /// The token of a method, addressed by declaring type and method ordinal.
    ///
    /// Method rows are flattened across types in declaration order, exactly
    /// as the image serializes them.
    #[must_use]
    pub fn method_token(&self, type_index: usize, method_index: usize) -> Token {
        let preceding: usize = self.types[..type_index]
            .iter()
            .map(|type_def| type_def.methods.len())
            .sum();
        Token::method_def((preceding + method_index) as u32 + 1)
    }
}
