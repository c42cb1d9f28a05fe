//! Type definitions and their members.

use crate::metadata::method::Method;

/// Reference to a base type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A type defined in the same module, by type-definition index.
    Internal(usize),
    /// A type defined in an external module.
    External {
        /// Index into the owning module's external-module table.
        module: usize,
        /// Namespace of the referenced type.
        namespace: String,
        /// Name of the referenced type.
        name: String,
    },
}

/// An instance field: name and declared element-type name.
///
/// The element type is recorded by simple name only; structural lookups match
/// on it, which is what lets resolution survive reordering of unrelated
/// members across releases of the target module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Simple name of the declared element type.
    pub type_name: String,
}

/// A property: name, declared element-type name, and accessor ordinals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Simple name of the declared element type.
    pub type_name: String,
    /// Ordinal of the getter within the declaring type's method list.
    pub getter: Option<usize>,
    /// Ordinal of the setter within the declaring type's method list.
    pub setter: Option<usize>,
}

/// A type definition with its ordered member lists.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// Declaring namespace; empty for the global namespace.
    pub namespace: String,
    /// Type name.
    pub name: String,
    /// Base type, if any.
    pub base: Option<TypeRef>,
    /// Instance fields, in declaration order.
    pub fields: Vec<Field>,
    /// Properties, in declaration order.
    pub properties: Vec<Property>,
    /// Methods (including constructors), in declaration order.
    pub methods: Vec<Method>,
}

impl TypeDef {
    /// Create an empty type definition.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeDef {
            namespace: namespace.into(),
            name: name.into(),
            base: None,
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// The namespace-qualified type name.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Ordinals of all instance constructors, in declaration order.
    #[must_use]
    pub fn constructors(&self) -> Vec<usize> {
        self.methods
            .iter()
            .enumerate()
            .filter(|(_, method)| method.is_constructor())
            .map(|(ordinal, _)| ordinal)
            .collect()
    }
}
