//! Structural signature resolution.

use crate::{
    metadata::{
        module::{MemberRef, MemberRefKind, Module},
        query::Lookup,
        token::Token,
        types::{TypeDef, TypeRef},
    },
    Error, Result,
};

/// The structural signature of the patch target.
///
/// Lookups match on these names exactly. The defaults describe the known
/// compiler component; tests and unusual deployments can substitute their
/// own shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSignature {
    /// Namespace of the target type.
    pub type_namespace: String,
    /// Name of the target type.
    pub type_name: String,
    /// Element-type name identifying the flag field (and the flag property on
    /// the target type).
    pub flag_type: String,
    /// Element-type name identifying the import-mode property on the base
    /// type.
    pub import_mode_type: String,
}

impl Default for TargetSignature {
    fn default() -> Self {
        TargetSignature {
            type_namespace: "Microsoft.CodeAnalysis.CSharp".into(),
            type_name: "CSharpCompilationOptions".into(),
            flag_type: "BinderFlags".into(),
            import_mode_type: "MetadataImportOptions".into(),
        }
    }
}

/// The resolved patch target.
///
/// Produced once per patch run by [`resolve`]; read-only afterwards. Tokens
/// are valid within the module the target was resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTarget {
    type_index: usize,
    flag_field: Token,
    setter: Token,
    getter: Token,
    constructors: Vec<usize>,
}

impl PatchTarget {
    /// Index of the target type in the module's type table.
    #[must_use]
    pub fn type_index(&self) -> usize {
        self.type_index
    }

    /// Token of the flag field.
    #[must_use]
    pub fn flag_field(&self) -> Token {
        self.flag_field
    }

    /// Token of the import-mode property setter.
    #[must_use]
    pub fn setter(&self) -> Token {
        self.setter
    }

    /// Token of the import-mode property getter.
    #[must_use]
    pub fn getter(&self) -> Token {
        self.getter
    }

    /// Ordinals of the target type's constructors, all of which get patched.
    #[must_use]
    pub fn constructors(&self) -> &[usize] {
        &self.constructors
    }
}

/// Resolve the patch target inside `module`.
///
/// The four steps, in order:
///
/// 1. Locate the type whose namespace and name match the signature exactly.
/// 2. Within it, locate the unique field whose declared element-type name
///    equals the flag-type name.
/// 3. Resolve the type's base type and locate the unique property whose
///    declared element-type name equals the import-mode type name. When the
///    base type lives in another module, references to the property's getter
///    and setter are imported into this module's reference table; an internal
///    base type yields direct method-definition tokens.
/// 4. Collect every constructor of the target type. The component exposes
///    multiple overloads, and all of them must set the flag.
///
/// # Errors
/// [`crate::Error::TargetTypeNotFound`] if the target or base type is absent;
/// [`crate::Error::MemberNotFound`] / [`crate::Error::AmbiguousMember`] when
/// a uniqueness lookup yields zero or many matches;
/// [`crate::Error::MissingBaseType`] if the target type has no base;
/// [`crate::Error::UnresolvedReference`] if the base type's module was not
/// attached during load.
pub fn resolve(module: &mut Module, signature: &TargetSignature) -> Result<PatchTarget> {
    let type_index = module
        .type_index(&signature.type_namespace, &signature.type_name)
        .ok_or_else(|| {
            Error::TargetTypeNotFound(format!(
                "{}.{}",
                signature.type_namespace, signature.type_name
            ))
        })?;

    let target_type = &module.types[type_index];
    let full_name = target_type.full_name();

    let field_index = match Lookup::unique(
        target_type
            .fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.type_name == signature.flag_type)
            .map(|(index, _)| index),
    ) {
        Lookup::Found(index) => index,
        Lookup::NotFound => {
            return Err(Error::MemberNotFound {
                declaring_type: full_name,
                member: format!("field of type {}", signature.flag_type),
            })
        }
        Lookup::Ambiguous => {
            return Err(Error::AmbiguousMember {
                declaring_type: full_name,
                member: format!("field of type {}", signature.flag_type),
            })
        }
    };
    let flag_field = module.field_token(type_index, field_index);

    let base = target_type
        .base
        .clone()
        .ok_or_else(|| Error::MissingBaseType(full_name.clone()))?;
    let (getter, setter) = resolve_import_mode_accessors(module, base, signature)?;

    let constructors = module.types[type_index].constructors();

    log::debug!(
        "resolved {}: flag field {}, setter {}, {} constructor(s)",
        full_name,
        flag_field,
        setter,
        constructors.len()
    );

    Ok(PatchTarget {
        type_index,
        flag_field,
        setter,
        getter,
        constructors,
    })
}

/// Locate the import-mode property on the base type and return
/// `(getter, setter)` tokens usable from the target module.
fn resolve_import_mode_accessors(
    module: &mut Module,
    base: TypeRef,
    signature: &TargetSignature,
) -> Result<(Token, Token)> {
    match base {
        TypeRef::Internal(base_index) => {
            let base_type = module.types.get(base_index).ok_or_else(|| {
                malformed_error!("Base type index {} is out of range", base_index)
            })?;
            let (getter_ordinal, setter_ordinal) =
                import_mode_accessor_ordinals(base_type, signature)?;
            Ok((
                module.method_token(base_index, getter_ordinal),
                module.method_token(base_index, setter_ordinal),
            ))
        }
        TypeRef::External {
            module: extern_index,
            namespace,
            name,
        } => {
            // Pull the accessor names out of the external module first; the
            // import below needs the target module mutably.
            let (getter_name, setter_name) = {
                let external = module.extern_modules()[extern_index]
                    .resolved()
                    .ok_or_else(|| {
                        Error::UnresolvedReference(
                            module.extern_modules()[extern_index].name.clone(),
                        )
                    })?;
                let base_index = external.type_index(&namespace, &name).ok_or_else(|| {
                    Error::TargetTypeNotFound(format!("{namespace}.{name}"))
                })?;
                let base_type = &external.types[base_index];
                let (getter_ordinal, setter_ordinal) =
                    import_mode_accessor_ordinals(base_type, signature)?;
                (
                    base_type.methods[getter_ordinal].name.clone(),
                    base_type.methods[setter_ordinal].name.clone(),
                )
            };

            let getter = module.import_member(MemberRef {
                kind: MemberRefKind::Method,
                module: extern_index,
                type_namespace: namespace.clone(),
                type_name: name.clone(),
                name: getter_name,
            });
            let setter = module.import_member(MemberRef {
                kind: MemberRefKind::Method,
                module: extern_index,
                type_namespace: namespace,
                type_name: name,
                name: setter_name,
            });
            Ok((getter, setter))
        }
    }
}

/// Locate the unique import-mode property on `base_type` and return its
/// `(getter, setter)` method ordinals.
fn import_mode_accessor_ordinals(
    base_type: &TypeDef,
    signature: &TargetSignature,
) -> Result<(usize, usize)> {
    let full_name = base_type.full_name();

    let property = match Lookup::unique(
        base_type
            .properties
            .iter()
            .filter(|property| property.type_name == signature.import_mode_type),
    ) {
        Lookup::Found(property) => property,
        Lookup::NotFound => {
            return Err(Error::MemberNotFound {
                declaring_type: full_name,
                member: format!("property of type {}", signature.import_mode_type),
            })
        }
        Lookup::Ambiguous => {
            return Err(Error::AmbiguousMember {
                declaring_type: full_name,
                member: format!("property of type {}", signature.import_mode_type),
            })
        }
    };

    let getter = property.getter.ok_or_else(|| Error::MemberNotFound {
        declaring_type: full_name.clone(),
        member: format!("get accessor of property {}", property.name),
    })?;
    let setter = property.setter.ok_or_else(|| Error::MemberNotFound {
        declaring_type: full_name.clone(),
        member: format!("set accessor of property {}", property.name),
    })?;

    Ok((getter, setter))
}
