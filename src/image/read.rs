//! Module image parsing.

use crate::{
    cil::{assembler, decoder::decode_body},
    file::parser::Parser,
    image::{MAGIC, VERSION},
    metadata::{
        method::{ExceptionKind, ExceptionRegion, Method, MethodAttributes, MethodBody},
        module::{MemberRef, MemberRefKind, Module, ModuleAttributes},
        token::Token,
        types::{Field, Property, TypeDef, TypeRef},
    },
    Error, Result,
};

/// Parse a module image from raw bytes.
///
/// The returned module is writable; the loader downgrades read-only loads.
///
/// # Errors
/// Returns [`crate::Error::Empty`] for empty input,
/// [`crate::Error::NotSupported`] for inputs that are not module images (or a
/// newer container version), and [`crate::Error::Malformed`] /
/// [`crate::Error::OutOfBounds`] for structurally damaged images.
pub fn read_module(data: &[u8]) -> Result<Module> {
    if data.is_empty() {
        return Err(Error::Empty);
    }

    let mut parser = Parser::new(data);

    if parser.read_bytes(4)? != MAGIC {
        return Err(Error::NotSupported);
    }
    if parser.read_le::<u16>()? != VERSION {
        return Err(Error::NotSupported);
    }

    let raw_attributes = parser.read_le::<u32>()?;
    let attributes = ModuleAttributes::from_bits(raw_attributes)
        .ok_or_else(|| malformed_error!("Unknown module attribute bits: {:#010X}", raw_attributes))?;
    let name = parser.read_prefixed_string_utf8()?;

    let mut module = Module::new(name);
    module.attributes = attributes;

    let extern_count = parser.read_compressed_uint()? as usize;
    for _ in 0..extern_count {
        let extern_name = parser.read_prefixed_string_utf8()?;
        module.add_extern_module(extern_name);
    }

    let member_ref_count = parser.read_compressed_uint()? as usize;
    for _ in 0..member_ref_count {
        let kind = match parser.read_le::<u8>()? {
            0 => MemberRefKind::Field,
            1 => MemberRefKind::Method,
            other => return Err(malformed_error!("Unknown member reference kind: {}", other)),
        };
        let extern_index = parser.read_compressed_uint()? as usize;
        if extern_index >= extern_count {
            return Err(malformed_error!(
                "Member reference names extern module {} of {}",
                extern_index,
                extern_count
            ));
        }
        let type_namespace = parser.read_prefixed_string_utf8()?;
        let type_name = parser.read_prefixed_string_utf8()?;
        let member_name = parser.read_prefixed_string_utf8()?;
        module.push_member_ref(MemberRef {
            kind,
            module: extern_index,
            type_namespace,
            type_name,
            name: member_name,
        });
    }

    let user_string_count = parser.read_compressed_uint()? as usize;
    for _ in 0..user_string_count {
        let value = parser.read_prefixed_string_utf8()?;
        module.push_user_string(value);
    }

    let type_count = parser.read_compressed_uint()? as usize;
    for _ in 0..type_count {
        let type_def = read_type(&mut parser, extern_count)?;
        module.types.push(type_def);
    }

    // Internal base references and accessor ordinals can point forward, so
    // they are validated only after the full type table is known.
    for type_def in &module.types {
        if let Some(TypeRef::Internal(index)) = &type_def.base {
            if *index >= module.types.len() {
                return Err(malformed_error!(
                    "Type {} has base index {} of {}",
                    type_def.full_name(),
                    index,
                    module.types.len()
                ));
            }
        }
        for property in &type_def.properties {
            for accessor in [property.getter, property.setter].into_iter().flatten() {
                if accessor >= type_def.methods.len() {
                    return Err(malformed_error!(
                        "Property {}.{} references method ordinal {} of {}",
                        type_def.full_name(),
                        property.name,
                        accessor,
                        type_def.methods.len()
                    ));
                }
            }
        }
    }

    if parser.has_more_data() {
        return Err(malformed_error!(
            "Trailing data after module image at offset {}",
            parser.pos()
        ));
    }

    Ok(module)
}

fn read_type(parser: &mut Parser<'_>, extern_count: usize) -> Result<TypeDef> {
    let namespace = parser.read_prefixed_string_utf8()?;
    let name = parser.read_prefixed_string_utf8()?;
    let mut type_def = TypeDef::new(namespace, name);

    type_def.base = match parser.read_le::<u8>()? {
        0 => None,
        1 => Some(TypeRef::Internal(parser.read_compressed_uint()? as usize)),
        2 => {
            let extern_index = parser.read_compressed_uint()? as usize;
            if extern_index >= extern_count {
                return Err(malformed_error!(
                    "Base type names extern module {} of {}",
                    extern_index,
                    extern_count
                ));
            }
            Some(TypeRef::External {
                module: extern_index,
                namespace: parser.read_prefixed_string_utf8()?,
                name: parser.read_prefixed_string_utf8()?,
            })
        }
        other => return Err(malformed_error!("Unknown base type tag: {}", other)),
    };

    let field_count = parser.read_compressed_uint()? as usize;
    for _ in 0..field_count {
        type_def.fields.push(Field {
            name: parser.read_prefixed_string_utf8()?,
            type_name: parser.read_prefixed_string_utf8()?,
        });
    }

    let property_count = parser.read_compressed_uint()? as usize;
    for _ in 0..property_count {
        let property_name = parser.read_prefixed_string_utf8()?;
        let type_name = parser.read_prefixed_string_utf8()?;
        let getter = decode_accessor(parser.read_compressed_uint()?);
        let setter = decode_accessor(parser.read_compressed_uint()?);
        type_def.properties.push(Property {
            name: property_name,
            type_name,
            getter,
            setter,
        });
    }

    let method_count = parser.read_compressed_uint()? as usize;
    for _ in 0..method_count {
        type_def.methods.push(read_method(parser)?);
    }

    Ok(type_def)
}

fn decode_accessor(encoded: u32) -> Option<usize> {
    if encoded == 0 {
        None
    } else {
        Some(encoded as usize - 1)
    }
}

fn read_method(parser: &mut Parser<'_>) -> Result<Method> {
    let name = parser.read_prefixed_string_utf8()?;
    let raw_flags = parser.read_le::<u32>()?;
    let flags = MethodAttributes::from_bits(raw_flags)
        .ok_or_else(|| malformed_error!("Unknown method attribute bits: {:#010X}", raw_flags))?;

    let max_stack = parser.read_le::<u16>()?;
    let code_length = parser.read_compressed_uint()? as usize;
    let code = parser.read_bytes(code_length)?;
    let decoded = decode_body(code)?;

    let exception_count = parser.read_compressed_uint()? as usize;
    let mut exceptions = Vec::with_capacity(exception_count);
    for _ in 0..exception_count {
        let kind_tag = parser.read_le::<u8>()?;
        let class_token = parser.read_le::<u32>()?;
        let kind = match kind_tag {
            assembler::EH_KIND_CATCH => ExceptionKind::Catch(Token::new(class_token)),
            assembler::EH_KIND_FILTER => ExceptionKind::Filter,
            assembler::EH_KIND_FINALLY => ExceptionKind::Finally,
            assembler::EH_KIND_FAULT => ExceptionKind::Fault,
            other => return Err(malformed_error!("Unknown exception handler kind: {}", other)),
        };

        let try_offset = parser.read_le::<u32>()?;
        let try_length = parser.read_le::<u32>()?;
        let handler_offset = parser.read_le::<u32>()?;
        let handler_length = parser.read_le::<u32>()?;

        let anchor = |offset: u32, description: &str| {
            decoded.instruction_at(offset).ok_or_else(|| {
                malformed_error!(
                    "Exception {} offset {:#X} in {} is not an instruction boundary",
                    description,
                    offset,
                    name
                )
            })
        };
        let end_anchor = |end: u32, description: &str| {
            decoded.instruction_ending_at(end).ok_or_else(|| {
                malformed_error!(
                    "Exception {} end {:#X} in {} is not an instruction boundary",
                    description,
                    end,
                    name
                )
            })
        };

        exceptions.push(ExceptionRegion {
            kind,
            try_start: anchor(try_offset, "try")?,
            try_end: end_anchor(try_offset + try_length, "try")?,
            handler_start: anchor(handler_offset, "handler")?,
            handler_end: end_anchor(handler_offset + handler_length, "handler")?,
        });
    }

    Ok(Method {
        name,
        flags,
        body: MethodBody::from_parts(max_stack, decoded.instructions, exceptions),
    })
}
