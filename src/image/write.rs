//! Module image serialization.

use std::{fs, path::Path};

use crate::{
    cil::assembler::encode_body,
    file::writer::ByteWriter,
    image::{MAGIC, VERSION},
    metadata::{
        method::Method,
        module::{MemberRefKind, Module},
        types::{TypeDef, TypeRef},
    },
    Error, Result,
};

/// Serialize a module to image bytes.
///
/// # Errors
/// Returns [`crate::Error::ReadOnly`] if the module was loaded read-only, or
/// [`crate::Error::Malformed`] if a method body cannot be encoded.
pub fn serialize(module: &Module) -> Result<Vec<u8>> {
    if !module.writable() {
        return Err(Error::ReadOnly(module.name.clone()));
    }

    let mut writer = ByteWriter::new();
    writer.write_bytes(&MAGIC);
    writer.write_le(VERSION);
    writer.write_le(module.attributes.bits());
    writer.write_prefixed_string_utf8(&module.name)?;

    writer.write_compressed_uint(module.extern_modules().len() as u32)?;
    for extern_module in module.extern_modules() {
        writer.write_prefixed_string_utf8(&extern_module.name)?;
    }

    writer.write_compressed_uint(module.member_refs().len() as u32)?;
    for member_ref in module.member_refs() {
        writer.write_le(match member_ref.kind {
            MemberRefKind::Field => 0_u8,
            MemberRefKind::Method => 1_u8,
        });
        writer.write_compressed_uint(member_ref.module as u32)?;
        writer.write_prefixed_string_utf8(&member_ref.type_namespace)?;
        writer.write_prefixed_string_utf8(&member_ref.type_name)?;
        writer.write_prefixed_string_utf8(&member_ref.name)?;
    }

    writer.write_compressed_uint(module.user_strings().len() as u32)?;
    for user_string in module.user_strings() {
        writer.write_prefixed_string_utf8(user_string)?;
    }

    writer.write_compressed_uint(module.types.len() as u32)?;
    for type_def in &module.types {
        write_type(&mut writer, type_def)?;
    }

    Ok(writer.into_bytes())
}

fn write_type(writer: &mut ByteWriter, type_def: &TypeDef) -> Result<()> {
    writer.write_prefixed_string_utf8(&type_def.namespace)?;
    writer.write_prefixed_string_utf8(&type_def.name)?;

    match &type_def.base {
        None => writer.write_le(0_u8),
        Some(TypeRef::Internal(index)) => {
            writer.write_le(1_u8);
            writer.write_compressed_uint(*index as u32)?;
        }
        Some(TypeRef::External {
            module,
            namespace,
            name,
        }) => {
            writer.write_le(2_u8);
            writer.write_compressed_uint(*module as u32)?;
            writer.write_prefixed_string_utf8(namespace)?;
            writer.write_prefixed_string_utf8(name)?;
        }
    }

    writer.write_compressed_uint(type_def.fields.len() as u32)?;
    for field in &type_def.fields {
        writer.write_prefixed_string_utf8(&field.name)?;
        writer.write_prefixed_string_utf8(&field.type_name)?;
    }

    writer.write_compressed_uint(type_def.properties.len() as u32)?;
    for property in &type_def.properties {
        writer.write_prefixed_string_utf8(&property.name)?;
        writer.write_prefixed_string_utf8(&property.type_name)?;
        writer.write_compressed_uint(encode_accessor(property.getter))?;
        writer.write_compressed_uint(encode_accessor(property.setter))?;
    }

    writer.write_compressed_uint(type_def.methods.len() as u32)?;
    for method in &type_def.methods {
        write_method(writer, method)?;
    }

    Ok(())
}

fn encode_accessor(accessor: Option<usize>) -> u32 {
    match accessor {
        None => 0,
        Some(ordinal) => ordinal as u32 + 1,
    }
}

fn write_method(writer: &mut ByteWriter, method: &Method) -> Result<()> {
    writer.write_prefixed_string_utf8(&method.name)?;
    writer.write_le(method.flags.bits());

    let encoded = encode_body(&method.body)?;
    writer.write_le(method.body.max_stack);
    writer.write_compressed_uint(encoded.code.len() as u32)?;
    writer.write_bytes(&encoded.code);

    writer.write_compressed_uint(encoded.exceptions.len() as u32)?;
    for region in &encoded.exceptions {
        writer.write_le(region.kind);
        writer.write_le(region.class_token);
        writer.write_le(region.try_offset);
        writer.write_le(region.try_length);
        writer.write_le(region.handler_offset);
        writer.write_le(region.handler_length);
    }

    Ok(())
}

/// Serialize a module and write it to `output_path`.
///
/// `output_path` must differ from the path the module was loaded from:
/// writing in place while another handle may still reference the original is
/// not supported. A failed write leaves the partial output file in an
/// indeterminate state; callers must not treat it as valid (the swap protocol
/// never promotes a staged file unless this call succeeded).
///
/// # Errors
/// Returns [`crate::Error::FileState`] if `output_path` equals the module's
/// source path, [`crate::Error::ReadOnly`] for read-only loads, and
/// [`crate::Error::Io`] with the failing path on write failure.
pub fn write_module(module: &Module, output_path: &Path) -> Result<()> {
    if module.source_path() == Some(output_path) {
        return Err(Error::FileState {
            path: output_path.to_path_buf(),
            message: "output path must differ from the module's source path".into(),
        });
    }

    let bytes = serialize(module)?;
    fs::write(output_path, bytes).map_err(|source| io_error!(output_path, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_module_is_refused() {
        let mut module = Module::new("m.dll");
        module.set_writable(false);
        assert!(matches!(serialize(&module), Err(Error::ReadOnly(_))));
    }

    #[test]
    fn refuses_write_to_source_path() {
        let mut module = Module::new("m.dll");
        module.set_source_path(Path::new("/tmp/m.dll"));
        assert!(matches!(
            write_module(&module, Path::new("/tmp/m.dll")),
            Err(Error::FileState { .. })
        ));
    }
}
