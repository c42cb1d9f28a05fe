//! Structural resolution failures against deployed module files.

mod common;

use std::fs;

use cilpatch::{
    image::write::serialize,
    pipeline::{self, PatchOptions},
    prelude::*,
};

const BASE_MODULE: &str = "Microsoft.CodeAnalysis.dll";
const TARGET_MODULE: &str = "Microsoft.CodeAnalysis.CSharp.dll";

fn deploy_with(
    dir: &std::path::Path,
    base: Option<&Module>,
    target: &Module,
) -> std::path::PathBuf {
    if let Some(base) = base {
        fs::write(dir.join(BASE_MODULE), serialize(base).unwrap()).unwrap();
    }
    let active = dir.join(TARGET_MODULE);
    fs::write(&active, serialize(target).unwrap()).unwrap();
    active
}

#[test]
fn two_flag_fields_are_ambiguous_not_first_match() {
    let dir = tempfile::tempdir().unwrap();
    let base = common::base_module(BASE_MODULE);

    let mut target = common::target_module(BASE_MODULE);
    target.types[0].fields.push(Field {
        name: "_lazyBinderFlags".into(),
        type_name: "BinderFlags".into(),
    });
    let active = deploy_with(dir.path(), Some(&base), &target);

    assert!(matches!(
        pipeline::enable(&active, &PatchOptions::default()),
        Err(Error::AmbiguousMember { .. })
    ));
}

#[test]
fn missing_flag_field_is_member_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let base = common::base_module(BASE_MODULE);

    let mut target = common::target_module(BASE_MODULE);
    target.types[0].fields.clear();
    let active = deploy_with(dir.path(), Some(&base), &target);

    assert!(matches!(
        pipeline::enable(&active, &PatchOptions::default()),
        Err(Error::MemberNotFound { .. })
    ));
}

#[test]
fn missing_import_mode_property_is_member_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut base = common::base_module(BASE_MODULE);
    base.types[0].properties.clear();

    let target = common::target_module(BASE_MODULE);
    let active = deploy_with(dir.path(), Some(&base), &target);

    assert!(matches!(
        pipeline::enable(&active, &PatchOptions::default()),
        Err(Error::MemberNotFound { .. })
    ));
}

#[test]
fn renamed_target_type_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let base = common::base_module(BASE_MODULE);

    let mut target = common::target_module(BASE_MODULE);
    target.types[0].name = "VisualBasicCompilationOptions".into();
    let active = deploy_with(dir.path(), Some(&base), &target);

    assert!(matches!(
        pipeline::enable(&active, &PatchOptions::default()),
        Err(Error::TargetTypeNotFound(_))
    ));
}

#[test]
fn target_without_base_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let base = common::base_module(BASE_MODULE);

    let mut target = common::target_module(BASE_MODULE);
    target.types[0].base = None;
    let active = deploy_with(dir.path(), Some(&base), &target);

    assert!(matches!(
        pipeline::enable(&active, &PatchOptions::default()),
        Err(Error::MissingBaseType(_))
    ));
}

#[test]
fn absent_base_module_file_fails_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let target = common::target_module(BASE_MODULE);
    let active = deploy_with(dir.path(), None, &target);

    assert!(matches!(
        pipeline::enable(&active, &PatchOptions::default()),
        Err(Error::UnresolvedReference(name)) if name == BASE_MODULE
    ));
}

#[test]
fn base_type_in_the_same_module_resolves_without_imports() {
    // The engine accepts a target whose base type is internal; accessor
    // tokens then point at method definitions directly.
    let dir = tempfile::tempdir().unwrap();

    let base_parts = common::base_module("unused.dll");
    let mut target = common::target_module(BASE_MODULE);
    target.types[0].base = Some(TypeRef::Internal(1));
    target.types.push(base_parts.types[0].clone());
    // No external references remain in use, but the extern table entry is
    // harmless only if its file exists; drop it by rebuilding the module.
    let mut merged = Module::new("Microsoft.CodeAnalysis.CSharp.dll");
    merged.types = target.types.clone();
    let active = deploy_with(dir.path(), None, &merged);

    pipeline::enable(&active, &PatchOptions::default()).unwrap();

    let loaded = Loader::new().load(&active, false).unwrap();
    assert!(loaded.member_refs().is_empty());

    // The constructor's setter call references the internal method
    // definition of set_MetadataImportOptions.
    let ctor_body = &loaded.types[0].methods[0].body;
    let call = ctor_body
        .instructions()
        .iter()
        .rev()
        .find(|instruction| instruction.opcode == OpCode::Call)
        .unwrap();
    match call.operand {
        Operand::Token(token) => {
            // Method rows: 3 in the target type, then getter (row 4) and
            // setter (row 5) on the internal base type.
            assert_eq!(token, Token::method_def(5));
        }
        ref other => panic!("expected token operand, got {other:?}"),
    }
}
