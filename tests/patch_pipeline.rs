//! End-to-end pipeline tests: enable, disable, idempotence and crash
//! recovery over real files.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use cilpatch::{image::write::serialize, pipeline, prelude::*, swap};

const BASE_MODULE: &str = "Microsoft.CodeAnalysis.dll";
const TARGET_MODULE: &str = "Microsoft.CodeAnalysis.CSharp.dll";

/// Write the standard two-module fixture into `dir` and return the active
/// file path.
fn deploy(dir: &Path) -> PathBuf {
    let base = common::base_module(BASE_MODULE);
    fs::write(dir.join(BASE_MODULE), serialize(&base).unwrap()).unwrap();

    let target = common::target_module(BASE_MODULE);
    let active = dir.join(TARGET_MODULE);
    fs::write(&active, serialize(&target).unwrap()).unwrap();
    active
}

fn load_patched(active: &Path) -> Module {
    let mut loader = Loader::new();
    loader.add_search_directory(active.parent().unwrap());
    loader.load(active, false).unwrap()
}

#[test]
fn enable_patches_both_constructors_and_the_setter() {
    let dir = tempfile::tempdir().unwrap();
    let active = deploy(dir.path());

    let unpatched = load_patched(&active);
    let ctor_lengths: Vec<usize> = unpatched.types[0]
        .constructors()
        .iter()
        .map(|&ctor| unpatched.types[0].methods[ctor].body.len())
        .collect();

    pipeline::enable(&active, &PatchOptions::default()).unwrap();

    let state = swap::FilePatchState::inspect(&active);
    assert!(state.active && state.backup && !state.staged);

    let patched = load_patched(&active);
    let options_type = &patched.types[0];

    // Both constructors gained the fixed block before their single return.
    for (position, &ctor) in options_type.constructors().iter().enumerate() {
        let body = &options_type.methods[ctor].body;
        assert_eq!(body.len(), ctor_lengths[position] + CONSTRUCTOR_BLOCK_LEN);

        let tail: Vec<OpCode> = body.instructions()[body.len() - 7..]
            .iter()
            .map(|instruction| instruction.opcode)
            .collect();
        assert_eq!(
            tail,
            vec![
                OpCode::Ldarg0,
                OpCode::LdcI4,
                OpCode::Stfld,
                OpCode::Ldarg0,
                OpCode::LdcI42,
                OpCode::Call,
                OpCode::Ret,
            ]
        );
    }

    // The setter gained the two-instruction OR block before the store.
    let setter_body = &options_type.methods[2].body;
    let opcodes: Vec<OpCode> = setter_body
        .instructions()
        .iter()
        .map(|instruction| instruction.opcode)
        .collect();
    assert_eq!(
        opcodes,
        vec![
            OpCode::Ldarg0,
            OpCode::Ldarg1,
            OpCode::LdcI4,
            OpCode::Or,
            OpCode::Stfld,
            OpCode::Ret,
        ]
    );

    // The import-mode accessors were imported into the reference table.
    let imported: Vec<&str> = patched
        .member_refs()
        .iter()
        .map(|member_ref| member_ref.name.as_str())
        .collect();
    assert!(imported.contains(&"set_MetadataImportOptions"));
    assert!(imported.contains(&"get_MetadataImportOptions"));
}

#[test]
fn disable_after_enable_restores_identical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let active = deploy(dir.path());
    let pristine = fs::read(&active).unwrap();

    pipeline::enable(&active, &PatchOptions::default()).unwrap();
    assert_ne!(fs::read(&active).unwrap(), pristine);

    pipeline::disable(&active).unwrap();

    assert_eq!(fs::read(&active).unwrap(), pristine);
    assert!(!swap::backup_path(&active).exists());
    assert!(!swap::staged_path(&active).exists());
}

#[test]
fn enable_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let active = deploy(dir.path());
    let pristine = fs::read(&active).unwrap();

    pipeline::enable(&active, &PatchOptions::default()).unwrap();
    let first = fs::read(&active).unwrap();

    pipeline::enable(&active, &PatchOptions::default()).unwrap();
    let second = fs::read(&active).unwrap();

    assert_eq!(first, second);
    // The backup still holds the pristine module, not a patched one.
    assert_eq!(fs::read(swap::backup_path(&active)).unwrap(), pristine);
}

#[test]
fn enable_recovers_from_interrupted_exchange() {
    let dir = tempfile::tempdir().unwrap();
    let active = deploy(dir.path());
    let pristine = fs::read(&active).unwrap();

    pipeline::enable(&active, &PatchOptions::default()).unwrap();
    let patched = fs::read(&active).unwrap();

    // Simulate a crash between the backup rename and the staged promotion:
    // backup present, active missing, staged output left behind.
    fs::rename(&active, swap::staged_path(&active)).unwrap();

    pipeline::enable(&active, &PatchOptions::default()).unwrap();

    assert_eq!(fs::read(&active).unwrap(), patched);
    assert_eq!(fs::read(swap::backup_path(&active)).unwrap(), pristine);
    assert!(!swap::staged_path(&active).exists());
}

#[test]
fn disable_without_backup_keeps_active_file() {
    let dir = tempfile::tempdir().unwrap();
    let active = deploy(dir.path());
    let pristine = fs::read(&active).unwrap();

    pipeline::disable(&active).unwrap();
    assert_eq!(fs::read(&active).unwrap(), pristine);
}

#[test]
fn disable_with_nothing_present_is_a_state_error() {
    let dir = tempfile::tempdir().unwrap();
    let active = dir.path().join(TARGET_MODULE);

    assert!(matches!(
        pipeline::disable(&active),
        Err(Error::FileState { .. })
    ));
}

#[test]
fn failed_resolution_never_promotes_a_patch() {
    let dir = tempfile::tempdir().unwrap();

    // Base module without the import-mode property: resolution fails after
    // Prepare, and the active file must remain exactly as it was.
    let mut base = common::base_module(BASE_MODULE);
    base.types[0].properties.clear();
    fs::write(dir.path().join(BASE_MODULE), serialize(&base).unwrap()).unwrap();

    let target = common::target_module(BASE_MODULE);
    let active = dir.path().join(TARGET_MODULE);
    fs::write(&active, serialize(&target).unwrap()).unwrap();
    let pristine = fs::read(&active).unwrap();

    assert!(matches!(
        pipeline::enable(&active, &PatchOptions::default()),
        Err(Error::MemberNotFound { .. })
    ));

    assert_eq!(fs::read(&active).unwrap(), pristine);
    assert!(!swap::backup_path(&active).exists());
}
