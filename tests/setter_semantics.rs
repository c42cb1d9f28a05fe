//! Flag semantics of the patched property setter: every incoming value is
//! OR'd with the configured flag, so the flag survives later reassignment.

mod common;

use std::fs;

use cilpatch::{
    image::write::serialize,
    pipeline::{self, PatchOptions},
    prelude::*,
};

const BASE_MODULE: &str = "Microsoft.CodeAnalysis.dll";
const TARGET_MODULE: &str = "Microsoft.CodeAnalysis.CSharp.dll";

fn enable_with_flag(flag: u32) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let base = common::base_module(BASE_MODULE);
    fs::write(dir.path().join(BASE_MODULE), serialize(&base).unwrap()).unwrap();

    let target = common::target_module(BASE_MODULE);
    let active = dir.path().join(TARGET_MODULE);
    fs::write(&active, serialize(&target).unwrap()).unwrap();

    let options = PatchOptions {
        flag,
        ..PatchOptions::default()
    };
    pipeline::enable(&active, &options).unwrap();
    (dir, active)
}

fn patched_setter_body(active: &std::path::Path) -> MethodBody {
    let mut loader = Loader::new();
    loader.add_search_directory(active.parent().unwrap());
    let module = loader.load(active, false).unwrap();
    module.types[0].methods[2].body.clone()
}

#[test]
fn setter_ors_every_incoming_value() {
    let flag = DEFAULT_FLAG;
    let (_dir, active) = enable_with_flag(flag);
    let body = patched_setter_body(&active);

    for value in [0_u32, 1, flag, 0x0000_FFFF, 0x8000_0001, u32::MAX] {
        assert_eq!(common::eval_setter(&body, value), value | flag);
    }
}

#[test]
fn setter_is_idempotent_under_or() {
    let flag = DEFAULT_FLAG;
    let (_dir, active) = enable_with_flag(flag);
    let body = patched_setter_body(&active);

    // Assigning the flag itself, or zero, still yields the flag.
    assert_eq!(common::eval_setter(&body, flag), flag);
    assert_eq!(common::eval_setter(&body, 0), flag);
}

#[test]
fn unpatched_setter_stores_the_raw_value() {
    let body = {
        let target = common::target_module(BASE_MODULE);
        target.types[0].methods[2].body.clone()
    };
    assert_eq!(common::eval_setter(&body, 0x1234), 0x1234);
}

#[test]
fn high_bit_flags_embed_by_reinterpretation() {
    // A flag with the sign bit set survives the i32 immediate round trip.
    let flag = 0x8000_0000_u32;
    let (_dir, active) = enable_with_flag(flag);
    let body = patched_setter_body(&active);

    assert_eq!(common::eval_setter(&body, 0), flag);
    assert_eq!(common::eval_setter(&body, 0x0000_0001), flag | 1);
}
