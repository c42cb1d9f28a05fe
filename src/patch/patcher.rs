//! Instruction patching of the resolved target.

use crate::{
    cil::{InstrId, OpCode, Operand},
    metadata::{
        method::MethodBody,
        module::{Module, ModuleAttributes},
        query::Lookup,
    },
    patch::signature::{PatchTarget, TargetSignature},
    Error, Result,
};

/// Default flag value: ignore accessibility checks.
pub const DEFAULT_FLAG: u32 = 0x0040_0000;

/// Number of instructions inserted before each constructor return.
///
/// The block is fixed regardless of the flag value: load the instance, load
/// the flag literal, store the flag field, load the instance, load the
/// most-permissive import mode, call the imported setter.
pub const CONSTRUCTOR_BLOCK_LEN: usize = 6;

/// Apply the full patch to a resolved target.
///
/// Runs [`normalize_attributes`], [`patch_constructors`] and
/// [`patch_flag_setter`] in that order.
///
/// # Errors
/// Propagates the anchor and lookup errors of the individual steps.
pub fn apply(
    module: &mut Module,
    target: &PatchTarget,
    signature: &TargetSignature,
    flag: u32,
) -> Result<()> {
    normalize_attributes(module);
    patch_constructors(module, target, flag)?;
    patch_flag_setter(module, target, signature, flag)
}

/// Clear the library attribute in favor of pure managed code.
///
/// The patched module must load the same way the pristine one did; a module
/// marked as a mixed library is downgraded to plain managed-only.
pub fn normalize_attributes(module: &mut Module) {
    if module.attributes.contains(ModuleAttributes::IL_LIBRARY) {
        module.attributes.remove(ModuleAttributes::IL_LIBRARY);
        module.attributes.insert(ModuleAttributes::IL_ONLY);
        log::debug!("module attributes now {:?}", module.attributes);
    }
}

/// Splice the flag store and import-mode setter call into every constructor.
///
/// Each constructor body is scanned from the end toward the start for return
/// instructions; a constructor may have more than one exit point. Immediately
/// before every return, a fixed block of [`CONSTRUCTOR_BLOCK_LEN`]
/// instructions is inserted through chained anchor-relative insertion, which
/// preserves exactly one control-flow path through the new code.
///
/// The flag is embedded as a signed 32-bit immediate by bit reinterpretation.
///
/// # Errors
/// Returns [`crate::Error::MalformedBody`] if a constructor has no return
/// instruction to anchor on.
pub fn patch_constructors(module: &mut Module, target: &PatchTarget, flag: u32) -> Result<()> {
    let flag_field = target.flag_field();
    let setter = target.setter();
    let type_index = target.type_index();

    for &constructor in target.constructors() {
        let type_def = &module.types[type_index];
        let method_name = format!(
            "{}::{}",
            type_def.full_name(),
            type_def.methods[constructor].name
        );

        let body = &mut module.types[type_index].methods[constructor].body;
        let returns: Vec<InstrId> = body
            .instructions()
            .iter()
            .rev()
            .filter(|instruction| instruction.opcode == OpCode::Ret)
            .map(|instruction| instruction.id())
            .collect();

        if returns.is_empty() {
            return Err(Error::MalformedBody {
                method: method_name,
                message: "no return instruction to anchor on".into(),
            });
        }

        for anchor in &returns {
            #[allow(clippy::cast_possible_wrap)]
            insert_block_before(
                body,
                *anchor,
                &[
                    (OpCode::Ldarg0, Operand::None),
                    (OpCode::LdcI4, Operand::Int32(flag as i32)),
                    (OpCode::Stfld, Operand::Token(flag_field)),
                    (OpCode::Ldarg0, Operand::None),
                    (OpCode::LdcI42, Operand::None),
                    (OpCode::Call, Operand::Token(setter)),
                ],
            )?;
        }

        // The new block holds the instance plus one literal at its deepest.
        body.max_stack = body.max_stack.max(2);

        log::debug!(
            "patched {} at {} return(s)",
            method_name,
            returns.len()
        );
    }

    Ok(())
}

/// Rewrite the flag property setter to OR every incoming value with `flag`.
///
/// The setter of the unique flag-typed property on the target type is assumed
/// to have the conventional auto-property shape: argument loads, a store to
/// the backing field, and a trailing return. The `ldc.i4 <flag>; or` pair is
/// inserted immediately before the second-to-last instruction (the backing
/// field store), so the value on the evaluation stack is OR'd before it is
/// stored. Any later assignment that only partially sets the property can no
/// longer clear the configured flag.
///
/// The shape is validated before insertion; a body that is too short, does
/// not end in a return, or whose store anchor is not a field store fails fast
/// rather than splicing at a wrong offset.
///
/// # Errors
/// Returns [`crate::Error::MemberNotFound`] / [`crate::Error::AmbiguousMember`]
/// for the property lookup, and [`crate::Error::MalformedBody`] for shape
/// violations.
pub fn patch_flag_setter(
    module: &mut Module,
    target: &PatchTarget,
    signature: &TargetSignature,
    flag: u32,
) -> Result<()> {
    let type_def = &module.types[target.type_index()];
    let full_name = type_def.full_name();

    let property = match Lookup::unique(
        type_def
            .properties
            .iter()
            .filter(|property| property.type_name == signature.flag_type),
    ) {
        Lookup::Found(property) => property,
        Lookup::NotFound => {
            return Err(Error::MemberNotFound {
                declaring_type: full_name,
                member: format!("property of type {}", signature.flag_type),
            })
        }
        Lookup::Ambiguous => {
            return Err(Error::AmbiguousMember {
                declaring_type: full_name,
                member: format!("property of type {}", signature.flag_type),
            })
        }
    };

    let setter_ordinal = property.setter.ok_or_else(|| Error::MemberNotFound {
        declaring_type: full_name.clone(),
        member: format!("set accessor of property {}", property.name),
    })?;

    let method_name = format!("{}::{}", full_name, type_def.methods[setter_ordinal].name);
    let body = &mut module.types[target.type_index()].methods[setter_ordinal].body;

    let anchor = setter_store_anchor(body, &method_name)?;

    #[allow(clippy::cast_possible_wrap)]
    insert_block_before(
        body,
        anchor,
        &[
            (OpCode::LdcI4, Operand::Int32(flag as i32)),
            (OpCode::Or, Operand::None),
        ],
    )?;

    // Instance, incoming value, and the OR'd literal are live at the store.
    body.max_stack = body.max_stack.max(3);

    log::debug!("patched setter {}", method_name);
    Ok(())
}

/// Validate the conventional setter shape and return the store anchor.
fn setter_store_anchor(body: &MethodBody, method_name: &str) -> Result<InstrId> {
    let instructions = body.instructions();
    if instructions.len() < 3 {
        return Err(Error::MalformedBody {
            method: method_name.into(),
            message: format!(
                "setter body has {} instruction(s); expected loads, a field store and a return",
                instructions.len()
            ),
        });
    }

    let last = &instructions[instructions.len() - 1];
    if last.opcode != OpCode::Ret {
        return Err(Error::MalformedBody {
            method: method_name.into(),
            message: format!("setter body ends in {}, not ret", last.opcode),
        });
    }

    let anchor = &instructions[instructions.len() - 2];
    if anchor.opcode != OpCode::Stfld {
        return Err(Error::MalformedBody {
            method: method_name.into(),
            message: format!(
                "second-to-last setter instruction is {}, not stfld",
                anchor.opcode
            ),
        });
    }

    Ok(anchor.id())
}

/// Insert `block` immediately before `anchor`, chaining each new instruction
/// after the previous one.
fn insert_block_before(
    body: &mut MethodBody,
    anchor: InstrId,
    block: &[(OpCode, Operand)],
) -> Result<()> {
    let mut entries = block.iter();
    let Some((opcode, operand)) = entries.next() else {
        return Ok(());
    };

    let mut previous = body.insert_before(anchor, *opcode, *operand)?;
    for (opcode, operand) in entries {
        previous = body.insert_after(previous, *opcode, *operand)?;
    }
    Ok(())
}
