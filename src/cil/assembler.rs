//! CIL bytecode assembly.
//!
//! Encodes a mutable [`crate::metadata::MethodBody`] back into bytes. All
//! byte offsets are recomputed from the instruction sequence: branch
//! immediates are derived from the id of their destination instruction, and
//! exception regions are translated from id anchors back to offset/length
//! form.
//!
//! Short-form branch opcodes are accepted on decode but widened to their
//! long form here, so an insertion can never push a branch destination out of
//! the short encoding's reach.

use std::collections::HashMap;

use crate::{
    cil::{
        instruction::{InstrId, Operand},
        opcode::{OpCode, OperandKind},
    },
    file::writer::ByteWriter,
    metadata::method::{ExceptionKind, MethodBody},
    Result,
};

/// Exception handler kind tag: typed catch handler.
pub(crate) const EH_KIND_CATCH: u8 = 0;
/// Exception handler kind tag: filter handler.
pub(crate) const EH_KIND_FILTER: u8 = 1;
/// Exception handler kind tag: finally handler.
pub(crate) const EH_KIND_FINALLY: u8 = 2;
/// Exception handler kind tag: fault handler.
pub(crate) const EH_KIND_FAULT: u8 = 3;

/// An exception region in serialized (offset/length) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawExceptionRegion {
    /// Handler kind tag.
    pub kind: u8,
    /// Token of the caught exception type; zero unless `kind` is catch.
    pub class_token: u32,
    /// Byte offset of the protected range.
    pub try_offset: u32,
    /// Byte length of the protected range.
    pub try_length: u32,
    /// Byte offset of the handler.
    pub handler_offset: u32,
    /// Byte length of the handler.
    pub handler_length: u32,
}

/// An encoded method body: code bytes plus serialized exception regions.
pub struct EncodedBody {
    /// The encoded instruction stream.
    pub code: Vec<u8>,
    /// Exception regions in offset/length form.
    pub exceptions: Vec<RawExceptionRegion>,
}

struct Layout {
    /// id -> (offset, encoded size) under the widened encoding
    placements: HashMap<InstrId, (u32, u32)>,
}

impl Layout {
    fn offset_of(&self, id: InstrId) -> Result<u32> {
        self.placements
            .get(&id)
            .map(|(offset, _)| *offset)
            .ok_or_else(|| malformed_error!("Instruction #{} is not part of this body", id.0))
    }

    fn end_of(&self, id: InstrId) -> Result<u32> {
        self.placements
            .get(&id)
            .map(|(offset, size)| offset + size)
            .ok_or_else(|| malformed_error!("Instruction #{} is not part of this body", id.0))
    }
}

fn encoded_size(opcode: OpCode) -> u32 {
    let (prefix, _) = opcode.encoding();
    let opcode_size = if prefix.is_some() { 2 } else { 1 };
    let operand_size = match opcode.operand_kind() {
        OperandKind::None => 0,
        OperandKind::Int8 | OperandKind::Target8 => 1,
        OperandKind::Int32 | OperandKind::Token | OperandKind::Target32 => 4,
    };
    opcode_size + operand_size
}

fn compute_layout(body: &MethodBody) -> Layout {
    let mut placements = HashMap::new();
    let mut offset = 0_u32;

    for instruction in body.instructions() {
        let size = encoded_size(instruction.opcode.widened());
        placements.insert(instruction.id(), (offset, size));
        offset += size;
    }

    Layout { placements }
}

/// Encode a method body to bytes.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if an instruction's operand does not
/// match its opcode's operand kind, or if a branch or exception region
/// references an id that is not part of the body.
///
/// # Examples
///
/// ```rust
/// use cilpatch::cil::{assembler::encode_body, OpCode, Operand};
/// use cilpatch::metadata::MethodBody;
///
/// let mut body = MethodBody::new();
/// body.push(OpCode::Ldarg0, Operand::None);
/// body.push(OpCode::Ret, Operand::None);
///
/// let encoded = encode_body(&body)?;
/// assert_eq!(encoded.code, vec![0x02, 0x2A]);
/// # Ok::<(), cilpatch::Error>(())
/// ```
pub fn encode_body(body: &MethodBody) -> Result<EncodedBody> {
    let layout = compute_layout(body);
    let mut writer = ByteWriter::new();

    for instruction in body.instructions() {
        let opcode = instruction.opcode.widened();
        let (prefix, byte) = opcode.encoding();
        if let Some(prefix_byte) = prefix {
            writer.write_le(prefix_byte);
        }
        writer.write_le(byte);

        match (opcode.operand_kind(), &instruction.operand) {
            (OperandKind::None, Operand::None) => {}
            (OperandKind::Int8, Operand::Int8(value)) => writer.write_le(*value),
            (OperandKind::Int32, Operand::Int32(value)) => writer.write_le(*value),
            (OperandKind::Token, Operand::Token(token)) => writer.write_le(token.value()),
            (OperandKind::Target32, Operand::Target(target)) => {
                let end = layout.end_of(instruction.id())?;
                let destination = layout.offset_of(*target)?;
                let delta = i64::from(destination) - i64::from(end);
                // Deltas always fit: bodies are bounded well below i32 range.
                writer.write_le(delta as i32);
            }
            (kind, operand) => {
                return Err(malformed_error!(
                    "Operand {:?} does not match operand kind {:?} of {}",
                    operand,
                    kind,
                    opcode
                ))
            }
        }
    }

    let mut exceptions = Vec::with_capacity(body.exceptions.len());
    for region in &body.exceptions {
        let (kind, class_token) = match region.kind {
            ExceptionKind::Catch(token) => (EH_KIND_CATCH, token.value()),
            ExceptionKind::Filter => (EH_KIND_FILTER, 0),
            ExceptionKind::Finally => (EH_KIND_FINALLY, 0),
            ExceptionKind::Fault => (EH_KIND_FAULT, 0),
        };

        let try_offset = layout.offset_of(region.try_start)?;
        let try_length = layout.end_of(region.try_end)? - try_offset;
        let handler_offset = layout.offset_of(region.handler_start)?;
        let handler_length = layout.end_of(region.handler_end)? - handler_offset;

        exceptions.push(RawExceptionRegion {
            kind,
            class_token,
            try_offset,
            try_length,
            handler_offset,
            handler_length,
        });
    }

    Ok(EncodedBody {
        code: writer.into_bytes(),
        exceptions,
    })
}
