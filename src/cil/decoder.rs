//! CIL bytecode decoding.
//!
//! Decodes an encoded code block into [`crate::cil::Instruction`] sequences.
//! Branch operands are resolved from relative byte offsets to the stable id
//! of the destination instruction during decoding; a branch that does not
//! land on an instruction boundary is rejected as malformed.

use std::collections::HashMap;

use crate::{
    cil::{
        instruction::{InstrId, Instruction, Operand},
        opcode::{OpCode, OperandKind, PREFIX_EXTENDED},
    },
    file::parser::Parser,
    metadata::token::Token,
    Result,
};

/// Result of decoding one code block.
///
/// Alongside the instructions, the decoder keeps the byte offset and encoded
/// size of every instruction so callers can translate offset-based structures
/// (exception regions) into id-anchored ones.
pub struct DecodedBody {
    /// The decoded instructions, in program order.
    pub instructions: Vec<Instruction>,
    /// Byte offset and encoded size per instruction, parallel to
    /// `instructions`.
    layout: Vec<(u32, u32)>,
    by_offset: HashMap<u32, usize>,
}

impl DecodedBody {
    /// The id of the instruction starting at `offset`, if any.
    #[must_use]
    pub fn instruction_at(&self, offset: u32) -> Option<InstrId> {
        self.by_offset
            .get(&offset)
            .map(|index| self.instructions[*index].id())
    }

    /// The id of the instruction whose encoding ends exactly at `end`.
    #[must_use]
    pub fn instruction_ending_at(&self, end: u32) -> Option<InstrId> {
        self.layout
            .iter()
            .position(|(offset, size)| offset + size == end)
            .map(|index| self.instructions[index].id())
    }
}

/// Decode a complete code block.
///
/// # Arguments
/// * `code` - The encoded instruction stream, starting at its first opcode
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown opcodes or branch targets
/// that do not fall on an instruction boundary, and
/// [`crate::Error::OutOfBounds`] for a truncated stream.
///
/// # Examples
///
/// ```rust
/// use cilpatch::cil::{decoder::decode_body, OpCode};
///
/// let code = [0x02, 0x2A]; // ldarg.0, ret
/// let decoded = decode_body(&code)?;
/// assert_eq!(decoded.instructions[0].opcode, OpCode::Ldarg0);
/// # Ok::<(), cilpatch::Error>(())
/// ```
pub fn decode_body(code: &[u8]) -> Result<DecodedBody> {
    let mut parser = Parser::new(code);
    let mut instructions = Vec::new();
    let mut layout = Vec::new();
    let mut by_offset = HashMap::new();
    // (instruction index, absolute byte offset of the branch destination)
    let mut pending_branches = Vec::new();

    while parser.has_more_data() {
        let offset = parser.pos() as u32;
        let first_byte = parser.read_le::<u8>()?;

        let opcode = if first_byte == PREFIX_EXTENDED {
            let second_byte = parser.read_le::<u8>()?;
            OpCode::from_extended_byte(second_byte)
                .ok_or_else(|| malformed_error!("Invalid opcode: FE {:02X}", second_byte))?
        } else {
            OpCode::from_byte(first_byte)
                .ok_or_else(|| malformed_error!("Invalid opcode: {:02X}", first_byte))?
        };

        let index = instructions.len();
        let operand = match opcode.operand_kind() {
            OperandKind::None => Operand::None,
            OperandKind::Int8 => Operand::Int8(parser.read_le::<i8>()?),
            OperandKind::Int32 => Operand::Int32(parser.read_le::<i32>()?),
            OperandKind::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
            OperandKind::Target8 => {
                let delta = i64::from(parser.read_le::<i8>()?);
                pending_branches.push((index, parser.pos() as i64 + delta));
                Operand::None
            }
            OperandKind::Target32 => {
                let delta = i64::from(parser.read_le::<i32>()?);
                pending_branches.push((index, parser.pos() as i64 + delta));
                Operand::None
            }
        };

        let size = parser.pos() as u32 - offset;
        instructions.push(Instruction::new(InstrId(index as u32), opcode, operand));
        layout.push((offset, size));
        by_offset.insert(offset, index);
    }

    // Branch destinations must fall on an instruction boundary.
    for (index, destination) in pending_branches {
        let target = u32::try_from(destination)
            .ok()
            .and_then(|offset| by_offset.get(&offset))
            .map(|target_index| instructions[*target_index].id())
            .ok_or_else(|| {
                malformed_error!(
                    "Branch at instruction {} targets offset {:#X}, which is not an instruction boundary",
                    index,
                    destination
                )
            })?;
        instructions[index].operand = Operand::Target(target);
    }

    Ok(DecodedBody {
        instructions,
        layout,
        by_offset,
    })
}
