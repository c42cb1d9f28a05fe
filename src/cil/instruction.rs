//! Decoded CIL instructions and their operands.

use crate::{cil::OpCode, metadata::token::Token};

/// Stable identity of one instruction within a method body.
///
/// Ids are allocated monotonically per body and never reused, so an id stays
/// a valid anchor across later insertions into the same body. Ids carry no
/// ordering meaning; the instruction sequence itself defines program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrId(pub(crate) u32);

/// A typed instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// No operand.
    None,
    /// Signed 8-bit immediate (`ldc.i4.s`).
    Int8(i8),
    /// Signed 32-bit immediate (`ldc.i4`). Unsigned flag values are embedded
    /// by bit reinterpretation, not value conversion.
    Int32(i32),
    /// Metadata token referencing a field, method or member reference.
    Token(Token),
    /// Branch target, resolved to the id of the destination instruction.
    Target(InstrId),
}

/// One operation in a method body: an opcode plus an optional operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    id: InstrId,
    /// The operation code.
    pub opcode: OpCode,
    /// The operand, if the opcode takes one.
    pub operand: Operand,
}

impl Instruction {
    pub(crate) fn new(id: InstrId, opcode: OpCode, operand: Operand) -> Self {
        Instruction {
            id,
            opcode,
            operand,
        }
    }

    /// The stable id of this instruction within its body.
    #[must_use]
    pub fn id(&self) -> InstrId {
        self.id
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            Operand::Int8(value) => write!(f, "{} {}", self.opcode, value),
            Operand::Int32(value) => write!(f, "{} {}", self.opcode, value),
            Operand::Token(token) => write!(f, "{} {}", self.opcode, token),
            Operand::Target(id) => write!(f, "{} -> #{}", self.opcode, id.0),
        }
    }
}
