//! The supported CIL operation codes.

/// Operand encoding of an operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand bytes follow the opcode.
    None,
    /// One signed byte immediate.
    Int8,
    /// Four-byte signed immediate.
    Int32,
    /// Four-byte metadata token.
    Token,
    /// One signed byte relative branch target.
    Target8,
    /// Four-byte signed relative branch target.
    Target32,
}

/// A CIL operation code.
///
/// This is the instruction subset the patch engine understands: argument and
/// constant loads, field and call operations, arithmetic/bitwise operations,
/// branches and returns. Opcodes use the standard one-byte encoding, with
/// `0xFE`-prefixed two-byte forms for the extended page.
///
/// The [`std::fmt::Display`] implementation (via `strum`) renders the
/// conventional mnemonic, e.g. `ldarg.0` or `ldc.i4.s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[allow(missing_docs)]
pub enum OpCode {
    #[strum(serialize = "nop")]
    Nop,
    #[strum(serialize = "ldarg.0")]
    Ldarg0,
    #[strum(serialize = "ldarg.1")]
    Ldarg1,
    #[strum(serialize = "ldarg.2")]
    Ldarg2,
    #[strum(serialize = "ldarg.3")]
    Ldarg3,
    #[strum(serialize = "ldloc.0")]
    Ldloc0,
    #[strum(serialize = "ldloc.1")]
    Ldloc1,
    #[strum(serialize = "stloc.0")]
    Stloc0,
    #[strum(serialize = "stloc.1")]
    Stloc1,
    #[strum(serialize = "ldc.i4.m1")]
    LdcI4M1,
    #[strum(serialize = "ldc.i4.0")]
    LdcI40,
    #[strum(serialize = "ldc.i4.1")]
    LdcI41,
    #[strum(serialize = "ldc.i4.2")]
    LdcI42,
    #[strum(serialize = "ldc.i4.3")]
    LdcI43,
    #[strum(serialize = "ldc.i4.4")]
    LdcI44,
    #[strum(serialize = "ldc.i4.5")]
    LdcI45,
    #[strum(serialize = "ldc.i4.6")]
    LdcI46,
    #[strum(serialize = "ldc.i4.7")]
    LdcI47,
    #[strum(serialize = "ldc.i4.8")]
    LdcI48,
    #[strum(serialize = "ldc.i4.s")]
    LdcI4S,
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    #[strum(serialize = "dup")]
    Dup,
    #[strum(serialize = "pop")]
    Pop,
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "ret")]
    Ret,
    #[strum(serialize = "br.s")]
    BrS,
    #[strum(serialize = "brfalse.s")]
    BrfalseS,
    #[strum(serialize = "brtrue.s")]
    BrtrueS,
    #[strum(serialize = "br")]
    Br,
    #[strum(serialize = "brfalse")]
    Brfalse,
    #[strum(serialize = "brtrue")]
    Brtrue,
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Sub,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "xor")]
    Xor,
    #[strum(serialize = "ldstr")]
    Ldstr,
    #[strum(serialize = "callvirt")]
    Callvirt,
    #[strum(serialize = "newobj")]
    Newobj,
    #[strum(serialize = "ldfld")]
    Ldfld,
    #[strum(serialize = "stfld")]
    Stfld,
    #[strum(serialize = "ceq")]
    Ceq,
}

/// Prefix byte of the extended opcode page.
pub(crate) const PREFIX_EXTENDED: u8 = 0xFE;

impl OpCode {
    /// The byte encoding of this opcode as `(prefix, byte)`.
    ///
    /// `prefix` is `None` for the single-byte page and `Some(0xFE)` for the
    /// extended page.
    #[must_use]
    pub fn encoding(&self) -> (Option<u8>, u8) {
        match self {
            OpCode::Nop => (None, 0x00),
            OpCode::Ldarg0 => (None, 0x02),
            OpCode::Ldarg1 => (None, 0x03),
            OpCode::Ldarg2 => (None, 0x04),
            OpCode::Ldarg3 => (None, 0x05),
            OpCode::Ldloc0 => (None, 0x06),
            OpCode::Ldloc1 => (None, 0x07),
            OpCode::Stloc0 => (None, 0x0A),
            OpCode::Stloc1 => (None, 0x0B),
            OpCode::LdcI4M1 => (None, 0x15),
            OpCode::LdcI40 => (None, 0x16),
            OpCode::LdcI41 => (None, 0x17),
            OpCode::LdcI42 => (None, 0x18),
            OpCode::LdcI43 => (None, 0x19),
            OpCode::LdcI44 => (None, 0x1A),
            OpCode::LdcI45 => (None, 0x1B),
            OpCode::LdcI46 => (None, 0x1C),
            OpCode::LdcI47 => (None, 0x1D),
            OpCode::LdcI48 => (None, 0x1E),
            OpCode::LdcI4S => (None, 0x1F),
            OpCode::LdcI4 => (None, 0x20),
            OpCode::Dup => (None, 0x25),
            OpCode::Pop => (None, 0x26),
            OpCode::Call => (None, 0x28),
            OpCode::Ret => (None, 0x2A),
            OpCode::BrS => (None, 0x2B),
            OpCode::BrfalseS => (None, 0x2C),
            OpCode::BrtrueS => (None, 0x2D),
            OpCode::Br => (None, 0x38),
            OpCode::Brfalse => (None, 0x39),
            OpCode::Brtrue => (None, 0x3A),
            OpCode::Add => (None, 0x58),
            OpCode::Sub => (None, 0x59),
            OpCode::And => (None, 0x5F),
            OpCode::Or => (None, 0x60),
            OpCode::Xor => (None, 0x61),
            OpCode::Ldstr => (None, 0x72),
            OpCode::Callvirt => (None, 0x6F),
            OpCode::Newobj => (None, 0x73),
            OpCode::Ldfld => (None, 0x7B),
            OpCode::Stfld => (None, 0x7D),
            OpCode::Ceq => (Some(PREFIX_EXTENDED), 0x01),
        }
    }

    /// Decode an opcode from the single-byte page.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        let opcode = match byte {
            0x00 => OpCode::Nop,
            0x02 => OpCode::Ldarg0,
            0x03 => OpCode::Ldarg1,
            0x04 => OpCode::Ldarg2,
            0x05 => OpCode::Ldarg3,
            0x06 => OpCode::Ldloc0,
            0x07 => OpCode::Ldloc1,
            0x0A => OpCode::Stloc0,
            0x0B => OpCode::Stloc1,
            0x15 => OpCode::LdcI4M1,
            0x16 => OpCode::LdcI40,
            0x17 => OpCode::LdcI41,
            0x18 => OpCode::LdcI42,
            0x19 => OpCode::LdcI43,
            0x1A => OpCode::LdcI44,
            0x1B => OpCode::LdcI45,
            0x1C => OpCode::LdcI46,
            0x1D => OpCode::LdcI47,
            0x1E => OpCode::LdcI48,
            0x1F => OpCode::LdcI4S,
            0x20 => OpCode::LdcI4,
            0x25 => OpCode::Dup,
            0x26 => OpCode::Pop,
            0x28 => OpCode::Call,
            0x2A => OpCode::Ret,
            0x2B => OpCode::BrS,
            0x2C => OpCode::BrfalseS,
            0x2D => OpCode::BrtrueS,
            0x38 => OpCode::Br,
            0x39 => OpCode::Brfalse,
            0x3A => OpCode::Brtrue,
            0x58 => OpCode::Add,
            0x59 => OpCode::Sub,
            0x5F => OpCode::And,
            0x60 => OpCode::Or,
            0x61 => OpCode::Xor,
            0x72 => OpCode::Ldstr,
            0x6F => OpCode::Callvirt,
            0x73 => OpCode::Newobj,
            0x7B => OpCode::Ldfld,
            0x7D => OpCode::Stfld,
            _ => return None,
        };
        Some(opcode)
    }

    /// Decode an opcode from the extended (`0xFE`-prefixed) page.
    #[must_use]
    pub fn from_extended_byte(byte: u8) -> Option<OpCode> {
        match byte {
            0x01 => Some(OpCode::Ceq),
            _ => None,
        }
    }

    /// The operand encoding this opcode expects.
    #[must_use]
    pub fn operand_kind(&self) -> OperandKind {
        match self {
            OpCode::LdcI4S => OperandKind::Int8,
            OpCode::LdcI4 => OperandKind::Int32,
            OpCode::Call
            | OpCode::Callvirt
            | OpCode::Newobj
            | OpCode::Ldfld
            | OpCode::Stfld
            | OpCode::Ldstr => OperandKind::Token,
            OpCode::BrS | OpCode::BrfalseS | OpCode::BrtrueS => OperandKind::Target8,
            OpCode::Br | OpCode::Brfalse | OpCode::Brtrue => OperandKind::Target32,
            _ => OperandKind::None,
        }
    }

    /// Returns `true` if this opcode transfers control to a branch target.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.operand_kind(),
            OperandKind::Target8 | OperandKind::Target32
        )
    }

    /// The long-form equivalent of a short-form branch opcode.
    ///
    /// Non-branch opcodes and long-form branches are returned unchanged. The
    /// assembler widens every branch to its long form, so insertions can never
    /// push a target out of the short encoding's range.
    #[must_use]
    pub fn widened(&self) -> OpCode {
        match self {
            OpCode::BrS => OpCode::Br,
            OpCode::BrfalseS => OpCode::Brfalse,
            OpCode::BrtrueS => OpCode::Brtrue,
            other => *other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_decoding_agree() {
        for byte in 0..=0xFF_u8 {
            if let Some(opcode) = OpCode::from_byte(byte) {
                assert_eq!(opcode.encoding(), (None, byte));
            }
        }
        assert_eq!(
            OpCode::from_extended_byte(0x01),
            Some(OpCode::Ceq)
        );
        assert_eq!(OpCode::Ceq.encoding(), (Some(PREFIX_EXTENDED), 0x01));
    }

    #[test]
    fn mnemonics() {
        assert_eq!(OpCode::Ldarg0.to_string(), "ldarg.0");
        assert_eq!(OpCode::LdcI42.to_string(), "ldc.i4.2");
        assert_eq!(OpCode::Stfld.to_string(), "stfld");
        assert_eq!(OpCode::Or.to_string(), "or");
    }

    #[test]
    fn widening_maps_short_branches() {
        assert_eq!(OpCode::BrS.widened(), OpCode::Br);
        assert_eq!(OpCode::BrtrueS.widened(), OpCode::Brtrue);
        assert_eq!(OpCode::Ret.widened(), OpCode::Ret);
    }
}
