//! Method definitions and mutable method bodies.

use bitflags::bitflags;

use crate::{
    cil::{InstrId, Instruction, OpCode, Operand},
    metadata::token::Token,
    Result,
};

bitflags! {
    /// Attribute flags of a method definition.
    ///
    /// Only the flag-like bits the engine inspects are modeled; member access
    /// levels are not.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAttributes: u32 {
        /// The method is static (no instance receiver).
        const STATIC = 0x0010;
        /// The method cannot be overridden.
        const FINAL = 0x0020;
        /// The method is virtual.
        const VIRTUAL = 0x0040;
        /// The method hides by signature, not just by name.
        const HIDE_BY_SIG = 0x0080;
        /// The method name carries semantic meaning (accessors, operators).
        const SPECIAL_NAME = 0x0800;
        /// The runtime itself interprets the name (constructors).
        const RT_SPECIAL_NAME = 0x1000;
    }
}

/// Kind of an exception handler region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    /// Typed catch handler; the token names the caught exception type.
    Catch(Token),
    /// Filter handler.
    Filter,
    /// Finally handler.
    Finally,
    /// Fault handler.
    Fault,
}

/// One exception handling region of a method body.
///
/// Regions are anchored by instruction id, with inclusive start and end
/// instructions. Byte offsets and lengths are recomputed from the ids when
/// the body is re-encoded, so regions survive instruction insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionRegion {
    /// The handler kind.
    pub kind: ExceptionKind,
    /// First instruction of the protected range.
    pub try_start: InstrId,
    /// Last instruction of the protected range (inclusive).
    pub try_end: InstrId,
    /// First instruction of the handler.
    pub handler_start: InstrId,
    /// Last instruction of the handler (inclusive).
    pub handler_end: InstrId,
}

/// An ordered, mutable sequence of instructions plus exception regions.
///
/// Instruction insertion is defined relative to an existing instruction
/// (directly before or directly after it), never by absolute index, so prior
/// insertions in the same body remain valid reference points. The body is
/// mutable only until the owning module is serialized.
///
/// # Examples
///
/// ```rust
/// use cilpatch::metadata::MethodBody;
/// use cilpatch::cil::{OpCode, Operand};
///
/// let mut body = MethodBody::new();
/// let ret = body.push(OpCode::Ret, Operand::None);
/// body.insert_before(ret, OpCode::Nop, Operand::None)?;
/// assert_eq!(body.instructions().len(), 2);
/// assert_eq!(body.instructions()[0].opcode, OpCode::Nop);
/// # Ok::<(), cilpatch::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Maximum operand stack depth declared for the body.
    pub max_stack: u16,
    /// Exception handling regions, anchored by instruction id.
    pub exceptions: Vec<ExceptionRegion>,
    instructions: Vec<Instruction>,
    next_id: u32,
}

impl MethodBody {
    /// Create an empty body.
    #[must_use]
    pub fn new() -> Self {
        MethodBody {
            max_stack: 0,
            exceptions: Vec::new(),
            instructions: Vec::new(),
            next_id: 0,
        }
    }

    /// Reassemble a body from decoded parts.
    ///
    /// The id allocator continues after the highest id present.
    pub(crate) fn from_parts(
        max_stack: u16,
        instructions: Vec<Instruction>,
        exceptions: Vec<ExceptionRegion>,
    ) -> Self {
        let next_id = instructions
            .iter()
            .map(|instruction| instruction.id().0 + 1)
            .max()
            .unwrap_or(0);

        MethodBody {
            max_stack,
            exceptions,
            instructions,
            next_id,
        }
    }

    /// The instruction sequence in program order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions in the body.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the body has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Look up an instruction by id.
    #[must_use]
    pub fn instruction(&self, id: InstrId) -> Option<&Instruction> {
        self.index_of(id).map(|index| &self.instructions[index])
    }

    /// Append an instruction at the end of the body.
    ///
    /// Returns the id of the new instruction.
    pub fn push(&mut self, opcode: OpCode, operand: Operand) -> InstrId {
        let id = self.alloc_id();
        self.instructions.push(Instruction::new(id, opcode, operand));
        id
    }

    /// Insert an instruction directly before the anchor instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no instruction with the anchor
    /// id exists in this body.
    pub fn insert_before(
        &mut self,
        anchor: InstrId,
        opcode: OpCode,
        operand: Operand,
    ) -> Result<InstrId> {
        let index = self
            .index_of(anchor)
            .ok_or_else(|| malformed_error!("Anchor instruction #{} not found", anchor.0))?;

        let id = self.alloc_id();
        self.instructions
            .insert(index, Instruction::new(id, opcode, operand));
        Ok(id)
    }

    /// Insert an instruction directly after the anchor instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no instruction with the anchor
    /// id exists in this body.
    pub fn insert_after(
        &mut self,
        anchor: InstrId,
        opcode: OpCode,
        operand: Operand,
    ) -> Result<InstrId> {
        let index = self
            .index_of(anchor)
            .ok_or_else(|| malformed_error!("Anchor instruction #{} not found", anchor.0))?;

        let id = self.alloc_id();
        self.instructions
            .insert(index + 1, Instruction::new(id, opcode, operand));
        Ok(id)
    }

    fn alloc_id(&mut self) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: InstrId) -> Option<usize> {
        self.instructions
            .iter()
            .position(|instruction| instruction.id() == id)
    }
}

impl Default for MethodBody {
    fn default() -> Self {
        Self::new()
    }
}

/// A method definition: name, attribute flags, and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    /// Method name. Constructors are named `.ctor`.
    pub name: String,
    /// Attribute flags.
    pub flags: MethodAttributes,
    /// The method body.
    pub body: MethodBody,
}

impl Method {
    /// Create a method with the given name and flags and an empty body.
    #[must_use]
    pub fn new(name: impl Into<String>, flags: MethodAttributes) -> Self {
        Method {
            name: name.into(),
            flags,
            body: MethodBody::new(),
        }
    }

    /// Returns `true` if this method is an instance constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.flags.contains(MethodAttributes::RT_SPECIAL_NAME)
            && !self.flags.contains(MethodAttributes::STATIC)
            && self.name == ".ctor"
    }
}
