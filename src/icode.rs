//! Low-level intermediate code records and their buffer.
//!
//! Every scanned machine instruction becomes one [`Icode`] record. Records
//! are appended during decoding and mutated in place by the later passes;
//! they are never reordered, so an instruction index is a stable address for
//! the lifetime of its procedure.

use crate::frame::{Expr, StackFrame};
use crate::function::FuncId;
use crate::machine::{CondFlags, IndexMode, Register, RegisterSet};
use crate::opcode::Opcode;

use bitflags::bitflags;

bitflags! {
    /// Flag word of a low-level instruction record.
    ///
    /// The high four bits are decode directives that live only in the
    /// dispatch table; [`LlFlags::ICODE_MASK`] strips them when a table entry
    /// is copied into a record.
    pub struct LlFlags: u32 {
        /// Byte operands.
        const B = 0x0000_0001;
        /// Source operand is an immediate.
        const I = 0x0000_0002;
        /// Instruction cannot be expressed in a high-level language.
        const NOT_HLL = 0x0000_0004;
        /// Floating-point instruction (ESC or WAIT).
        const FLOAT_OP = 0x0000_0008;
        /// Immediate is a relocated segment value.
        const SEG_IMMED = 0x0000_0010;
        /// Operand memory overlaps known code.
        const IMPURE = 0x0000_0020;
        /// Operand carries a 16-bit offset that could be an address.
        const WORD_OFF = 0x0000_0040;
        /// Instruction terminates the process.
        const TERMINATES = 0x0000_0080;
        /// Instruction is the target of a case-table entry.
        const CASE = 0x0000_0100;
        /// Indirect jump dispatches through a case table.
        const SWITCH = 0x0000_0200;
        /// Instruction is a jump target.
        const TARGET = 0x0000_0400;
        /// Synthesized instruction, not present in the image.
        const SYNTHETIC = 0x0000_0800;
        /// Jump whose immediate target cannot be linked to a label.
        const NO_LABEL = 0x0000_1000;
        /// Record is logically absent and must be skipped.
        const NO_CODE = 0x0000_2000;
        /// Instruction reads a data symbol.
        const SYM_USE = 0x0000_4000;
        /// Instruction writes a data symbol.
        const SYM_DEF = 0x0000_8000;
        /// Opcode takes no source operand.
        const NO_SRC = 0x0001_0000;
        /// Opcode takes no operands.
        const NO_OPS = 0x0002_0000;
        /// Opcode takes implicit operands.
        const IM_OPS = 0x0004_0000;
        /// Source operand is a byte while the destination is a word.
        const SRC_B = 0x0008_0000;
        /// Implicit destination (sign-extension forms).
        const IM_DST = 0x0010_0000;
        /// Implicit temporary destination (word DIV/IDIV).
        const IM_TMP_DST = 0x0020_0000;

        /// Table directive: the modrm reg field is the destination.
        const TO_REG = 0x0800_0000;
        /// Table directive: sign-extend the 8-bit immediate.
        const S_EXT = 0x1000_0000;
        /// Table directive: an SP operand disqualifies HLL translation.
        const NSP = 0x2000_0000;
        /// Table directive: 80386-only encoding.
        const OP386 = 0x4000_0000;

        /// Bits that survive the copy from a table entry into a record.
        const ICODE_MASK = !(Self::TO_REG.bits | Self::S_EXT.bits | Self::NSP.bits | Self::OP386.bits);
    }
}

/// One resolved operand of a low-level instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LlOperand {
    /// No operand.
    #[default]
    None,
    /// A machine register.
    Reg(Register),
    /// A memory reference.
    Mem {
        /// Segment the access goes through, after defaulting rules.
        seg: Register,
        /// Explicit override prefix, when one was consumed.
        seg_over: Option<Register>,
        /// Indexed addressing mode; `None` is an absolute reference.
        base: Option<IndexMode>,
        /// Signed displacement, or the absolute offset for direct references.
        off: i16,
    },
    /// An immediate value.
    Imm(u32),
    /// A resolved direct-call target.
    Proc(FuncId),
}

impl LlOperand {
    /// Immediate payload, if the operand is one.
    pub const fn imm(&self) -> Option<u32> {
        match self {
            LlOperand::Imm(v) => Some(*v),
            _ => None,
        }
    }

    /// True when the operand is the given register.
    pub fn is_reg(&self, reg: Register) -> bool {
        matches!(self, LlOperand::Reg(r) if *r == reg)
    }
}

/// Register define/use sets of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefUse {
    /// Registers written.
    pub def: RegisterSet,
    /// Registers read.
    pub uses: RegisterSet,
}

impl Default for DefUse {
    fn default() -> Self {
        Self {
            def: RegisterSet::empty(),
            uses: RegisterSet::empty(),
        }
    }
}

/// High-level view of an instruction, attached once the relevant analysis
/// has run. Argument recovery consumes assignments and call sites.
#[derive(Debug, Clone, PartialEq)]
pub enum HlIcode {
    /// `lhs = rhs`.
    Assign {
        /// Destination identifier expression.
        lhs: Expr,
        /// Source expression.
        rhs: Expr,
    },
    /// A call with its actual-argument frame.
    Call {
        /// Callee.
        proc: FuncId,
        /// Actuals pushed at this site.
        args: StackFrame,
    },
}

/// One low-level instruction record.
#[derive(Debug, Clone, PartialEq)]
pub struct Icode {
    /// Decoded opcode, [`Opcode::Zero`] while invalid.
    pub opcode: Opcode,
    /// Source operand.
    pub src: LlOperand,
    /// Destination operand.
    pub dst: LlOperand,
    /// Flag word.
    pub flags: LlFlags,
    /// Condition flags defined.
    pub def: CondFlags,
    /// Condition flags used.
    pub uses: CondFlags,
    /// Register define/use sets.
    pub du: DefUse,
    /// Bytes of image consumed by the decode.
    pub num_bytes: u8,
    /// Absolute image offset of the instruction.
    pub label: u32,
    /// Switch targets, for indirect jumps through a case table.
    pub case_tbl: Option<Vec<u32>>,
    /// Data-symbol table index for memory references.
    pub data_sym: Option<usize>,
    /// High-level view, once synthesized.
    pub hl: Option<HlIcode>,
    /// Record invalidated by a structural rewrite.
    pub invalid: bool,
}

impl Icode {
    /// Fresh record for the instruction at image offset `label`.
    pub fn new(label: u32) -> Self {
        Self {
            opcode: Opcode::Zero,
            src: LlOperand::None,
            dst: LlOperand::None,
            flags: LlFlags::empty(),
            def: CondFlags::empty(),
            uses: CondFlags::empty(),
            du: DefUse::default(),
            num_bytes: 0,
            label,
            case_tbl: None,
            data_sym: None,
            hl: None,
            invalid: false,
        }
    }

    /// True when the record is logically absent.
    pub fn is_no_code(&self) -> bool {
        self.flags.contains(LlFlags::NO_CODE)
    }
}

/// Ordered per-procedure sequence of instruction records.
///
/// Supports append, indexed access and the in-place mutations the analysis
/// passes perform. Indices are stable addresses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IcodeBuf {
    records: Vec<Icode>,
}

impl IcodeBuf {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, including invalidated ones.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record has been appended.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record, returning its index.
    pub fn push(&mut self, icode: Icode) -> usize {
        self.records.push(icode);
        self.records.len() - 1
    }

    /// Record at `i`.
    pub fn get(&self, i: usize) -> Option<&Icode> {
        self.records.get(i)
    }

    /// Mutable record at `i`.
    pub fn get_mut(&mut self, i: usize) -> Option<&mut Icode> {
        self.records.get_mut(i)
    }

    /// Iterate over the records in order.
    pub fn iter(&self) -> impl Iterator<Item = &Icode> {
        self.records.iter()
    }

    /// Set flag bits on record `i`.
    pub fn set_flag(&mut self, i: usize, mask: LlFlags) {
        if let Some(ic) = self.records.get_mut(i) {
            ic.flags.insert(mask);
        }
    }

    /// Clear flag bits on record `i`.
    pub fn clear_flag(&mut self, i: usize, mask: LlFlags) {
        if let Some(ic) = self.records.get_mut(i) {
            ic.flags.remove(mask);
        }
    }

    /// Mark or unmark record `i` as invalidated.
    pub fn set_invalid(&mut self, i: usize, invalid: bool) {
        if let Some(ic) = self.records.get_mut(i) {
            ic.invalid = invalid;
        }
    }

    /// Rewrite the immediate source operand of record `i`.
    pub fn set_immediate(&mut self, i: usize, value: u32) {
        if let Some(ic) = self.records.get_mut(i) {
            ic.src = LlOperand::Imm(value);
        }
    }
}
