//! 8086 machine model: registers, addressing modes, condition flags

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::FromRepr, strum::EnumIter)]
#[repr(u8)]
/// Machine register identifiers.
///
/// The numbering follows the convention used throughout the analysis: word
/// registers first, then their byte halves, then the segment registers.
/// Byte halves sit exactly eight places after their parent word register,
/// which is what [`Register::byte_variant`] relies on.
pub enum Register {
    /// Accumulator.
    Ax = 1,
    /// Count register.
    Cx = 2,
    /// Data register.
    Dx = 3,
    /// Base register.
    Bx = 4,
    /// Stack pointer.
    Sp = 5,
    /// Base pointer.
    Bp = 6,
    /// Source index.
    Si = 7,
    /// Destination index.
    Di = 8,
    /// Low byte of AX.
    Al = 9,
    /// Low byte of CX.
    Cl = 10,
    /// Low byte of DX.
    Dl = 11,
    /// Low byte of BX.
    Bl = 12,
    /// High byte of AX.
    Ah = 13,
    /// High byte of CX.
    Ch = 14,
    /// High byte of DX.
    Dh = 15,
    /// High byte of BX.
    Bh = 16,
    /// Extra segment.
    Es = 17,
    /// Code segment.
    Cs = 18,
    /// Stack segment.
    Ss = 19,
    /// Data segment.
    Ds = 20,
}

impl Register {
    /// Number of distinct register identifiers, including the unused slot 0.
    pub const COUNT: usize = 21;

    /// Word general-purpose register for a 3-bit field of a modrm byte or an
    /// opcode.
    pub fn word(field: u8) -> Self {
        Self::from_repr((field & 7) + Register::Ax as u8).expect("3-bit register field")
    }

    /// Segment register for a 2- or 3-bit encoded field. Fields beyond DS
    /// have no register and yield `None`.
    pub fn segment(field: u8) -> Option<Self> {
        let repr = field.checked_add(Register::Es as u8)?;
        if repr > Register::Ds as u8 {
            return None;
        }
        Self::from_repr(repr)
    }

    /// True for AX..DI.
    pub const fn is_word(self) -> bool {
        (self as u8) >= Register::Ax as u8 && (self as u8) <= Register::Di as u8
    }

    /// True for AL..BH.
    pub const fn is_byte(self) -> bool {
        (self as u8) >= Register::Al as u8 && (self as u8) <= Register::Bh as u8
    }

    /// True for ES..DS.
    pub const fn is_segment(self) -> bool {
        (self as u8) >= Register::Es as u8
    }

    /// The byte half corresponding to a word register, used when a table
    /// entry carries the byte-operand flag. Registers outside the AX group
    /// are returned unchanged.
    pub fn byte_variant(self) -> Self {
        if self.is_word() {
            Self::from_repr(self as u8 + 8).unwrap_or(self)
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr)]
#[repr(u8)]
/// The eight indexed addressing modes encodable in the r/m field of a modrm
/// byte when `mod != 3`.
pub enum IndexMode {
    /// `[BX + SI]`
    BxSi = 0,
    /// `[BX + DI]`
    BxDi = 1,
    /// `[BP + SI]`
    BpSi = 2,
    /// `[BP + DI]`
    BpDi = 3,
    /// `[SI]`
    Si = 4,
    /// `[DI]`
    Di = 5,
    /// `[BP]`
    Bp = 6,
    /// `[BX]`
    Bx = 7,
}

impl IndexMode {
    /// Addressing through BP defaults to the stack segment.
    pub const fn is_bp_based(self) -> bool {
        matches!(self, IndexMode::BpSi | IndexMode::BpDi | IndexMode::Bp)
    }
}

bitflags! {
    /// Condition-code flags tracked by the analysis.
    pub struct CondFlags: u8 {
        /// Carry.
        const CF = 0x01;
        /// Sign.
        const SF = 0x02;
        /// Zero.
        const ZF = 0x04;
        /// Direction.
        const DF = 0x08;
    }
}

bitflags! {
    /// A set of machine registers, one bit per [`Register`] identifier.
    /// Used for the per-instruction register define/use sets.
    pub struct RegisterSet: u32 {
        /// All registers.
        const ALL = (1 << Register::COUNT) - 2;
    }
}

impl RegisterSet {
    /// Singleton set.
    pub fn of(reg: Register) -> Self {
        Self::from_bits_truncate(1 << reg as u8)
    }

    /// Add a register to the set.
    pub fn define(&mut self, reg: Register) {
        self.insert(Self::of(reg));
    }

    /// Remove a register from the set, recording that its value flowed into
    /// an argument rather than being defined here.
    pub fn mask_off(&mut self, reg: Register) {
        self.remove(Self::of(reg));
    }
}

/// Register snapshot at a point of interest, e.g. the machine state on entry
/// to a procedure as recorded by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineState {
    /// Instruction pointer.
    pub ip: u32,
    regs: [u16; Register::COUNT],
}

impl MachineState {
    /// Empty state with all registers zero.
    pub const fn new() -> Self {
        Self {
            ip: 0,
            regs: [0; Register::COUNT],
        }
    }

    /// Value of a register.
    pub fn reg(&self, reg: Register) -> u16 {
        self.regs[reg as usize]
    }

    /// Overwrite a register.
    pub fn set_reg(&mut self, reg: Register, value: u16) {
        self.regs[reg as usize] = value;
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}
