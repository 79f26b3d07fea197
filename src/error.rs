//! Analysis error implementation

use thiserror::Error;

/// Per-instruction decode failures, returned by the scanner.
///
/// The caller decides whether to abandon the procedure or keep scanning at
/// the next candidate offset.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanError {
    /// The instruction pointer, or a fetch made while decoding the current
    /// instruction, fell outside the loaded image.
    #[error("instruction pointer {0:#07x} is outside the image")]
    IpOutOfRange(u32),
    /// The byte sequence does not encode any 8086 instruction.
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    /// The byte sequence is only meaningful on the 80386 and later.
    #[error("opcode {0:#04x} requires an 80386")]
    Invalid386Op(u8),
}

/// Non-fatal decode conditions. The produced instruction is still valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanWarning {
    /// A segment override prefix was not consumed by the instruction.
    DanglingSegOverride,
    /// A repeat prefix preceded a non-string instruction.
    DanglingRep,
}

/// Structural errors raised while building a procedure's control-flow graph.
///
/// These indicate an inconsistency between the instruction stream and the
/// recorded jump targets and are expected to abort the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// An out-edge target does not coincide with the start of any basic
    /// block of the procedure.
    #[error("jump target {ip} in `{proc}` does not start a basic block")]
    UnresolvedTarget {
        /// Instruction index the edge points at.
        ip: u32,
        /// Name of the procedure being processed.
        proc: String,
    },
    /// An out-edge points at a synthesized instruction.
    #[error("synthesized instruction {0:#x} cannot be a control-flow target")]
    SyntheticTarget(u32),
}
