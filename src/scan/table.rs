//! Static dispatch table for the instruction decoder.
//!
//! One entry per first-byte value. Each entry names a primary and a
//! secondary handler from a closed set of tags, the decode-directive flags,
//! the initial opcode and the condition-flag define/use masks. The table is
//! the single source of truth for opcode legality: a decode that ends with
//! [`Opcode::Zero`] is invalid, and an entry flagged `OP386` names an
//! encoding this analysis rejects by design.

use crate::icode::LlFlags;
use crate::machine::{CondFlags, Register};
use crate::opcode::Opcode;

/// Decode handler tags. The same set serves the primary and the secondary
/// slot of a table entry; most entries use only a few of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    /// Expand a modrm byte: reg-side operand, then r/m-side operand.
    ModRm,
    /// Segment register encoded in the modrm reg field.
    SegRm,
    /// Fetch a 1-byte immediate.
    Imm8,
    /// Fetch a 2-byte immediate.
    Imm16,
    /// Register encoded in the low 3 bits of the opcode byte.
    RegField,
    /// Segment register encoded in bits 3..4 of the opcode byte.
    SegField,
    /// String instruction: promote the opcode under a repeat prefix.
    StrOp,
    /// Coprocessor escape: pack the FP opcode, then expand r/m.
    EscOp,
    /// Implied memory operand, honouring a segment override.
    MemImp,
    /// Invalid when the modrm byte names a register (mod = 3).
    MemOnly,
    /// Like [`Handler::MemOnly`], and the reg field must be 0; expands r/m.
    MemReg0,
    /// 2-byte absolute memory reference without a modrm byte.
    AbsMem,
    /// 1-byte signed displacement relative to the next instruction.
    Disp8,
    /// 2-byte signed displacement relative to the next instruction.
    Disp16,
    /// 4-byte far pointer: offset word, then segment word.
    DispFar,
    /// Prefix capture; the scan loop continues with the next byte.
    Prefix(PrefixKind),
    /// Fan-out on the modrm reg field: ADD/OR/ADC/SBB/AND/SUB/XOR/CMP.
    ImmGrp,
    /// Fan-out on the modrm reg field: rotates and shifts.
    ShiftGrp,
    /// Fan-out on the modrm reg field: TEST/NOT/NEG/MUL/IMUL/DIV/IDIV.
    ArithGrp,
    /// Fan-out on the modrm reg field: INC/DEC/CALL/CALLF/JMP/JMPF/PUSH.
    TransGrp,
    /// Implied AX (AL under the byte flag) on the destination side.
    AxDst,
    /// Implied AX source.
    AxSrc,
    /// Implied AL source.
    AlSrc,
    /// Constant immediate 1.
    Const1,
    /// Constant immediate 3.
    Const3,
    /// Promote to NO_OPS when an immediate was fetched.
    NoOps,
    /// INT 0x34..=0x3B is a floating-point emulation escape.
    IntCheck,
    /// No effect.
    Idle,
}

/// Captured prefix kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrefixKind {
    /// Segment override.
    Seg(Register),
    /// `REPE`/`REP`.
    Repe,
    /// `REPNE`.
    Repne,
}

/// One row of the dispatch table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpEntry {
    /// Primary handler.
    pub prime: Handler,
    /// Secondary handler.
    pub finish: Handler,
    /// Raw flag word; only [`LlFlags::ICODE_MASK`] bits reach the record.
    pub flg: u32,
    /// Initial opcode.
    pub opcode: Opcode,
    /// Condition flags defined.
    pub df: u8,
    /// Condition flags used.
    pub uf: u8,
}

const fn e(prime: Handler, finish: Handler, flg: u32, opcode: Opcode, df: u8, uf: u8) -> OpEntry {
    OpEntry {
        prime,
        finish,
        flg,
        opcode,
        df,
        uf,
    }
}

const B: u32 = LlFlags::B.bits();
const NH: u32 = LlFlags::NOT_HLL.bits();
const FO: u32 = LlFlags::FLOAT_OP.bits();
const NS: u32 = LlFlags::NO_SRC.bits();
const NO: u32 = LlFlags::NO_OPS.bits();
const IM: u32 = LlFlags::IM_OPS.bits();
const SB: u32 = LlFlags::SRC_B.bits();
const ID: u32 = LlFlags::IM_DST.bits();
const TO: u32 = LlFlags::TO_REG.bits();
const SE: u32 = LlFlags::S_EXT.bits();
const NSP: u32 = LlFlags::NSP.bits();
const O3: u32 = LlFlags::OP386.bits();

const CF: u8 = CondFlags::CF.bits();
const SF: u8 = CondFlags::SF.bits();
const ZF: u8 = CondFlags::ZF.bits();
const DF: u8 = CondFlags::DF.bits();
const SZ: u8 = SF | ZF;
const SZC: u8 = SF | ZF | CF;
const SZCD: u8 = SF | ZF | CF | DF;

use Handler::*;
use Opcode::*;

/// The 256-entry dispatch table, indexed by the first instruction byte.
#[rustfmt::skip]
pub(crate) static TABLE: [OpEntry; 256] = [
    e(ModRm, NoOps, B, Add, SZC, 0),                        // 0x00
    e(ModRm, NoOps, 0, Add, SZC, 0),                        // 0x01
    e(ModRm, NoOps, TO | B, Add, SZC, 0),                   // 0x02
    e(ModRm, NoOps, TO, Add, SZC, 0),                       // 0x03
    e(Imm8, AxDst, B, Add, SZC, 0),                         // 0x04
    e(Imm16, AxDst, 0, Add, SZC, 0),                        // 0x05
    e(SegField, NoOps, NS, Push, 0, 0),                     // 0x06
    e(SegField, NoOps, NS, Pop, 0, 0),                      // 0x07
    e(ModRm, NoOps, B, Or, SZC, 0),                         // 0x08
    e(ModRm, NoOps, NSP, Or, SZC, 0),                       // 0x09
    e(ModRm, NoOps, TO | B, Or, SZC, 0),                    // 0x0a
    e(ModRm, NoOps, TO | NSP, Or, SZC, 0),                  // 0x0b
    e(Imm8, AxDst, B, Or, SZC, 0),                          // 0x0c
    e(Imm16, AxDst, 0, Or, SZC, 0),                         // 0x0d
    e(SegField, NoOps, NS, Push, 0, 0),                     // 0x0e
    e(Idle, NoOps, O3, Zero, 0, 0),                          // 0x0f
    e(ModRm, NoOps, B, Adc, SZC, CF),                       // 0x10
    e(ModRm, NoOps, NSP, Adc, SZC, CF),                     // 0x11
    e(ModRm, NoOps, TO | B, Adc, SZC, CF),                  // 0x12
    e(ModRm, NoOps, TO | NSP, Adc, SZC, CF),                // 0x13
    e(Imm8, AxDst, B, Adc, SZC, CF),                        // 0x14
    e(Imm16, AxDst, 0, Adc, SZC, CF),                       // 0x15
    e(SegField, NoOps, NH | NS, Push, 0, 0),                // 0x16
    e(SegField, NoOps, NH | NS, Pop, 0, 0),                 // 0x17
    e(ModRm, NoOps, B, Sbb, SZC, CF),                       // 0x18
    e(ModRm, NoOps, NSP, Sbb, SZC, CF),                     // 0x19
    e(ModRm, NoOps, TO | B, Sbb, SZC, CF),                  // 0x1a
    e(ModRm, NoOps, TO | NSP, Sbb, SZC, CF),                // 0x1b
    e(Imm8, AxDst, B, Sbb, SZC, CF),                        // 0x1c
    e(Imm16, AxDst, 0, Sbb, SZC, CF),                       // 0x1d
    e(SegField, NoOps, NS, Push, 0, 0),                     // 0x1e
    e(SegField, NoOps, NS, Pop, 0, 0),                      // 0x1f
    e(ModRm, NoOps, B, And, SZC, 0),                        // 0x20
    e(ModRm, NoOps, NSP, And, SZC, 0),                      // 0x21
    e(ModRm, NoOps, TO | B, And, SZC, 0),                   // 0x22
    e(ModRm, NoOps, TO | NSP, And, SZC, 0),                 // 0x23
    e(Imm8, AxDst, B, And, SZC, 0),                         // 0x24
    e(Imm16, AxDst, 0, And, SZC, 0),                        // 0x25
    e(Prefix(PrefixKind::Seg(Register::Es)), NoOps, 0, Zero, 0, 0), // 0x26
    e(Idle, AxDst, NH | B | NS, Daa, SZC, 0),                // 0x27
    e(ModRm, NoOps, B, Sub, SZC, 0),                        // 0x28
    e(ModRm, NoOps, 0, Sub, SZC, 0),                        // 0x29
    e(ModRm, NoOps, TO | B, Sub, SZC, 0),                   // 0x2a
    e(ModRm, NoOps, TO, Sub, SZC, 0),                       // 0x2b
    e(Imm8, AxDst, B, Sub, SZC, 0),                         // 0x2c
    e(Imm16, AxDst, 0, Sub, SZC, 0),                        // 0x2d
    e(Prefix(PrefixKind::Seg(Register::Cs)), NoOps, 0, Zero, 0, 0), // 0x2e
    e(Idle, AxDst, NH | B | NS, Das, SZC, 0),                // 0x2f
    e(ModRm, NoOps, B, Xor, SZC, 0),                        // 0x30
    e(ModRm, NoOps, NSP, Xor, SZC, 0),                      // 0x31
    e(ModRm, NoOps, TO | B, Xor, SZC, 0),                   // 0x32
    e(ModRm, NoOps, TO | NSP, Xor, SZC, 0),                 // 0x33
    e(Imm8, AxDst, B, Xor, SZC, 0),                         // 0x34
    e(Imm16, AxDst, 0, Xor, SZC, 0),                        // 0x35
    e(Prefix(PrefixKind::Seg(Register::Ss)), NoOps, 0, Zero, 0, 0), // 0x36
    e(Idle, AxDst, NH | NS, Aaa, SZC, 0),                    // 0x37
    e(ModRm, NoOps, B, Cmp, SZC, 0),                        // 0x38
    e(ModRm, NoOps, NSP, Cmp, SZC, 0),                      // 0x39
    e(ModRm, NoOps, TO | B, Cmp, SZC, 0),                   // 0x3a
    e(ModRm, NoOps, TO | NSP, Cmp, SZC, 0),                 // 0x3b
    e(Imm8, AxDst, B, Cmp, SZC, 0),                         // 0x3c
    e(Imm16, AxDst, 0, Cmp, SZC, 0),                        // 0x3d
    e(Prefix(PrefixKind::Seg(Register::Ds)), NoOps, 0, Zero, 0, 0), // 0x3e
    e(Idle, AxDst, NH | NS, Aas, SZC, 0),                    // 0x3f
    e(RegField, NoOps, 0, Inc, SZ, 0),                      // 0x40
    e(RegField, NoOps, 0, Inc, SZ, 0),                      // 0x41
    e(RegField, NoOps, 0, Inc, SZ, 0),                      // 0x42
    e(RegField, NoOps, 0, Inc, SZ, 0),                      // 0x43
    e(RegField, NoOps, NH, Inc, SZ, 0),                     // 0x44
    e(RegField, NoOps, 0, Inc, SZ, 0),                      // 0x45
    e(RegField, NoOps, 0, Inc, SZ, 0),                      // 0x46
    e(RegField, NoOps, 0, Inc, SZ, 0),                      // 0x47
    e(RegField, NoOps, 0, Dec, SZ, 0),                      // 0x48
    e(RegField, NoOps, 0, Dec, SZ, 0),                      // 0x49
    e(RegField, NoOps, 0, Dec, SZ, 0),                      // 0x4a
    e(RegField, NoOps, 0, Dec, SZ, 0),                      // 0x4b
    e(RegField, NoOps, NH, Dec, SZ, 0),                     // 0x4c
    e(RegField, NoOps, 0, Dec, SZ, 0),                      // 0x4d
    e(RegField, NoOps, 0, Dec, SZ, 0),                      // 0x4e
    e(RegField, NoOps, 0, Dec, SZ, 0),                      // 0x4f
    e(RegField, NoOps, NS, Push, 0, 0),                     // 0x50
    e(RegField, NoOps, NS, Push, 0, 0),                     // 0x51
    e(RegField, NoOps, NS, Push, 0, 0),                     // 0x52
    e(RegField, NoOps, NS, Push, 0, 0),                     // 0x53
    e(RegField, NoOps, NH | NS, Push, 0, 0),                // 0x54
    e(RegField, NoOps, NS, Push, 0, 0),                     // 0x55
    e(RegField, NoOps, NS, Push, 0, 0),                     // 0x56
    e(RegField, NoOps, NS, Push, 0, 0),                     // 0x57
    e(RegField, NoOps, NS, Pop, 0, 0),                      // 0x58
    e(RegField, NoOps, NS, Pop, 0, 0),                      // 0x59
    e(RegField, NoOps, NS, Pop, 0, 0),                      // 0x5a
    e(RegField, NoOps, NS, Pop, 0, 0),                      // 0x5b
    e(RegField, NoOps, NH | NS, Pop, 0, 0),                 // 0x5c
    e(RegField, NoOps, NS, Pop, 0, 0),                      // 0x5d
    e(RegField, NoOps, NS, Pop, 0, 0),                      // 0x5e
    e(RegField, NoOps, NS, Pop, 0, 0),                      // 0x5f
    e(Idle, NoOps, NH | NO, Pusha, 0, 0),                    // 0x60
    e(Idle, NoOps, NH | NO, Popa, 0, 0),                     // 0x61
    e(MemOnly, ModRm, TO | NSP, Bound, 0, 0),               // 0x62
    e(Idle, NoOps, O3, Zero, 0, 0),                          // 0x63
    e(Idle, NoOps, O3, Zero, 0, 0),                          // 0x64
    e(Idle, NoOps, O3, Zero, 0, 0),                          // 0x65
    e(Idle, NoOps, O3, Zero, 0, 0),                          // 0x66
    e(Idle, NoOps, O3, Zero, 0, 0),                          // 0x67
    e(Imm16, NoOps, NS, Push, 0, 0),                        // 0x68
    e(ModRm, Imm16, TO | NSP, Imul, SZC, 0),                // 0x69
    e(Imm8, NoOps, SE | NS, Push, 0, 0),                    // 0x6a
    e(ModRm, Imm8, TO | NSP | SE, Imul, SZC, 0),            // 0x6b
    e(StrOp, MemImp, NH | B | IM, Ins, 0, DF),              // 0x6c
    e(StrOp, MemImp, NH | IM, Ins, 0, DF),                  // 0x6d
    e(StrOp, MemImp, NH | B | IM, Outs, 0, DF),             // 0x6e
    e(StrOp, MemImp, NH | IM, Outs, 0, DF),                 // 0x6f
    e(Disp8, NoOps, NH, Jo, 0, 0),                          // 0x70
    e(Disp8, NoOps, NH, Jno, 0, 0),                         // 0x71
    e(Disp8, NoOps, 0, Jb, 0, CF),                          // 0x72
    e(Disp8, NoOps, 0, Jae, 0, CF),                         // 0x73
    e(Disp8, NoOps, 0, Je, 0, ZF),                          // 0x74
    e(Disp8, NoOps, 0, Jne, 0, ZF),                         // 0x75
    e(Disp8, NoOps, 0, Jbe, 0, ZF | CF),                    // 0x76
    e(Disp8, NoOps, 0, Ja, 0, ZF | CF),                     // 0x77
    e(Disp8, NoOps, 0, Js, 0, SF),                          // 0x78
    e(Disp8, NoOps, 0, Jns, 0, SF),                         // 0x79
    e(Disp8, NoOps, NH, Jp, 0, 0),                          // 0x7a
    e(Disp8, NoOps, NH, Jnp, 0, 0),                         // 0x7b
    e(Disp8, NoOps, 0, Jl, 0, SF),                          // 0x7c
    e(Disp8, NoOps, 0, Jge, 0, SF),                         // 0x7d
    e(Disp8, NoOps, 0, Jle, 0, SZ),                         // 0x7e
    e(Disp8, NoOps, 0, Jg, 0, SZ),                          // 0x7f
    e(ImmGrp, Imm8, B, Zero, 0, 0),                         // 0x80
    e(ImmGrp, Imm16, NSP, Zero, 0, 0),                      // 0x81
    e(ImmGrp, Imm8, B, Zero, 0, 0),                         // 0x82
    e(ImmGrp, Imm8, NSP | SE, Zero, 0, 0),                  // 0x83
    e(ModRm, NoOps, TO | B, Test, SZC, 0),                  // 0x84
    e(ModRm, NoOps, TO | NSP, Test, SZC, 0),                // 0x85
    e(ModRm, NoOps, TO | B, Xchg, 0, 0),                    // 0x86
    e(ModRm, NoOps, TO | NSP, Xchg, 0, 0),                  // 0x87
    e(ModRm, NoOps, B, Mov, 0, 0),                          // 0x88
    e(ModRm, NoOps, 0, Mov, 0, 0),                          // 0x89
    e(ModRm, NoOps, TO | B, Mov, 0, 0),                     // 0x8a
    e(ModRm, NoOps, TO, Mov, 0, 0),                         // 0x8b
    e(SegRm, NoOps, NSP, Mov, 0, 0),                        // 0x8c
    e(MemOnly, ModRm, TO | NSP, Lea, 0, 0),                 // 0x8d
    e(SegRm, NoOps, TO | NSP, Mov, 0, 0),                   // 0x8e
    e(MemReg0, NoOps, NS, Pop, 0, 0),                       // 0x8f
    e(Idle, NoOps, NO, Opcode::Nop, 0, 0),                   // 0x90
    e(RegField, AxDst, 0, Xchg, 0, 0),                      // 0x91
    e(RegField, AxDst, 0, Xchg, 0, 0),                      // 0x92
    e(RegField, AxDst, 0, Xchg, 0, 0),                      // 0x93
    e(RegField, AxDst, NH, Xchg, 0, 0),                     // 0x94
    e(RegField, AxDst, 0, Xchg, 0, 0),                      // 0x95
    e(RegField, AxDst, 0, Xchg, 0, 0),                      // 0x96
    e(RegField, AxDst, 0, Xchg, 0, 0),                      // 0x97
    e(AlSrc, AxDst, SB | SE, Signex, 0, 0),                 // 0x98
    e(AxSrc, AxDst, ID | SE, Signex, 0, 0),                 // 0x99
    e(DispFar, NoOps, 0, CallF, 0, 0),                      // 0x9a
    e(Idle, NoOps, FO | NO, Wait, 0, 0),                     // 0x9b
    e(Idle, NoOps, NH | NO, Pushf, 0, 0),                    // 0x9c
    e(Idle, NoOps, NH | NO, Popf, SZCD, 0),                  // 0x9d
    e(Idle, NoOps, NH | NO, Sahf, SZC, 0),                   // 0x9e
    e(Idle, NoOps, NH | NO, Lahf, 0, SZC),                   // 0x9f
    e(AbsMem, AxDst, B, Mov, 0, 0),                         // 0xa0
    e(AbsMem, AxDst, 0, Mov, 0, 0),                         // 0xa1
    e(AbsMem, AxDst, TO | B, Mov, 0, 0),                    // 0xa2
    e(AbsMem, AxDst, TO, Mov, 0, 0),                        // 0xa3
    e(StrOp, MemImp, B | IM, Movs, 0, DF),                  // 0xa4
    e(StrOp, MemImp, IM, Movs, 0, DF),                      // 0xa5
    e(StrOp, MemImp, B | IM, Cmps, SZC, DF),                // 0xa6
    e(StrOp, MemImp, IM, Cmps, SZC, DF),                    // 0xa7
    e(Imm8, AxDst, B, Test, SZC, 0),                        // 0xa8
    e(Imm16, AxDst, 0, Test, SZC, 0),                       // 0xa9
    e(StrOp, MemImp, B | IM, Stos, 0, DF),                  // 0xaa
    e(StrOp, MemImp, IM, Stos, 0, DF),                      // 0xab
    e(StrOp, MemImp, B | IM, Lods, 0, DF),                  // 0xac
    e(StrOp, MemImp, IM, Lods, 0, DF),                      // 0xad
    e(StrOp, MemImp, B | IM, Scas, SZC, DF),                // 0xae
    e(StrOp, MemImp, IM, Scas, SZC, DF),                    // 0xaf
    e(RegField, Imm8, B, Mov, 0, 0),                        // 0xb0
    e(RegField, Imm8, B, Mov, 0, 0),                        // 0xb1
    e(RegField, Imm8, B, Mov, 0, 0),                        // 0xb2
    e(RegField, Imm8, B, Mov, 0, 0),                        // 0xb3
    e(RegField, Imm8, B, Mov, 0, 0),                        // 0xb4
    e(RegField, Imm8, B, Mov, 0, 0),                        // 0xb5
    e(RegField, Imm8, B, Mov, 0, 0),                        // 0xb6
    e(RegField, Imm8, B, Mov, 0, 0),                        // 0xb7
    e(RegField, Imm16, 0, Mov, 0, 0),                       // 0xb8
    e(RegField, Imm16, 0, Mov, 0, 0),                       // 0xb9
    e(RegField, Imm16, 0, Mov, 0, 0),                       // 0xba
    e(RegField, Imm16, 0, Mov, 0, 0),                       // 0xbb
    e(RegField, Imm16, NH, Mov, 0, 0),                      // 0xbc
    e(RegField, Imm16, 0, Mov, 0, 0),                       // 0xbd
    e(RegField, Imm16, 0, Mov, 0, 0),                       // 0xbe
    e(RegField, Imm16, 0, Mov, 0, 0),                       // 0xbf
    e(ShiftGrp, Imm8, B, Zero, 0, 0),                       // 0xc0
    e(ShiftGrp, Imm8, NSP | SB, Zero, 0, 0),                // 0xc1
    e(Imm16, NoOps, 0, Ret, 0, 0),                          // 0xc2
    e(Idle, NoOps, NO, Ret, 0, 0),                           // 0xc3
    e(MemOnly, ModRm, TO | NSP, Les, 0, 0),                 // 0xc4
    e(MemOnly, ModRm, TO | NSP, Lds, 0, 0),                 // 0xc5
    e(MemReg0, Imm8, B, Mov, 0, 0),                         // 0xc6
    e(MemReg0, Imm16, 0, Mov, 0, 0),                        // 0xc7
    e(Imm16, Imm8, 0, Enter, 0, 0),                         // 0xc8
    e(Idle, NoOps, NO, Leave, 0, 0),                         // 0xc9
    e(Imm16, NoOps, 0, RetF, 0, 0),                         // 0xca
    e(Idle, NoOps, NO, RetF, 0, 0),                          // 0xcb
    e(Const3, NoOps, NH, Int, 0, 0),                        // 0xcc
    e(Imm8, IntCheck, NH, Int, 0, 0),                       // 0xcd
    e(Idle, NoOps, NH | NO, Into, 0, 0),                     // 0xce
    e(Idle, NoOps, NH | NO, Iret, 0, 0),                     // 0xcf
    e(ShiftGrp, Const1, B, Zero, 0, 0),                     // 0xd0
    e(ShiftGrp, Const1, SB, Zero, 0, 0),                    // 0xd1
    e(ShiftGrp, Idle, B, Zero, 0, 0),                        // 0xd2
    e(ShiftGrp, Idle, SB, Zero, 0, 0),                       // 0xd3
    e(Imm8, AxDst, NH, Aam, SZC, 0),                        // 0xd4
    e(Imm8, AxDst, NH, Aad, SZC, 0),                        // 0xd5
    e(Idle, NoOps, 0, Zero, 0, 0),                           // 0xd6
    e(MemImp, AxDst, NH | B | IM, Xlat, 0, 0),              // 0xd7
    e(EscOp, NoOps, FO, Esc, 0, 0),                         // 0xd8
    e(EscOp, NoOps, FO, Esc, 0, 0),                         // 0xd9
    e(EscOp, NoOps, FO, Esc, 0, 0),                         // 0xda
    e(EscOp, NoOps, FO, Esc, 0, 0),                         // 0xdb
    e(EscOp, NoOps, FO, Esc, 0, 0),                         // 0xdc
    e(EscOp, NoOps, FO, Esc, 0, 0),                         // 0xdd
    e(EscOp, NoOps, FO, Esc, 0, 0),                         // 0xde
    e(EscOp, NoOps, FO, Esc, 0, 0),                         // 0xdf
    e(Disp8, NoOps, 0, Loopne, 0, ZF),                      // 0xe0
    e(Disp8, NoOps, 0, Loope, 0, ZF),                       // 0xe1
    e(Disp8, NoOps, 0, Loop, 0, 0),                         // 0xe2
    e(Disp8, NoOps, 0, Jcxz, 0, 0),                         // 0xe3
    e(Imm8, AxDst, NH | B | NS, In, 0, 0),                  // 0xe4
    e(Imm8, AxDst, NH | NS, In, 0, 0),                      // 0xe5
    e(Imm8, AxDst, NH | B | NS, Out, 0, 0),                 // 0xe6
    e(Imm8, AxDst, NH | NS, Out, 0, 0),                     // 0xe7
    e(Disp16, NoOps, 0, Call, 0, 0),                        // 0xe8
    e(Disp16, NoOps, 0, Jmp, 0, 0),                         // 0xe9
    e(DispFar, NoOps, 0, JmpF, 0, 0),                       // 0xea
    e(Disp8, NoOps, 0, Jmp, 0, 0),                          // 0xeb
    e(Idle, AxDst, NH | B | NS, In, 0, 0),                   // 0xec
    e(Idle, AxDst, NH | NS, In, 0, 0),                       // 0xed
    e(Idle, AxDst, NH | B | NS, Out, 0, 0),                  // 0xee
    e(Idle, AxDst, NH | NS, Out, 0, 0),                      // 0xef
    e(Idle, NoOps, NH | NO, Lock, 0, 0),                     // 0xf0
    e(Idle, NoOps, 0, Zero, 0, 0),                           // 0xf1
    e(Prefix(PrefixKind::Repne), NoOps, 0, Zero, 0, 0),     // 0xf2
    e(Prefix(PrefixKind::Repe), NoOps, 0, Zero, 0, 0),      // 0xf3
    e(Idle, NoOps, NH | NO, Hlt, 0, 0),                      // 0xf4
    e(Idle, NoOps, NO, Cmc, CF, CF),                         // 0xf5
    e(ArithGrp, Idle, B, Zero, 0, 0),                        // 0xf6
    e(ArithGrp, Idle, NSP, Zero, 0, 0),                      // 0xf7
    e(Idle, NoOps, NO, Clc, CF, 0),                          // 0xf8
    e(Idle, NoOps, NO, Stc, CF, 0),                          // 0xf9
    e(Idle, NoOps, NH | NO, Cli, 0, 0),                      // 0xfa
    e(Idle, NoOps, NH | NO, Sti, 0, 0),                      // 0xfb
    e(Idle, NoOps, NO, Cld, DF, 0),                          // 0xfc
    e(Idle, NoOps, NO, Std, DF, 0),                          // 0xfd
    e(TransGrp, Idle, B, Zero, 0, 0),                        // 0xfe
    e(TransGrp, Idle, NSP, Zero, 0, 0),                      // 0xff
];

/// Opcode and used-flag mask selected by the modrm reg field for the
/// immediate-group encodings (0x80..=0x83). All entries define SF, ZF, CF.
pub(crate) static IMM_GRP: [(Opcode, u8); 8] = [
    (Add, 0),
    (Or, 0),
    (Adc, CF),
    (Sbb, CF),
    (And, 0),
    (Sub, 0),
    (Xor, 0),
    (Cmp, 0),
];

/// Opcode, defined-flag and used-flag masks for the shift/rotate group
/// (0xc0, 0xc1, 0xd0..=0xd3). Reg field 6 does not encode an instruction.
pub(crate) static SHIFT_GRP: [(Opcode, u8, u8); 8] = [
    (Rol, CF, 0),
    (Ror, CF, 0),
    (Rcl, CF, CF),
    (Rcr, CF, CF),
    (Shl, SZC, 0),
    (Shr, SZC, 0),
    (Zero, 0, 0),
    (Sar, SZC, 0),
];

/// Opcode and defined-flag mask for the arithmetic group (0xf6, 0xf7). Reg
/// field 1 does not encode an instruction.
pub(crate) static ARITH_GRP: [(Opcode, u8); 8] = [
    (Test, SZC),
    (Zero, 0),
    (Not, 0),
    (Neg, SZC),
    (Mul, SZC),
    (Imul, SZC),
    (Div, SZC),
    (Idiv, SZC),
];

/// Opcode and defined-flag mask for the increment/transfer group (0xfe,
/// 0xff). Reg field 7 does not encode an instruction.
pub(crate) static TRANS_GRP: [(Opcode, u8); 8] = [
    (Inc, SZ),
    (Dec, SZ),
    (Call, 0),
    (CallF, 0),
    (Jmp, 0),
    (JmpF, 0),
    (Push, 0),
    (Zero, 0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_rows_carry_no_opcode() {
        for byte in [0x26u8, 0x2e, 0x36, 0x3e, 0xf2, 0xf3] {
            let entry = &TABLE[byte as usize];
            assert!(matches!(entry.prime, Handler::Prefix(_)), "{byte:#04x}");
            assert_eq!(entry.opcode, Opcode::Zero, "{byte:#04x}");
        }
    }

    #[test]
    fn op386_rows_are_invalid() {
        for byte in [0x0fu8, 0x63, 0x64, 0x65, 0x66, 0x67] {
            let entry = &TABLE[byte as usize];
            assert_eq!(entry.opcode, Opcode::Zero, "{byte:#04x}");
            assert_ne!(entry.flg & O3, 0, "{byte:#04x}");
        }
    }

    #[test]
    fn fan_out_rows_start_invalid() {
        for byte in [0x80u8, 0x81, 0x82, 0x83, 0xc0, 0xc1, 0xd0, 0xd1, 0xd2, 0xd3, 0xf6, 0xf7, 0xfe, 0xff] {
            assert_eq!(TABLE[byte as usize].opcode, Opcode::Zero, "{byte:#04x}");
        }
    }
}
