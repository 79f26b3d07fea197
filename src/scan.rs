//! Table-driven 8086 machine-code scanner.
//!
//! [`scan`] converts one instruction at a given image offset into a
//! low-level [`Icode`] record with resolved operands, flags and
//! condition-flag define/use sets. All decode state lives in a per-scan
//! context; nothing survives between calls.

use crate::error::{ScanError, ScanWarning};
use crate::icode::{Icode, LlFlags, LlOperand};
use crate::image::Image;
use crate::machine::{CondFlags, IndexMode, Register};
use crate::opcode::{Opcode, RepKind};

use tracing::trace;

mod table;

use table::{Handler, PrefixKind, ARITH_GRP, IMM_GRP, SHIFT_GRP, TABLE, TRANS_GRP};

/// A successfully decoded instruction, possibly with a non-fatal condition
/// attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Scanned {
    /// The decoded record.
    pub icode: Icode,
    /// Residual prefix that no instruction consumed, if any.
    pub warning: Option<ScanWarning>,
}

/// Scan one machine instruction at offset `ip` of the image.
///
/// On success the record's `num_bytes` holds the bytes actually consumed. A
/// segment-override or repeat prefix left dangling by the instruction is
/// reported as a warning on the result; the record itself remains valid.
pub fn scan(image: &Image, ip: u32) -> Result<Scanned, ScanError> {
    if ip as usize >= image.len() {
        return Err(ScanError::IpOutOfRange(ip));
    }

    let mut ctx = Scanner {
        image,
        pos: ip as usize,
        seg: None,
        rep: None,
        icode: Icode::new(ip),
    };

    let mut op;
    loop {
        op = ctx.fetch_byte()?;
        let entry = &TABLE[op as usize];
        ctx.icode.opcode = entry.opcode;
        ctx.icode.flags = LlFlags::from_bits_truncate(entry.flg) & LlFlags::ICODE_MASK;
        ctx.icode.def = CondFlags::from_bits_truncate(entry.df);
        ctx.icode.uses = CondFlags::from_bits_truncate(entry.uf);

        ctx.run(entry.prime, op)?;
        ctx.run(entry.finish, op)?;

        if !matches!(entry.prime, Handler::Prefix(_)) {
            break;
        }
    }

    if ctx.icode.opcode == Opcode::Zero {
        return Err(if TABLE[op as usize].flg & LlFlags::OP386.bits() != 0 {
            ScanError::Invalid386Op(op)
        } else {
            ScanError::InvalidOpcode(op)
        });
    }

    ctx.icode.num_bytes = (ctx.pos - ip as usize) as u8;
    let warning = if ctx.seg.is_some() {
        Some(ScanWarning::DanglingSegOverride)
    } else if ctx.rep.is_some() {
        Some(ScanWarning::DanglingRep)
    } else {
        None
    };
    trace!(ip, opcode = ?ctx.icode.opcode, bytes = ctx.icode.num_bytes, "scanned");

    Ok(Scanned {
        icode: ctx.icode,
        warning,
    })
}

/// Operand base passed to the address builder: either a pure register or a
/// memory reference through an optional indexed mode.
#[derive(Debug, Clone, Copy)]
enum Base {
    Reg(Register),
    Mem(Option<IndexMode>),
}

/// Per-scan decode context.
struct Scanner<'a> {
    image: &'a Image,
    /// Absolute cursor into the image.
    pos: usize,
    /// Latched segment-override prefix.
    seg: Option<Register>,
    /// Latched repeat prefix.
    rep: Option<RepKind>,
    /// Record being filled in.
    icode: Icode,
}

impl Scanner<'_> {
    fn fetch_byte(&mut self) -> Result<u8, ScanError> {
        let b = self
            .image
            .byte(self.pos)
            .ok_or(ScanError::IpOutOfRange(self.pos as u32))?;
        self.pos += 1;
        Ok(b)
    }

    fn fetch_word(&mut self) -> Result<u16, ScanError> {
        let lo = self.fetch_byte()?;
        let hi = self.fetch_byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn peek_byte(&self) -> Result<u8, ScanError> {
        self.image
            .byte(self.pos)
            .ok_or(ScanError::IpOutOfRange(self.pos as u32))
    }

    fn run(&mut self, handler: Handler, op: u8) -> Result<(), ScanError> {
        match handler {
            Handler::ModRm => self.modrm(op),
            Handler::SegRm => self.seg_rm(op),
            Handler::Imm8 => self.imm8(op),
            Handler::Imm16 => self.imm16(),
            Handler::RegField => {
                self.reg_field(op);
                Ok(())
            }
            Handler::SegField => {
                self.seg_field(op);
                Ok(())
            }
            Handler::StrOp => {
                self.str_op();
                Ok(())
            }
            Handler::EscOp => self.esc_op(op),
            Handler::MemImp => {
                self.mem_imp(op);
                Ok(())
            }
            Handler::MemOnly => self.mem_only(),
            Handler::MemReg0 => self.mem_reg0(op),
            Handler::AbsMem => self.abs_mem(op),
            Handler::Disp8 => self.disp8(),
            Handler::Disp16 => self.disp16(),
            Handler::DispFar => self.disp_far(),
            Handler::Prefix(kind) => {
                self.prefix(kind);
                Ok(())
            }
            Handler::ImmGrp => self.imm_grp(op),
            Handler::ShiftGrp => self.shift_grp(op),
            Handler::ArithGrp => self.arith_grp(op),
            Handler::TransGrp => self.trans_grp(op),
            Handler::AxDst => {
                self.set_address(op, true, None, Base::Reg(Register::Ax), 0);
                Ok(())
            }
            Handler::AxSrc => {
                self.icode.src = LlOperand::Reg(Register::Ax);
                Ok(())
            }
            Handler::AlSrc => {
                self.icode.src = LlOperand::Reg(Register::Al);
                Ok(())
            }
            Handler::Const1 => {
                self.const_imm(1);
                Ok(())
            }
            Handler::Const3 => {
                self.const_imm(3);
                Ok(())
            }
            Handler::NoOps => {
                if self.icode.flags.contains(LlFlags::I) {
                    self.icode.flags.insert(LlFlags::NO_OPS);
                }
                Ok(())
            }
            Handler::IntCheck => {
                self.int_check();
                Ok(())
            }
            Handler::Idle => Ok(()),
        }
    }

    /// Build the source or destination operand. `fdst` selects the r/m side
    /// of the instruction; the `TO_REG` directive flips which side lands in
    /// the destination. Pure registers shift into their byte halves under
    /// the byte directive; memory references pick up the consumed segment
    /// override or the BP-based stack-segment default.
    fn set_address(
        &mut self,
        op: u8,
        fdst: bool,
        seg_over: Option<Register>,
        base: Base,
        off: i16,
    ) {
        let flg = TABLE[op as usize].flg;
        let operand = match base {
            Base::Reg(reg) => {
                let reg = if flg & LlFlags::B.bits() != 0 {
                    reg.byte_variant()
                } else {
                    reg
                };
                LlOperand::Reg(reg)
            }
            Base::Mem(base) => {
                let seg = seg_over.unwrap_or(match base {
                    Some(ix) if ix.is_bp_based() => Register::Ss,
                    _ => Register::Ds,
                });
                LlOperand::Mem {
                    seg,
                    seg_over,
                    base,
                    off,
                }
            }
        };

        let to_dst = (flg & LlFlags::TO_REG.bits() == 0) == fdst;
        if to_dst {
            self.icode.dst = operand;
        } else {
            self.icode.src = operand;
        }

        if seg_over.is_some() {
            self.seg = None;
        }
    }

    /// Decode the r/m side of a modrm byte into the destination (source
    /// under `TO_REG`).
    fn rm(&mut self, op: u8) -> Result<(), ScanError> {
        let modrm = self.fetch_byte()?;
        let mode = modrm >> 6;
        let rm = modrm & 7;
        let seg = self.seg;

        match mode {
            0 if rm == 6 => {
                let off = self.fetch_word()?;
                self.set_address(op, true, seg, Base::Mem(None), off as i16);
                self.icode.flags.insert(LlFlags::WORD_OFF);
            }
            0 => self.set_address(op, true, seg, Base::Mem(IndexMode::from_repr(rm)), 0),
            1 => {
                let disp = self.fetch_byte()? as i8;
                self.set_address(op, true, seg, Base::Mem(IndexMode::from_repr(rm)), disp as i16);
            }
            2 => {
                let disp = self.fetch_word()?;
                self.set_address(op, true, seg, Base::Mem(IndexMode::from_repr(rm)), disp as i16);
                self.icode.flags.insert(LlFlags::WORD_OFF);
            }
            _ => self.set_address(op, true, None, Base::Reg(Register::word(rm)), 0),
        }

        if TABLE[op as usize].flg & LlFlags::NSP.bits() != 0
            && (self.icode.src.is_reg(Register::Sp) || self.icode.dst.is_reg(Register::Sp))
        {
            self.icode.flags.insert(LlFlags::NOT_HLL);
        }
        Ok(())
    }

    fn modrm(&mut self, op: u8) -> Result<(), ScanError> {
        let reg = Register::word((self.peek_byte()? >> 3) & 7);
        self.set_address(op, false, None, Base::Reg(reg), 0);
        self.rm(op)
    }

    /// Segment register in the modrm reg field. Moves into CS and reg codes
    /// beyond DS do not encode instructions.
    fn seg_rm(&mut self, op: u8) -> Result<(), ScanError> {
        let field = (self.peek_byte()? >> 3) & 7;
        let to_reg = TABLE[op as usize].flg & LlFlags::TO_REG.bits() != 0;
        match Register::segment(field) {
            Some(Register::Cs) if to_reg => {
                self.icode.opcode = Opcode::Zero;
                Ok(())
            }
            Some(seg) => {
                self.set_address(op, false, None, Base::Reg(seg), 0);
                self.rm(op)
            }
            None => {
                self.icode.opcode = Opcode::Zero;
                Ok(())
            }
        }
    }

    fn reg_field(&mut self, op: u8) {
        self.set_address(op, false, None, Base::Reg(Register::word(op & 7)), 0);
        self.icode.dst = self.icode.src.clone();
    }

    fn seg_field(&mut self, op: u8) {
        if let Some(seg) = Register::segment((op & 0x18) >> 3) {
            self.set_address(op, true, None, Base::Reg(seg), 0);
        }
    }

    /// Promote a string instruction under a latched repeat prefix and
    /// consume the prefix.
    fn str_op(&mut self) {
        if let Some(rep) = self.rep.take() {
            self.icode.opcode = self.icode.opcode.repeated(rep);
            if self.icode.opcode == Opcode::RepLods {
                self.icode.flags.insert(LlFlags::NOT_HLL);
            }
        }
    }

    /// Pack the coprocessor opcode from the escape byte and the modrm reg
    /// field, then expand the r/m operand.
    fn esc_op(&mut self, op: u8) -> Result<(), ScanError> {
        let reg = (self.peek_byte()? >> 3) & 7;
        self.icode.src = LlOperand::Imm(u32::from(reg) + (u32::from(op & 7) << 3));
        self.icode.flags.insert(LlFlags::I);
        self.rm(op)
    }

    fn mem_imp(&mut self, op: u8) {
        let seg = self.seg;
        self.set_address(op, false, seg, Base::Mem(None), 0);
    }

    fn mem_only(&mut self) -> Result<(), ScanError> {
        if self.peek_byte()? & 0xc0 == 0xc0 {
            self.icode.opcode = Opcode::Zero;
        }
        Ok(())
    }

    fn mem_reg0(&mut self, op: u8) -> Result<(), ScanError> {
        let modrm = self.peek_byte()?;
        if (modrm >> 3) & 7 != 0 || modrm & 0xc0 == 0xc0 {
            self.icode.opcode = Opcode::Zero;
            Ok(())
        } else {
            self.rm(op)
        }
    }

    fn abs_mem(&mut self, op: u8) -> Result<(), ScanError> {
        let off = self.fetch_word()?;
        let seg = self.seg;
        self.set_address(op, false, seg, Base::Mem(None), off as i16);
        Ok(())
    }

    /// Displacement target relative to the next instruction, kept as an
    /// unsigned image offset.
    fn rel_target(&mut self, off: i32) {
        let target = (self.pos as u32).wrapping_add(off as u32);
        self.icode.src = LlOperand::Imm(target);
        self.icode.flags.insert(LlFlags::I);
    }

    fn disp8(&mut self) -> Result<(), ScanError> {
        let off = self.fetch_byte()? as i8;
        self.rel_target(i32::from(off));
        Ok(())
    }

    fn disp16(&mut self) -> Result<(), ScanError> {
        let off = self.fetch_word()? as i16;
        self.rel_target(i32::from(off));
        Ok(())
    }

    fn disp_far(&mut self) -> Result<(), ScanError> {
        let off = self.fetch_word()?;
        let seg = self.fetch_word()?;
        self.icode.src = LlOperand::Imm(u32::from(off) + (u32::from(seg) << 4));
        self.icode.flags.insert(LlFlags::I);
        Ok(())
    }

    fn prefix(&mut self, kind: PrefixKind) {
        match kind {
            PrefixKind::Seg(seg) => self.seg = Some(seg),
            PrefixKind::Repe => self.rep = Some(RepKind::Repe),
            PrefixKind::Repne => self.rep = Some(RepKind::Repne),
        }
    }

    fn imm8(&mut self, op: u8) -> Result<(), ScanError> {
        let b = self.fetch_byte()?;
        let value = if TABLE[op as usize].flg & LlFlags::S_EXT.bits() != 0 {
            b as i8 as i32 as u32
        } else {
            u32::from(b)
        };
        self.icode.src = LlOperand::Imm(value);
        self.icode.flags.insert(LlFlags::I);
        Ok(())
    }

    /// Fetch a word immediate. A word sitting on a relocation entry is a
    /// segment value. ENTER keeps the word on the destination side as its
    /// frame size; the nesting level follows as the source immediate.
    fn imm16(&mut self) -> Result<(), ScanError> {
        if self.image.is_reloc(self.pos as u32) {
            self.icode.flags.insert(LlFlags::SEG_IMMED);
        }
        let word = self.fetch_word()?;
        if self.icode.opcode == Opcode::Enter {
            self.icode.dst = LlOperand::Imm(u32::from(word));
            self.icode.flags.insert(LlFlags::NO_OPS);
        } else {
            self.icode.src = LlOperand::Imm(u32::from(word));
        }
        self.icode.flags.insert(LlFlags::I);
        Ok(())
    }

    fn const_imm(&mut self, value: u32) {
        self.icode.src = LlOperand::Imm(value);
        self.icode.flags.insert(LlFlags::I);
    }

    /// Interrupts 0x34..=0x3B are the Borland/Microsoft floating-point
    /// emulation convention; rewrite them as coprocessor escapes.
    fn int_check(&mut self) {
        if let LlOperand::Imm(n) = self.icode.src {
            if (0x34..=0x3b).contains(&n) {
                self.icode.src = LlOperand::Imm(n - 0x34);
                self.icode.opcode = Opcode::Esc;
                self.icode.flags.insert(LlFlags::FLOAT_OP);
            }
        }
    }

    fn imm_grp(&mut self, op: u8) -> Result<(), ScanError> {
        let reg = ((self.peek_byte()? >> 3) & 7) as usize;
        let (opcode, uf) = IMM_GRP[reg];
        self.icode.opcode = opcode;
        self.icode.uses = CondFlags::from_bits_truncate(uf);
        self.icode.def = CondFlags::SF | CondFlags::ZF | CondFlags::CF;
        self.rm(op)?;
        // ADD/SUB on SP stay translatable; they adjust the frame.
        if matches!(self.icode.opcode, Opcode::Add | Opcode::Sub) {
            self.icode.flags.remove(LlFlags::NOT_HLL);
        }
        Ok(())
    }

    fn shift_grp(&mut self, op: u8) -> Result<(), ScanError> {
        let reg = ((self.peek_byte()? >> 3) & 7) as usize;
        let (opcode, df, uf) = SHIFT_GRP[reg];
        self.icode.opcode = opcode;
        self.icode.def = CondFlags::from_bits_truncate(df);
        self.icode.uses = CondFlags::from_bits_truncate(uf);
        self.rm(op)?;
        self.icode.src = LlOperand::Reg(Register::Cl);
        Ok(())
    }

    fn arith_grp(&mut self, op: u8) -> Result<(), ScanError> {
        let reg = ((self.peek_byte()? >> 3) & 7) as usize;
        let (opcode, df) = ARITH_GRP[reg];
        self.icode.opcode = opcode;
        self.icode.def = CondFlags::from_bits_truncate(df);
        self.rm(op)?;
        match opcode {
            Opcode::Test => {
                if TABLE[op as usize].flg & LlFlags::B.bits() != 0 {
                    self.imm8(op)?;
                } else {
                    self.imm16()?;
                }
            }
            Opcode::Not | Opcode::Neg => {
                self.icode.flags.insert(LlFlags::NO_SRC);
            }
            _ => {
                self.icode.src = self.icode.dst.clone();
                self.set_address(op, true, None, Base::Reg(Register::Ax), 0);
            }
        }
        if matches!(opcode, Opcode::Div | Opcode::Idiv)
            && !self.icode.flags.contains(LlFlags::B)
        {
            self.icode.flags.insert(LlFlags::IM_TMP_DST);
        }
        Ok(())
    }

    /// Increment/transfer group. Byte encodings only exist for INC and DEC;
    /// the rest require the word form.
    fn trans_grp(&mut self, op: u8) -> Result<(), ScanError> {
        let reg = ((self.peek_byte()? >> 3) & 7) as usize;
        if reg < 2 || TABLE[op as usize].flg & LlFlags::B.bits() == 0 {
            let (opcode, df) = TRANS_GRP[reg];
            self.icode.opcode = opcode;
            self.icode.def = CondFlags::from_bits_truncate(df);
            self.rm(op)?;
            self.icode.src = self.icode.dst.clone();
            if matches!(opcode, Opcode::Jmp | Opcode::Call | Opcode::CallF) {
                self.icode.flags.insert(LlFlags::NO_OPS);
            } else if matches!(opcode, Opcode::Inc | Opcode::Push | Opcode::Dec) {
                self.icode.flags.insert(LlFlags::NO_SRC);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageKind;
    use crate::machine::MachineState;

    fn img(bytes: &[u8]) -> Image {
        Image::new(bytes.to_vec(), ImageKind::Exe, Vec::new(), MachineState::new())
    }

    fn decode(bytes: &[u8]) -> Scanned {
        scan(&img(bytes), 0).expect("valid instruction")
    }

    #[test]
    fn modrm_register_form_assigns_sides() {
        // MOV AX, CX
        let s = decode(&[0x8b, 0xc1]);
        assert_eq!(s.icode.opcode, Opcode::Mov);
        assert_eq!(s.icode.dst, LlOperand::Reg(Register::Ax));
        assert_eq!(s.icode.src, LlOperand::Reg(Register::Cx));
        assert_eq!(s.icode.num_bytes, 2);
    }

    #[test]
    fn byte_flag_selects_byte_registers() {
        // MOV BL, DH
        let s = decode(&[0x8a, 0xde]);
        assert_eq!(s.icode.dst, LlOperand::Reg(Register::Bl));
        assert_eq!(s.icode.src, LlOperand::Reg(Register::Dh));
    }

    #[test]
    fn bp_indexing_defaults_to_stack_segment() {
        // MOV AX, [BP-2]
        let s = decode(&[0x8b, 0x46, 0xfe]);
        assert_eq!(
            s.icode.src,
            LlOperand::Mem {
                seg: Register::Ss,
                seg_over: None,
                base: Some(IndexMode::Bp),
                off: -2,
            }
        );
    }

    #[test]
    fn sp_operand_disqualifies_hll() {
        // OR AX, SP
        let s = decode(&[0x09, 0xe0]);
        assert!(s.icode.flags.contains(LlFlags::NOT_HLL));
        // OR SP, imm16 keeps the disqualification.
        let s = decode(&[0x81, 0xcc, 0x34, 0x12]);
        assert_eq!(s.icode.opcode, Opcode::Or);
        assert!(s.icode.flags.contains(LlFlags::NOT_HLL));
        // ADD SP, 4 through the immediate group stays translatable.
        let s = decode(&[0x83, 0xc4, 0x04]);
        assert_eq!(s.icode.opcode, Opcode::Add);
        assert!(!s.icode.flags.contains(LlFlags::NOT_HLL));
    }

    #[test]
    fn rep_prefix_promotes_string_opcodes() {
        let s = decode(&[0xf3, 0xa4]);
        assert_eq!(s.icode.opcode, Opcode::RepMovs);
        assert_eq!(s.warning, None);
        assert_eq!(s.icode.num_bytes, 2);

        let s = decode(&[0xf3, 0xa6]);
        assert_eq!(s.icode.opcode, Opcode::RepeCmps);
        let s = decode(&[0xf2, 0xa6]);
        assert_eq!(s.icode.opcode, Opcode::RepneCmps);

        let s = decode(&[0xf3, 0xac]);
        assert_eq!(s.icode.opcode, Opcode::RepLods);
        assert!(s.icode.flags.contains(LlFlags::NOT_HLL));
    }

    #[test]
    fn dangling_prefixes_warn() {
        let s = decode(&[0xf3, 0x90]);
        assert_eq!(s.warning, Some(ScanWarning::DanglingRep));
        let s = decode(&[0x26, 0x90]);
        assert_eq!(s.warning, Some(ScanWarning::DanglingSegOverride));
    }

    #[test]
    fn invalid_and_386_opcodes_are_rejected() {
        assert_eq!(scan(&img(&[0xd6]), 0), Err(ScanError::InvalidOpcode(0xd6)));
        assert_eq!(scan(&img(&[0x0f]), 0), Err(ScanError::Invalid386Op(0x0f)));
        assert_eq!(scan(&img(&[0x66, 0x90]), 0), Err(ScanError::Invalid386Op(0x66)));
        // MOV CS, AX does not encode an instruction.
        assert_eq!(scan(&img(&[0x8e, 0xc8]), 0), Err(ScanError::InvalidOpcode(0x8e)));
        // LEA with a register r/m is likewise invalid.
        assert_eq!(scan(&img(&[0x8d, 0xc0]), 0), Err(ScanError::InvalidOpcode(0x8d)));
    }

    #[test]
    fn truncated_fetches_report_out_of_range() {
        assert_eq!(scan(&img(&[]), 0), Err(ScanError::IpOutOfRange(0)));
        assert_eq!(scan(&img(&[0xb8]), 0), Err(ScanError::IpOutOfRange(1)));
        assert_eq!(scan(&img(&[0x8b]), 0), Err(ScanError::IpOutOfRange(1)));
    }

    #[test]
    fn word_div_gets_a_temporary_destination() {
        let s = decode(&[0xf7, 0xf3]); // DIV BX
        assert_eq!(s.icode.opcode, Opcode::Div);
        assert!(s.icode.flags.contains(LlFlags::IM_TMP_DST));
        let s = decode(&[0xf6, 0xf3]); // DIV BL
        assert!(!s.icode.flags.contains(LlFlags::IM_TMP_DST));
    }

    #[test]
    fn enter_packs_frame_size_and_level() {
        let s = decode(&[0xc8, 0x10, 0x00, 0x02]);
        assert_eq!(s.icode.opcode, Opcode::Enter);
        assert_eq!(s.icode.dst, LlOperand::Imm(0x10));
        assert_eq!(s.icode.src, LlOperand::Imm(2));
        assert!(s.icode.flags.contains(LlFlags::NO_OPS));
    }

    #[test]
    fn relocated_immediate_is_a_segment_value() {
        let image = Image::new(
            vec![0xb8, 0x34, 0x12],
            ImageKind::Exe,
            vec![1],
            MachineState::new(),
        );
        let s = scan(&image, 0).unwrap();
        assert!(s.icode.flags.contains(LlFlags::SEG_IMMED));
        assert_eq!(s.icode.src, LlOperand::Imm(0x1234));
    }
}
