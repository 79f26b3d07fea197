//! Formal and actual argument recovery.
//!
//! Register values written just before a call are promoted into actuals at
//! the call site and formals on the callee; stack-pushed expressions become
//! positional actuals. Type mismatches between an actual and its formal are
//! reconciled where the rules allow, and are otherwise left for later
//! passes.

use crate::frame::{Expr, HlType, Ident, MacroTag, StackFrame, StkSym};
use crate::function::{FuncFlags, FuncId, Function, Program};
use crate::icode::{HlIcode, LlFlags};
use crate::image::{Image, ImageKind};
use crate::machine::Register;
use crate::opcode::Opcode;

use tracing::debug;

/// Register class of an assignment destination.
#[derive(Clone, Copy)]
enum RegClass {
    Single(Register),
    Pair { lo: Register, hi: Register },
}

impl Program {
    /// Walk backward from every call site of `fid` over the register
    /// assignments feeding it, promoting each into an argument.
    pub fn recover_reg_args(&mut self, fid: FuncId) {
        for t in 0..self.funcs[fid].icode.len() {
            let is_call = matches!(
                self.funcs[fid].icode.get(t).and_then(|ic| ic.hl.as_ref()),
                Some(HlIcode::Call { .. })
            );
            if !is_call {
                continue;
            }
            let mut p = t;
            while p > 0 {
                p -= 1;
                let ic = match self.funcs[fid].icode.get(p) {
                    Some(ic) => ic,
                    None => break,
                };
                if ic.flags.contains(LlFlags::NO_CODE) {
                    continue;
                }
                let feeds_call = match &ic.hl {
                    Some(HlIcode::Assign { lhs, .. }) => {
                        matches!(lhs.ident(), Some(Ident::Reg(_) | Ident::Long(_)))
                            && !ic.du.def.is_empty()
                    }
                    _ => false,
                };
                if !feeds_call {
                    break;
                }
                self.new_reg_arg(fid, p, t);
            }
        }
    }

    /// Promote the register assignment at `picode` into an argument of the
    /// call at `ticode`.
    ///
    /// The assignment's destination register (or long register pair) is
    /// interned in the callee's local table; a formal referencing it is
    /// appended unless one exists; the assignment's source expression is
    /// pushed as the call-site actual; and the defined register bits are
    /// masked off the assignment so later passes see the value flowing into
    /// a parameter rather than dying.
    pub fn new_reg_arg(&mut self, caller: FuncId, picode: usize, ticode: usize) {
        let (lhs, rhs) = match self.funcs[caller].icode.get(picode).and_then(|ic| ic.hl.as_ref())
        {
            Some(HlIcode::Assign { lhs, rhs }) => (lhs.clone(), rhs.clone()),
            _ => return,
        };
        let callee = match self.funcs[caller].icode.get(ticode).and_then(|ic| ic.hl.as_ref()) {
            Some(HlIcode::Call { proc, .. }) => *proc,
            _ => return,
        };

        let class = match lhs.ident() {
            Some(Ident::Reg(idx)) => match self.funcs[caller].local_id.registers(*idx) {
                Some((reg, None)) => RegClass::Single(reg),
                _ => return,
            },
            Some(Ident::Long(idx)) => match self.funcs[caller].local_id.registers(*idx) {
                Some((lo, Some(hi))) => RegClass::Pair { lo, hi },
                _ => return,
            },
            _ => return,
        };
        let arg_type = match &class {
            RegClass::Single(reg) if reg.is_word() => HlType::WordSign,
            RegClass::Single(_) => HlType::ByteSign,
            RegClass::Pair { .. } => HlType::LongSign,
        };

        // Callee side: intern the register local and ensure a formal.
        {
            let target = &mut self.funcs[callee];
            target.flags.insert(FuncFlags::REG_ARGS);
            let (tidx, regs) = match class {
                RegClass::Single(reg) => {
                    let tidx = target.local_id.new_byte_word_reg(arg_type, reg);
                    (tidx, Expr::Ident(Ident::Reg(tidx)))
                }
                RegClass::Pair { lo, hi } => {
                    let tidx = target.local_id.new_long_reg(arg_type, hi, lo, 0);
                    (tidx, Expr::Ident(Ident::Long(tidx)))
                }
            };
            let exists = target.args.syms.iter().any(|sym| sym.regs.as_ref() == Some(&regs));
            if !exists {
                let name = format!("arg{}", target.args.syms.len());
                if let Some(id) = target.local_id.get_mut(tidx) {
                    id.name = Some(name.clone());
                }
                if let RegClass::Pair { lo, hi } = class {
                    target.local_id.prop_long_id(lo, hi, &name);
                }
                target.args.push(StkSym {
                    name,
                    ty: arg_type,
                    size: arg_type.size(),
                    regs: Some(regs),
                    ..StkSym::default()
                });
                debug!(callee = %target.name, formals = target.args.num_args, "formal appended");
            }
        }

        // Caller side: mask the defined registers and push the actual.
        let source = &mut self.funcs[caller];
        if let Some(ic) = source.icode.get_mut(picode) {
            match class {
                RegClass::Single(reg) => ic.du.def.mask_off(reg),
                RegClass::Pair { lo, hi } => {
                    ic.du.def.mask_off(lo);
                    ic.du.def.mask_off(hi);
                }
            }
        }
        if let Some(HlIcode::Call { args, .. }) =
            source.icode.get_mut(ticode).and_then(|ic| ic.hl.as_mut())
        {
            args.push(StkSym {
                name: format!("arg{}", args.syms.len()),
                ty: arg_type,
                size: arg_type.size(),
                regs: Some(lhs),
                actual: Some(rhs),
                ..StkSym::default()
            });
        }
    }

    /// Push a stack-passed actual onto the call at `ticode`.
    ///
    /// A segment register on a far call is a long reference into another
    /// segment, not an argument, and is suppressed. Returns true when a
    /// near call tried to pass a segment register, which the caller reports
    /// as an error.
    pub fn new_stk_arg(&mut self, caller: FuncId, ticode: usize, exp: Expr) -> bool {
        let opcode = match self.funcs[caller].icode.get(ticode) {
            Some(ic) => ic.opcode,
            None => return false,
        };
        if let Some(Ident::Reg(idx)) = exp.ident() {
            if let Some((reg, None)) = self.funcs[caller].local_id.registers(*idx) {
                if reg.is_segment() {
                    return opcode != Opcode::CallF;
                }
            }
        }
        if let Some(HlIcode::Call { args, .. }) = self.funcs[caller]
            .icode
            .get_mut(ticode)
            .and_then(|ic| ic.hl.as_mut())
        {
            args.push(StkSym {
                actual: Some(exp),
                ..StkSym::default()
            });
        }
        false
    }

    /// Place the actual `exp` at position `pos` of the call's argument
    /// frame.
    pub fn place_stk_arg(&mut self, caller: FuncId, ticode: usize, exp: Expr, pos: usize) {
        if let Some(HlIcode::Call { args, .. }) = self.funcs[caller]
            .icode
            .get_mut(ticode)
            .and_then(|ic| ic.hl.as_mut())
        {
            if let Some(sym) = args.syms.get_mut(pos) {
                sym.actual = Some(exp);
                sym.name = format!("arg{pos}");
            }
        }
    }
}

/// Rewrite an actual whose inferred type disagrees with the formal's, where
/// a rule applies. A constant passed where a string is expected is an
/// offset from the caller's data segment into the image; other mismatches
/// are left alone.
pub fn adjust_act_arg_type(exp: &mut Expr, for_type: HlType, proc: &Function, image: &Image) {
    let act_type = exp.hl_type(&proc.local_id);
    let ident = match exp {
        Expr::Ident(id) => id,
        Expr::Bin(..) => return,
    };
    if act_type == for_type {
        return;
    }
    if for_type == HlType::Str && act_type == HlType::Const {
        if let Ident::Const(off) = *ident {
            let base = u32::from(proc.state.reg(Register::Ds)) << 4;
            let bias = if image.kind() == ImageKind::Com { 0x100 } else { 0 };
            *ident = Ident::Str(base + off + bias);
        }
    }
}

impl StackFrame {
    /// Reconcile the formal at logical position `num_arg` with an actual of
    /// type `act_type`. A long actual meeting a word or unknown formal
    /// merges that formal with its successor into one long LO/HI pair.
    pub fn adjust_for_arg_type(&mut self, num_arg: usize, act_type: HlType) {
        // Stack offset of the formal at this position.
        let mut off = i32::from(self.min_off);
        for i in 0..num_arg {
            match self.syms.get(i) {
                Some(sym) => off += i32::from(sym.size),
                None => break,
            }
        }

        if num_arg >= self.syms.len() {
            return;
        }
        let pos = match (num_arg..self.syms.len()).find(|&i| i32::from(self.syms[i].off) == off) {
            Some(pos) => pos,
            None => return,
        };

        let for_type = self.syms[pos].ty;
        if for_type == act_type || !act_type.is_long() {
            return;
        }
        if !matches!(
            for_type,
            HlType::WordSign | HlType::WordUnsign | HlType::Unknown
        ) {
            return;
        }
        if pos + 1 >= self.syms.len() {
            return;
        }

        self.syms[pos].ty = act_type;
        self.syms[pos].size = 4;
        self.syms[pos].macro_tag = Some(MacroTag::Lo);
        let name = self.syms[pos].name.clone();
        let high = &mut self.syms[pos + 1];
        high.macro_tag = Some(MacroTag::Hi);
        high.name = name;
        high.invalid = true;
        self.num_args = self.num_args.saturating_sub(1);
    }
}
