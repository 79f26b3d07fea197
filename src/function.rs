//! Procedure representation and the per-run driver state.

use crate::cfg::{BasicBlock, BbId};
use crate::error::FatalError;
use crate::frame::{LocalIdTable, StackFrame};
use crate::icode::{IcodeBuf, LlFlags};
use crate::image::{DataSym, Image};
use crate::machine::MachineState;

use bitflags::bitflags;
use tracing::debug;

/// Stable identity of a discovered procedure: its index in the driver's
/// function list.
pub type FuncId = usize;

bitflags! {
    /// Per-procedure attribute flags.
    pub struct FuncFlags: u32 {
        /// The procedure never returns to its caller.
        const TERMINATES = 0x0001;
        /// The procedure receives arguments in registers.
        const REG_ARGS = 0x0002;
        /// Some instruction's operand memory overlaps known code.
        const IMPURE = 0x0004;
        /// The procedure dispatches through a case table.
        const HAS_CASE = 0x0008;
    }
}

/// One discovered procedure: its instruction records, control-flow graph
/// and recovered argument information.
#[derive(Debug, Clone)]
pub struct Function {
    /// Procedure name.
    pub name: String,
    /// Image offset of the entry point.
    pub start_ip: u32,
    /// Attribute flags.
    pub flags: FuncFlags,
    /// Instruction records, in scan order.
    pub icode: IcodeBuf,
    /// Basic-block arena; the entry block is index 0.
    pub blocks: Vec<BasicBlock>,
    /// Blocks in descending last-visit order after simplification.
    pub dfs_last: Vec<Option<BbId>>,
    /// Interned local identifiers.
    pub local_id: LocalIdTable,
    /// Formal argument frame.
    pub args: StackFrame,
    /// Register snapshot on entry.
    pub state: MachineState,
}

impl Function {
    /// Fresh procedure with an empty instruction buffer.
    pub fn new(name: impl Into<String>, start_ip: u32, state: MachineState) -> Self {
        Self {
            name: name.into(),
            start_ip,
            flags: FuncFlags::empty(),
            icode: IcodeBuf::new(),
            blocks: Vec::new(),
            dfs_last: Vec::new(),
            local_id: LocalIdTable::new(),
            args: StackFrame::new(),
            state,
        }
    }

    /// Tag instructions whose referenced data overlaps known code, and the
    /// procedure itself, as impure. `is_code` is the code-bitmap predicate
    /// the symbol table exposes.
    pub fn mark_impure(&mut self, syms: &[DataSym], is_code: impl Fn(u32) -> bool) {
        for i in 0..self.icode.len() {
            let ic = match self.icode.get(i) {
                Some(ic) => ic,
                None => continue,
            };
            if !ic.flags.intersects(LlFlags::SYM_USE | LlFlags::SYM_DEF) {
                continue;
            }
            let sym = match ic.data_sym.and_then(|s| syms.get(s)) {
                Some(sym) => sym,
                None => continue,
            };
            if (sym.label..sym.label + sym.size).any(&is_code) {
                self.icode.set_flag(i, LlFlags::IMPURE);
                self.flags.insert(FuncFlags::IMPURE);
                debug!(proc = %self.name, icode = i, "operand memory overlaps code");
            }
        }
    }
}

/// Driver state for one analysis run: the loaded image and the procedures
/// discovered so far.
#[derive(Debug, Clone)]
pub struct Program {
    /// The loaded image.
    pub image: Image,
    /// Discovered procedures, addressed by [`FuncId`].
    pub funcs: Vec<Function>,
}

impl Program {
    /// New driver state over a loaded image.
    pub fn new(image: Image) -> Self {
        Self {
            image,
            funcs: Vec::new(),
        }
    }

    /// Append a procedure, returning its id.
    pub fn add_func(&mut self, func: Function) -> FuncId {
        self.funcs.push(func);
        self.funcs.len() - 1
    }

    /// Build the control-flow graph of one procedure, consulting the other
    /// procedures' terminate flags at call sites.
    pub fn build_cfg(&mut self, fid: FuncId) -> Result<(), FatalError> {
        let term: Vec<bool> = self
            .funcs
            .iter()
            .map(|f| f.flags.contains(FuncFlags::TERMINATES))
            .collect();
        self.funcs[fid].create_cfg(|callee| term.get(callee).copied().unwrap_or(false))
    }
}
