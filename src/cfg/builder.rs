//! Basic-block partitioning and edge resolution.

use crate::cfg::{BasicBlock, Edge, NodeKind};
use crate::consts::SYNTHESIZED_MIN;
use crate::error::FatalError;
use crate::function::{FuncFlags, FuncId, Function};
use crate::icode::{LlFlags, LlOperand};

use tracing::debug;

impl Function {
    /// Split the procedure's instruction records into basic blocks and link
    /// them into a control-flow graph.
    ///
    /// A block ends on a conditional or unconditional jump, a call, a
    /// return, a process-terminating instruction, the instruction before a
    /// join point, and at the end of the procedure. Records flagged
    /// `NO_CODE` neither open nor close a block. The second pass resolves
    /// every out-edge to the block starting at its target instruction
    /// index; an unresolved target is a structural error.
    ///
    /// `callee_terminates` reports whether a resolved call target never
    /// returns, in which case the call ends its block with no successors.
    pub fn create_cfg(
        &mut self,
        callee_terminates: impl Fn(FuncId) -> bool,
    ) -> Result<(), FatalError> {
        self.blocks.clear();
        let count = self.icode.len();
        let mut start = 0usize;

        for ip in 0..count {
            let (flags, opcode, src, case_tbl) = match self.icode.get(ip) {
                Some(ic) => (ic.flags, ic.opcode, ic.src.clone(), ic.case_tbl.clone()),
                None => break,
            };
            let next_flags = self
                .icode
                .get(ip + 1)
                .map(|ic| ic.flags)
                .unwrap_or_else(LlFlags::empty);

            // A procedure that runs off its end gets a synthetic exit.
            if ip + 1 == count
                && !flags.contains(LlFlags::TERMINATES)
                && !opcode.is_jump()
                && !opcode.is_ret()
            {
                self.blocks.push(BasicBlock::new(start, ip, NodeKind::NowhereNode));
                continue;
            }
            if flags.contains(LlFlags::NO_CODE) {
                continue;
            }

            if opcode.is_conditional_jump() || opcode.is_loop() {
                let kind = if opcode.is_loop() {
                    NodeKind::LoopNode
                } else {
                    NodeKind::TwoBranch
                };
                let mut bb = BasicBlock::new(start, ip, kind);
                start = ip + 1;
                bb.out_edges.push(Edge::new(start as u32));
                // Jumps off into nowhere lose their taken edge.
                if !flags.contains(LlFlags::NO_LABEL) {
                    if let Some(target) = src.imm() {
                        bb.out_edges.push(Edge::new(target));
                    }
                }
                self.blocks.push(bb);
            } else if opcode.is_jump() {
                if flags.contains(LlFlags::SWITCH) {
                    let mut bb = BasicBlock::new(start, ip, NodeKind::MultiBranch);
                    if let Some(entries) = &case_tbl {
                        bb.out_edges.extend(entries.iter().map(|&e| Edge::new(e)));
                    }
                    self.flags.insert(FuncFlags::HAS_CASE);
                    self.blocks.push(bb);
                } else if flags.contains(LlFlags::I) && !flags.contains(LlFlags::NO_LABEL) {
                    let mut bb = BasicBlock::new(start, ip, NodeKind::OneBranch);
                    if let Some(target) = src.imm() {
                        bb.out_edges.push(Edge::new(target));
                    }
                    self.blocks.push(bb);
                } else {
                    self.blocks.push(BasicBlock::new(start, ip, NodeKind::NowhereNode));
                }
                start = ip + 1;
            } else if opcode.is_call() {
                let falls_through = match src {
                    LlOperand::Proc(callee) => !callee_terminates(callee),
                    _ => true,
                };
                let mut bb = BasicBlock::new(start, ip, NodeKind::CallNode);
                start = ip + 1;
                if falls_through {
                    bb.out_edges.push(Edge::new(start as u32));
                }
                self.blocks.push(bb);
            } else if opcode.is_ret() {
                self.blocks.push(BasicBlock::new(start, ip, NodeKind::ReturnNode));
                start = ip + 1;
            } else if flags.contains(LlFlags::TERMINATES) {
                self.blocks.push(BasicBlock::new(start, ip, NodeKind::TerminateNode));
                start = ip + 1;
            } else if next_flags.intersects(LlFlags::TARGET | LlFlags::CASE) {
                // The successor is a join point; fall into it.
                let mut bb = BasicBlock::new(start, ip, NodeKind::FallNode);
                start = ip + 1;
                bb.out_edges.push(Edge::new(start as u32));
                self.blocks.push(bb);
            }
        }

        self.resolve_edges()?;
        debug!(proc = %self.name, blocks = self.blocks.len(), "control-flow graph built");
        Ok(())
    }

    /// Turn the list of blocks into a graph: point every out-edge at the
    /// block whose start matches its target, and give the target an in-edge
    /// placeholder that the numbering pass will fill.
    fn resolve_edges(&mut self) -> Result<(), FatalError> {
        for b in 0..self.blocks.len() {
            for e in 0..self.blocks[b].out_edges.len() {
                let ip = self.blocks[b].out_edges[e].ip;
                if ip >= SYNTHESIZED_MIN {
                    return Err(FatalError::SyntheticTarget(ip));
                }
                let target = self
                    .blocks
                    .iter()
                    .position(|bb| bb.start == ip as usize)
                    .ok_or_else(|| FatalError::UnresolvedTarget {
                        ip,
                        proc: self.name.clone(),
                    })?;
                self.blocks[b].out_edges[e].to = Some(target);
                self.blocks[target].in_edges.push(None);
            }
        }
        Ok(())
    }
}
