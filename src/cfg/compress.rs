//! Control-flow graph simplification.
//!
//! Three passes, in order: jump elision rewrites edges that lead through
//! pure-jump blocks, a depth-first merge folds fall-through chains, and a
//! final pass compacts the arena and assigns depth-first visit ordinals
//! while materializing in-edge back-references.

use crate::cfg::{BasicBlock, BbId, NodeKind};
use crate::consts::{DFS_JMP, DFS_MERGE, DFS_NUM, UN_INIT};
use crate::function::Function;
use crate::icode::{IcodeBuf, LlFlags};

use itertools::Itertools;
use tracing::debug;

impl Function {
    /// Remove redundant jumps and blocks and number the survivors.
    ///
    /// Running this on an already-simplified graph changes nothing beyond
    /// re-deriving the same numbering.
    pub fn compress_cfg(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let before = self.blocks.len();

        self.elide_jumps();
        merge_fall_through(&mut self.blocks, &mut self.icode, 0);
        self.compact();

        let count = self.blocks.len();
        self.dfs_last = vec![None; count];
        let mut first = 0usize;
        let mut last = count as isize - 1;
        dfs_number(&mut self.blocks, &mut self.dfs_last, 0, &mut first, &mut last);

        debug!(
            proc = %self.name,
            before,
            after = count,
            "control-flow graph compressed"
        );
    }

    /// Pass 1: chase every out-edge of a reachable branch block through any
    /// chain of single-instruction jump blocks, re-pointing the edge at the
    /// chain's end and invalidating jumps left without predecessors.
    fn elide_jumps(&mut self) {
        for b in 0..self.blocks.len() {
            if self.blocks[b].in_edges.is_empty()
                || !matches!(self.blocks[b].kind, NodeKind::OneBranch | NodeKind::TwoBranch)
            {
                continue;
            }
            let mut e = 0;
            while e < self.blocks[b].out_edges.len() {
                let ip = self.blocks[b].last_ip();
                if let Some(target) = self.blocks[b].out_edges[e].to {
                    let next = rm_jmp(&mut self.blocks, &mut self.icode, ip, target);
                    // The chase may have clobbered this block's own edges.
                    if self.blocks[b].out_edges.get(e).is_some() {
                        let next_start = self.blocks[next].start as u32;
                        self.blocks[b].out_edges[e].to = Some(next);
                        self.icode.set_immediate(ip, next_start);
                    }
                }
                e += 1;
            }
        }
    }

    /// Pass 3 (compaction half): delete blocks that ended up with no
    /// predecessors, apart from the entry, and remap the survivors' edges.
    fn compact(&mut self) {
        if self.blocks[0].in_edges.is_empty() {
            self.blocks[0].index = UN_INIT;
        }
        let dead: Vec<usize> = self
            .blocks
            .iter()
            .positions(|bb| bb.in_edges.is_empty())
            .filter(|&i| i != 0)
            .collect();
        if dead.is_empty() {
            return;
        }

        let mut remap = vec![UN_INIT; self.blocks.len()];
        let mut kept = 0;
        for (i, slot) in remap.iter_mut().enumerate() {
            if i == 0 || !self.blocks[i].in_edges.is_empty() {
                *slot = kept;
                kept += 1;
            }
        }

        let mut i = 0;
        self.blocks.retain(|_| {
            let keep = remap[i] != UN_INIT;
            i += 1;
            keep
        });
        for bb in &mut self.blocks {
            for edge in &mut bb.out_edges {
                if let Some(to) = edge.to {
                    edge.to = Some(remap[to]);
                }
            }
        }
    }
}

/// Follow a chain of pure-jump blocks (a lone unconditional jump) from
/// `bb`, unlinking each one from the origin's path. A chain member whose
/// last predecessor goes away has its jump invalidated. A chain that bites
/// its own tail demotes the head block to a dead end and drops its edges.
/// Returns the block the origin's edge should point at.
fn rm_jmp(blocks: &mut [BasicBlock], icode: &mut IcodeBuf, origin: usize, mut bb: BbId) -> BbId {
    let marker = DFS_JMP + origin as u32;

    while blocks[bb].kind == NodeKind::OneBranch && blocks[bb].length == 1 {
        if blocks[bb].traversed != marker {
            blocks[bb].traversed = marker;
            blocks[bb].in_edges.pop();
            let target = blocks[bb].out_edges.first().and_then(|e| e.to);
            if !blocks[bb].in_edges.is_empty() {
                // The origin now reaches the target directly.
                if let Some(t) = target {
                    blocks[t].in_edges.push(None);
                }
            } else {
                icode.set_flag(blocks[bb].start, LlFlags::NO_CODE);
                icode.set_invalid(blocks[bb].start, true);
            }
            match target {
                Some(t) => bb = t,
                None => break,
            }
        } else {
            // Going around in circles.
            blocks[bb].kind = NodeKind::NowhereNode;
            icode.set_immediate(blocks[bb].start, blocks[bb].start as u32);
            let mut p = bb;
            loop {
                p = match blocks[p].out_edges.first().and_then(|e| e.to) {
                    Some(t) => t,
                    None => break,
                };
                blocks[p].in_edges.pop();
                if !blocks[p].in_edges.is_empty() {
                    icode.set_flag(blocks[p].start, LlFlags::NO_CODE);
                    icode.set_invalid(blocks[p].start, true);
                }
                if blocks[p].kind == NodeKind::NowhereNode {
                    break;
                }
            }
            blocks[bb].out_edges.clear();
        }
    }
    bb
}

/// Pass 2: depth-first merge of fall-through chains. A block absorbs its
/// unique successor when nothing else enters that successor; a trailing
/// unconditional jump is first invalidated, provided only `NO_CODE` holes
/// separate it from its target.
fn merge_fall_through(blocks: &mut [BasicBlock], icode: &mut IcodeBuf, cur: BbId) {
    loop {
        let kind = blocks[cur].kind;
        if kind != NodeKind::FallNode && kind != NodeKind::OneBranch {
            break;
        }
        let child = match blocks[cur].out_edges.first().and_then(|e| e.to) {
            Some(c) => c,
            None => break,
        };

        if kind == NodeKind::OneBranch {
            let gap = blocks[cur].start + blocks[cur].length;
            let adjacent = blocks[child].start >= gap
                && (gap..blocks[child].start)
                    .all(|i| icode.get(i).map_or(false, |ic| ic.is_no_code()));
            if !adjacent {
                break;
            }
            icode.set_flag(gap - 1, LlFlags::NO_CODE);
            icode.set_invalid(gap - 1, true);
            blocks[cur].kind = NodeKind::FallNode;
            blocks[cur].length -= 1;
        }

        if blocks[child].in_edges.len() != 1 {
            break;
        }

        blocks[cur].kind = blocks[child].kind;
        blocks[cur].length = blocks[child].start + blocks[child].length - blocks[cur].start;
        icode.clear_flag(blocks[child].start, LlFlags::TARGET);
        blocks[cur].out_edges = std::mem::take(&mut blocks[child].out_edges);
        blocks[child].in_edges.clear();
    }

    blocks[cur].traversed = DFS_MERGE;
    for e in 0..blocks[cur].out_edges.len() {
        if let Some(child) = blocks[cur].out_edges[e].to {
            if blocks[child].traversed != DFS_MERGE {
                merge_fall_through(blocks, icode, child);
            }
        }
    }
}

/// Pass 3 (numbering half): record first-visit ordinals ascending from 0
/// and last-visit ordinals descending from the block count, filling each
/// block's in-edge list with predecessor back-references along the way.
fn dfs_number(
    blocks: &mut [BasicBlock],
    dfs_last: &mut [Option<BbId>],
    cur: BbId,
    first: &mut usize,
    last: &mut isize,
) {
    blocks[cur].traversed = DFS_NUM;
    blocks[cur].dfs_first = *first;
    *first += 1;

    for e in 0..blocks[cur].out_edges.len() {
        let child = match blocks[cur].out_edges[e].to {
            Some(c) => c,
            None => continue,
        };
        let cursor = blocks[child].index;
        if cursor < blocks[child].in_edges.len() {
            blocks[child].in_edges[cursor] = Some(cur);
            blocks[child].index = cursor + 1;
            if blocks[child].index == blocks[child].in_edges.len() {
                blocks[child].index = UN_INIT;
            }
        }
        if blocks[child].traversed != DFS_NUM {
            dfs_number(blocks, dfs_last, child, first, last);
        }
    }

    blocks[cur].dfs_last = *last as usize;
    dfs_last[*last as usize] = Some(cur);
    *last -= 1;
}
