use decomp86::prelude::*;

fn func(icodes: Vec<Icode>) -> Function {
    let mut f = Function::new("test_proc", 0, MachineState::new());
    for ic in icodes {
        f.icode.push(ic);
    }
    f
}

fn plain(opcode: Opcode, label: u32) -> Icode {
    let mut ic = Icode::new(label);
    ic.opcode = opcode;
    ic.num_bytes = 1;
    ic
}

/// Unconditional jump to the instruction at index `target`.
fn jmp(label: u32, target: u32) -> Icode {
    let mut ic = plain(Opcode::Jmp, label);
    ic.src = LlOperand::Imm(target);
    ic.flags.insert(LlFlags::I | LlFlags::NO_OPS);
    ic
}

/// Conditional jump to the instruction at index `target`.
fn jcc(opcode: Opcode, label: u32, target: u32) -> Icode {
    let mut ic = plain(opcode, label);
    ic.src = LlOperand::Imm(target);
    ic.flags.insert(LlFlags::I);
    ic
}

fn ret(label: u32) -> Icode {
    plain(Opcode::Ret, label)
}

/// Sum of resolved out-edges landing on each block must match its in-edge
/// list, and the numbering must be internally consistent.
fn assert_graph_invariants(f: &Function) {
    for (b, bb) in f.blocks.iter().enumerate() {
        let incoming = f
            .blocks
            .iter()
            .flat_map(|p| p.out_edges.iter())
            .filter(|e| e.to == Some(b))
            .count();
        assert_eq!(incoming, bb.in_edges.len(), "in-edge count of block {b}");
        for (i, pred) in bb.in_edges.iter().enumerate() {
            let p = pred.unwrap_or_else(|| panic!("unfilled in-edge {i} of block {b}"));
            assert!(
                f.blocks[p].out_edges.iter().any(|e| e.to == Some(b)),
                "in-edge {i} of block {b} does not correspond to an out-edge"
            );
        }
        assert_eq!(
            f.dfs_last[bb.dfs_last].expect("dfs_last slot"),
            b,
            "dfs_last slot of block {b}"
        );
    }
    assert_eq!(f.blocks[0].dfs_first, 0, "entry first-visit ordinal");
}

#[test]
fn jump_chain_collapses_to_a_single_return_block() {
    // JMP L1; L1: JMP L2; L2: RET
    let mut f = func(vec![jmp(0, 1), jmp(1, 2), ret(2)]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks.len(), 3);
    assert_eq!(f.blocks[0].kind, NodeKind::OneBranch);

    f.compress_cfg();
    assert_eq!(f.blocks.len(), 1);
    assert_eq!(f.blocks[0].kind, NodeKind::ReturnNode);
    assert_eq!(f.blocks[0].start, 0);
    assert_eq!(f.blocks[0].length, 3);

    for i in [0usize, 1] {
        let ic = f.icode.get(i).unwrap();
        assert!(ic.is_no_code(), "jump {i} must be elided");
        assert!(ic.invalid, "jump {i} must be invalidated");
    }
    assert!(!f.icode.get(2).unwrap().is_no_code());
    assert_graph_invariants(&f);
}

#[test]
fn diamond_keeps_its_shape_and_numbering() {
    // JNE L2; JMP L3; L2: NOP; L3: RET
    let mut target_ret = ret(3);
    target_ret.flags.insert(LlFlags::TARGET);
    let mut f = func(vec![
        jcc(Opcode::Jne, 0, 2),
        jmp(1, 3),
        plain(Opcode::Nop, 2),
        target_ret,
    ]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks.len(), 4);
    assert_eq!(f.blocks[0].kind, NodeKind::TwoBranch);
    assert_eq!(f.blocks[0].out_edges.len(), 2);
    assert_eq!(f.blocks[2].kind, NodeKind::FallNode);

    f.compress_cfg();
    // Nothing merges: the join point has two predecessors.
    assert_eq!(f.blocks.len(), 4);
    assert_graph_invariants(&f);

    let join = f.blocks.iter().position(|b| b.kind == NodeKind::ReturnNode).unwrap();
    assert_eq!(f.blocks[join].in_edges.len(), 2);
}

#[test]
fn simplification_is_idempotent() {
    let mut target_ret = ret(3);
    target_ret.flags.insert(LlFlags::TARGET);
    let mut f = func(vec![
        jcc(Opcode::Jne, 0, 2),
        jmp(1, 3),
        plain(Opcode::Nop, 2),
        target_ret,
    ]);
    f.create_cfg(|_| false).unwrap();
    f.compress_cfg();

    let blocks = f.blocks.clone();
    let dfs_last = f.dfs_last.clone();
    let icode = f.icode.clone();
    f.compress_cfg();
    assert_eq!(f.blocks, blocks);
    assert_eq!(f.dfs_last, dfs_last);
    assert_eq!(f.icode, icode);
}

#[test]
fn conditional_jump_without_a_label_degrades_to_one_edge() {
    let mut j = jcc(Opcode::Je, 0, 0);
    j.flags.insert(LlFlags::NO_LABEL);
    let mut f = func(vec![j, ret(1)]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks[0].kind, NodeKind::TwoBranch);
    assert_eq!(f.blocks[0].out_edges.len(), 1);
    assert_eq!(f.blocks[0].out_edges[0].ip, 1);
}

#[test]
fn loops_get_their_own_node_kind() {
    let mut f = func(vec![
        plain(Opcode::Inc, 0),
        jcc(Opcode::Loop, 1, 0),
        ret(2),
    ]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks[0].kind, NodeKind::LoopNode);
    assert_eq!(f.blocks[0].out_edges.len(), 2);
    f.compress_cfg();
    assert_graph_invariants(&f);
}

#[test]
fn switch_jump_fans_out_per_case_entry() {
    let mut sw = plain(Opcode::Jmp, 0);
    sw.flags.insert(LlFlags::SWITCH);
    sw.case_tbl = Some(vec![1, 2]);
    let mut case1 = ret(1);
    case1.flags.insert(LlFlags::CASE);
    let mut case2 = ret(2);
    case2.flags.insert(LlFlags::CASE);

    let mut f = func(vec![sw, case1, case2]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks[0].kind, NodeKind::MultiBranch);
    assert_eq!(f.blocks[0].out_edges.len(), 2);
    assert!(f.flags.contains(FuncFlags::HAS_CASE));
}

#[test]
fn calls_fall_through_unless_the_callee_terminates() {
    let mut call_exit = plain(Opcode::Call, 0);
    call_exit.src = LlOperand::Proc(1);
    let mut f = func(vec![call_exit.clone(), ret(1)]);
    f.create_cfg(|callee| callee == 1).unwrap();
    assert_eq!(f.blocks[0].kind, NodeKind::CallNode);
    assert!(f.blocks[0].out_edges.is_empty());

    let mut f = func(vec![call_exit, ret(1)]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks[0].kind, NodeKind::CallNode);
    assert_eq!(f.blocks[0].out_edges.len(), 1);
}

#[test]
fn running_off_the_end_synthesizes_a_dead_end() {
    let mut f = func(vec![plain(Opcode::Inc, 0), plain(Opcode::Dec, 1)]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks.len(), 1);
    assert_eq!(f.blocks[0].kind, NodeKind::NowhereNode);
    assert_eq!(f.blocks[0].length, 2);
}

#[test]
fn unresolved_targets_are_fatal() {
    let mut f = func(vec![jmp(0, 7), ret(1)]);
    let err = f.create_cfg(|_| false).unwrap_err();
    assert!(matches!(err, FatalError::UnresolvedTarget { ip: 7, .. }));
}

#[test]
fn synthesized_targets_are_fatal() {
    let mut f = func(vec![jmp(0, 0x0010_0000), ret(1)]);
    let err = f.create_cfg(|_| false).unwrap_err();
    assert_eq!(err, FatalError::SyntheticTarget(0x0010_0000));
}

#[test]
fn no_code_records_neither_open_nor_close_blocks() {
    let mut hole = plain(Opcode::Nop, 1);
    hole.flags.insert(LlFlags::NO_CODE);
    let mut f = func(vec![plain(Opcode::Inc, 0), hole, ret(2)]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks.len(), 1);
    assert_eq!(f.blocks[0].kind, NodeKind::ReturnNode);
    assert_eq!(f.blocks[0].length, 3);
}

#[test]
fn jump_elision_carves_holes_the_merge_pass_crosses() {
    // JNE L2; MOV; JMP L1; L1: JMP L2; L2: RET
    //
    // Pass 1 elides the intermediate pure jump (instruction 3), leaving a
    // NO_CODE hole between the first jump and its rewritten target; pass 2
    // must still invalidate that jump across the hole.
    let mut target_ret = ret(4);
    target_ret.flags.insert(LlFlags::TARGET);
    let mut f = func(vec![
        jcc(Opcode::Jne, 0, 4),
        plain(Opcode::Mov, 1),
        jmp(2, 3),
        jmp(3, 4),
        target_ret,
    ]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks.len(), 4);

    f.compress_cfg();
    assert!(f.icode.get(3).unwrap().is_no_code(), "elided pure jump");
    assert!(f.icode.get(2).unwrap().is_no_code(), "jump across the hole");
    assert_eq!(f.blocks.len(), 3);
    let mid = f.blocks.iter().find(|b| b.start == 1).unwrap();
    assert_eq!(mid.kind, NodeKind::FallNode);
    assert_graph_invariants(&f);
}

#[test]
fn self_loop_survives_simplification() {
    // L: NOP; JMP L, one block jumping to its own start.
    let mut head = plain(Opcode::Nop, 0);
    head.flags.insert(LlFlags::TARGET);
    let mut f = func(vec![head, jmp(1, 0)]);
    f.create_cfg(|_| false).unwrap();
    assert_eq!(f.blocks.len(), 1);
    assert_eq!(f.blocks[0].kind, NodeKind::OneBranch);

    f.compress_cfg();
    assert_eq!(f.blocks.len(), 1);
    assert_eq!(f.blocks[0].kind, NodeKind::OneBranch);
    assert_eq!(f.blocks[0].out_edges[0].to, Some(0));
    assert!(!f.icode.get(1).unwrap().is_no_code());
    assert_graph_invariants(&f);
}
