use decomp86::prelude::*;

fn image(bytes: &[u8]) -> Image {
    Image::new(bytes.to_vec(), ImageKind::Exe, Vec::new(), MachineState::new())
}

#[test]
fn nop_is_a_one_byte_no_operand_instruction() {
    let s = scan(&image(&[0x90]), 0).unwrap();
    assert_eq!(s.icode.opcode, Opcode::Nop);
    assert_eq!(s.icode.num_bytes, 1);
    assert!(s.icode.flags.contains(LlFlags::NO_OPS));
    assert_eq!(s.warning, None);
}

#[test]
fn short_jump_target_wraps_around_the_instruction() {
    // JMP short -2 at offset 0 jumps to itself.
    let s = scan(&image(&[0xeb, 0xfe]), 0).unwrap();
    assert_eq!(s.icode.opcode, Opcode::Jmp);
    assert_eq!(s.icode.num_bytes, 2);
    assert!(s.icode.flags.contains(LlFlags::I));
    assert_eq!(s.icode.src, LlOperand::Imm(0));
}

#[test]
fn fp_emulation_interrupt_becomes_an_escape() {
    let s = scan(&image(&[0xcd, 0x35]), 0).unwrap();
    assert_eq!(s.icode.opcode, Opcode::Esc);
    assert_eq!(s.icode.src, LlOperand::Imm(1));
    assert!(s.icode.flags.contains(LlFlags::FLOAT_OP));
    assert_eq!(s.icode.num_bytes, 2);
}

#[test]
fn plain_interrupts_keep_their_number() {
    let s = scan(&image(&[0xcd, 0x21]), 0).unwrap();
    assert_eq!(s.icode.opcode, Opcode::Int);
    assert_eq!(s.icode.src, LlOperand::Imm(0x21));
    assert!(!s.icode.flags.contains(LlFlags::FLOAT_OP));
}

#[test]
fn segment_override_is_consumed_by_the_memory_operand() {
    // ES: MOV AX, [0x1000]
    let s = scan(&image(&[0x26, 0xa1, 0x00, 0x10]), 0).unwrap();
    assert_eq!(s.icode.opcode, Opcode::Mov);
    assert_eq!(s.icode.dst, LlOperand::Reg(Register::Ax));
    assert_eq!(
        s.icode.src,
        LlOperand::Mem {
            seg: Register::Es,
            seg_over: Some(Register::Es),
            base: None,
            off: 0x1000,
        }
    );
    assert_eq!(s.icode.num_bytes, 4);
    assert_eq!(s.warning, None);
}

#[test]
fn far_pointer_targets_are_linearized() {
    // CALL 1234:0010
    let s = scan(&image(&[0x9a, 0x10, 0x00, 0x34, 0x12]), 0).unwrap();
    assert_eq!(s.icode.opcode, Opcode::CallF);
    assert_eq!(s.icode.src, LlOperand::Imm(0x12340 + 0x10));
    assert_eq!(s.icode.num_bytes, 5);
}

#[test]
fn scanning_outside_the_image_is_rejected() {
    assert_eq!(scan(&image(&[0x90]), 1), Err(ScanError::IpOutOfRange(1)));
    assert_eq!(scan(&image(&[0x90]), 9), Err(ScanError::IpOutOfRange(9)));
}

#[rstest::rstest]
#[case(&[0x90], Opcode::Nop, 1)]
#[case(&[0x40], Opcode::Inc, 1)]
#[case(&[0x58], Opcode::Pop, 1)]
#[case(&[0xc3], Opcode::Ret, 1)]
#[case(&[0xcb], Opcode::RetF, 1)]
#[case(&[0xfd], Opcode::Std, 1)]
#[case(&[0x04, 0x07], Opcode::Add, 2)]
#[case(&[0xb0, 0x11], Opcode::Mov, 2)]
#[case(&[0x74, 0x08], Opcode::Je, 2)]
#[case(&[0xe2, 0xf0], Opcode::Loop, 2)]
#[case(&[0xb8, 0x34, 0x12], Opcode::Mov, 3)]
#[case(&[0xe8, 0x00, 0x01], Opcode::Call, 3)]
#[case(&[0xc2, 0x04, 0x00], Opcode::Ret, 3)]
#[case(&[0x8b, 0x47, 0x02], Opcode::Mov, 3)]
#[case(&[0x81, 0xc3, 0x34, 0x12], Opcode::Add, 4)]
#[case(&[0x8b, 0x9f, 0x00, 0x01], Opcode::Mov, 4)]
#[case(&[0xea, 0x00, 0x00, 0x00, 0x10], Opcode::JmpF, 5)]
#[case(&[0xc8, 0x08, 0x00, 0x00], Opcode::Enter, 4)]
fn decoded_lengths_match_the_encodings(
    #[case] bytes: &[u8],
    #[case] opcode: Opcode,
    #[case] len: u8,
) {
    let s = scan(&image(bytes), 0).unwrap();
    assert_eq!(s.icode.opcode, opcode);
    assert_eq!(s.icode.num_bytes, len);
}

#[test]
fn sequential_scanning_lands_on_instruction_boundaries() {
    let bytes = [
        0xb8, 0x34, 0x12, // MOV AX, 0x1234
        0x05, 0x01, 0x00, // ADD AX, 1
        0x8b, 0x1e, 0x00, 0x20, // MOV BX, [0x2000]
        0xf3, 0xa4, // REP MOVSB
        0xc3, // RET
    ];
    let img = image(&bytes);
    let expected = [
        (0, Opcode::Mov),
        (3, Opcode::Add),
        (6, Opcode::Mov),
        (10, Opcode::RepMovs),
        (12, Opcode::Ret),
    ];
    let mut ip = 0u32;
    for (at, opcode) in expected {
        assert_eq!(ip, at);
        let s = scan(&img, ip).unwrap();
        assert_eq!(s.icode.opcode, opcode);
        assert_eq!(s.icode.label, ip);
        ip += u32::from(s.icode.num_bytes);
    }
    assert_eq!(ip as usize, bytes.len());
}

#[test]
fn scan_is_idempotent_for_the_same_offset() {
    let img = image(&[0x26, 0x8b, 0x47, 0x02, 0xc3]);
    let a = scan(&img, 0).unwrap();
    let b = scan(&img, 0).unwrap();
    assert_eq!(a, b);
}
