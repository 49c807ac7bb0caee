mod common;

use aero_dxbc_spirv::sm4::opcode::*;
use aero_dxbc_spirv::CompileError;
use common::*;
use pretty_assertions::assert_eq;
use rspirv::spirv::{Op, StorageClass};

const INDEXABLE_TEMP: u32 = 3;

fn expect_invalid_state(stage: u32, body: &[u32], needle: &str) {
    match try_compile(stage, body, &[], &[]) {
        Err(CompileError::InvalidTranslationState(msg)) => {
            assert!(msg.contains(needle), "{msg}");
        }
        other => panic!("expected InvalidTranslationState, got {other:?}"),
    }
}

#[test]
fn temp_index_past_the_register_file_is_rejected() {
    for reg in [u32::MAX, 4096] {
        let mut body = inst(OPCODE_MOV, &[reg_dst(TEMP, reg, 0b0001), imm32(0)]);
        body.extend(inst(OPCODE_RET, &[]));
        expect_invalid_state(STAGE_PIXEL, &body, &format!("r{reg}"));
    }

    let mut huge = inst(OPCODE_DCL_TEMPS, &[vec![u32::MAX]]);
    huge.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(STAGE_PIXEL, &huge, "temp registers");
}

#[test]
fn undeclared_temps_are_created_on_first_use() {
    let mut body = inst(OPCODE_MOV, &[reg_dst(TEMP, 2, 0b0001), imm32(0)]);
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_PIXEL, &body, &[], &[]);
    let insts = instructions(artifact.code());
    for name in ["r0", "r1", "r2"] {
        let var = named(&insts, name).unwrap_or_else(|| panic!("{name} is named"));
        assert_eq!(defining(&insts, var).operands[2], StorageClass::Private as u32);
    }
    assert!(named(&insts, "r3").is_none());
}

#[test]
fn indexable_temp_element_must_be_within_its_declaration() {
    // mov x0[5].x, l(0) against x0[2]
    let mut body = inst(OPCODE_DCL_INDEXABLE_TEMP, &[vec![0], vec![2], vec![4]]);
    body.extend(inst(
        OPCODE_MOV,
        &[
            vec![operand_token(INDEXABLE_TEMP, 2, OPERAND_SEL_MASK, 0b0001, 2), 0, 5],
            imm32(0),
        ],
    ));
    body.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(STAGE_PIXEL, &body, "x0[5]");

    let mut in_range = inst(OPCODE_DCL_INDEXABLE_TEMP, &[vec![0], vec![2], vec![4]]);
    in_range.extend(inst(
        OPCODE_MOV,
        &[
            vec![operand_token(INDEXABLE_TEMP, 2, OPERAND_SEL_MASK, 0b0001, 2), 0, 1],
            imm32(0),
        ],
    ));
    in_range.extend(inst(OPCODE_RET, &[]));
    let artifact = compile(STAGE_PIXEL, &in_range, &[], &[]);
    let insts = instructions(artifact.code());
    let x0 = named(&insts, "x0").expect("x0 is named");
    assert_eq!(variable_array(&insts, x0).1, 2);
}

#[test]
fn indexable_temp_redeclaration_must_keep_its_length() {
    let mut body = inst(OPCODE_DCL_INDEXABLE_TEMP, &[vec![0], vec![2], vec![4]]);
    body.extend(inst(OPCODE_DCL_INDEXABLE_TEMP, &[vec![0], vec![3], vec![4]]));
    body.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(STAGE_PIXEL, &body, "x0");
}

fn dcl_tgsm_raw(bytes: u32) -> Vec<u32> {
    inst(OPCODE_DCL_TGSM_RAW, &[reg_decl(TGSM, 0), vec![bytes]])
}

#[test]
fn repeated_thread_group_memory_declaration_keeps_one_array() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_DCL_THREAD_GROUP, &[vec![8], vec![1], vec![1]]));
    body.extend(inst(OPCODE_DCL_TEMPS, &[vec![1]]));
    body.extend(dcl_tgsm_raw(16));
    body.extend(inst(
        OPCODE_STORE_RAW,
        &[reg_dst(TGSM, 0, 0b0001), imm32(0), imm32(7)],
    ));
    body.extend(dcl_tgsm_raw(16));
    body.extend(inst(
        OPCODE_LD_RAW,
        &[reg_dst(TEMP, 0, 0b0001), imm32(0), reg_src(TGSM, 0, [0, 0, 0, 0])],
    ));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_COMPUTE, &body, &[], &[]);
    let insts = instructions(artifact.code());

    let workgroup_vars: Vec<u32> = insts
        .iter()
        .filter(|i| i.is(Op::Variable) && i.operands[2] == StorageClass::Workgroup as u32)
        .map(|i| i.operands[1])
        .collect();
    let g0 = named(&insts, "g0").expect("g0 is named");
    assert_eq!(workgroup_vars, vec![g0]);

    // store and load both index the same array
    let chains_into_g0 = insts
        .iter()
        .filter(|i| i.is(Op::AccessChain) && i.operands[2] == g0)
        .count();
    assert_eq!(chains_into_g0, 2);
}

#[test]
fn thread_group_memory_redeclaration_must_keep_its_size() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_DCL_THREAD_GROUP, &[vec![8], vec![1], vec![1]]));
    body.extend(dcl_tgsm_raw(16));
    body.extend(dcl_tgsm_raw(32));
    body.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(STAGE_COMPUTE, &body, "g0");
}

#[test]
fn thread_group_memory_is_capped_at_32_kib() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_DCL_THREAD_GROUP, &[vec![8], vec![1], vec![1]]));
    body.extend(dcl_tgsm_raw(32 * 1024 + 4));
    body.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(STAGE_COMPUTE, &body, "g0");
}
