mod common;

use aero_dxbc_spirv::sm4::opcode::*;
use aero_dxbc_spirv::sm4::decode_program;
use aero_dxbc_spirv::{
    AnalysisInfo, CompileError, Compiler, CompilerOptions, ShaderStage, Signature, Sm4Program,
};
use common::*;
use pretty_assertions::assert_eq;
use rspirv::spirv::Op;

#[test]
fn switch_keeps_case_literals_in_declaration_order() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_SWITCH, &[imm32(0)]));
    body.extend(inst(OPCODE_CASE, &[imm32(3)]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_CASE, &[imm32(1)]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_CASE, &[imm32(7)]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_DEFAULT, &[]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDSWITCH, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_PIXEL, &body, &[], &[]);
    let insts = instructions(artifact.code());

    let switches: Vec<&RawInst> = insts.iter().filter(|i| i.is(Op::Switch)).collect();
    assert_eq!(switches.len(), 1);
    let operands = &switches[0].operands;
    // selector, default, then (literal, label) pairs
    assert_eq!(operands.len(), 8);
    assert_eq!(vec![operands[2], operands[4], operands[6]], vec![3, 1, 7]);
    let mut labels = vec![operands[1], operands[3], operands[5], operands[7]];
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels.len(), 4, "default and each case get their own block");

    let merge = insts.iter().find(|i| i.is(Op::SelectionMerge)).expect("OpSelectionMerge");
    assert_eq!(count(&insts, Op::SelectionMerge), 1);
    assert!(!labels.contains(&merge.operands[0]));
    let breaks = insts
        .iter()
        .filter(|i| i.is(Op::Branch) && i.operands[0] == merge.operands[0])
        .count();
    assert_eq!(breaks, 4);
}

#[test]
fn case_without_break_falls_through() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_DCL_TEMPS, &[vec![1]]));
    body.extend(inst(OPCODE_SWITCH, &[imm32(0)]));
    body.extend(inst(OPCODE_CASE, &[imm32(0)]));
    body.extend(inst(OPCODE_MOV, &[reg_dst(TEMP, 0, 0b0001), imm32(1)]));
    body.extend(inst(OPCODE_CASE, &[imm32(1)]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDSWITCH, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_PIXEL, &body, &[], &[]);
    let insts = instructions(artifact.code());
    let switch = insts.iter().find(|i| i.is(Op::Switch)).expect("OpSwitch");
    let (case0, case1) = (switch.operands[3], switch.operands[5]);
    assert_ne!(case0, case1);

    // The case 0 block ends in a branch straight into case 1.
    let case0_start = insts
        .iter()
        .position(|i| i.is(Op::Label) && i.operands[0] == case0)
        .expect("case 0 label");
    let terminator = insts[case0_start..]
        .iter()
        .find(|i| i.is(Op::Branch) || i.is(Op::Unreachable))
        .expect("case 0 terminator");
    assert!(terminator.is(Op::Branch));
    assert_eq!(terminator.operands[0], case1);
}

#[test]
fn non_immediate_case_label_is_rejected() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_DCL_TEMPS, &[vec![1]]));
    body.extend(inst(OPCODE_SWITCH, &[imm32(0)]));
    body.extend(inst(OPCODE_CASE, &[reg_src(TEMP, 0, [0, 0, 0, 0])]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDSWITCH, &[]));
    body.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(&body);
}

#[test]
fn adjacent_case_labels_share_a_block() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_SWITCH, &[imm32(0)]));
    body.extend(inst(OPCODE_CASE, &[imm32(0)]));
    body.extend(inst(OPCODE_CASE, &[imm32(7)]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDSWITCH, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_PIXEL, &body, &[], &[]);
    let insts = instructions(artifact.code());
    let switch = insts.iter().find(|i| i.is(Op::Switch)).expect("OpSwitch");
    assert_eq!(switch.operands[2], 0);
    assert_eq!(switch.operands[4], 7);
    assert_eq!(switch.operands[3], switch.operands[5]);
}

#[test]
fn loops_emit_a_loop_merge() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_LOOP, &[]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDLOOP, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_PIXEL, &body, &[], &[]);
    let insts = instructions(artifact.code());
    assert_eq!(count(&insts, Op::LoopMerge), 1);
}

/// `(merge, continue)` labels of the single `OpLoopMerge`.
fn loop_labels(insts: &[RawInst]) -> (u32, u32) {
    let merges: Vec<&RawInst> = insts.iter().filter(|i| i.is(Op::LoopMerge)).collect();
    assert_eq!(merges.len(), 1);
    (merges[0].operands[0], merges[0].operands[1])
}

fn branches_to(insts: &[RawInst], target: u32) -> usize {
    insts
        .iter()
        .filter(|i| i.is(Op::Branch) && i.operands[0] == target)
        .count()
}

#[test]
fn continue_branches_to_the_loop_continue_block() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_LOOP, &[]));
    body.extend(inst(OPCODE_CONTINUE, &[]));
    body.extend(inst(OPCODE_ENDLOOP, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_PIXEL, &body, &[], &[]);
    let insts = instructions(artifact.code());
    let (_, label_continue) = loop_labels(&insts);
    // the continue itself, then the fall-off at endloop
    assert_eq!(branches_to(&insts, label_continue), 2);
}

#[test]
fn conditional_continue_is_a_guarded_branch() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_LOOP, &[]));
    body.extend(inst_with_controls(
        OPCODE_CONTINUEC,
        OPCODE_TEST_NONZERO_BIT >> 11,
        &[imm32(1)],
    ));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDLOOP, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_PIXEL, &body, &[], &[]);
    let insts = instructions(artifact.code());
    let (label_break, label_continue) = loop_labels(&insts);
    assert_eq!(count(&insts, Op::SelectionMerge), 1);
    assert_eq!(count(&insts, Op::BranchConditional), 1);
    assert_eq!(branches_to(&insts, label_continue), 2);
    assert_eq!(branches_to(&insts, label_break), 1);
}

#[test]
fn break_in_a_nested_switch_leaves_only_the_switch() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_LOOP, &[]));
    body.extend(inst(OPCODE_SWITCH, &[imm32(0)]));
    body.extend(inst(OPCODE_CASE, &[imm32(0)]));
    body.extend(inst(OPCODE_CONTINUE, &[]));
    body.extend(inst(OPCODE_DEFAULT, &[]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDSWITCH, &[]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDLOOP, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_PIXEL, &body, &[], &[]);
    let insts = instructions(artifact.code());
    let (loop_break, loop_continue) = loop_labels(&insts);
    let switch_break = insts
        .iter()
        .find(|i| i.is(Op::SelectionMerge))
        .expect("OpSelectionMerge")
        .operands[0];
    assert_ne!(switch_break, loop_break);

    // default's break targets the switch merge; the break after endswitch
    // targets the loop merge.
    assert!(branches_to(&insts, switch_break) >= 1);
    assert_eq!(branches_to(&insts, loop_break), 1);
    // case 0's continue skips the switch frame.
    assert!(branches_to(&insts, loop_continue) >= 1);
    let case0 = insts.iter().find(|i| i.is(Op::Switch)).expect("OpSwitch").operands[3];
    let case0_start = insts
        .iter()
        .position(|i| i.is(Op::Label) && i.operands[0] == case0)
        .expect("case 0 label");
    let first_branch = insts[case0_start..]
        .iter()
        .find(|i| i.is(Op::Branch))
        .expect("branch in case 0");
    assert_eq!(first_branch.operands[0], loop_continue);
}

fn expect_invalid_state(body: &[u32]) {
    match try_compile(STAGE_PIXEL, body, &[], &[]) {
        Err(CompileError::InvalidTranslationState(_)) => {}
        other => panic!("expected InvalidTranslationState, got {other:?}"),
    }
}

#[test]
fn unbalanced_control_flow_is_rejected() {
    let mut endif = inst(OPCODE_ENDIF, &[]);
    endif.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(&endif);

    let mut orphan_break = inst(OPCODE_BREAK, &[]);
    orphan_break.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(&orphan_break);

    let mut open_if = inst(OPCODE_IF, &[imm32(1)]);
    open_if.extend(inst(OPCODE_RET, &[]));
    expect_invalid_state(&open_if);

    let mut mismatched = inst(OPCODE_LOOP, &[]);
    mismatched.extend(inst(OPCODE_ENDIF, &[]));
    expect_invalid_state(&mismatched);
}

#[test]
fn depth_tracks_open_constructs() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_IF, &[imm32(1)]));
    body.extend(inst(OPCODE_LOOP, &[]));
    body.extend(inst(OPCODE_BREAK, &[]));
    body.extend(inst(OPCODE_ENDLOOP, &[]));
    body.extend(inst(OPCODE_ENDIF, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let mut tokens = vec![0x0000_0050, (body.len() + 2) as u32];
    tokens.extend(&body);
    let program = Sm4Program::from_tokens(tokens).expect("program");
    let insts = decode_program(&program).expect("decode");

    let options = CompilerOptions::default();
    let signature = Signature::default();
    let analysis = AnalysisInfo::default();
    let mut compiler = Compiler::new(
        ShaderStage::Pixel,
        &options,
        &signature,
        &signature,
        &signature,
        &analysis,
    )
    .expect("compiler");

    let mut depths = Vec::new();
    for inst in &insts {
        compiler.process_instruction(inst).expect("instruction");
        depths.push(compiler.control_flow_depth());
    }
    assert_eq!(depths, vec![1, 2, 2, 1, 0, 0]);
    compiler.finalize().expect("finalize");
}
