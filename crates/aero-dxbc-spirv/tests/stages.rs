mod common;

use aero_dxbc::test_utils::SignatureEntryDesc;
use aero_dxbc_spirv::sm4::opcode::*;
use aero_dxbc_spirv::{CompileError, ShaderStage};
use common::*;
use pretty_assertions::assert_eq;
use rspirv::spirv::{BuiltIn, Capability, ExecutionMode, Op, StorageClass};

fn vs_passthrough_body() -> Vec<u32> {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_DCL_INPUT, &[reg_dst(INPUT, 0, 0xf)]));
    body.extend(inst(OPCODE_DCL_OUTPUT, &[reg_dst(OUTPUT, 0, 0xf)]));
    body.extend(inst(
        OPCODE_MOV,
        &[reg_dst(OUTPUT, 0, 0xf), reg_src(INPUT, 0, [0, 1, 2, 3])],
    ));
    body.extend(inst(OPCODE_RET, &[]));
    body
}

fn texcoord() -> [SignatureEntryDesc<'static>; 1] {
    [SignatureEntryDesc::user("TEXCOORD", 0, 0xf)]
}

#[test]
fn vertex_passthrough_moves_one_register() {
    let artifact = compile(STAGE_VERTEX, &vs_passthrough_body(), &texcoord(), &texcoord());
    assert_eq!(artifact.stage(), ShaderStage::Vertex);
    assert_eq!(artifact.entry_point(), "main");

    let interface = artifact.interface_slots();
    assert_eq!(interface.input_slots, 0b1);
    assert_eq!(interface.output_slots, 0b1);
    assert_eq!(interface.inputs.len(), 1);
    assert_eq!(interface.inputs[0].semantic_name, "TEXCOORD");
    assert!(artifact.resource_slots().is_empty());

    let insts = instructions(artifact.code());
    let body = named(&insts, "vs_main").expect("vs_main is named");
    let body = function_body(&insts, body);
    assert_eq!(count(body, Op::Load), 1);
    assert_eq!(count(body, Op::Store), 1);

    let entry = function_body(&insts, entry_point_id(&insts));
    assert_eq!(count(entry, Op::FunctionCall), 1);
}

#[test]
fn module_loads_with_a_single_entry_point() {
    let artifact = compile(STAGE_VERTEX, &vs_passthrough_body(), &texcoord(), &texcoord());
    let module = rspirv::dr::load_words(artifact.code()).expect("module parses");
    assert_eq!(module.entry_points.len(), 1);
    assert!(module
        .capabilities
        .iter()
        .any(|c| c.operands[0] == rspirv::dr::Operand::Capability(Capability::Shader)));
}

#[test]
fn compiling_twice_is_deterministic() {
    let body = vs_passthrough_body();
    let a = compile(STAGE_VERTEX, &body, &texcoord(), &texcoord());
    let b = compile(STAGE_VERTEX, &body, &texcoord(), &texcoord());
    assert_eq!(a.code(), b.code());
    assert_eq!(a.hash(), b.hash());
    assert_eq!(a.to_bytes().len(), a.code().len() * 4);
}

#[test]
fn clip_distance_output_uses_the_builtin_array() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_DCL_OUTPUT_SIV, &[reg_dst(OUTPUT, 0, 0xf), vec![1]]));
    body.extend(inst(OPCODE_DCL_OUTPUT_SIV, &[reg_dst(OUTPUT, 1, 0b0011), vec![2]]));
    body.extend(inst(OPCODE_RET, &[]));

    let osgn = [
        SignatureEntryDesc::system_value("SV_Position", 1, 0, 0xf),
        SignatureEntryDesc::system_value("SV_ClipDistance", 2, 1, 0b0011),
    ];
    let artifact = compile(STAGE_VERTEX, &body, &[], &osgn);

    let interface = artifact.interface_slots();
    assert_eq!(interface.output_slots, 0);
    assert_eq!(interface.outputs.len(), 2);

    let insts = instructions(artifact.code());
    assert!(has_capability(&insts, Capability::ClipDistance));
    let clip = builtin_ids(&insts, BuiltIn::ClipDistance);
    assert_eq!(clip.len(), 1);
    let (element, length) = variable_array(&insts, clip[0]);
    assert_eq!(length, 2);
    assert!(defining(&insts, element).is(Op::TypeFloat));
    assert_eq!(builtin_ids(&insts, BuiltIn::Position).len(), 1);
}

#[test]
fn thread_group_memory_is_a_workgroup_dword_array() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_DCL_THREAD_GROUP, &[vec![8], vec![1], vec![1]]));
    body.extend(inst(
        OPCODE_DCL_TGSM_STRUCTURED,
        &[reg_decl(TGSM, 0), vec![4], vec![256]],
    ));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_COMPUTE, &body, &[], &[]);
    let insts = instructions(artifact.code());

    let g0 = named(&insts, "g0").expect("g0 is named");
    assert_eq!(defining(&insts, g0).operands[2], StorageClass::Workgroup as u32);
    let (element, length) = variable_array(&insts, g0);
    assert_eq!(length, 256);
    assert_eq!(defining(&insts, element).operands[1..].to_vec(), vec![32, 0]);

    let entry = entry_point_id(&insts);
    let local_size = insts
        .iter()
        .find(|i| i.is(Op::ExecutionMode) && i.operands[1] == ExecutionMode::LocalSize as u32)
        .expect("LocalSize");
    assert_eq!(local_size.operands, vec![entry, ExecutionMode::LocalSize as u32, 8, 1, 1]);
}

#[test]
fn hull_phases_run_in_order_around_the_barrier() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_HS_DECLS, &[]));
    body.extend(inst_with_controls(OPCODE_DCL_INPUT_CONTROL_POINT_COUNT, 3, &[]));
    body.extend(inst_with_controls(OPCODE_DCL_OUTPUT_CONTROL_POINT_COUNT, 3, &[]));
    body.extend(inst(OPCODE_HS_CONTROL_POINT_PHASE, &[]));
    body.extend(inst(OPCODE_RET, &[]));
    body.extend(inst(OPCODE_HS_FORK_PHASE, &[]));
    body.extend(inst(OPCODE_DCL_HS_FORK_PHASE_INSTANCE_COUNT, &[vec![2]]));
    body.extend(inst(OPCODE_RET, &[]));
    body.extend(inst(OPCODE_HS_JOIN_PHASE, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    let artifact = compile(STAGE_HULL, &body, &[], &[]);
    assert_eq!(artifact.stage(), ShaderStage::Hull);

    let insts = instructions(artifact.code());
    assert!(has_capability(&insts, Capability::Tessellation));
    let control_point = named(&insts, "hs_control_point").expect("control point phase");
    let fork = named(&insts, "hs_fork_0").expect("fork phase");
    let join = named(&insts, "hs_join_0").expect("join phase");
    assert!(named(&insts, "hs_fork_0_instance").is_some());

    let entry = function_body(&insts, entry_point_id(&insts));
    let position = |pred: &dyn Fn(&RawInst) -> bool| {
        entry.iter().position(pred).expect("instruction in entry function")
    };
    let call_to = |target: u32| move |i: &RawInst| i.is(Op::FunctionCall) && i.operands[2] == target;

    let cp_call = position(&call_to(control_point));
    let barrier = position(&|i: &RawInst| i.is(Op::ControlBarrier));
    let loop_merge = position(&|i: &RawInst| i.is(Op::LoopMerge));
    let fork_call = position(&call_to(fork));
    let join_call = position(&call_to(join));
    assert!(cp_call < barrier);
    assert!(barrier < loop_merge);
    assert!(loop_merge < fork_call);
    assert!(fork_call < join_call);
    assert_eq!(count(entry, Op::LoopMerge), 1);

    let output_vertices = insts
        .iter()
        .find(|i| i.is(Op::ExecutionMode) && i.operands[1] == ExecutionMode::OutputVertices as u32)
        .expect("OutputVertices");
    assert_eq!(output_vertices.operands[2], 3);
}

#[test]
fn second_control_point_phase_is_rejected() {
    let mut body = Vec::new();
    body.extend(inst(OPCODE_HS_DECLS, &[]));
    body.extend(inst_with_controls(OPCODE_DCL_OUTPUT_CONTROL_POINT_COUNT, 3, &[]));
    body.extend(inst(OPCODE_HS_CONTROL_POINT_PHASE, &[]));
    body.extend(inst(OPCODE_RET, &[]));
    body.extend(inst(OPCODE_HS_CONTROL_POINT_PHASE, &[]));
    body.extend(inst(OPCODE_RET, &[]));

    match try_compile(STAGE_HULL, &body, &[], &[]) {
        Err(CompileError::InvalidTranslationState(msg)) => {
            assert!(msg.contains("control point phase"), "{msg}")
        }
        other => panic!("expected InvalidTranslationState, got {other:?}"),
    }
}
