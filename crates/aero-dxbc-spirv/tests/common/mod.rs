#![allow(dead_code)]

use aero_dxbc::test_utils::{build_container, build_signature_chunk, SignatureEntryDesc};
use aero_dxbc::FourCC;
use aero_dxbc_spirv::sm4::opcode::*;
use aero_dxbc_spirv::{compile_dxbc, CompileError, CompilerOptions, ShaderArtifact};
use rspirv::spirv::Op;

pub const STAGE_PIXEL: u32 = 0;
pub const STAGE_VERTEX: u32 = 1;
pub const STAGE_HULL: u32 = 3;
pub const STAGE_COMPUTE: u32 = 5;

pub const TEMP: u32 = 0;
pub const INPUT: u32 = 1;
pub const OUTPUT: u32 = 2;
pub const IMM32: u32 = 4;
pub const SAMPLER: u32 = 6;
pub const RESOURCE: u32 = 7;
pub const CONSTANT_BUFFER: u32 = 8;
pub const IMMEDIATE_CONSTANT_BUFFER: u32 = 9;
pub const UAV: u32 = 30;
pub const TGSM: u32 = 31;

pub fn opcode_token(opcode: u32, len_dwords: u32) -> u32 {
    opcode | (len_dwords << OPCODE_LEN_SHIFT)
}

pub fn operand_token(ty: u32, components: u32, mode: u32, sel: u32, index_dim: u32) -> u32 {
    components
        | (mode << OPERAND_SELECTION_MODE_SHIFT)
        | (sel << OPERAND_COMPONENT_SELECTION_SHIFT)
        | (ty << OPERAND_TYPE_SHIFT)
        | (index_dim << OPERAND_INDEX_DIMENSION_SHIFT)
}

/// A one-index register written with `mask`.
pub fn reg_dst(ty: u32, index: u32, mask: u32) -> Vec<u32> {
    vec![operand_token(ty, 2, OPERAND_SEL_MASK, mask, 1), index]
}

/// A one-index register read through `swizzle`.
pub fn reg_src(ty: u32, index: u32, swizzle: [u8; 4]) -> Vec<u32> {
    let bits = swizzle
        .iter()
        .enumerate()
        .fold(0u32, |acc, (i, &c)| acc | (u32::from(c) << (2 * i)));
    vec![operand_token(ty, 2, OPERAND_SEL_SWIZZLE, bits, 1), index]
}

/// A register operand with no component selection, as used by declarations.
pub fn reg_decl(ty: u32, index: u32) -> Vec<u32> {
    vec![operand_token(ty, 0, 0, 0, 1), index]
}

pub fn imm32(value: u32) -> Vec<u32> {
    vec![operand_token(IMM32, 1, 0, 0, 0), value]
}

pub fn imm32x4(values: [u32; 4]) -> Vec<u32> {
    let mut out = vec![operand_token(IMM32, 2, OPERAND_SEL_SWIZZLE, 0xe4, 0)];
    out.extend(values);
    out
}

/// Assembles one instruction, filling in the length field.
pub fn inst(opcode: u32, operands: &[Vec<u32>]) -> Vec<u32> {
    inst_with_controls(opcode, 0, operands)
}

/// Like [`inst`], with raw control bits (bit 11 upwards) ORed into the opcode token.
pub fn inst_with_controls(opcode: u32, controls: u32, operands: &[Vec<u32>]) -> Vec<u32> {
    let len = 1 + operands.iter().map(Vec::len).sum::<usize>() as u32;
    let mut out = vec![opcode_token(opcode, len) | (controls << 11)];
    for operand in operands {
        out.extend(operand);
    }
    out
}

/// `SHEX` chunk bytes for a model 5.0 program of `stage_type`.
pub fn shader_chunk(stage_type: u32, body: &[u32]) -> Vec<u8> {
    let mut tokens = vec![(stage_type << 16) | 0x50, (body.len() + 2) as u32];
    tokens.extend_from_slice(body);
    tokens.iter().flat_map(|t| t.to_le_bytes()).collect()
}

pub fn container(
    stage_type: u32,
    body: &[u32],
    isgn: &[SignatureEntryDesc<'_>],
    osgn: &[SignatureEntryDesc<'_>],
) -> Vec<u8> {
    let shex = shader_chunk(stage_type, body);
    let isgn = build_signature_chunk(isgn);
    let osgn = build_signature_chunk(osgn);
    build_container(&[
        (FourCC(*b"ISGN"), &isgn),
        (FourCC(*b"OSGN"), &osgn),
        (FourCC(*b"SHEX"), &shex),
    ])
}

pub fn try_compile(
    stage_type: u32,
    body: &[u32],
    isgn: &[SignatureEntryDesc<'_>],
    osgn: &[SignatureEntryDesc<'_>],
) -> Result<ShaderArtifact, CompileError> {
    compile_dxbc(&container(stage_type, body, isgn, osgn), &CompilerOptions::default())
}

pub fn compile(
    stage_type: u32,
    body: &[u32],
    isgn: &[SignatureEntryDesc<'_>],
    osgn: &[SignatureEntryDesc<'_>],
) -> ShaderArtifact {
    try_compile(stage_type, body, isgn, osgn).expect("compile")
}

/// One raw SPIR-V instruction: opcode plus operand words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInst {
    pub opcode: u16,
    pub operands: Vec<u32>,
}

impl RawInst {
    pub fn is(&self, op: Op) -> bool {
        self.opcode == op as u16
    }
}

/// Splits a module into instructions without interpreting operands.
pub fn instructions(code: &[u32]) -> Vec<RawInst> {
    assert_eq!(code.first(), Some(&0x0723_0203), "SPIR-V magic");
    let mut out = Vec::new();
    let mut pos = 5;
    while pos < code.len() {
        let word = code[pos];
        let count = (word >> 16) as usize;
        assert!(count > 0 && pos + count <= code.len(), "bad word count at {pos}");
        out.push(RawInst {
            opcode: (word & 0xffff) as u16,
            operands: code[pos + 1..pos + count].to_vec(),
        });
        pos += count;
    }
    out
}

pub fn count(insts: &[RawInst], op: Op) -> usize {
    insts.iter().filter(|i| i.is(op)).count()
}

/// Decodes a nul-terminated literal string.
pub fn literal_string(words: &[u32]) -> String {
    let bytes: Vec<u8> = words
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .take_while(|&b| b != 0)
        .collect();
    String::from_utf8(bytes).expect("utf-8 literal")
}

/// The id given `name` by `OpName`.
pub fn named(insts: &[RawInst], name: &str) -> Option<u32> {
    insts
        .iter()
        .filter(|i| i.is(Op::Name))
        .find(|i| literal_string(&i.operands[1..]) == name)
        .map(|i| i.operands[0])
}

/// The type, constant, variable or function defining `id`.
pub fn defining(insts: &[RawInst], id: u32) -> &RawInst {
    insts
        .iter()
        .find(|i| {
            if (Op::TypeVoid as u16..=Op::TypeForwardPointer as u16).contains(&i.opcode) {
                i.operands.first() == Some(&id)
            } else if i.is(Op::Variable)
                || i.is(Op::Constant)
                || i.is(Op::ConstantComposite)
                || i.is(Op::ConstantNull)
                || i.is(Op::Function)
            {
                i.operands.get(1) == Some(&id)
            } else {
                false
            }
        })
        .unwrap_or_else(|| panic!("no definition for %{id}"))
}

/// Instructions of the function whose result id is `id`, up to `OpFunctionEnd`.
pub fn function_body(insts: &[RawInst], id: u32) -> &[RawInst] {
    let start = insts
        .iter()
        .position(|i| i.is(Op::Function) && i.operands[1] == id)
        .unwrap_or_else(|| panic!("no function %{id}"));
    let len = insts[start..]
        .iter()
        .position(|i| i.is(Op::FunctionEnd))
        .expect("OpFunctionEnd");
    &insts[start..start + len + 1]
}

pub fn entry_point_id(insts: &[RawInst]) -> u32 {
    insts
        .iter()
        .find(|i| i.is(Op::EntryPoint))
        .map(|i| i.operands[1])
        .expect("OpEntryPoint")
}

/// Value of the `OpConstant` with result `id`.
pub fn constant_value(insts: &[RawInst], id: u32) -> u32 {
    let def = defining(insts, id);
    assert!(def.is(Op::Constant), "%{id} is not a constant");
    def.operands[2]
}

/// `(element type, length)` of the array a variable points at.
pub fn variable_array(insts: &[RawInst], var: u32) -> (u32, u32) {
    let var_def = defining(insts, var);
    let pointer = defining(insts, var_def.operands[0]);
    assert!(pointer.is(Op::TypePointer));
    let array = defining(insts, pointer.operands[2]);
    assert!(array.is(Op::TypeArray), "%{var} does not point at an array");
    (array.operands[1], constant_value(insts, array.operands[2]))
}

/// Ids decorated `BuiltIn builtin`.
pub fn builtin_ids(insts: &[RawInst], builtin: rspirv::spirv::BuiltIn) -> Vec<u32> {
    insts
        .iter()
        .filter(|i| {
            i.is(Op::Decorate)
                && i.operands.get(1) == Some(&(rspirv::spirv::Decoration::BuiltIn as u32))
                && i.operands.get(2) == Some(&(builtin as u32))
        })
        .map(|i| i.operands[0])
        .collect()
}

pub fn has_capability(insts: &[RawInst], capability: rspirv::spirv::Capability) -> bool {
    insts
        .iter()
        .any(|i| i.is(Op::Capability) && i.operands[0] == capability as u32)
}
