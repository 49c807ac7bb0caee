//! SM4/SM5 token layout constants and the per-opcode operand format table.
//!
//! Bit positions follow the D3D10/11 tokenized program format: an opcode
//! token carries the opcode in bits 0..=10, opcode-specific controls in
//! 11..=23, the instruction length in 24..=30 and an "extended" flag in bit 31.

use crate::sm4_ir::DataType;

pub const OPCODE_MASK: u32 = 0x7ff;
pub const OPCODE_LEN_SHIFT: u32 = 24;
pub const OPCODE_LEN_MASK: u32 = 0x7f;
pub const OPCODE_EXTENDED_BIT: u32 = 1 << 31;
pub const OPCODE_CONTROLS_SHIFT: u32 = 11;
pub const OPCODE_CONTROLS_MASK: u32 = 0x1fff;

pub const OPCODE_SATURATE_BIT: u32 = 1 << 13;
pub const OPCODE_TEST_NONZERO_BIT: u32 = 1 << 18;
pub const OPCODE_PRECISE_SHIFT: u32 = 19;
pub const OPCODE_PRECISE_MASK: u32 = 0xf;
pub const OPCODE_UAV_GLOBALLY_COHERENT_BIT: u32 = 1 << 16;
pub const OPCODE_UAV_HAS_COUNTER_BIT: u32 = 1 << 23;

pub const CUSTOMDATA_CLASS_SHIFT: u32 = 11;
pub const CUSTOMDATA_CLASS_COMMENT: u32 = 0;
pub const CUSTOMDATA_CLASS_DEBUGINFO: u32 = 1;
pub const CUSTOMDATA_CLASS_OPAQUE: u32 = 2;
pub const CUSTOMDATA_CLASS_IMMEDIATE_CONSTANT_BUFFER: u32 = 3;
pub const CUSTOMDATA_CLASS_SHADER_MESSAGE: u32 = 4;

pub const EXT_OPCODE_TYPE_MASK: u32 = 0x3f;
pub const EXT_OPCODE_EMPTY: u32 = 0;
pub const EXT_OPCODE_SAMPLE_CONTROLS: u32 = 1;
pub const EXT_OPCODE_RESOURCE_DIM: u32 = 2;
pub const EXT_OPCODE_RESOURCE_RETURN_TYPE: u32 = 3;

pub const OPERAND_NUM_COMPONENTS_MASK: u32 = 0x3;
pub const OPERAND_SELECTION_MODE_SHIFT: u32 = 2;
pub const OPERAND_SELECTION_MODE_MASK: u32 = 0x3;
pub const OPERAND_COMPONENT_SELECTION_SHIFT: u32 = 4;
pub const OPERAND_TYPE_SHIFT: u32 = 12;
pub const OPERAND_TYPE_MASK: u32 = 0xff;
pub const OPERAND_INDEX_DIMENSION_SHIFT: u32 = 20;
pub const OPERAND_INDEX_DIMENSION_MASK: u32 = 0x3;
pub const OPERAND_INDEX0_REP_SHIFT: u32 = 22;
pub const OPERAND_INDEX_REP_BITS: u32 = 3;
pub const OPERAND_INDEX_REP_MASK: u32 = 0x7;
pub const OPERAND_EXTENDED_BIT: u32 = 1 << 31;

pub const OPERAND_SEL_MASK: u32 = 0;
pub const OPERAND_SEL_SWIZZLE: u32 = 1;
pub const OPERAND_SEL_SELECT1: u32 = 2;

pub const OPERAND_INDEX_REP_IMMEDIATE32: u32 = 0;
pub const OPERAND_INDEX_REP_IMMEDIATE64: u32 = 1;
pub const OPERAND_INDEX_REP_RELATIVE: u32 = 2;
pub const OPERAND_INDEX_REP_IMMEDIATE32_PLUS_RELATIVE: u32 = 3;
pub const OPERAND_INDEX_REP_IMMEDIATE64_PLUS_RELATIVE: u32 = 4;

pub const EXT_OPERAND_MODIFIER: u32 = 1;
pub const EXT_OPERAND_MODIFIER_SHIFT: u32 = 6;
pub const EXT_OPERAND_MODIFIER_MASK: u32 = 0xff;

pub const OPCODE_ADD: u32 = 0;
pub const OPCODE_AND: u32 = 1;
pub const OPCODE_BREAK: u32 = 2;
pub const OPCODE_BREAKC: u32 = 3;
pub const OPCODE_CALL: u32 = 4;
pub const OPCODE_CALLC: u32 = 5;
pub const OPCODE_CASE: u32 = 6;
pub const OPCODE_CONTINUE: u32 = 7;
pub const OPCODE_CONTINUEC: u32 = 8;
pub const OPCODE_CUT: u32 = 9;
pub const OPCODE_DEFAULT: u32 = 10;
pub const OPCODE_DERIV_RTX: u32 = 11;
pub const OPCODE_DERIV_RTY: u32 = 12;
pub const OPCODE_DISCARD: u32 = 13;
pub const OPCODE_DIV: u32 = 14;
pub const OPCODE_DP2: u32 = 15;
pub const OPCODE_DP3: u32 = 16;
pub const OPCODE_DP4: u32 = 17;
pub const OPCODE_ELSE: u32 = 18;
pub const OPCODE_EMIT: u32 = 19;
pub const OPCODE_EMITTHENCUT: u32 = 20;
pub const OPCODE_ENDIF: u32 = 21;
pub const OPCODE_ENDLOOP: u32 = 22;
pub const OPCODE_ENDSWITCH: u32 = 23;
pub const OPCODE_EQ: u32 = 24;
pub const OPCODE_EXP: u32 = 25;
pub const OPCODE_FRC: u32 = 26;
pub const OPCODE_FTOI: u32 = 27;
pub const OPCODE_FTOU: u32 = 28;
pub const OPCODE_GE: u32 = 29;
pub const OPCODE_IADD: u32 = 30;
pub const OPCODE_IF: u32 = 31;
pub const OPCODE_IEQ: u32 = 32;
pub const OPCODE_IGE: u32 = 33;
pub const OPCODE_ILT: u32 = 34;
pub const OPCODE_IMAD: u32 = 35;
pub const OPCODE_IMAX: u32 = 36;
pub const OPCODE_IMIN: u32 = 37;
pub const OPCODE_IMUL: u32 = 38;
pub const OPCODE_INE: u32 = 39;
pub const OPCODE_INEG: u32 = 40;
pub const OPCODE_ISHL: u32 = 41;
pub const OPCODE_ISHR: u32 = 42;
pub const OPCODE_ITOF: u32 = 43;
pub const OPCODE_LABEL: u32 = 44;
pub const OPCODE_LD: u32 = 45;
pub const OPCODE_LD_MS: u32 = 46;
pub const OPCODE_LOG: u32 = 47;
pub const OPCODE_LOOP: u32 = 48;
pub const OPCODE_LT: u32 = 49;
pub const OPCODE_MAD: u32 = 50;
pub const OPCODE_MIN: u32 = 51;
pub const OPCODE_MAX: u32 = 52;
pub const OPCODE_CUSTOMDATA: u32 = 53;
pub const OPCODE_MOV: u32 = 54;
pub const OPCODE_MOVC: u32 = 55;
pub const OPCODE_MUL: u32 = 56;
pub const OPCODE_NE: u32 = 57;
pub const OPCODE_NOP: u32 = 58;
pub const OPCODE_NOT: u32 = 59;
pub const OPCODE_OR: u32 = 60;
pub const OPCODE_RESINFO: u32 = 61;
pub const OPCODE_RET: u32 = 62;
pub const OPCODE_RETC: u32 = 63;
pub const OPCODE_ROUND_NE: u32 = 64;
pub const OPCODE_ROUND_NI: u32 = 65;
pub const OPCODE_ROUND_PI: u32 = 66;
pub const OPCODE_ROUND_Z: u32 = 67;
pub const OPCODE_RSQ: u32 = 68;
pub const OPCODE_SAMPLE: u32 = 69;
pub const OPCODE_SAMPLE_C: u32 = 70;
pub const OPCODE_SAMPLE_C_LZ: u32 = 71;
pub const OPCODE_SAMPLE_L: u32 = 72;
pub const OPCODE_SAMPLE_D: u32 = 73;
pub const OPCODE_SAMPLE_B: u32 = 74;
pub const OPCODE_SQRT: u32 = 75;
pub const OPCODE_SWITCH: u32 = 76;
pub const OPCODE_SINCOS: u32 = 77;
pub const OPCODE_UDIV: u32 = 78;
pub const OPCODE_ULT: u32 = 79;
pub const OPCODE_UGE: u32 = 80;
pub const OPCODE_UMUL: u32 = 81;
pub const OPCODE_UMAD: u32 = 82;
pub const OPCODE_UMAX: u32 = 83;
pub const OPCODE_UMIN: u32 = 84;
pub const OPCODE_USHR: u32 = 85;
pub const OPCODE_UTOF: u32 = 86;
pub const OPCODE_XOR: u32 = 87;
pub const OPCODE_DCL_RESOURCE: u32 = 88;
pub const OPCODE_DCL_CONSTANT_BUFFER: u32 = 89;
pub const OPCODE_DCL_SAMPLER: u32 = 90;
pub const OPCODE_DCL_INDEX_RANGE: u32 = 91;
pub const OPCODE_DCL_GS_OUTPUT_PRIMITIVE_TOPOLOGY: u32 = 92;
pub const OPCODE_DCL_GS_INPUT_PRIMITIVE: u32 = 93;
pub const OPCODE_DCL_MAX_OUTPUT_VERTEX_COUNT: u32 = 94;
pub const OPCODE_DCL_INPUT: u32 = 95;
pub const OPCODE_DCL_INPUT_SGV: u32 = 96;
pub const OPCODE_DCL_INPUT_SIV: u32 = 97;
pub const OPCODE_DCL_INPUT_PS: u32 = 98;
pub const OPCODE_DCL_INPUT_PS_SGV: u32 = 99;
pub const OPCODE_DCL_INPUT_PS_SIV: u32 = 100;
pub const OPCODE_DCL_OUTPUT: u32 = 101;
pub const OPCODE_DCL_OUTPUT_SGV: u32 = 102;
pub const OPCODE_DCL_OUTPUT_SIV: u32 = 103;
pub const OPCODE_DCL_TEMPS: u32 = 104;
pub const OPCODE_DCL_INDEXABLE_TEMP: u32 = 105;
pub const OPCODE_DCL_GLOBAL_FLAGS: u32 = 106;
pub const OPCODE_LOD: u32 = 108;
pub const OPCODE_GATHER4: u32 = 109;
pub const OPCODE_SAMPLE_POS: u32 = 110;
pub const OPCODE_SAMPLE_INFO: u32 = 111;
pub const OPCODE_HS_DECLS: u32 = 113;
pub const OPCODE_HS_CONTROL_POINT_PHASE: u32 = 114;
pub const OPCODE_HS_FORK_PHASE: u32 = 115;
pub const OPCODE_HS_JOIN_PHASE: u32 = 116;
pub const OPCODE_EMIT_STREAM: u32 = 117;
pub const OPCODE_CUT_STREAM: u32 = 118;
pub const OPCODE_EMITTHENCUT_STREAM: u32 = 119;
pub const OPCODE_INTERFACE_CALL: u32 = 120;
pub const OPCODE_BUFINFO: u32 = 121;
pub const OPCODE_DERIV_RTX_COARSE: u32 = 122;
pub const OPCODE_DERIV_RTX_FINE: u32 = 123;
pub const OPCODE_DERIV_RTY_COARSE: u32 = 124;
pub const OPCODE_DERIV_RTY_FINE: u32 = 125;
pub const OPCODE_GATHER4_C: u32 = 126;
pub const OPCODE_GATHER4_PO: u32 = 127;
pub const OPCODE_GATHER4_PO_C: u32 = 128;
pub const OPCODE_RCP: u32 = 129;
pub const OPCODE_F32TOF16: u32 = 130;
pub const OPCODE_F16TOF32: u32 = 131;
pub const OPCODE_UADDC: u32 = 132;
pub const OPCODE_USUBB: u32 = 133;
pub const OPCODE_COUNTBITS: u32 = 134;
pub const OPCODE_FIRSTBIT_HI: u32 = 135;
pub const OPCODE_FIRSTBIT_LO: u32 = 136;
pub const OPCODE_FIRSTBIT_SHI: u32 = 137;
pub const OPCODE_UBFE: u32 = 138;
pub const OPCODE_IBFE: u32 = 139;
pub const OPCODE_BFI: u32 = 140;
pub const OPCODE_BFREV: u32 = 141;
pub const OPCODE_SWAPC: u32 = 142;
pub const OPCODE_DCL_STREAM: u32 = 143;
pub const OPCODE_DCL_FUNCTION_BODY: u32 = 144;
pub const OPCODE_DCL_FUNCTION_TABLE: u32 = 145;
pub const OPCODE_DCL_INTERFACE: u32 = 146;
pub const OPCODE_DCL_INPUT_CONTROL_POINT_COUNT: u32 = 147;
pub const OPCODE_DCL_OUTPUT_CONTROL_POINT_COUNT: u32 = 148;
pub const OPCODE_DCL_TESS_DOMAIN: u32 = 149;
pub const OPCODE_DCL_TESS_PARTITIONING: u32 = 150;
pub const OPCODE_DCL_TESS_OUTPUT_PRIMITIVE: u32 = 151;
pub const OPCODE_DCL_HS_MAX_TESSFACTOR: u32 = 152;
pub const OPCODE_DCL_HS_FORK_PHASE_INSTANCE_COUNT: u32 = 153;
pub const OPCODE_DCL_HS_JOIN_PHASE_INSTANCE_COUNT: u32 = 154;
pub const OPCODE_DCL_THREAD_GROUP: u32 = 155;
pub const OPCODE_DCL_UAV_TYPED: u32 = 156;
pub const OPCODE_DCL_UAV_RAW: u32 = 157;
pub const OPCODE_DCL_UAV_STRUCTURED: u32 = 158;
pub const OPCODE_DCL_TGSM_RAW: u32 = 159;
pub const OPCODE_DCL_TGSM_STRUCTURED: u32 = 160;
pub const OPCODE_DCL_RESOURCE_RAW: u32 = 161;
pub const OPCODE_DCL_RESOURCE_STRUCTURED: u32 = 162;
pub const OPCODE_LD_UAV_TYPED: u32 = 163;
pub const OPCODE_STORE_UAV_TYPED: u32 = 164;
pub const OPCODE_LD_RAW: u32 = 165;
pub const OPCODE_STORE_RAW: u32 = 166;
pub const OPCODE_LD_STRUCTURED: u32 = 167;
pub const OPCODE_STORE_STRUCTURED: u32 = 168;
pub const OPCODE_ATOMIC_AND: u32 = 169;
pub const OPCODE_ATOMIC_OR: u32 = 170;
pub const OPCODE_ATOMIC_XOR: u32 = 171;
pub const OPCODE_ATOMIC_CMP_STORE: u32 = 172;
pub const OPCODE_ATOMIC_IADD: u32 = 173;
pub const OPCODE_ATOMIC_IMAX: u32 = 174;
pub const OPCODE_ATOMIC_IMIN: u32 = 175;
pub const OPCODE_ATOMIC_UMAX: u32 = 176;
pub const OPCODE_ATOMIC_UMIN: u32 = 177;
pub const OPCODE_IMM_ATOMIC_ALLOC: u32 = 178;
pub const OPCODE_IMM_ATOMIC_CONSUME: u32 = 179;
pub const OPCODE_IMM_ATOMIC_IADD: u32 = 180;
pub const OPCODE_IMM_ATOMIC_AND: u32 = 181;
pub const OPCODE_IMM_ATOMIC_OR: u32 = 182;
pub const OPCODE_IMM_ATOMIC_XOR: u32 = 183;
pub const OPCODE_IMM_ATOMIC_EXCH: u32 = 184;
pub const OPCODE_IMM_ATOMIC_CMP_EXCH: u32 = 185;
pub const OPCODE_IMM_ATOMIC_IMAX: u32 = 186;
pub const OPCODE_IMM_ATOMIC_IMIN: u32 = 187;
pub const OPCODE_IMM_ATOMIC_UMAX: u32 = 188;
pub const OPCODE_IMM_ATOMIC_UMIN: u32 = 189;
pub const OPCODE_SYNC: u32 = 190;
pub const OPCODE_DADD: u32 = 191;
pub const OPCODE_DMAX: u32 = 192;
pub const OPCODE_DMIN: u32 = 193;
pub const OPCODE_DMUL: u32 = 194;
pub const OPCODE_DEQ: u32 = 195;
pub const OPCODE_DGE: u32 = 196;
pub const OPCODE_DLT: u32 = 197;
pub const OPCODE_DNE: u32 = 198;
pub const OPCODE_DMOV: u32 = 199;
pub const OPCODE_DMOVC: u32 = 200;
pub const OPCODE_DTOF: u32 = 201;
pub const OPCODE_FTOD: u32 = 202;
pub const OPCODE_EVAL_SNAPPED: u32 = 203;
pub const OPCODE_EVAL_SAMPLE_INDEX: u32 = 204;
pub const OPCODE_EVAL_CENTROID: u32 = 205;
pub const OPCODE_DCL_GS_INSTANCE_COUNT: u32 = 206;

/// Broad instruction family, used by the compiler to pick a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstClass {
    Declaration,
    CustomData,
    ControlFlow,
    GeometryEmit,
    Atomic,
    AtomicCounter,
    Barrier,
    BitExtract,
    BitInsert,
    BufferQuery,
    BufferLoad,
    BufferStore,
    ConvertFloat16,
    Float64,
    HullShaderPhase,
    Interpolate,
    NoOperation,
    TextureQuery,
    TextureQueryLod,
    TextureQueryMs,
    TextureQueryMsPos,
    TextureFetch,
    TextureGather,
    TextureSample,
    TypedUavLoad,
    TypedUavStore,
    VectorAlu,
    VectorCmov,
    VectorCmp,
    VectorDeriv,
    VectorDot,
    VectorIdiv,
    VectorImul,
    VectorShift,
    VectorSinCos,
}

/// One operand slot in an instruction format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Dst(DataType),
    Src(DataType),
    Imm32,
    /// Swallows every remaining dword of the instruction as raw immediates.
    Rest,
}

/// Static layout of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstFormat {
    pub name: &'static str,
    pub class: InstClass,
    pub operands: &'static [OperandKind],
}

const F: DataType = DataType::Float32;
const U: DataType = DataType::Uint32;
const I: DataType = DataType::Sint32;

use OperandKind::{Dst as D, Imm32 as IMM, Rest as REST, Src as S};

const fn fmt(
    name: &'static str,
    class: InstClass,
    operands: &'static [OperandKind],
) -> Option<InstFormat> {
    Some(InstFormat {
        name,
        class,
        operands,
    })
}

/// Returns the operand layout of `opcode`, or `None` for opcodes the decoder
/// does not recognize.
pub fn instruction_format(opcode: u32) -> Option<InstFormat> {
    use InstClass::*;

    match opcode {
        OPCODE_ADD => fmt("add", VectorAlu, &[D(F), S(F), S(F)]),
        OPCODE_AND => fmt("and", VectorAlu, &[D(U), S(U), S(U)]),
        OPCODE_BREAK => fmt("break", ControlFlow, &[]),
        OPCODE_BREAKC => fmt("breakc", ControlFlow, &[S(U)]),
        OPCODE_CALL => fmt("call", ControlFlow, &[S(U)]),
        OPCODE_CALLC => fmt("callc", ControlFlow, &[S(U), S(U)]),
        OPCODE_CASE => fmt("case", ControlFlow, &[S(U)]),
        OPCODE_CONTINUE => fmt("continue", ControlFlow, &[]),
        OPCODE_CONTINUEC => fmt("continuec", ControlFlow, &[S(U)]),
        OPCODE_CUT => fmt("cut", GeometryEmit, &[]),
        OPCODE_DEFAULT => fmt("default", ControlFlow, &[]),
        OPCODE_DERIV_RTX => fmt("deriv_rtx", VectorDeriv, &[D(F), S(F)]),
        OPCODE_DERIV_RTY => fmt("deriv_rty", VectorDeriv, &[D(F), S(F)]),
        OPCODE_DISCARD => fmt("discard", ControlFlow, &[S(U)]),
        OPCODE_DIV => fmt("div", VectorAlu, &[D(F), S(F), S(F)]),
        OPCODE_DP2 => fmt("dp2", VectorDot, &[D(F), S(F), S(F)]),
        OPCODE_DP3 => fmt("dp3", VectorDot, &[D(F), S(F), S(F)]),
        OPCODE_DP4 => fmt("dp4", VectorDot, &[D(F), S(F), S(F)]),
        OPCODE_ELSE => fmt("else", ControlFlow, &[]),
        OPCODE_EMIT => fmt("emit", GeometryEmit, &[]),
        OPCODE_EMITTHENCUT => fmt("emit_then_cut", GeometryEmit, &[]),
        OPCODE_ENDIF => fmt("endif", ControlFlow, &[]),
        OPCODE_ENDLOOP => fmt("endloop", ControlFlow, &[]),
        OPCODE_ENDSWITCH => fmt("endswitch", ControlFlow, &[]),
        OPCODE_EQ => fmt("eq", VectorCmp, &[D(U), S(F), S(F)]),
        OPCODE_EXP => fmt("exp", VectorAlu, &[D(F), S(F)]),
        OPCODE_FRC => fmt("frc", VectorAlu, &[D(F), S(F)]),
        OPCODE_FTOI => fmt("ftoi", VectorAlu, &[D(I), S(F)]),
        OPCODE_FTOU => fmt("ftou", VectorAlu, &[D(U), S(F)]),
        OPCODE_GE => fmt("ge", VectorCmp, &[D(U), S(F), S(F)]),
        OPCODE_IADD => fmt("iadd", VectorAlu, &[D(I), S(I), S(I)]),
        OPCODE_IF => fmt("if", ControlFlow, &[S(U)]),
        OPCODE_IEQ => fmt("ieq", VectorCmp, &[D(U), S(I), S(I)]),
        OPCODE_IGE => fmt("ige", VectorCmp, &[D(U), S(I), S(I)]),
        OPCODE_ILT => fmt("ilt", VectorCmp, &[D(U), S(I), S(I)]),
        OPCODE_IMAD => fmt("imad", VectorAlu, &[D(I), S(I), S(I), S(I)]),
        OPCODE_IMAX => fmt("imax", VectorAlu, &[D(I), S(I), S(I)]),
        OPCODE_IMIN => fmt("imin", VectorAlu, &[D(I), S(I), S(I)]),
        OPCODE_IMUL => fmt("imul", VectorImul, &[D(I), D(I), S(I), S(I)]),
        OPCODE_INE => fmt("ine", VectorCmp, &[D(U), S(I), S(I)]),
        OPCODE_INEG => fmt("ineg", VectorAlu, &[D(I), S(I)]),
        OPCODE_ISHL => fmt("ishl", VectorShift, &[D(I), S(I), S(U)]),
        OPCODE_ISHR => fmt("ishr", VectorShift, &[D(I), S(I), S(U)]),
        OPCODE_ITOF => fmt("itof", VectorAlu, &[D(F), S(I)]),
        OPCODE_LABEL => fmt("label", ControlFlow, &[S(U)]),
        OPCODE_LD => fmt("ld", TextureFetch, &[D(F), S(I), S(F)]),
        OPCODE_LD_MS => fmt("ld_ms", TextureFetch, &[D(F), S(I), S(F), S(I)]),
        OPCODE_LOG => fmt("log", VectorAlu, &[D(F), S(F)]),
        OPCODE_LOOP => fmt("loop", ControlFlow, &[]),
        OPCODE_LT => fmt("lt", VectorCmp, &[D(U), S(F), S(F)]),
        OPCODE_MAD => fmt("mad", VectorAlu, &[D(F), S(F), S(F), S(F)]),
        OPCODE_MIN => fmt("min", VectorAlu, &[D(F), S(F), S(F)]),
        OPCODE_MAX => fmt("max", VectorAlu, &[D(F), S(F), S(F)]),
        OPCODE_CUSTOMDATA => fmt("customdata", CustomData, &[]),
        OPCODE_MOV => fmt("mov", VectorAlu, &[D(F), S(F)]),
        OPCODE_MOVC => fmt("movc", VectorCmov, &[D(F), S(U), S(F), S(F)]),
        OPCODE_MUL => fmt("mul", VectorAlu, &[D(F), S(F), S(F)]),
        OPCODE_NE => fmt("ne", VectorCmp, &[D(U), S(F), S(F)]),
        OPCODE_NOP => fmt("nop", NoOperation, &[]),
        OPCODE_NOT => fmt("not", VectorAlu, &[D(U), S(U)]),
        OPCODE_OR => fmt("or", VectorAlu, &[D(U), S(U), S(U)]),
        OPCODE_RESINFO => fmt("resinfo", TextureQuery, &[D(F), S(U), S(F)]),
        OPCODE_RET => fmt("ret", ControlFlow, &[]),
        OPCODE_RETC => fmt("retc", ControlFlow, &[S(U)]),
        OPCODE_ROUND_NE => fmt("round_ne", VectorAlu, &[D(F), S(F)]),
        OPCODE_ROUND_NI => fmt("round_ni", VectorAlu, &[D(F), S(F)]),
        OPCODE_ROUND_PI => fmt("round_pi", VectorAlu, &[D(F), S(F)]),
        OPCODE_ROUND_Z => fmt("round_z", VectorAlu, &[D(F), S(F)]),
        OPCODE_RSQ => fmt("rsq", VectorAlu, &[D(F), S(F)]),
        OPCODE_SAMPLE => fmt("sample", TextureSample, &[D(F), S(F), S(F), S(F)]),
        OPCODE_SAMPLE_C => fmt("sample_c", TextureSample, &[D(F), S(F), S(F), S(F), S(F)]),
        OPCODE_SAMPLE_C_LZ => {
            fmt("sample_c_lz", TextureSample, &[D(F), S(F), S(F), S(F), S(F)])
        }
        OPCODE_SAMPLE_L => fmt("sample_l", TextureSample, &[D(F), S(F), S(F), S(F), S(F)]),
        OPCODE_SAMPLE_D => fmt(
            "sample_d",
            TextureSample,
            &[D(F), S(F), S(F), S(F), S(F), S(F)],
        ),
        OPCODE_SAMPLE_B => fmt("sample_b", TextureSample, &[D(F), S(F), S(F), S(F), S(F)]),
        OPCODE_SQRT => fmt("sqrt", VectorAlu, &[D(F), S(F)]),
        OPCODE_SWITCH => fmt("switch", ControlFlow, &[S(U)]),
        OPCODE_SINCOS => fmt("sincos", VectorSinCos, &[D(F), D(F), S(F)]),
        OPCODE_UDIV => fmt("udiv", VectorIdiv, &[D(U), D(U), S(U), S(U)]),
        OPCODE_ULT => fmt("ult", VectorCmp, &[D(U), S(U), S(U)]),
        OPCODE_UGE => fmt("uge", VectorCmp, &[D(U), S(U), S(U)]),
        OPCODE_UMUL => fmt("umul", VectorImul, &[D(U), D(U), S(U), S(U)]),
        OPCODE_UMAD => fmt("umad", VectorAlu, &[D(U), S(U), S(U), S(U)]),
        OPCODE_UMAX => fmt("umax", VectorAlu, &[D(U), S(U), S(U)]),
        OPCODE_UMIN => fmt("umin", VectorAlu, &[D(U), S(U), S(U)]),
        OPCODE_USHR => fmt("ushr", VectorShift, &[D(U), S(U), S(U)]),
        OPCODE_UTOF => fmt("utof", VectorAlu, &[D(F), S(U)]),
        OPCODE_XOR => fmt("xor", VectorAlu, &[D(U), S(U), S(U)]),

        OPCODE_DCL_RESOURCE => fmt("dcl_resource", Declaration, &[D(F), IMM]),
        OPCODE_DCL_CONSTANT_BUFFER => fmt("dcl_constantbuffer", Declaration, &[S(F)]),
        OPCODE_DCL_SAMPLER => fmt("dcl_sampler", Declaration, &[D(F)]),
        OPCODE_DCL_INDEX_RANGE => fmt("dcl_indexrange", Declaration, &[D(F), IMM]),
        OPCODE_DCL_GS_OUTPUT_PRIMITIVE_TOPOLOGY => {
            fmt("dcl_outputtopology", Declaration, &[])
        }
        OPCODE_DCL_GS_INPUT_PRIMITIVE => fmt("dcl_inputprimitive", Declaration, &[]),
        OPCODE_DCL_MAX_OUTPUT_VERTEX_COUNT => fmt("dcl_maxout", Declaration, &[IMM]),
        OPCODE_DCL_INPUT => fmt("dcl_input", Declaration, &[D(F)]),
        OPCODE_DCL_INPUT_SGV => fmt("dcl_input_sgv", Declaration, &[D(F), IMM]),
        OPCODE_DCL_INPUT_SIV => fmt("dcl_input_siv", Declaration, &[D(F), IMM]),
        OPCODE_DCL_INPUT_PS => fmt("dcl_input_ps", Declaration, &[D(F)]),
        OPCODE_DCL_INPUT_PS_SGV => fmt("dcl_input_ps_sgv", Declaration, &[D(F), IMM]),
        OPCODE_DCL_INPUT_PS_SIV => fmt("dcl_input_ps_siv", Declaration, &[D(F), IMM]),
        OPCODE_DCL_OUTPUT => fmt("dcl_output", Declaration, &[D(F)]),
        OPCODE_DCL_OUTPUT_SGV => fmt("dcl_output_sgv", Declaration, &[D(F), IMM]),
        OPCODE_DCL_OUTPUT_SIV => fmt("dcl_output_siv", Declaration, &[D(F), IMM]),
        OPCODE_DCL_TEMPS => fmt("dcl_temps", Declaration, &[IMM]),
        OPCODE_DCL_INDEXABLE_TEMP => fmt("dcl_indexableTemp", Declaration, &[IMM, IMM, IMM]),
        OPCODE_DCL_GLOBAL_FLAGS => fmt("dcl_globalFlags", Declaration, &[]),

        OPCODE_LOD => fmt("lod", TextureQueryLod, &[D(F), S(F), S(F), S(F)]),
        OPCODE_GATHER4 => fmt("gather4", TextureGather, &[D(F), S(F), S(F), S(F)]),
        OPCODE_SAMPLE_POS => fmt("samplepos", TextureQueryMsPos, &[D(F), S(F), S(U)]),
        OPCODE_SAMPLE_INFO => fmt("sampleinfo", TextureQueryMs, &[D(F), S(F)]),

        OPCODE_HS_DECLS => fmt("hs_decls", HullShaderPhase, &[]),
        OPCODE_HS_CONTROL_POINT_PHASE => fmt("hs_control_point_phase", HullShaderPhase, &[]),
        OPCODE_HS_FORK_PHASE => fmt("hs_fork_phase", HullShaderPhase, &[]),
        OPCODE_HS_JOIN_PHASE => fmt("hs_join_phase", HullShaderPhase, &[]),

        OPCODE_EMIT_STREAM => fmt("emit_stream", GeometryEmit, &[D(U)]),
        OPCODE_CUT_STREAM => fmt("cut_stream", GeometryEmit, &[D(U)]),
        OPCODE_EMITTHENCUT_STREAM => fmt("emit_then_cut_stream", GeometryEmit, &[D(U)]),
        OPCODE_INTERFACE_CALL => fmt("fcall", ControlFlow, &[IMM, S(U)]),

        OPCODE_BUFINFO => fmt("bufinfo", BufferQuery, &[D(U), S(U)]),
        OPCODE_DERIV_RTX_COARSE => fmt("deriv_rtx_coarse", VectorDeriv, &[D(F), S(F)]),
        OPCODE_DERIV_RTX_FINE => fmt("deriv_rtx_fine", VectorDeriv, &[D(F), S(F)]),
        OPCODE_DERIV_RTY_COARSE => fmt("deriv_rty_coarse", VectorDeriv, &[D(F), S(F)]),
        OPCODE_DERIV_RTY_FINE => fmt("deriv_rty_fine", VectorDeriv, &[D(F), S(F)]),
        OPCODE_GATHER4_C => fmt("gather4_c", TextureGather, &[D(F), S(F), S(F), S(F), S(F)]),
        OPCODE_GATHER4_PO => fmt("gather4_po", TextureGather, &[D(F), S(F), S(I), S(F), S(F)]),
        OPCODE_GATHER4_PO_C => fmt(
            "gather4_po_c",
            TextureGather,
            &[D(F), S(F), S(I), S(F), S(F), S(F)],
        ),
        OPCODE_RCP => fmt("rcp", VectorAlu, &[D(F), S(F)]),
        OPCODE_F32TOF16 => fmt("f32tof16", ConvertFloat16, &[D(U), S(F)]),
        OPCODE_F16TOF32 => fmt("f16tof32", ConvertFloat16, &[D(F), S(U)]),
        OPCODE_UADDC => fmt("uaddc", VectorAlu, &[D(U), D(U), S(U), S(U)]),
        OPCODE_USUBB => fmt("usubb", VectorAlu, &[D(U), D(U), S(U), S(U)]),
        OPCODE_COUNTBITS => fmt("countbits", VectorAlu, &[D(U), S(U)]),
        OPCODE_FIRSTBIT_HI => fmt("firstbit_hi", VectorAlu, &[D(U), S(U)]),
        OPCODE_FIRSTBIT_LO => fmt("firstbit_lo", VectorAlu, &[D(U), S(U)]),
        OPCODE_FIRSTBIT_SHI => fmt("firstbit_shi", VectorAlu, &[D(U), S(I)]),
        OPCODE_UBFE => fmt("ubfe", BitExtract, &[D(U), S(U), S(U), S(U)]),
        OPCODE_IBFE => fmt("ibfe", BitExtract, &[D(I), S(U), S(U), S(I)]),
        OPCODE_BFI => fmt("bfi", BitInsert, &[D(U), S(U), S(U), S(U), S(U)]),
        OPCODE_BFREV => fmt("bfrev", VectorAlu, &[D(U), S(U)]),
        OPCODE_SWAPC => fmt("swapc", VectorCmov, &[D(F), D(F), S(U), S(F), S(F)]),

        OPCODE_DCL_STREAM => fmt("dcl_stream", Declaration, &[D(U)]),
        OPCODE_DCL_FUNCTION_BODY => fmt("dcl_function_body", Declaration, &[IMM]),
        OPCODE_DCL_FUNCTION_TABLE => fmt("dcl_function_table", Declaration, &[REST]),
        OPCODE_DCL_INTERFACE => fmt("dcl_interface", Declaration, &[REST]),
        OPCODE_DCL_INPUT_CONTROL_POINT_COUNT => {
            fmt("dcl_input_control_point_count", Declaration, &[])
        }
        OPCODE_DCL_OUTPUT_CONTROL_POINT_COUNT => {
            fmt("dcl_output_control_point_count", Declaration, &[])
        }
        OPCODE_DCL_TESS_DOMAIN => fmt("dcl_tessellator_domain", Declaration, &[]),
        OPCODE_DCL_TESS_PARTITIONING => fmt("dcl_tessellator_partitioning", Declaration, &[]),
        OPCODE_DCL_TESS_OUTPUT_PRIMITIVE => {
            fmt("dcl_tessellator_output_primitive", Declaration, &[])
        }
        OPCODE_DCL_HS_MAX_TESSFACTOR => fmt("dcl_hs_max_tessfactor", Declaration, &[IMM]),
        OPCODE_DCL_HS_FORK_PHASE_INSTANCE_COUNT => {
            fmt("dcl_hs_fork_phase_instance_count", Declaration, &[IMM])
        }
        OPCODE_DCL_HS_JOIN_PHASE_INSTANCE_COUNT => {
            fmt("dcl_hs_join_phase_instance_count", Declaration, &[IMM])
        }
        OPCODE_DCL_THREAD_GROUP => fmt("dcl_thread_group", Declaration, &[IMM, IMM, IMM]),
        OPCODE_DCL_UAV_TYPED => fmt("dcl_uav_typed", Declaration, &[D(F), IMM]),
        OPCODE_DCL_UAV_RAW => fmt("dcl_uav_raw", Declaration, &[D(U)]),
        OPCODE_DCL_UAV_STRUCTURED => fmt("dcl_uav_structured", Declaration, &[D(U), IMM]),
        OPCODE_DCL_TGSM_RAW => fmt("dcl_tgsm_raw", Declaration, &[D(U), IMM]),
        OPCODE_DCL_TGSM_STRUCTURED => {
            fmt("dcl_tgsm_structured", Declaration, &[D(U), IMM, IMM])
        }
        OPCODE_DCL_RESOURCE_RAW => fmt("dcl_resource_raw", Declaration, &[D(U)]),
        OPCODE_DCL_RESOURCE_STRUCTURED => {
            fmt("dcl_resource_structured", Declaration, &[D(U), IMM])
        }

        OPCODE_LD_UAV_TYPED => fmt("ld_uav_typed", TypedUavLoad, &[D(F), S(U), S(F)]),
        OPCODE_STORE_UAV_TYPED => fmt("store_uav_typed", TypedUavStore, &[D(F), S(U), S(F)]),
        OPCODE_LD_RAW => fmt("ld_raw", BufferLoad, &[D(U), S(U), S(U)]),
        OPCODE_STORE_RAW => fmt("store_raw", BufferStore, &[D(U), S(U), S(U)]),
        OPCODE_LD_STRUCTURED => fmt("ld_structured", BufferLoad, &[D(U), S(U), S(U), S(U)]),
        OPCODE_STORE_STRUCTURED => {
            fmt("store_structured", BufferStore, &[D(U), S(U), S(U), S(U)])
        }

        OPCODE_ATOMIC_AND => fmt("atomic_and", Atomic, &[D(U), S(U), S(U)]),
        OPCODE_ATOMIC_OR => fmt("atomic_or", Atomic, &[D(U), S(U), S(U)]),
        OPCODE_ATOMIC_XOR => fmt("atomic_xor", Atomic, &[D(U), S(U), S(U)]),
        OPCODE_ATOMIC_CMP_STORE => fmt("atomic_cmp_store", Atomic, &[D(U), S(U), S(U), S(U)]),
        OPCODE_ATOMIC_IADD => fmt("atomic_iadd", Atomic, &[D(I), S(U), S(I)]),
        OPCODE_ATOMIC_IMAX => fmt("atomic_imax", Atomic, &[D(I), S(U), S(I)]),
        OPCODE_ATOMIC_IMIN => fmt("atomic_imin", Atomic, &[D(I), S(U), S(I)]),
        OPCODE_ATOMIC_UMAX => fmt("atomic_umax", Atomic, &[D(U), S(U), S(U)]),
        OPCODE_ATOMIC_UMIN => fmt("atomic_umin", Atomic, &[D(U), S(U), S(U)]),
        OPCODE_IMM_ATOMIC_ALLOC => fmt("imm_atomic_alloc", AtomicCounter, &[D(U), S(U)]),
        OPCODE_IMM_ATOMIC_CONSUME => fmt("imm_atomic_consume", AtomicCounter, &[D(U), S(U)]),
        OPCODE_IMM_ATOMIC_IADD => fmt("imm_atomic_iadd", Atomic, &[D(I), D(I), S(U), S(I)]),
        OPCODE_IMM_ATOMIC_AND => fmt("imm_atomic_and", Atomic, &[D(U), D(U), S(U), S(U)]),
        OPCODE_IMM_ATOMIC_OR => fmt("imm_atomic_or", Atomic, &[D(U), D(U), S(U), S(U)]),
        OPCODE_IMM_ATOMIC_XOR => fmt("imm_atomic_xor", Atomic, &[D(U), D(U), S(U), S(U)]),
        OPCODE_IMM_ATOMIC_EXCH => fmt("imm_atomic_exch", Atomic, &[D(U), D(U), S(U), S(U)]),
        OPCODE_IMM_ATOMIC_CMP_EXCH => fmt(
            "imm_atomic_cmp_exch",
            Atomic,
            &[D(U), D(U), S(U), S(U), S(U)],
        ),
        OPCODE_IMM_ATOMIC_IMAX => fmt("imm_atomic_imax", Atomic, &[D(I), D(I), S(U), S(I)]),
        OPCODE_IMM_ATOMIC_IMIN => fmt("imm_atomic_imin", Atomic, &[D(I), D(I), S(U), S(I)]),
        OPCODE_IMM_ATOMIC_UMAX => fmt("imm_atomic_umax", Atomic, &[D(U), D(U), S(U), S(U)]),
        OPCODE_IMM_ATOMIC_UMIN => fmt("imm_atomic_umin", Atomic, &[D(U), D(U), S(U), S(U)]),
        OPCODE_SYNC => fmt("sync", Barrier, &[]),

        OPCODE_DADD => fmt("dadd", Float64, &[D(U), S(U), S(U)]),
        OPCODE_DMAX => fmt("dmax", Float64, &[D(U), S(U), S(U)]),
        OPCODE_DMIN => fmt("dmin", Float64, &[D(U), S(U), S(U)]),
        OPCODE_DMUL => fmt("dmul", Float64, &[D(U), S(U), S(U)]),
        OPCODE_DEQ => fmt("deq", Float64, &[D(U), S(U), S(U)]),
        OPCODE_DGE => fmt("dge", Float64, &[D(U), S(U), S(U)]),
        OPCODE_DLT => fmt("dlt", Float64, &[D(U), S(U), S(U)]),
        OPCODE_DNE => fmt("dne", Float64, &[D(U), S(U), S(U)]),
        OPCODE_DMOV => fmt("dmov", Float64, &[D(U), S(U)]),
        OPCODE_DMOVC => fmt("dmovc", Float64, &[D(U), S(U), S(U), S(U)]),
        OPCODE_DTOF => fmt("dtof", Float64, &[D(F), S(U)]),
        OPCODE_FTOD => fmt("ftod", Float64, &[D(U), S(F)]),

        OPCODE_EVAL_SNAPPED => fmt("eval_snapped", Interpolate, &[D(F), S(F), S(I)]),
        OPCODE_EVAL_SAMPLE_INDEX => fmt("eval_sample_index", Interpolate, &[D(F), S(F), S(I)]),
        OPCODE_EVAL_CENTROID => fmt("eval_centroid", Interpolate, &[D(F), S(F)]),
        OPCODE_DCL_GS_INSTANCE_COUNT => fmt("dcl_gs_instance_count", Declaration, &[IMM]),

        _ => None,
    }
}

/// Human-readable opcode name for diagnostics.
pub fn opcode_name(opcode: u32) -> &'static str {
    instruction_format(opcode).map_or("unknown", |f| f.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_opcode_has_a_unique_name() {
        let mut seen = std::collections::BTreeMap::new();
        for opcode in 0..=OPCODE_MASK {
            if let Some(format) = instruction_format(opcode) {
                if let Some(prev) = seen.insert(format.name, opcode) {
                    panic!("opcodes {prev} and {opcode} share the name {}", format.name);
                }
            }
        }
        assert!(seen.len() > 190);
    }

    #[test]
    fn gaps_in_the_opcode_space_are_rejected() {
        assert!(instruction_format(107).is_none());
        assert!(instruction_format(112).is_none());
        assert!(instruction_format(0x7ff).is_none());
    }

    #[test]
    fn destinations_precede_sources() {
        for opcode in 0..=OPCODE_MASK {
            let Some(format) = instruction_format(opcode) else {
                continue;
            };
            let first_src = format
                .operands
                .iter()
                .position(|k| !matches!(k, OperandKind::Dst(_)))
                .unwrap_or(format.operands.len());
            assert!(
                format.operands[first_src..]
                    .iter()
                    .all(|k| !matches!(k, OperandKind::Dst(_))),
                "{} mixes destination and source operands",
                format.name
            );
        }
    }
}
