use aero_dxbc::test_utils::{build_container, build_signature_chunk, SignatureEntryDesc};
use aero_dxbc::FourCC;
use aero_dxbc_spirv::sm4::opcode::*;
use aero_dxbc_spirv::{compile_dxbc, CompileError, CompilerOptions, ShaderStage, Sm4Error};
use pretty_assertions::assert_eq;
use rspirv::dr::Operand;
use rspirv::spirv::{ExecutionMode, ExecutionModel, Op};

const FOURCC_SHDR: FourCC = FourCC(*b"SHDR");
const FOURCC_ISGN: FourCC = FourCC(*b"ISGN");
const FOURCC_OSGN: FourCC = FourCC(*b"OSGN");
const FOURCC_RDEF: FourCC = FourCC(*b"RDEF");

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn operand(ty: u32, components: u32, mode: u32, sel: u32) -> u32 {
    components
        | (mode << OPERAND_SELECTION_MODE_SHIFT)
        | (sel << OPERAND_COMPONENT_SELECTION_SHIFT)
        | (ty << OPERAND_TYPE_SHIFT)
        | (1 << OPERAND_INDEX_DIMENSION_SHIFT)
}

fn token_bytes(tokens: &[u32]) -> Vec<u8> {
    tokens.iter().flat_map(|t| t.to_le_bytes()).collect()
}

/// ps_4_0: `dcl_input_ps linear v0.xyzw; dcl_output o0.xyzw; mov o0, v0; ret`
fn color_passthrough_ps() -> Vec<u8> {
    let v0_dst = operand(1, 2, OPERAND_SEL_MASK, 0xf);
    let o0_dst = operand(2, 2, OPERAND_SEL_MASK, 0xf);
    let v0_src = operand(1, 2, OPERAND_SEL_SWIZZLE, 0xe4);
    let body = [
        OPCODE_DCL_INPUT_PS | (3 << OPCODE_LEN_SHIFT) | (2 << 11),
        v0_dst,
        0,
        OPCODE_DCL_OUTPUT | (3 << OPCODE_LEN_SHIFT),
        o0_dst,
        0,
        OPCODE_MOV | (5 << OPCODE_LEN_SHIFT),
        o0_dst,
        0,
        v0_src,
        0,
        OPCODE_RET | (1 << OPCODE_LEN_SHIFT),
    ];
    let mut tokens = vec![0x0000_0040, (body.len() + 2) as u32];
    tokens.extend(body);
    token_bytes(&tokens)
}

fn ps_container(shader: &[u8]) -> Vec<u8> {
    let isgn = build_signature_chunk(&[SignatureEntryDesc::user("COLOR", 0, 0xf)]);
    let osgn = build_signature_chunk(&[SignatureEntryDesc::system_value("SV_Target", 64, 0, 0xf)]);
    let rdef: Vec<u8> = Vec::new();
    build_container(&[
        (FOURCC_RDEF, &rdef),
        (FOURCC_ISGN, &isgn),
        (FOURCC_OSGN, &osgn),
        (FOURCC_SHDR, shader),
    ])
}

#[test]
fn sm4_pixel_shader_compiles_to_a_fragment_module() {
    init_tracing();
    let bytes = ps_container(&color_passthrough_ps());
    let artifact = compile_dxbc(&bytes, &CompilerOptions::default()).expect("compile");

    assert_eq!(artifact.stage(), ShaderStage::Pixel);
    assert_eq!(artifact.interface_slots().input_slots, 0b1);
    assert_eq!(artifact.interface_slots().output_slots, 0b1);

    let module = rspirv::dr::load_words(artifact.code()).expect("module parses");
    assert_eq!(module.entry_points.len(), 1);
    let entry = &module.entry_points[0];
    assert_eq!(entry.operands[0], Operand::ExecutionModel(ExecutionModel::Fragment));
    assert_eq!(entry.operands[2], Operand::LiteralString("main".to_owned()));
    assert!(module.execution_modes.iter().any(|m| {
        m.operands.get(1) == Some(&Operand::ExecutionMode(ExecutionMode::OriginUpperLeft))
    }));
}

#[test]
fn options_rename_the_entry_point_and_strip_names() {
    init_tracing();
    let bytes = ps_container(&color_passthrough_ps());
    let options = CompilerOptions {
        entry_point_name: "ps_entry".to_owned(),
        strip_debug_names: true,
        spirv_version: (1, 0),
        ..CompilerOptions::default()
    };
    let artifact = compile_dxbc(&bytes, &options).expect("compile");
    assert_eq!(artifact.entry_point(), "ps_entry");

    let module = rspirv::dr::load_words(artifact.code()).expect("module parses");
    assert!(module.debug_names.is_empty());
    assert_eq!(
        module.entry_points[0].operands[2],
        Operand::LiteralString("ps_entry".to_owned())
    );
    let header = module.header.as_ref().expect("header");
    assert_eq!(header.version(), (1, 0));

    let default = compile_dxbc(&bytes, &CompilerOptions::default()).expect("compile");
    assert_ne!(default.hash(), artifact.hash());
}

#[test]
fn container_without_shader_chunk_is_rejected() {
    let isgn = build_signature_chunk(&[]);
    let bytes = build_container(&[(FOURCC_ISGN, &isgn)]);
    let err = compile_dxbc(&bytes, &CompilerOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Program(Sm4Error::MissingShaderChunk)));
}

#[test]
fn garbage_is_not_a_container() {
    let err = compile_dxbc(b"not a dxbc blob", &CompilerOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Dxbc(_)));
}

#[test]
fn unknown_opcode_is_malformed_bytecode() {
    let tokens = [0x0000_0040, 4, OPCODE_RET | (1 << OPCODE_LEN_SHIFT), 107 | (1 << OPCODE_LEN_SHIFT)];
    let bytes = ps_container(&token_bytes(&tokens));
    let err = compile_dxbc(&bytes, &CompilerOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::MalformedBytecode(_)));
    assert!(err.to_string().contains("malformed bytecode"));
}

#[test]
fn words_and_bytes_agree() {
    let bytes = ps_container(&color_passthrough_ps());
    let artifact = compile_dxbc(&bytes, &CompilerOptions::default()).expect("compile");
    let code = artifact.code();
    let raw = artifact.to_bytes();
    assert_eq!(raw.len(), code.len() * 4);
    assert_eq!(&raw[..4], &0x0723_0203u32.to_le_bytes());
    assert_eq!(code[0], 0x0723_0203);

    let functions = code
        .iter()
        .filter(|w| (**w & 0xffff) as u16 == Op::Function as u16 && (**w >> 16) == 5)
        .count();
    assert!(functions >= 2);
}
