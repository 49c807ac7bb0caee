//! DXBC (Shader Model 4/5) to SPIR-V compiler.
//!
//! The pipeline is a straight line: the container's `SHDR`/`SHEX` chunk is
//! tokenized ([`sm4`]), decoded into [`sm4_ir`] instruction records,
//! pre-scanned by [`analysis`], and translated one instruction at a time by the
//! compiler into a single SPIR-V module wrapped in a [`ShaderArtifact`].
//!
//! ```no_run
//! # fn main() -> Result<(), aero_dxbc_spirv::CompileError> {
//! let bytes = std::fs::read("shader.dxbc").expect("read shader");
//! let artifact = aero_dxbc_spirv::compile_dxbc(&bytes, &Default::default())?;
//! println!("{} words, {} bindings", artifact.code().len(), artifact.resource_slots().len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod analysis;
pub mod artifact;
pub mod binding_model;
mod compiler;
mod error;
pub mod options;
pub mod signature;
pub mod sm4;
pub mod sm4_ir;

use std::collections::BTreeMap;

use aero_dxbc::{DxbcFile, SignatureChunk};

pub use crate::analysis::{analyze, AnalysisInfo, ClipCullCounts, UavAccess};
pub use crate::artifact::{InterfaceRegister, InterfaceSlots, ResourceSlot, ShaderArtifact};
pub use crate::binding_model::{BindingClass, ResourceKind, StageMask, ViewDimension};
pub use crate::compiler::Compiler;
pub use crate::error::CompileError;
pub use crate::options::{CompilerOptions, TextureClampMode};
pub use crate::signature::{InterpolationMode, Signature, SignatureElement, SystemValue};
pub use crate::sm4::{ShaderModel, ShaderStage, Sm4Error, Sm4Program};

use crate::sm4::opcode::{OPCODE_DCL_INPUT_PS, OPCODE_DCL_INPUT_PS_SGV, OPCODE_DCL_INPUT_PS_SIV};
use crate::sm4::{FOURCC_ISGN, FOURCC_OSGN, FOURCC_PCSG};
use crate::sm4_ir::Sm4Instruction;

/// Compiles a complete DXBC container.
///
/// `ISGN`/`OSGN` (or their `*SG1` spellings) are optional; a missing chunk is
/// treated as an empty signature. `PCSG` is only consulted by hull and domain
/// shaders.
pub fn compile_dxbc(bytes: &[u8], options: &CompilerOptions) -> Result<ShaderArtifact, CompileError> {
    let file = DxbcFile::parse(bytes)?;
    let program = Sm4Program::parse_from_dxbc(&file)?;

    let isgn = file.get_signature(FOURCC_ISGN).transpose()?.unwrap_or_default();
    let osgn = file.get_signature(FOURCC_OSGN).transpose()?.unwrap_or_default();
    let pcsg = file.get_signature(FOURCC_PCSG).transpose()?;

    compile_program(&program, &isgn, &osgn, pcsg.as_ref(), options)
}

/// Compiles an already extracted program with its signature chunks.
pub fn compile_program(
    program: &Sm4Program,
    isgn: &SignatureChunk,
    osgn: &SignatureChunk,
    pcsg: Option<&SignatureChunk>,
    options: &CompilerOptions,
) -> Result<ShaderArtifact, CompileError> {
    let insts = sm4::decode_program(program)?;
    tracing::debug!(
        stage = %program.stage,
        model = format_args!("{}.{}", program.model.major, program.model.minor),
        instructions = insts.len(),
        "decoded shader program"
    );

    let isgn = Signature::from_chunk(isgn).with_interpolation(&input_interpolation(&insts));
    let osgn = Signature::from_chunk(osgn);
    let psgn = pcsg.map(Signature::from_chunk).unwrap_or_default();
    let analysis = analyze(&insts, &isgn, &osgn);

    let mut compiler = Compiler::new(program.stage, options, &isgn, &osgn, &psgn, &analysis)?;
    for inst in &insts {
        compiler.process_instruction(inst)?;
    }
    compiler.finalize()
}

/// Interpolation mode of every `dcl_input_ps*` register.
fn input_interpolation(insts: &[Sm4Instruction]) -> BTreeMap<u32, InterpolationMode> {
    insts
        .iter()
        .filter(|inst| {
            matches!(
                inst.opcode,
                OPCODE_DCL_INPUT_PS | OPCODE_DCL_INPUT_PS_SGV | OPCODE_DCL_INPUT_PS_SIV
            )
        })
        .filter_map(|inst| {
            let reg = inst.dst.first()?.index(0)?;
            Some((reg, InterpolationMode::from_raw(inst.interpolation())))
        })
        .collect()
}
