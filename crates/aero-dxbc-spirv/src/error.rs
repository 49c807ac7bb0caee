use aero_dxbc::DxbcError;
use thiserror::Error;

use crate::sm4::{ShaderStage, Sm4DecodeError, Sm4Error};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("DXBC container: {0}")]
    Dxbc(#[from] DxbcError),
    #[error("shader program: {0}")]
    Program(#[from] Sm4Error),
    #[error("malformed bytecode: {0}")]
    MalformedBytecode(#[from] Sm4DecodeError),
    #[error("unsupported shader stage {0}")]
    UnsupportedStage(ShaderStage),
    #[error("unsupported instruction {name} (opcode {opcode}) at dword {at_dword} in {stage} shader")]
    UnsupportedInstruction {
        opcode: u32,
        name: &'static str,
        at_dword: usize,
        stage: ShaderStage,
    },
    #[error("invalid translation state: {0}")]
    InvalidTranslationState(String),
    #[error("{kind}{slot} is out of range (max {max} slots)")]
    ResourceSlotOutOfRange {
        kind: &'static str,
        slot: u32,
        max: u32,
    },
    #[error("SPIR-V module builder: {0}")]
    ModuleBuilder(String),
}

impl From<rspirv::dr::Error> for CompileError {
    fn from(err: rspirv::dr::Error) -> Self {
        CompileError::ModuleBuilder(format!("{err:?}"))
    }
}

impl CompileError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CompileError::InvalidTranslationState(msg.into())
    }
}
