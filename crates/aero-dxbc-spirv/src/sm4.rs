use core::fmt;

use aero_dxbc::{DxbcError, DxbcFile, FourCC};
use thiserror::Error;

pub mod decode;
pub mod opcode;

pub use decode::{decode_program, Sm4DecodeError, Sm4DecodeErrorKind, Sm4Decoder};

pub const FOURCC_ISGN: FourCC = FourCC(*b"ISGN");
pub const FOURCC_OSGN: FourCC = FourCC(*b"OSGN");
pub const FOURCC_PCSG: FourCC = FourCC(*b"PCSG");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
    Unknown(u16),
}

impl ShaderStage {
    /// Dense index used by the binding model, `None` for unknown stages.
    pub fn index(self) -> Option<u32> {
        match self {
            ShaderStage::Vertex => Some(0),
            ShaderStage::Hull => Some(1),
            ShaderStage::Domain => Some(2),
            ShaderStage::Geometry => Some(3),
            ShaderStage::Pixel => Some(4),
            ShaderStage::Compute => Some(5),
            ShaderStage::Unknown(_) => None,
        }
    }

    /// Short prefix used for function names (`vs_main`, `ps_main`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
            ShaderStage::Geometry => "gs",
            ShaderStage::Hull => "hs",
            ShaderStage::Domain => "ds",
            ShaderStage::Compute => "cs",
            ShaderStage::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Pixel => f.write_str("pixel"),
            ShaderStage::Geometry => f.write_str("geometry"),
            ShaderStage::Hull => f.write_str("hull"),
            ShaderStage::Domain => f.write_str("domain"),
            ShaderStage::Compute => f.write_str("compute"),
            ShaderStage::Unknown(ty) => write!(f, "unknown({ty})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderModel {
    pub major: u8,
    pub minor: u8,
}

#[derive(Debug, Clone)]
pub struct Sm4Program {
    pub stage: ShaderStage,
    pub model: ShaderModel,
    /// Full token stream (DWORDs), including version + length.
    pub tokens: Vec<u32>,
}

impl Sm4Program {
    pub fn parse_from_dxbc_bytes(bytes: &[u8]) -> Result<Self, Sm4Error> {
        let file = DxbcFile::parse(bytes)?;
        Self::parse_from_dxbc(&file)
    }

    pub fn parse_from_dxbc(dxbc: &DxbcFile<'_>) -> Result<Self, Sm4Error> {
        let chunk = dxbc.shader_chunk().ok_or(Sm4Error::MissingShaderChunk)?;
        Self::parse_program_tokens(chunk.data)
    }

    pub fn parse_program_tokens(bytes: &[u8]) -> Result<Self, Sm4Error> {
        if bytes.len() % 4 != 0 {
            return Err(Sm4Error::MisalignedTokens { len: bytes.len() });
        }
        let tokens: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::from_tokens(tokens)
    }

    /// Wraps an already tokenized program, validating the version and length
    /// header.
    pub fn from_tokens(tokens: Vec<u32>) -> Result<Self, Sm4Error> {
        if tokens.len() < 2 {
            return Err(Sm4Error::TooShort {
                dwords: tokens.len(),
            });
        }

        let declared_len = tokens[1] as usize;
        if declared_len < 2 || declared_len > tokens.len() {
            return Err(Sm4Error::DeclaredLengthOutOfBounds {
                declared: declared_len,
                available: tokens.len(),
            });
        }

        let (stage, model) = decode_version_token(tokens[0]);
        Ok(Self {
            stage,
            model,
            tokens,
        })
    }

    /// The instruction tokens after the version and length header, clipped to
    /// the declared program length.
    pub fn body(&self) -> &[u32] {
        let len = self.tokens[1] as usize;
        &self.tokens[2..len]
    }
}

pub fn decode_version_token(version: u32) -> (ShaderStage, ShaderModel) {
    // - bits 0..=3: minor version
    // - bits 4..=7: major version
    // - bits 16..=31: program type
    let minor = (version & 0xF) as u8;
    let major = ((version >> 4) & 0xF) as u8;
    let ty = (version >> 16) as u16;

    let stage = match ty {
        0 => ShaderStage::Pixel,
        1 => ShaderStage::Vertex,
        2 => ShaderStage::Geometry,
        3 => ShaderStage::Hull,
        4 => ShaderStage::Domain,
        5 => ShaderStage::Compute,
        other => ShaderStage::Unknown(other),
    };

    (stage, ShaderModel { major, minor })
}

/// Failure to locate or frame the program token stream.
#[derive(Debug, Error)]
pub enum Sm4Error {
    #[error(transparent)]
    Dxbc(#[from] DxbcError),
    #[error("container has neither a SHEX nor a SHDR chunk")]
    MissingShaderChunk,
    #[error("program chunk is {len} bytes, not a whole number of dwords")]
    MisalignedTokens { len: usize },
    #[error("program is {dwords} dwords, too short for the version and length tokens")]
    TooShort { dwords: usize },
    #[error("program declares {declared} dwords but the chunk holds {available}")]
    DeclaredLengthOutOfBounds { declared: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_token_decodes_stage_and_model() {
        let (stage, model) = decode_version_token(0x0005_0050);
        assert_eq!(stage, ShaderStage::Compute);
        assert_eq!(model, ShaderModel { major: 5, minor: 0 });

        let (stage, model) = decode_version_token(0x0000_0041);
        assert_eq!(stage, ShaderStage::Pixel);
        assert_eq!(model, ShaderModel { major: 4, minor: 1 });

        assert_eq!(decode_version_token(0x0009_0050).0, ShaderStage::Unknown(9));
    }

    #[test]
    fn declared_length_must_fit() {
        let err = Sm4Program::from_tokens(vec![0x0001_0050, 8, 0]).unwrap_err();
        assert!(matches!(
            err,
            Sm4Error::DeclaredLengthOutOfBounds {
                declared: 8,
                available: 3
            }
        ));
    }

    #[test]
    fn body_is_clipped_to_declared_length() {
        let program = Sm4Program::from_tokens(vec![0x0001_0050, 3, 0xaa, 0xbb]).unwrap();
        assert_eq!(program.stage, ShaderStage::Vertex);
        assert_eq!(program.body(), &[0xaa]);
    }

    #[test]
    fn misaligned_bytes_are_rejected() {
        let err = Sm4Program::parse_program_tokens(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, Sm4Error::MisalignedTokens { len: 7 }));
    }
}
