//! A safe, zero-copy parser for DirectX shader bytecode containers (`DXBC`).
//!
//! Shader blobs handed to the compiler come straight from an application, so
//! every offset and size in the container is treated as untrusted: parsing
//! never panics and never reads outside the declared container size.
//!
//! Besides the container itself this crate parses the D3D10+ signature chunks
//! (`ISGN`/`OSGN`/`PCSG` and their `*SG1` variants) that map shader
//! inputs/outputs to registers.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod dxbc;
mod error;
mod fourcc;
/// Parsers for DXBC signature chunks (`ISGN`, `OSGN`, `PCSG`, ...).
pub mod signature;

/// Helpers for building synthetic DXBC blobs in tests.
///
/// Only available for this crate's own tests or with the `test-utils` feature.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::dxbc::{DxbcChunk, DxbcFile, DxbcHeader};
pub use crate::error::DxbcError;
pub use crate::fourcc::FourCC;
pub use crate::signature::{parse_signature_chunk, SignatureChunk, SignatureEntry};
