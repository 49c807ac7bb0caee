//! Parsers for DXBC signature chunks (`ISGN`, `OSGN`, `PCSG`, ...).
//!
//! A signature chunk lists the interface registers of one side of a shader
//! stage together with their semantic and system-value tags.
//!
//! Two entry layouts exist:
//! - v0 (24 bytes): the mask, read/write mask and stream are packed into the
//!   last dword.
//! - v1 (32 bytes, `*SG1`): the stream and min-precision get dwords of their own.

use crate::fourcc::FourCC;
use crate::DxbcError;

const SIGNATURE_HEADER_LEN: usize = 8;
const SIGNATURE_ENTRY_LEN_V0: usize = 24;
const SIGNATURE_ENTRY_LEN_V1: usize = 32;

/// A parsed DXBC signature chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureChunk {
    /// Parsed signature entries, in chunk order.
    pub entries: Vec<SignatureEntry>,
}

/// A single entry in a DXBC signature chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// The semantic name (e.g. `"POSITION"` or `"TEXCOORD"`).
    pub semantic_name: String,
    /// The semantic index (e.g. `0` for `TEXCOORD0`).
    pub semantic_index: u32,
    /// Register index assigned by the compiler.
    pub register: u32,
    /// System value type (`D3D_NAME`) stored as a raw `u32`.
    pub system_value_type: u32,
    /// Register component type (`D3D_REGISTER_COMPONENT_TYPE`) stored as a raw `u32`.
    pub component_type: u32,
    /// Component presence mask.
    pub mask: u8,
    /// Read/write mask.
    pub read_write_mask: u8,
    /// Output stream index (geometry shaders).
    pub stream: u32,
}

/// Parses a DXBC signature chunk payload.
///
/// The entry layout is detected heuristically; use
/// [`crate::DxbcFile::get_signature`] when the chunk id is known.
pub fn parse_signature_chunk(bytes: &[u8]) -> Result<SignatureChunk, DxbcError> {
    parse_signature(None, bytes)
}

pub(crate) fn parse_signature_chunk_for_fourcc(
    fourcc: FourCC,
    bytes: &[u8],
) -> Result<SignatureChunk, DxbcError> {
    parse_signature(Some(fourcc), bytes)
}

fn parse_signature(fourcc: Option<FourCC>, bytes: &[u8]) -> Result<SignatureChunk, DxbcError> {
    if bytes.len() < SIGNATURE_HEADER_LEN {
        return Err(DxbcError::invalid_chunk(format!(
            "signature chunk is truncated: need {SIGNATURE_HEADER_LEN} bytes for header, got {}",
            bytes.len()
        )));
    }
    let count = read_u32(bytes, 0, "param_count")? as usize;
    let table_offset = read_u32(bytes, 4, "param_offset")? as usize;

    if count == 0 {
        return Ok(SignatureChunk::default());
    }
    if table_offset < SIGNATURE_HEADER_LEN || table_offset % 4 != 0 {
        return Err(DxbcError::invalid_chunk(format!(
            "param_offset {table_offset} is misaligned or points into the signature header"
        )));
    }

    let prefer_v1 = match fourcc {
        Some(f) => f.is_v1_signature(),
        None => looks_like_v1(bytes, table_offset),
    };
    let (first, second) = if prefer_v1 {
        (SIGNATURE_ENTRY_LEN_V1, SIGNATURE_ENTRY_LEN_V0)
    } else {
        (SIGNATURE_ENTRY_LEN_V0, SIGNATURE_ENTRY_LEN_V1)
    };

    parse_entries(bytes, count, table_offset, first).or_else(|first_err| {
        parse_entries(bytes, count, table_offset, second).map_err(|second_err| {
            DxbcError::invalid_chunk(format!(
                "failed to parse signature entries ({first}-byte layout: {}; {second}-byte layout: {})",
                first_err.context(),
                second_err.context()
            ))
        })
    })
}

fn parse_entries(
    bytes: &[u8],
    count: usize,
    table_offset: usize,
    entry_len: usize,
) -> Result<SignatureChunk, DxbcError> {
    let table_end = count
        .checked_mul(entry_len)
        .and_then(|len| len.checked_add(table_offset))
        .ok_or_else(|| DxbcError::invalid_chunk("signature table size overflows"))?;
    if table_end > bytes.len() {
        return Err(DxbcError::invalid_chunk(format!(
            "signature table at {table_offset}..{table_end} is outside chunk length {}",
            bytes.len()
        )));
    }

    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        let at = table_offset + index * entry_len;
        let field = |offset: usize, what: &'static str| {
            read_u32(bytes, at + offset, what)
                .map_err(|e| DxbcError::invalid_chunk(format!("entry {index}: {}", e.context())))
        };

        let name_offset = field(0, "semantic_name_offset")? as usize;
        if name_offset < SIGNATURE_HEADER_LEN || (table_offset..table_end).contains(&name_offset) {
            return Err(DxbcError::invalid_chunk(format!(
                "entry {index} semantic_name_offset {name_offset} points into signature table ({table_offset}..{table_end}) or header"
            )));
        }

        let packed = field(20, "mask")?;
        let stream = if entry_len == SIGNATURE_ENTRY_LEN_V1 {
            field(24, "stream")?
        } else {
            (packed >> 16) & 0xff
        };

        entries.push(SignatureEntry {
            semantic_name: read_cstring(bytes, name_offset)
                .map_err(|e| DxbcError::invalid_chunk(format!("entry {index}: {}", e.context())))?
                .to_owned(),
            semantic_index: field(4, "semantic_index")?,
            system_value_type: field(8, "system_value_type")?,
            component_type: field(12, "component_type")?,
            register: field(16, "register")?,
            mask: (packed & 0xff) as u8,
            read_write_mask: ((packed >> 8) & 0xff) as u8,
            stream,
        });
    }

    Ok(SignatureChunk { entries })
}

/// In the 32-byte layout the first entry's stream/min-precision dwords are
/// small integers, whereas the same offsets in the 24-byte layout usually land
/// in the ASCII string table.
fn looks_like_v1(bytes: &[u8], table_offset: usize) -> bool {
    let stream = read_u32(bytes, table_offset + 24, "stream");
    let min_precision = read_u32(bytes, table_offset + 28, "min_precision");
    matches!((stream, min_precision), (Ok(s), Ok(p)) if s <= 3 && p <= 8)
}

fn read_u32(bytes: &[u8], offset: usize, what: &str) -> Result<u32, DxbcError> {
    offset
        .checked_add(4)
        .and_then(|end| bytes.get(offset..end))
        .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
        .ok_or_else(|| {
            DxbcError::invalid_chunk(format!(
                "need 4 bytes for {what} at {offset}, but chunk length is {}",
                bytes.len()
            ))
        })
}

fn read_cstring(bytes: &[u8], offset: usize) -> Result<&str, DxbcError> {
    let tail = bytes.get(offset..).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "semantic_name offset {offset} is outside chunk length {}",
            bytes.len()
        ))
    })?;
    let nul = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "semantic_name at offset {offset} is missing a null terminator"
        ))
    })?;
    core::str::from_utf8(&tail[..nul]).map_err(|_| {
        DxbcError::invalid_chunk(format!(
            "semantic_name at offset {offset} is not valid UTF-8"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{build_signature_chunk, build_signature_chunk_v1, SignatureEntryDesc};
    use pretty_assertions::assert_eq;

    fn entries() -> Vec<SignatureEntryDesc<'static>> {
        vec![
            SignatureEntryDesc {
                semantic_name: "SV_Position",
                semantic_index: 0,
                system_value_type: 1,
                component_type: 3,
                register: 0,
                mask: 0xf,
                read_write_mask: 0xf,
                stream: 0,
            },
            SignatureEntryDesc {
                semantic_name: "SV_ClipDistance",
                semantic_index: 0,
                system_value_type: 2,
                component_type: 3,
                register: 1,
                mask: 0x3,
                read_write_mask: 0x3,
                stream: 0,
            },
        ]
    }

    #[test]
    fn v0_and_v1_layouts_parse_to_the_same_entries() {
        let v0 = parse_signature_chunk(&build_signature_chunk(&entries())).unwrap();
        let v1 =
            parse_signature_chunk_for_fourcc(FourCC(*b"OSG1"), &build_signature_chunk_v1(&entries()))
                .unwrap();
        assert_eq!(v0, v1);
        assert_eq!(v0.entries[1].semantic_name, "SV_ClipDistance");
        assert_eq!(v0.entries[1].system_value_type, 2);
        assert_eq!(v0.entries[1].mask, 0x3);
    }

    #[test]
    fn v1_layout_is_detected_without_fourcc() {
        let sig = parse_signature_chunk(&build_signature_chunk_v1(&entries())).unwrap();
        assert_eq!(sig.entries.len(), 2);
        assert_eq!(sig.entries[0].register, 0);
        assert_eq!(sig.entries[1].register, 1);
    }
}
