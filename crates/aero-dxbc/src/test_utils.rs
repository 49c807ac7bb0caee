use crate::FourCC;

/// Builds a minimal `DXBC` container containing the provided chunks.
///
/// The checksum field is left zeroed; the parser does not validate it.
pub fn build_container(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    let header_len = 4 + 16 + 4 + 4 + 4 + 4 * chunks.len();
    let body_len: usize = chunks.iter().map(|(_, data)| 8 + data.len()).sum();
    let total_size = u32::try_from(header_len + body_len).expect("DXBC container too large");

    let mut out = Vec::with_capacity(total_size as usize);
    out.extend_from_slice(b"DXBC");
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&total_size.to_le_bytes());
    out.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let mut offset = header_len as u32;
    for (_, data) in chunks {
        out.extend_from_slice(&offset.to_le_bytes());
        offset += 8 + data.len() as u32;
    }
    for (fourcc, data) in chunks {
        out.extend_from_slice(&fourcc.0);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }

    debug_assert_eq!(out.len(), total_size as usize);
    out
}

/// Description of one signature entry for [`build_signature_chunk`].
#[derive(Debug, Clone, Copy)]
pub struct SignatureEntryDesc<'a> {
    /// Semantic name, written to the chunk's string table.
    pub semantic_name: &'a str,
    /// Semantic index.
    pub semantic_index: u32,
    /// Raw `D3D_NAME` system value.
    pub system_value_type: u32,
    /// Raw `D3D_REGISTER_COMPONENT_TYPE`.
    pub component_type: u32,
    /// Register index.
    pub register: u32,
    /// Component mask.
    pub mask: u8,
    /// Read/write mask.
    pub read_write_mask: u8,
    /// Output stream.
    pub stream: u8,
}

impl<'a> SignatureEntryDesc<'a> {
    /// A float4-style user semantic on `register` with component `mask`.
    pub fn user(semantic_name: &'a str, register: u32, mask: u8) -> Self {
        Self {
            semantic_name,
            semantic_index: 0,
            system_value_type: 0,
            component_type: 3,
            register,
            mask,
            read_write_mask: mask,
            stream: 0,
        }
    }

    /// A system-value semantic with raw `D3D_NAME` tag `system_value_type`.
    pub fn system_value(
        semantic_name: &'a str,
        system_value_type: u32,
        register: u32,
        mask: u8,
    ) -> Self {
        Self {
            system_value_type,
            ..Self::user(semantic_name, register, mask)
        }
    }
}

/// Builds a v0 (24-byte entry, `ISGN`/`OSGN`) signature chunk payload.
pub fn build_signature_chunk(entries: &[SignatureEntryDesc<'_>]) -> Vec<u8> {
    build_signature(entries, false)
}

/// Builds a v1 (32-byte entry, `ISG1`/`OSG1`) signature chunk payload.
pub fn build_signature_chunk_v1(entries: &[SignatureEntryDesc<'_>]) -> Vec<u8> {
    build_signature(entries, true)
}

fn build_signature(entries: &[SignatureEntryDesc<'_>], v1: bool) -> Vec<u8> {
    let entry_len = if v1 { 32 } else { 24 };
    let table_offset = 8usize;
    let strings_offset = table_offset + entry_len * entries.len();

    let mut strings = Vec::new();
    let mut name_offsets = Vec::with_capacity(entries.len());
    for entry in entries {
        name_offsets.push((strings_offset + strings.len()) as u32);
        strings.extend_from_slice(entry.semantic_name.as_bytes());
        strings.push(0);
    }

    let mut out = Vec::with_capacity(strings_offset + strings.len());
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    out.extend_from_slice(&(table_offset as u32).to_le_bytes());
    for (entry, name_offset) in entries.iter().zip(name_offsets) {
        out.extend_from_slice(&name_offset.to_le_bytes());
        out.extend_from_slice(&entry.semantic_index.to_le_bytes());
        out.extend_from_slice(&entry.system_value_type.to_le_bytes());
        out.extend_from_slice(&entry.component_type.to_le_bytes());
        out.extend_from_slice(&entry.register.to_le_bytes());
        if v1 {
            out.extend_from_slice(&[entry.mask, entry.read_write_mask, 0, 0]);
            out.extend_from_slice(&u32::from(entry.stream).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
        } else {
            out.extend_from_slice(&[entry.mask, entry.read_write_mask, entry.stream, 0]);
        }
    }
    out.extend_from_slice(&strings);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DxbcFile;

    #[test]
    fn build_container_roundtrips_through_parser() {
        let shdr = [1u8, 2, 3, 4];
        let bytes = build_container(&[(FourCC(*b"SHDR"), &shdr)]);

        let file = DxbcFile::parse(&bytes).expect("built container should parse");
        assert_eq!(file.header().total_size as usize, bytes.len());
        assert_eq!(file.header().chunk_count, 1);
        assert_eq!(file.get_chunk(FourCC(*b"SHDR")).unwrap().data, &shdr);
    }
}
