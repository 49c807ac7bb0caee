use aero_dxbc::{parse_signature_chunk, DxbcError, DxbcFile, FourCC};

fn build_signature_chunk() -> Vec<u8> {
    // Header: param_count, param_offset. Entries are 24 bytes:
    // name_offset, semantic_index, system_value_type, component_type, register,
    // then mask/rw_mask/stream/min_precision packed into one dword.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&8u32.to_le_bytes());

    let strings = 8 + 2 * 24;
    let pos_name = strings as u32;
    let tex_name = pos_name + "SV_Position\0".len() as u32;

    // SV_Position (register 0, xyzw)
    for v in [pos_name, 0, 1, 3, 0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(&[0xf, 0xf, 0, 0]);

    // TEXCOORD3 (register 1, xy, uint)
    for v in [tex_name, 3, 0, 1, 1] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(&[0x3, 0x1, 0, 0]);

    bytes.extend_from_slice(b"SV_Position\0");
    bytes.extend_from_slice(b"TEXCOORD\0");
    bytes
}

fn build_dxbc(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    let header_len = 32 + chunks.len() * 4;
    let total: usize = header_len + chunks.iter().map(|(_, d)| 8 + d.len()).sum::<usize>();

    let mut bytes = Vec::with_capacity(total);
    bytes.extend_from_slice(b"DXBC");
    bytes.extend_from_slice(&[0u8; 16]);
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&(total as u32).to_le_bytes());
    bytes.extend_from_slice(&(chunks.len() as u32).to_le_bytes());
    let mut cursor = header_len;
    for (_, data) in chunks {
        bytes.extend_from_slice(&(cursor as u32).to_le_bytes());
        cursor += 8 + data.len();
    }
    for (fourcc, data) in chunks {
        bytes.extend_from_slice(&fourcc.0);
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
    }
    bytes
}

#[test]
fn parse_signature_chunk_two_entries() {
    let sig = parse_signature_chunk(&build_signature_chunk()).expect("signature should parse");
    assert_eq!(sig.entries.len(), 2);

    let pos = &sig.entries[0];
    assert_eq!(pos.semantic_name, "SV_Position");
    assert_eq!(pos.system_value_type, 1);
    assert_eq!(pos.component_type, 3);
    assert_eq!(pos.mask, 0xf);

    let tex = &sig.entries[1];
    assert_eq!(tex.semantic_name, "TEXCOORD");
    assert_eq!(tex.semantic_index, 3);
    assert_eq!(tex.register, 1);
    assert_eq!(tex.component_type, 1);
    assert_eq!(tex.mask, 0x3);
    assert_eq!(tex.read_write_mask, 0x1);
}

#[test]
fn parse_signature_chunk_empty_is_ok() {
    let sig = parse_signature_chunk(&[0u8; 8]).expect("empty signature should parse");
    assert!(sig.entries.is_empty());
}

#[test]
fn get_signature_accepts_both_spellings() {
    let sig_bytes = build_signature_chunk();
    for (stored, requested) in [(b"ISGN", b"ISGN"), (b"ISG1", b"ISGN"), (b"ISGN", b"ISG1")] {
        let dxbc_bytes = build_dxbc(&[(FourCC(*stored), &sig_bytes)]);
        let dxbc = DxbcFile::parse(&dxbc_bytes).expect("DXBC should parse");
        let sig = dxbc
            .get_signature(FourCC(*requested))
            .expect("missing signature chunk")
            .expect("signature should parse");
        assert_eq!(sig.entries[0].semantic_name, "SV_Position");
    }
}

#[test]
fn get_signature_returns_none_when_absent() {
    let dxbc_bytes = build_dxbc(&[(FourCC(*b"SHEX"), &[0u8; 8])]);
    let dxbc = DxbcFile::parse(&dxbc_bytes).unwrap();
    assert!(dxbc.get_signature(FourCC(*b"OSGN")).is_none());
}

#[test]
fn truncated_table_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&8u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 4]);

    let err = parse_signature_chunk(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::InvalidChunk { .. }));
    assert!(err.context().contains("signature table"));
}

#[test]
fn semantic_name_into_table_is_rejected() {
    let mut bytes = build_signature_chunk();
    bytes[8..12].copy_from_slice(&8u32.to_le_bytes());

    let err = parse_signature_chunk(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::InvalidChunk { .. }));
    assert!(err.context().contains("points into signature table"));
}

#[test]
fn missing_null_terminator_is_rejected() {
    let mut bytes = build_signature_chunk();
    *bytes.last_mut().unwrap() = b'X';

    let err = parse_signature_chunk(&bytes).unwrap_err();
    assert!(err.context().contains("null terminator"));
}
