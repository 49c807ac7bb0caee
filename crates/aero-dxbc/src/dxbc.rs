use core::fmt;

use crate::error::DxbcError;
use crate::fourcc::FourCC;
use crate::signature::{parse_signature_chunk_for_fourcc, SignatureChunk};

const MAGIC: FourCC = FourCC(*b"DXBC");
const SHEX: FourCC = FourCC(*b"SHEX");
const SHDR: FourCC = FourCC(*b"SHDR");

// magic, 16-byte checksum, reserved dword, total size, chunk count
const HEADER_LEN: usize = 32;
const CHUNK_HEADER_LEN: usize = 8;
const MAX_CHUNKS: u32 = 4096;

/// The fixed header of a `DXBC` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxbcHeader {
    /// Always `DXBC` once parsed.
    pub magic: FourCC,
    /// Stored checksum. Not verified.
    pub checksum: [u8; 16],
    /// Container size in bytes, as declared by the header.
    pub total_size: u32,
    /// Number of entries in the chunk offset table.
    pub chunk_count: u32,
}

/// One chunk of a container: its FourCC and payload.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DxbcChunk<'a> {
    /// Chunk id, e.g. `SHEX` or `ISGN`.
    pub fourcc: FourCC,
    /// Payload bytes, without the 8-byte chunk header.
    pub data: &'a [u8],
}

impl fmt::Debug for DxbcChunk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DxbcChunk({}, {} bytes)", self.fourcc, self.data.len())
    }
}

/// A validated `DXBC` container borrowing its input buffer.
///
/// Every chunk range is checked against the declared container size during
/// [`DxbcFile::parse`].
#[derive(Debug, Clone)]
pub struct DxbcFile<'a> {
    header: DxbcHeader,
    chunks: Vec<DxbcChunk<'a>>,
}

/// Little-endian reads over an untrusted buffer.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn slice(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        self.bytes.get(offset..offset.checked_add(len)?)
    }

    fn fourcc(&self, offset: usize) -> Option<FourCC> {
        let raw = self.slice(offset, 4)?;
        Some(FourCC([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn u32(&self, offset: usize) -> Option<u32> {
        self.fourcc(offset).map(|FourCC(raw)| u32::from_le_bytes(raw))
    }
}

impl<'a> DxbcFile<'a> {
    /// Parses and validates the container header and chunk table.
    pub fn parse(bytes: &'a [u8]) -> Result<DxbcFile<'a>, DxbcError> {
        let input = Reader { bytes };
        let truncated =
            || DxbcError::malformed_header(format!("{} bytes is shorter than the header", bytes.len()));

        let magic = input.fourcc(0).ok_or_else(truncated)?;
        if magic != MAGIC {
            return Err(DxbcError::malformed_header(format!("magic is {magic}, not {MAGIC}")));
        }
        let mut checksum = [0u8; 16];
        checksum.copy_from_slice(input.slice(4, 16).ok_or_else(truncated)?);
        let total_size = input.u32(24).ok_or_else(truncated)?;
        let chunk_count = input.u32(28).ok_or_else(truncated)?;

        let size = total_size as usize;
        if size < HEADER_LEN {
            return Err(DxbcError::malformed_header(format!(
                "declared size {total_size} cannot hold the {HEADER_LEN}-byte header"
            )));
        }
        if size > bytes.len() {
            return Err(DxbcError::out_of_bounds(format!(
                "declared size {total_size} but only {} bytes given",
                bytes.len()
            )));
        }
        if chunk_count > MAX_CHUNKS {
            return Err(DxbcError::malformed_offsets(format!(
                "{chunk_count} chunks (limit {MAX_CHUNKS})"
            )));
        }

        let container = Reader {
            bytes: &bytes[..size],
        };
        let first_payload = HEADER_LEN + 4 * chunk_count as usize;
        if first_payload > size {
            return Err(DxbcError::malformed_offsets(format!(
                "offset table of {chunk_count} entries overruns the {size}-byte container"
            )));
        }

        let chunks = (0..chunk_count as usize)
            .map(|i| {
                let offset = container
                    .u32(HEADER_LEN + 4 * i)
                    .ok_or_else(|| DxbcError::malformed_offsets(format!("offset {i} unreadable")))?;
                read_chunk(&container, i, offset as usize, first_payload)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DxbcFile {
            header: DxbcHeader {
                magic,
                checksum,
                total_size,
                chunk_count,
            },
            chunks,
        })
    }

    /// The container header.
    pub fn header(&self) -> &DxbcHeader {
        &self.header
    }

    /// All chunks, in offset-table order.
    pub fn chunks(&self) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        self.chunks.iter().copied()
    }

    /// First chunk with id `fourcc`.
    pub fn get_chunk(&self, fourcc: FourCC) -> Option<DxbcChunk<'a>> {
        self.chunks().find(|chunk| chunk.fourcc == fourcc)
    }

    /// The program chunk: `SHEX` when present, otherwise `SHDR`.
    pub fn shader_chunk(&self) -> Option<DxbcChunk<'a>> {
        self.get_chunk(SHEX).or_else(|| self.get_chunk(SHDR))
    }

    /// Parses the signature chunk `kind`, falling back to its `*SG1`/`*SGN`
    /// counterpart when `kind` is absent or unparsable.
    ///
    /// `None` means neither spelling is present. When both fail, the error of
    /// `kind` wins.
    pub fn get_signature(&self, kind: FourCC) -> Option<Result<SignatureChunk, DxbcError>> {
        let exact = self.parse_signature(kind);
        if let Some(Ok(_)) = exact {
            return exact;
        }
        let fallback = kind.signature_variant().and_then(|alt| self.parse_signature(alt));
        match (exact, fallback) {
            (_, Some(Ok(sig))) => Some(Ok(sig)),
            (Some(err), _) => Some(err),
            (None, fallback) => fallback,
        }
    }

    fn parse_signature(&self, kind: FourCC) -> Option<Result<SignatureChunk, DxbcError>> {
        let mut failure = None;
        for chunk in self.chunks().filter(|chunk| chunk.fourcc == kind) {
            match parse_signature_chunk_for_fourcc(kind, chunk.data) {
                Ok(sig) => return Some(Ok(sig)),
                Err(err) if failure.is_none() => {
                    failure = Some(DxbcError::invalid_chunk(format!("{kind}: {}", err.context())));
                }
                Err(_) => {}
            }
        }
        failure.map(Err)
    }
}

fn read_chunk<'a>(
    container: &Reader<'a>,
    index: usize,
    offset: usize,
    first_payload: usize,
) -> Result<DxbcChunk<'a>, DxbcError> {
    if offset < first_payload {
        return Err(DxbcError::malformed_offsets(format!(
            "chunk {index} at {offset} overlaps the header and offset table (< {first_payload})"
        )));
    }
    let header_err =
        || DxbcError::out_of_bounds(format!("chunk {index} header at {offset} is truncated"));
    let fourcc = container.fourcc(offset).ok_or_else(header_err)?;
    let len = container.u32(offset + 4).ok_or_else(header_err)? as usize;
    let start = offset + CHUNK_HEADER_LEN;
    let data = container.slice(start, len).ok_or_else(|| {
        DxbcError::out_of_bounds(format!(
            "chunk {index} ({fourcc}) payload {start}+{len} runs past byte {}",
            container.bytes.len()
        ))
    })?;
    Ok(DxbcChunk { fourcc, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::build_container;

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = build_container(&[]);
        bytes[0] = b'X';
        let err = DxbcFile::parse(&bytes).unwrap_err();
        assert!(matches!(err, DxbcError::MalformedHeader { .. }));
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = build_container(&[]);
        let err = DxbcFile::parse(&bytes[..20]).unwrap_err();
        assert!(matches!(err, DxbcError::MalformedHeader { .. }), "{err}");
    }

    #[test]
    fn rejects_chunk_past_total_size() {
        let mut bytes = build_container(&[(FourCC(*b"SHEX"), &[0u8; 8])]);
        let size_pos = HEADER_LEN + 4 + 4;
        bytes[size_pos..size_pos + 4].copy_from_slice(&64u32.to_le_bytes());
        let err = DxbcFile::parse(&bytes).unwrap_err();
        assert!(matches!(err, DxbcError::OutOfBounds { .. }), "{err}");
    }

    #[test]
    fn rejects_chunk_offset_into_header() {
        let mut bytes = build_container(&[(FourCC(*b"SHEX"), &[0u8; 4])]);
        bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&4u32.to_le_bytes());
        let err = DxbcFile::parse(&bytes).unwrap_err();
        assert!(matches!(err, DxbcError::MalformedOffsets { .. }));
    }

    #[test]
    fn shader_chunk_prefers_shex() {
        let bytes = build_container(&[
            (FourCC(*b"SHDR"), &[1, 2, 3, 4]),
            (FourCC(*b"ISGN"), &[0u8; 8]),
            (FourCC(*b"SHEX"), &[5, 6, 7, 8]),
        ]);
        let file = DxbcFile::parse(&bytes).unwrap();
        assert_eq!(file.header().chunk_count, 3);
        let shader = file.shader_chunk().unwrap();
        assert_eq!(shader.fourcc, FourCC(*b"SHEX"));
        assert_eq!(shader.data, &[5, 6, 7, 8]);
    }

    #[test]
    fn falls_back_to_shdr() {
        let bytes = build_container(&[(FourCC(*b"SHDR"), &[1, 2, 3, 4])]);
        let file = DxbcFile::parse(&bytes).unwrap();
        assert_eq!(file.shader_chunk().unwrap().fourcc, FourCC(*b"SHDR"));
        assert!(file.get_chunk(FourCC(*b"RDEF")).is_none());
    }
}
