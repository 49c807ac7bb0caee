use core::fmt;

/// A four-character chunk identifier such as `SHEX` or `ISGN`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Returns the `*SGN`/`*SG1` spelling variant of a signature chunk id.
    ///
    /// Toolchains emit either spelling; `PCSG` pairs with `PCG1`.
    pub fn signature_variant(self) -> Option<FourCC> {
        let variant = match &self.0 {
            b"ISGN" => b"ISG1",
            b"OSGN" => b"OSG1",
            b"PSGN" => b"PSG1",
            b"PCSG" => b"PCG1",
            b"ISG1" => b"ISGN",
            b"OSG1" => b"OSGN",
            b"PSG1" => b"PSGN",
            b"PCG1" => b"PCSG",
            _ => return None,
        };
        Some(FourCC(*variant))
    }

    /// Returns `true` for the 32-byte-entry signature spellings (`*SG1`, `PCG1`).
    pub fn is_v1_signature(self) -> bool {
        self.0[3] == b'1'
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}
