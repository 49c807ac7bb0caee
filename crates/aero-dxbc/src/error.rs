use thiserror::Error;

/// Errors produced while parsing a `DXBC` container or one of its chunks.
///
/// Every variant carries a human-readable context string describing which
/// field or range was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DxbcError {
    /// The fixed container header is truncated or has a bad magic/size.
    #[error("malformed DXBC header: {context}")]
    MalformedHeader {
        /// Details about the rejected field.
        context: String,
    },
    /// The chunk offset table is inconsistent with the container layout.
    #[error("malformed DXBC chunk offsets: {context}")]
    MalformedOffsets {
        /// Details about the rejected offset.
        context: String,
    },
    /// A range referenced by the container lies outside the input buffer.
    #[error("DXBC data out of bounds: {context}")]
    OutOfBounds {
        /// Details about the rejected range.
        context: String,
    },
    /// A chunk payload could not be parsed.
    #[error("invalid DXBC chunk: {context}")]
    InvalidChunk {
        /// Details about the rejected chunk field.
        context: String,
    },
}

impl DxbcError {
    pub(crate) fn malformed_header(context: impl Into<String>) -> Self {
        Self::MalformedHeader {
            context: context.into(),
        }
    }

    pub(crate) fn malformed_offsets(context: impl Into<String>) -> Self {
        Self::MalformedOffsets {
            context: context.into(),
        }
    }

    pub(crate) fn out_of_bounds(context: impl Into<String>) -> Self {
        Self::OutOfBounds {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_chunk(context: impl Into<String>) -> Self {
        Self::InvalidChunk {
            context: context.into(),
        }
    }

    /// Returns the context string without the variant prefix.
    pub fn context(&self) -> &str {
        match self {
            Self::MalformedHeader { context }
            | Self::MalformedOffsets { context }
            | Self::OutOfBounds { context }
            | Self::InvalidChunk { context } => context,
        }
    }
}
