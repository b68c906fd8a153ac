//! Error types for archive operations

use crate::compression::DecompressError;
use crate::source::SourceError;
use thiserror::Error;

/// Archive operation result type
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised while reading a BSA archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// First four bytes are not `BSA\0`
    #[error("Invalid archive signature {found:?}, expected \"BSA\\0\"")]
    InvalidFormat {
        /// Bytes found at offset 0
        found: Vec<u8>,
    },

    /// Archive version other than 104 or 105
    #[error("Unsupported archive version: {0}")]
    UnsupportedVersion(u32),

    /// The file ends before a structure it declares
    #[error("Truncated archive at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Absolute offset of the read
        offset: u64,
        /// Bytes the structure requires
        needed: u64,
        /// Bytes left in the file
        available: u64,
    },

    /// Directory data contradicts itself
    #[error("Corrupt archive at offset {offset}: {reason}")]
    CorruptArchive {
        /// Absolute offset where the inconsistency was found
        offset: u64,
        /// What went wrong
        reason: String,
    },

    /// Decompressed entry length disagrees with its stored original size
    #[error(
        "Decompression mismatch for entry at offset {offset}: declared {expected} bytes, got {actual}"
    )]
    DecompressionMismatch {
        /// Absolute offset of the entry data
        offset: u64,
        /// Original size stored before the compressed stream
        expected: usize,
        /// Size produced by the decoder
        actual: usize,
    },

    /// Entry data could not be decompressed
    #[error("Decompression failed for entry at offset {offset}: {source}")]
    Decompression {
        /// Absolute offset of the entry data
        offset: u64,
        /// Underlying failure
        #[source]
        source: DecompressError,
    },

    /// No folder or file matches the requested path
    #[error("Not found in archive: {0}")]
    NotFound(String),

    /// Layout or codec the reader does not handle
    #[error("Unsupported archive feature: {0}")]
    Unsupported(String),

    /// Binary read error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Whether the error reports a missing path rather than a broken file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error indicates damaged or inconsistent archive data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::CorruptArchive { .. }
                | Self::DecompressionMismatch { .. }
                | Self::Decompression { .. }
        )
    }
}

impl From<SourceError> for ArchiveError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Truncated {
                offset,
                needed,
                available,
            } => Self::Truncated {
                offset,
                needed,
                available,
            },
            SourceError::UnterminatedString { offset } => Self::CorruptArchive {
                offset,
                reason: "unterminated name string".to_string(),
            },
            SourceError::BinRead(e) => Self::BinRead(e),
            SourceError::Io(e) => Self::Io(e),
        }
    }
}
