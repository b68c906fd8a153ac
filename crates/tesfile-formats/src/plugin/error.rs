//! Error types for plugin file operations

use super::form_id::FormId;
use super::tag::Tag;
use crate::compression::DecompressError;
use crate::source::SourceError;
use thiserror::Error;

/// Plugin operation result type
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors raised while indexing or decoding a plugin file
#[derive(Debug, Error)]
pub enum PluginError {
    /// First four bytes are not the plugin signature
    #[error("Invalid plugin signature {found:?}, expected \"TES4\"")]
    InvalidFormat {
        /// Bytes found at offset 0
        found: Vec<u8>,
    },

    /// A group header did not carry the group marker
    #[error("Invalid group header at offset {offset}: found tag {found}")]
    InvalidHeader {
        /// Absolute offset of the header
        offset: u64,
        /// Tag found instead of `GRUP`
        found: Tag,
    },

    /// A byte window is too short for the structure decoded from it
    #[error("Truncated input at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        /// Where the window starts: absolute for record and group headers,
        /// a position within the record content for fields
        offset: u64,
        /// Bytes the structure requires
        needed: usize,
        /// Bytes the window holds
        available: usize,
    },

    /// The file ends before a header or payload it declares
    #[error("Truncated file at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedFile {
        /// Absolute offset of the structure
        offset: u64,
        /// Bytes the structure declares
        needed: u64,
        /// Bytes left within the enclosing span
        available: u64,
    },

    /// A field or record walk did not land on its declared boundary
    #[error("Malformed payload in record at offset {offset}: {reason}")]
    MalformedPayload {
        /// Absolute offset of the enclosing record or group
        offset: u64,
        /// What went wrong
        reason: String,
    },

    /// A group marker appeared inside a record's field stream
    #[error("Group marker inside record at offset {offset} (content position {position})")]
    UnexpectedGroup {
        /// Absolute offset of the record
        offset: u64,
        /// Position of the marker within the record content
        position: usize,
    },

    /// Record type tag outside the four uppercase/digit/underscore convention
    #[error("Unrecognized record type {tag} at offset {offset}")]
    UnknownRecordType {
        /// Absolute offset of the record
        offset: u64,
        /// Tag found
        tag: Tag,
    },

    /// Inflated payload length disagrees with the declared size
    #[error(
        "Decompression mismatch in record at offset {offset}: declared {expected} bytes, got {actual}"
    )]
    DecompressionMismatch {
        /// Absolute offset of the record
        offset: u64,
        /// Size declared in the compressed payload prefix
        expected: usize,
        /// Size produced by inflate
        actual: usize,
    },

    /// Compressed payload could not be inflated
    #[error("Decompression failed in record at offset {offset}: {source}")]
    Decompression {
        /// Absolute offset of the record
        offset: u64,
        /// Underlying failure
        #[source]
        source: DecompressError,
    },

    /// No record matches the requested key
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Record content was requested before it was loaded
    #[error("Content of record {form_id} has not been loaded")]
    NotLoaded {
        /// Identifier of the record
        form_id: FormId,
    },

    /// Type tag text is not four bytes long
    #[error("Invalid type tag: {0:?}")]
    InvalidTag(String),

    /// FormID text or bytes could not be parsed
    #[error("Invalid FormID: {0}")]
    InvalidFormId(String),

    /// Binary read error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// Whether the error reports a missing key rather than a broken file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error indicates damaged or inconsistent file data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader { .. }
                | Self::TruncatedFile { .. }
                | Self::MalformedPayload { .. }
                | Self::UnexpectedGroup { .. }
                | Self::DecompressionMismatch { .. }
                | Self::Decompression { .. }
        )
    }
}

impl From<SourceError> for PluginError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Truncated {
                offset,
                needed,
                available,
            } => Self::TruncatedFile {
                offset,
                needed,
                available,
            },
            SourceError::UnterminatedString { offset } => Self::MalformedPayload {
                offset,
                reason: "unterminated string".to_string(),
            },
            SourceError::BinRead(e) => Self::BinRead(e),
            SourceError::Io(e) => Self::Io(e),
        }
    }
}
