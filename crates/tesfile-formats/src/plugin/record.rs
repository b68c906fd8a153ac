//! Records: a fixed 24-byte header followed by a field payload
//!
//! The header is decoded while the file is indexed; the payload is only read
//! (and inflated, when the compressed flag is set) by an explicit load step.
//! Until then every content accessor fails with [`PluginError::NotLoaded`].

use super::error::{PluginError, PluginResult};
use super::field::{Field, Fields};
use super::form_id::FormId;
use super::tag::Tag;
use crate::compression::inflate_zlib;
use crate::config::ReaderConfig;
use crate::source::ByteSource;
use binrw::BinRead;
use std::collections::BTreeSet;
use std::fmt;
use std::io::{Cursor, Read, Seek};
use tracing::debug;

/// Size of a record header in bytes
pub const RECORD_HEADER_SIZE: usize = 24;

/// Record flag word
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecordFlags {
    /// Raw flag value
    pub value: u32,
}

impl RecordFlags {
    /// Record originates from a master file (bit 0)
    pub const MASTER: u32 = 0x0000_0001;

    /// Strings are stored in external string tables (bit 7, plugin header only)
    pub const LOCALIZED: u32 = 0x0000_0080;

    /// Payload is zlib-compressed behind a 4-byte size prefix (bit 18)
    pub const COMPRESSED: u32 = 0x0004_0000;

    /// Create flags from a raw value
    pub const fn new(value: u32) -> Self {
        Self { value }
    }

    /// Check if a flag is set
    pub const fn has(&self, flag: u32) -> bool {
        (self.value & flag) != 0
    }
}

/// Decoded record header
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct RecordHeader {
    /// Four-character record type
    pub record_type: Tag,
    /// Stored payload size, excluding this header
    pub data_size: u32,
    /// Flag word
    pub flags: RecordFlags,
    /// Record identifier
    #[br(map = |raw: u32| FormId::from_u32(raw))]
    pub form_id: FormId,
    /// Packed edit date
    pub timestamp: u16,
    /// Version-control info
    pub version_control: u16,
    /// Internal record version
    pub version: u16,
    /// Unused
    pub unknown: u16,
}

impl RecordHeader {
    /// Decode from exactly 24 bytes located at `offset`
    pub fn parse(bytes: &[u8], offset: u64) -> PluginResult<Self> {
        if bytes.len() != RECORD_HEADER_SIZE {
            return Err(PluginError::TruncatedInput {
                offset,
                needed: RECORD_HEADER_SIZE,
                available: bytes.len(),
            });
        }
        Ok(Self::read(&mut Cursor::new(bytes))?)
    }
}

/// A record header, its position and optionally its loaded content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    header: RecordHeader,
    offset: u64,
    content: Option<Vec<u8>>,
}

impl Record {
    /// Decode a header-only record from 24 bytes located at `offset`
    pub fn from_header_bytes(bytes: &[u8], offset: u64) -> PluginResult<Self> {
        Ok(Self::new(RecordHeader::parse(bytes, offset)?, offset))
    }

    /// Wrap an already decoded header
    pub const fn new(header: RecordHeader, offset: u64) -> Self {
        Self {
            header,
            offset,
            content: None,
        }
    }

    /// Decoded header
    pub const fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Four-character record type
    pub const fn record_type(&self) -> Tag {
        self.header.record_type
    }

    /// Record identifier
    pub const fn form_id(&self) -> FormId {
        self.header.form_id
    }

    /// Absolute offset of the header
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Stored payload size
    pub const fn data_size(&self) -> u32 {
        self.header.data_size
    }

    /// Bytes the record occupies in the file, header included
    pub const fn total_size(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + self.header.data_size as u64
    }

    /// Offset of the first payload byte
    pub const fn payload_offset(&self) -> u64 {
        self.offset + RECORD_HEADER_SIZE as u64
    }

    /// Flag word
    pub const fn flags(&self) -> RecordFlags {
        self.header.flags
    }

    /// Whether the payload is compressed; never true for a group marker
    pub fn is_compressed(&self) -> bool {
        !self.header.record_type.is_group() && self.header.flags.has(RecordFlags::COMPRESSED)
    }

    /// Whether the record comes from a master file
    pub const fn is_master(&self) -> bool {
        self.header.flags.has(RecordFlags::MASTER)
    }

    /// Whether content has been attached
    pub const fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    /// Decompressed payload
    pub fn content(&self) -> PluginResult<&[u8]> {
        self.content
            .as_deref()
            .ok_or(PluginError::NotLoaded {
                form_id: self.header.form_id,
            })
    }

    /// Attach decompressed content, replacing any earlier value
    ///
    /// For uncompressed records the length must equal the header's data size.
    pub fn set_content(&mut self, content: Vec<u8>) -> PluginResult<()> {
        if !self.is_compressed() && content.len() != self.header.data_size as usize {
            return Err(PluginError::MalformedPayload {
                offset: self.offset,
                reason: format!(
                    "content is {} bytes, header declares {}",
                    content.len(),
                    self.header.data_size
                ),
            });
        }
        self.content = Some(content);
        Ok(())
    }

    /// Return a copy of this record carrying `content`
    pub fn with_content(&self, content: Vec<u8>) -> PluginResult<Self> {
        let mut hydrated = Self::new(self.header, self.offset);
        hydrated.set_content(content)?;
        Ok(hydrated)
    }

    /// Drop loaded content
    pub fn clear_content(&mut self) {
        self.content = None;
    }

    /// Read the payload from `source`, inflating it when compressed
    ///
    /// Every call re-reads the bytes; nothing is cached.
    pub fn read_content<R: Read + Seek>(
        &self,
        source: &mut ByteSource<R>,
        config: &ReaderConfig,
    ) -> PluginResult<Vec<u8>> {
        let data_size = self.header.data_size as usize;
        let raw = source.read_at(self.payload_offset(), data_size)?;
        if !self.is_compressed() {
            return Ok(raw);
        }

        let Some((prefix, compressed)) = raw.split_first_chunk::<4>() else {
            return Err(PluginError::MalformedPayload {
                offset: self.offset,
                reason: format!("compressed payload of {data_size} bytes has no size prefix"),
            });
        };
        let expected = u32::from_le_bytes(*prefix) as usize;

        let inflated = inflate_zlib(compressed, expected, config.max_decompressed_size).map_err(
            |source| PluginError::Decompression {
                offset: self.offset,
                source,
            },
        )?;
        if inflated.len() != expected {
            return Err(PluginError::DecompressionMismatch {
                offset: self.offset,
                expected,
                actual: inflated.len(),
            });
        }

        debug!(
            "Inflated {} record {} from {} to {} bytes",
            self.header.record_type,
            self.header.form_id,
            compressed.len(),
            inflated.len()
        );
        Ok(inflated)
    }

    /// Read the payload and attach it, replacing any earlier value
    pub fn load<R: Read + Seek>(
        &mut self,
        source: &mut ByteSource<R>,
        config: &ReaderConfig,
    ) -> PluginResult<&[u8]> {
        let content = self.read_content(source, config)?;
        let content = self.content.insert(content);
        Ok(content.as_slice())
    }

    /// Lazy iterator over the payload's fields
    pub fn fields(&self) -> PluginResult<Fields<'_>> {
        Ok(Fields::new(self.content()?, self.offset))
    }

    /// Payloads of every field tagged `tag`, in document order
    pub fn fields_of_tag(&self, tag: Tag) -> PluginResult<Vec<&[u8]>> {
        let mut matches = Vec::new();
        for field in self.fields()? {
            let field = field?;
            if field.tag() == tag {
                matches.push(field.payload());
            }
        }
        Ok(matches)
    }

    /// First field tagged `tag`
    pub fn first_field(&self, tag: Tag) -> PluginResult<Option<Field<'_>>> {
        for field in self.fields()? {
            let field = field?;
            if field.tag() == tag {
                return Ok(Some(field));
            }
        }
        Ok(None)
    }

    /// Distinct field tags present in the payload
    pub fn field_types(&self) -> PluginResult<BTreeSet<Tag>> {
        self.fields()?
            .map(|field| field.map(|f| f.tag()))
            .collect()
    }

    /// Editor identifier (`EDID`), if present
    pub fn editor_id(&self) -> PluginResult<Option<String>> {
        Ok(self
            .first_field(Tag::new(*b"EDID"))?
            .map(|field| field.as_str_lossy().into_owned()))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} record at offset {}, FormID {}",
            self.header.record_type, self.offset, self.header.form_id
        )
    }
}
