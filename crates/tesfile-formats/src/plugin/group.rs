//! Group containers
//!
//! A group brackets a contiguous run of records and nested groups. Its
//! 24-byte header carries the total span (header included) so a walker can
//! skip the whole group without descending into it.

use super::error::{PluginError, PluginResult};
use super::form_id::FormId;
use super::tag::Tag;
use binrw::BinRead;
use std::fmt;
use std::io::Cursor;

/// Size of a group header in bytes
pub const GROUP_HEADER_SIZE: usize = 24;

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct RawGroupHeader {
    tag: Tag,
    group_size: u32,
    label: [u8; 4],
    group_type: u32,
    timestamp: u16,
    version_control: u16,
    _unknown: u32,
}

/// Interpretation of the four label bytes, selected by the group type
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupLabel {
    /// Top-level group: the record type it holds
    RecordType(Tag),
    /// Children or cell groups: the identifier of the parent record
    FormId(FormId),
    /// Label without a defined meaning for this group type
    Undefined([u8; 4]),
}

impl GroupLabel {
    fn decode(group_type: u32, raw: [u8; 4]) -> Self {
        match group_type {
            0 => Self::RecordType(Tag::new(raw)),
            1 | 6..=9 => Self::FormId(FormId::from_u32(u32::from_le_bytes(raw))),
            _ => Self::Undefined(raw),
        }
    }
}

impl fmt::Debug for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordType(tag) => write!(f, "RecordType({tag})"),
            Self::FormId(form_id) => write!(f, "FormId({form_id})"),
            Self::Undefined(raw) => write!(f, "Undefined({raw:02x?})"),
        }
    }
}

/// Decoded group header with its position in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    group_size: u32,
    group_type: u32,
    label: GroupLabel,
    timestamp: u16,
    version_control: u16,
    offset: u64,
}

impl Group {
    /// Decode a group header from exactly 24 bytes located at `offset`
    pub fn from_header_bytes(bytes: &[u8], offset: u64) -> PluginResult<Self> {
        if bytes.len() != GROUP_HEADER_SIZE {
            return Err(PluginError::TruncatedInput {
                offset,
                needed: GROUP_HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let raw = RawGroupHeader::read(&mut Cursor::new(bytes))?;
        if !raw.tag.is_group() {
            return Err(PluginError::InvalidHeader {
                offset,
                found: raw.tag,
            });
        }
        if (raw.group_size as usize) < GROUP_HEADER_SIZE {
            return Err(PluginError::MalformedPayload {
                offset,
                reason: format!(
                    "group size {} is smaller than its own header",
                    raw.group_size
                ),
            });
        }

        Ok(Self {
            group_size: raw.group_size,
            group_type: raw.group_type,
            label: GroupLabel::decode(raw.group_type, raw.label),
            timestamp: raw.timestamp,
            version_control: raw.version_control,
            offset,
        })
    }

    /// Total span in bytes, header included
    pub const fn group_size(&self) -> u32 {
        self.group_size
    }

    /// Group type discriminant
    pub const fn group_type(&self) -> u32 {
        self.group_type
    }

    /// Label interpreted according to the group type
    pub const fn label(&self) -> GroupLabel {
        self.label
    }

    /// Packed edit date
    pub const fn timestamp(&self) -> u16 {
        self.timestamp
    }

    /// Version-control info
    pub const fn version_control(&self) -> u16 {
        self.version_control
    }

    /// Absolute offset of the header
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset of the first child header
    pub const fn content_offset(&self) -> u64 {
        self.offset + GROUP_HEADER_SIZE as u64
    }

    /// Offset one past the last byte of the group
    pub const fn end(&self) -> u64 {
        self.offset + self.group_size as u64
    }

    /// Whether the group holds no children
    pub const fn is_empty(&self) -> bool {
        self.group_size as usize == GROUP_HEADER_SIZE
    }
}
