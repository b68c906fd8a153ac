//! Localized string tables (`.strings`, `.dlstrings`, `.ilstrings`)
//!
//! Localized plugins store text fields as ids into string tables that ship
//! inside archives. A table starts with an entry count and the data block
//! size, then a directory of `(id, offset)` pairs, then the data block.
//! `.strings` entries are NUL-terminated; `.dlstrings` and `.ilstrings`
//! entries carry a u32 length (terminator included) first.

use crate::plugin::LocalizedText;
use binrw::BinRead;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// String table result type
pub type StringsResult<T> = Result<T, StringsError>;

/// Errors raised while decoding a string table
#[derive(Debug, Error)]
pub enum StringsError {
    /// Table data ends before a structure it declares
    #[error("Truncated string table at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Offset within the table
        offset: u64,
        /// Bytes the structure requires
        needed: u64,
        /// Bytes left
        available: u64,
    },

    /// No entry with this id
    #[error("String id {0:#x} not found")]
    NotFound(u32),

    /// File name does not end in a string table extension
    #[error("Not a string table file name: {0:?}")]
    UnknownKind(String),

    /// Binary read error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),
}

/// Entry encoding, selected by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringTableKind {
    /// `.strings`: NUL-terminated entries
    Strings,
    /// `.dlstrings`: length-prefixed entries (book text, descriptions)
    DlStrings,
    /// `.ilstrings`: length-prefixed entries (dialogue)
    IlStrings,
}

impl StringTableKind {
    /// Kind for a file name such as `skyrim_english.dlstrings`
    pub fn from_file_name(name: &str) -> StringsResult<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.rsplit_once('.').map(|(_, ext)| ext) {
            Some("strings") => Ok(Self::Strings),
            Some("dlstrings") => Ok(Self::DlStrings),
            Some("ilstrings") => Ok(Self::IlStrings),
            _ => Err(StringsError::UnknownKind(name.to_string())),
        }
    }

    /// Whether entries carry a length prefix
    pub const fn is_length_prefixed(self) -> bool {
        matches!(self, Self::DlStrings | Self::IlStrings)
    }
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
struct DirectoryEntry {
    id: u32,
    offset: u32,
}

#[derive(BinRead, Debug)]
#[br(little)]
struct TableHeader {
    count: u32,
    data_size: u32,
    #[br(count = count)]
    directory: Vec<DirectoryEntry>,
}

/// Decoded string table
#[derive(Debug, Clone)]
pub struct StringTable {
    kind: StringTableKind,
    offsets: HashMap<u32, u32>,
    data: Vec<u8>,
}

impl StringTable {
    /// Decode a table whose kind follows from `file_name`
    pub fn parse_named(file_name: &str, bytes: &[u8]) -> StringsResult<Self> {
        Self::parse(StringTableKind::from_file_name(file_name)?, bytes)
    }

    /// Decode a table
    pub fn parse(kind: StringTableKind, bytes: &[u8]) -> StringsResult<Self> {
        if bytes.len() < 8 {
            return Err(truncated(0, 8, bytes.len()));
        }
        let count = u64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
        let data_start = 8 + count * 8;
        if data_start > bytes.len() as u64 {
            return Err(truncated(0, data_start, bytes.len()));
        }

        let header = TableHeader::read(&mut Cursor::new(bytes))?;
        let data_end = data_start + u64::from(header.data_size);
        if data_end > bytes.len() as u64 {
            return Err(truncated(
                data_start,
                u64::from(header.data_size),
                bytes.len() - data_start as usize,
            ));
        }

        let offsets = header
            .directory
            .iter()
            .map(|entry| (entry.id, entry.offset))
            .collect();
        debug!(
            "String table ({kind:?}): {} entries, {} data bytes",
            header.count, header.data_size
        );

        Ok(Self {
            kind,
            offsets,
            data: bytes[data_start as usize..data_end as usize].to_vec(),
        })
    }

    /// Entry encoding
    pub const fn kind(&self) -> StringTableKind {
        self.kind
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Whether an id is present
    pub fn contains(&self, id: u32) -> bool {
        self.offsets.contains_key(&id)
    }

    /// All ids, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.offsets.keys().copied()
    }

    /// Text for an id
    pub fn get(&self, id: u32) -> StringsResult<Cow<'_, str>> {
        let offset = *self.offsets.get(&id).ok_or(StringsError::NotFound(id))? as usize;
        let tail = self
            .data
            .get(offset..)
            .filter(|tail| !tail.is_empty())
            .ok_or_else(|| truncated(offset as u64, 1, 0))?;

        let text = if self.kind.is_length_prefixed() {
            let Some((length, rest)) = tail.split_first_chunk::<4>() else {
                return Err(truncated(offset as u64, 4, tail.len()));
            };
            let length = u32::from_le_bytes(*length) as usize;
            rest.get(..length)
                .ok_or_else(|| truncated(offset as u64 + 4, length as u64, rest.len()))?
        } else {
            let end = tail
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| truncated(offset as u64, tail.len() as u64 + 1, tail.len()))?;
            &tail[..end]
        };

        let text = text.strip_suffix(&[0]).unwrap_or(text);
        Ok(String::from_utf8_lossy(text))
    }

    /// Text for a field value, inline or looked up
    pub fn resolve<'a>(&'a self, text: &'a LocalizedText) -> StringsResult<Cow<'a, str>> {
        match text {
            LocalizedText::Inline(inline) => Ok(Cow::Borrowed(inline.as_str())),
            LocalizedText::Id(id) => self.get(*id),
        }
    }
}

fn truncated(offset: u64, needed: u64, available: usize) -> StringsError {
    StringsError::Truncated {
        offset,
        needed,
        available: available as u64,
    }
}
