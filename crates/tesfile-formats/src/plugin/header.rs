//! The `TES4` plugin header record

use super::error::{PluginError, PluginResult};
use super::record::{Record, RecordFlags};
use super::tag::Tag;
use binrw::BinRead;
use std::io::Cursor;

const HEDR: Tag = Tag::new(*b"HEDR");
const CNAM: Tag = Tag::new(*b"CNAM");
const SNAM: Tag = Tag::new(*b"SNAM");
const MAST: Tag = Tag::new(*b"MAST");

/// `HEDR` payload
#[derive(BinRead, Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct HeaderData {
    /// File format version (1.7 for Skyrim Special Edition)
    pub version: f32,
    /// Number of records and groups in the file
    pub record_count: u32,
    /// Next free object index
    pub next_object_id: u32,
}

/// File-level metadata decoded from the `TES4` record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PluginHeader {
    /// Master file names in load order
    pub masters: Vec<String>,
    /// `HEDR` values, when present
    pub data: Option<HeaderData>,
    /// Author (`CNAM`)
    pub author: Option<String>,
    /// Description (`SNAM`)
    pub description: Option<String>,
    /// Master file flag
    pub is_master: bool,
    /// Strings live in external string tables
    pub is_localized: bool,
}

impl PluginHeader {
    /// Decode from a loaded `TES4` record
    pub fn from_record(record: &Record) -> PluginResult<Self> {
        let mut header = Self {
            is_master: record.is_master(),
            is_localized: record.flags().has(RecordFlags::LOCALIZED),
            ..Self::default()
        };

        for field in record.fields()? {
            let field = field?;
            match field.tag() {
                MAST => header.masters.push(field.as_str_lossy().into_owned()),
                CNAM => header.author = Some(field.as_str_lossy().into_owned()),
                SNAM => header.description = Some(field.as_str_lossy().into_owned()),
                HEDR => {
                    let data = HeaderData::read(&mut Cursor::new(field.payload())).map_err(
                        |e| PluginError::MalformedPayload {
                            offset: record.offset(),
                            reason: format!("HEDR field: {e}"),
                        },
                    )?;
                    header.data = Some(data);
                }
                _ => {}
            }
        }

        Ok(header)
    }

    /// Number of records and groups the file declares, when known
    pub fn record_count(&self) -> Option<u32> {
        self.data.map(|data| data.record_count)
    }
}
