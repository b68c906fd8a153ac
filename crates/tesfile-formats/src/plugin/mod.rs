//! Plugin files (ESM, ESP, ESL)
//!
//! A plugin is a flat run of records and groups, starting with the `TES4`
//! header record. Every record carries a 24-byte header and a payload of
//! tagged fields; groups bracket runs of records and may nest.
//!
//! # Binary Layout
//!
//! ```text
//! Record header (24 bytes, little-endian):
//!   [4B type][4B data size][4B flags][4B FormID][2B timestamp][2B vc][2B version][2B unknown]
//! Group header (24 bytes):
//!   [4B "GRUP"][4B total size incl. header][4B label][4B group type][2B timestamp][2B vc][4B unknown]
//! Field:
//!   [4B tag][2B length][payload]
//! Compressed payload (flag 0x40000):
//!   [4B decompressed size][zlib stream]
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use tesfile_formats::plugin::{FormId, PluginIndex, Tag};
//!
//! let mut plugin = PluginIndex::open("Skyrim.esm")?;
//! println!("masters: {:?}", plugin.masters());
//! println!("{} books", plugin.records_of_type(Tag::new(*b"BOOK")).len());
//!
//! let ysolda: FormId = "0x13bab".parse()?;
//! plugin.load_content(&ysolda)?;
//! println!("{:?}", plugin.get(&ysolda)?.editor_id()?);
//! # Ok::<(), tesfile_formats::plugin::PluginError>(())
//! ```

pub mod error;
pub mod field;
pub mod form_id;
pub mod group;
pub mod header;
pub mod index;
pub mod record;
pub mod record_types;
pub mod tag;

pub use error::{PluginError, PluginResult};
pub use field::{FIELD_HEADER_SIZE, Field, Fields};
pub use form_id::FormId;
pub use group::{GROUP_HEADER_SIZE, Group, GroupLabel};
pub use header::{HeaderData, PluginHeader};
pub use index::PluginIndex;
pub use record::{RECORD_HEADER_SIZE, Record, RecordFlags, RecordHeader};
pub use record_types::{Book, LocalizedText, Npc, RecordKind, RecordView};
pub use tag::Tag;
