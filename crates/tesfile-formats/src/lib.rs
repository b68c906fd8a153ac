#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::float_cmp)]
#![allow(clippy::derive_partial_eq_without_eq)] // Binary format structs
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::return_self_not_must_use)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
//! Read-only parsers for Bethesda game data files
//!
//! Two independent readers share a random-access [`ByteSource`]:
//!
//! - **Plugins** (`.esm`, `.esp`, `.esl`): a flat database of records and
//!   nested groups. [`PluginIndex`] walks every header once at open time and
//!   loads record payloads on request, inflating compressed ones.
//! - **Archives** (`.bsa` versions 104 and 105): a hashed virtual filesystem.
//!   [`ArchiveIndex`] reads the folder and file directories at open time and
//!   extracts entries on request, decompressing zlib or LZ4 data.
//!
//! Localized plugins keep their text in string tables shipped inside
//! archives; [`strings::StringTable`] decodes those.
//!
//! # Design Principles
//!
//! - **Offset-addressed reads**: every read names its absolute offset, and
//!   errors report the offset where a file stopped making sense
//! - **Lazy payloads**: opening never decompresses anything but the plugin
//!   header record
//! - **Explicit lifecycle**: record content is attached by a load step and
//!   reading it earlier is an error, never an empty buffer

#![warn(missing_docs)]

pub mod archive;
pub mod compression;
pub mod config;
pub mod plugin;
pub mod source;
pub mod strings;

pub use archive::{ArchiveError, ArchiveIndex, ArchiveResult};
pub use config::{ReaderConfig, UnknownRecordPolicy};
pub use plugin::{FormId, PluginError, PluginIndex, PluginResult, Record, Tag};
pub use source::{ByteSource, SourceError};
pub use strings::{StringTable, StringTableKind, StringsError};
