//! Plugin file index
//!
//! Opening a plugin walks every header once, front to back, and records
//! where each record lives. Group spans are tracked on an explicit stack of
//! end offsets, so nesting depth is bounded by memory rather than by the
//! call stack. Payloads stay on disk until a caller asks for them, except
//! for the `TES4` header, which is decoded immediately.

use super::error::{PluginError, PluginResult};
use super::form_id::FormId;
use super::group::{GROUP_HEADER_SIZE, Group};
use super::header::PluginHeader;
use super::record::{RECORD_HEADER_SIZE, Record};
use super::tag::Tag;
use crate::config::{ReaderConfig, UnknownRecordPolicy};
use crate::source::ByteSource;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info, warn};

/// Index over one plugin file (ESM, ESP or ESL)
#[derive(Debug)]
pub struct PluginIndex<R = BufReader<File>> {
    source: ByteSource<R>,
    config: ReaderConfig,
    header: PluginHeader,
    records: Vec<Record>,
    by_form_id: HashMap<u32, usize>,
    groups: Vec<Group>,
}

#[derive(Default)]
struct Walk {
    records: Vec<Record>,
    by_form_id: HashMap<u32, usize>,
    groups: Vec<Group>,
}

impl PluginIndex<BufReader<File>> {
    /// Open and index a plugin file with the default configuration
    pub fn open(path: impl AsRef<Path>) -> PluginResult<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    /// Open and index a plugin file
    pub fn open_with_config(path: impl AsRef<Path>, config: ReaderConfig) -> PluginResult<Self> {
        let path = path.as_ref();
        info!("Opening plugin {}", path.display());
        Self::from_source_with_config(ByteSource::open(path)?, config)
    }
}

impl PluginIndex<Cursor<Vec<u8>>> {
    /// Index an in-memory plugin image
    pub fn from_bytes(data: Vec<u8>) -> PluginResult<Self> {
        Self::from_source(ByteSource::from_bytes(data))
    }
}

impl<R: Read + Seek> PluginIndex<R> {
    /// Index a byte source with the default configuration
    pub fn from_source(source: ByteSource<R>) -> PluginResult<Self> {
        Self::from_source_with_config(source, ReaderConfig::default())
    }

    /// Index a byte source
    ///
    /// Fails with [`PluginError::InvalidFormat`] before any further read when
    /// the first four bytes are not `TES4`.
    pub fn from_source_with_config(
        mut source: ByteSource<R>,
        config: ReaderConfig,
    ) -> PluginResult<Self> {
        let signature = source.read_up_to(0, 4)?;
        if signature != Tag::HEADER.as_bytes() {
            return Err(PluginError::InvalidFormat { found: signature });
        }

        let Walk {
            mut records,
            by_form_id,
            groups,
        } = walk(&mut source, &config)?;

        let header_record = records
            .iter_mut()
            .find(|record| record.record_type() == Tag::HEADER)
            .ok_or_else(|| PluginError::NotFound("TES4 header record".to_string()))?;
        header_record.load(&mut source, &config)?;
        let header = PluginHeader::from_record(header_record)?;

        info!(
            "Indexed {} records in {} groups, {} masters",
            records.len(),
            groups.len(),
            header.masters.len()
        );
        if let Some(declared) = header.record_count() {
            let visited = records.len() + groups.len();
            if declared as usize != visited {
                debug!("Header declares {declared} records and groups, walk visited {visited}");
            }
        }

        Ok(Self {
            source,
            config,
            header,
            records,
            by_form_id,
            groups,
        })
    }

    /// Decoded `TES4` header
    pub const fn header(&self) -> &PluginHeader {
        &self.header
    }

    /// Master file names in load order
    pub fn masters(&self) -> &[String] {
        &self.header.masters
    }

    /// Configuration the index was opened with
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were indexed
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record with the given identifier
    ///
    /// Identifiers without a mod index address mod index 0.
    pub fn get(&self, form_id: &FormId) -> PluginResult<&Record> {
        self.position(form_id).map(|idx| &self.records[idx])
    }

    /// Whether a record with the given identifier exists
    pub fn contains_form_id(&self, form_id: &FormId) -> bool {
        self.by_form_id.contains_key(&form_id.value())
    }

    /// All records of one type, in file order
    pub fn records_of_type(&self, record_type: Tag) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|record| record.record_type() == record_type)
            .collect()
    }

    /// Whether at least one record of the type exists
    pub fn contains_type(&self, record_type: Tag) -> bool {
        self.records
            .iter()
            .any(|record| record.record_type() == record_type)
    }

    /// Distinct record types present
    pub fn record_types(&self) -> BTreeSet<Tag> {
        self.records.iter().map(Record::record_type).collect()
    }

    /// All records in file order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Every group header visited by the walk, in file order
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Raw bytes of an arbitrary file range, bypassing the record model
    pub fn read_range(&mut self, range: Range<u64>) -> PluginResult<Vec<u8>> {
        let length = range.end.saturating_sub(range.start);
        let length = usize::try_from(length).map_err(|_| PluginError::TruncatedFile {
            offset: range.start,
            needed: length,
            available: self.source.remaining(range.start),
        })?;
        Ok(self.source.read_at(range.start, length)?)
    }

    /// Read a record's payload from disk and attach it, replacing any earlier value
    pub fn load_content(&mut self, form_id: &FormId) -> PluginResult<&[u8]> {
        let idx = self.position(form_id)?;
        self.records[idx].load(&mut self.source, &self.config)
    }

    /// A record's payload, loading it first when needed
    pub fn record_content(&mut self, form_id: &FormId) -> PluginResult<&[u8]> {
        let idx = self.position(form_id)?;
        if !self.records[idx].is_loaded() {
            self.records[idx].load(&mut self.source, &self.config)?;
        }
        self.records[idx].content()
    }

    /// Return a copy of `record` with its payload read from this file
    ///
    /// The indexed record is left untouched.
    pub fn hydrate(&mut self, record: &Record) -> PluginResult<Record> {
        let content = record.read_content(&mut self.source, &self.config)?;
        record.with_content(content)
    }

    fn position(&self, form_id: &FormId) -> PluginResult<usize> {
        self.by_form_id
            .get(&form_id.value())
            .copied()
            .ok_or_else(|| PluginError::NotFound(format!("FormID {form_id}")))
    }
}

fn walk<R: Read + Seek>(source: &mut ByteSource<R>, config: &ReaderConfig) -> PluginResult<Walk> {
    let file_len = source.len();
    let mut out = Walk::default();
    let mut open_groups: Vec<u64> = Vec::new();
    let mut pos = 0u64;

    loop {
        while open_groups.last() == Some(&pos) {
            open_groups.pop();
        }
        let limit = open_groups.last().copied().unwrap_or(file_len);
        if open_groups.is_empty() && pos == file_len {
            break;
        }

        let available = limit.saturating_sub(pos);
        if available < RECORD_HEADER_SIZE as u64 {
            return Err(PluginError::TruncatedFile {
                offset: pos,
                needed: RECORD_HEADER_SIZE as u64,
                available,
            });
        }
        let bytes = source.read_at(pos, RECORD_HEADER_SIZE)?;

        if bytes.starts_with(Tag::GROUP.as_bytes()) {
            let group = Group::from_header_bytes(&bytes, pos)?;
            if u64::from(group.group_size()) > available {
                return Err(PluginError::TruncatedFile {
                    offset: pos,
                    needed: u64::from(group.group_size()),
                    available,
                });
            }
            debug!(
                "Group {:?} type {} at {} spans {} bytes",
                group.label(),
                group.group_type(),
                pos,
                group.group_size()
            );
            open_groups.push(group.end());
            out.groups.push(group);
            pos += GROUP_HEADER_SIZE as u64;
            continue;
        }

        let record = Record::from_header_bytes(&bytes, pos)?;
        if record.total_size() > available {
            return Err(PluginError::TruncatedFile {
                offset: pos,
                needed: record.total_size(),
                available,
            });
        }
        pos += record.total_size();

        let record_type = record.record_type();
        if !record_type.is_conventional() {
            match config.unknown_record_policy {
                UnknownRecordPolicy::Skip => {
                    warn!(
                        "Skipping record with unrecognized type {record_type} at offset {}",
                        record.offset()
                    );
                    continue;
                }
                UnknownRecordPolicy::Abort => {
                    return Err(PluginError::UnknownRecordType {
                        offset: record.offset(),
                        tag: record_type,
                    });
                }
            }
        }

        let key = record.form_id().value();
        if let Some(&existing) = out.by_form_id.get(&key) {
            warn!(
                "Duplicate FormID {} at offset {} replaces record at offset {}",
                record.form_id(),
                record.offset(),
                out.records[existing].offset()
            );
            out.records[existing] = record;
        } else {
            out.by_form_id.insert(key, out.records.len());
            out.records.push(record);
        }
    }

    Ok(out)
}
