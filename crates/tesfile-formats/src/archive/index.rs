//! Archive index and entry extraction
//!
//! Opening an archive reads the header, the folder table, every folder name
//! and the file name block. File records are read on demand: a lookup finds
//! the file's position in its folder's name list and reads the 16-byte record
//! at that slot.

use super::error::{ArchiveError, ArchiveResult};
use super::file::{FILE_RECORD_SIZE, FileRecord};
use super::folder::{Folder, FolderRecord};
use super::header::{
    ARCHIVE_HEADER_SIZE, ARCHIVE_MAGIC, ArchiveFlags, ArchiveHeader, ArchiveVersion,
};
use crate::compression::{decode_lz4_frame, inflate_zlib};
use crate::config::ReaderConfig;
use crate::source::ByteSource;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::ops::Range;
use std::path::Path;
use tesfile_hash::{PathHash, hash_file_bytes, hash_folder_bytes, normalize_path_bytes};
use tracing::{debug, info, warn};

/// Index over one BSA archive
#[derive(Debug)]
pub struct ArchiveIndex<R = BufReader<File>> {
    source: ByteSource<R>,
    config: ReaderConfig,
    header: ArchiveHeader,
    version: ArchiveVersion,
    folders: Vec<Folder>,
    by_hash: HashMap<PathHash, usize>,
}

impl ArchiveIndex<BufReader<File>> {
    /// Open and index an archive with the default configuration
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    /// Open and index an archive
    pub fn open_with_config(path: impl AsRef<Path>, config: ReaderConfig) -> ArchiveResult<Self> {
        let path = path.as_ref();
        info!("Opening archive {}", path.display());
        Self::from_source_with_config(ByteSource::open(path)?, config)
    }
}

impl ArchiveIndex<Cursor<Vec<u8>>> {
    /// Index an in-memory archive image
    pub fn from_bytes(data: Vec<u8>) -> ArchiveResult<Self> {
        Self::from_source(ByteSource::from_bytes(data))
    }
}

impl<R: Read + Seek> ArchiveIndex<R> {
    /// Index a byte source with the default configuration
    pub fn from_source(source: ByteSource<R>) -> ArchiveResult<Self> {
        Self::from_source_with_config(source, ReaderConfig::default())
    }

    /// Index a byte source
    pub fn from_source_with_config(
        mut source: ByteSource<R>,
        config: ReaderConfig,
    ) -> ArchiveResult<Self> {
        let signature = source.read_up_to(0, 4)?;
        if signature != ARCHIVE_MAGIC {
            return Err(ArchiveError::InvalidFormat { found: signature });
        }

        let header: ArchiveHeader = source.decode_le(0, ARCHIVE_HEADER_SIZE, ())?;
        let version = header.archive_version()?;
        if header.archive_flags.has(ArchiveFlags::XBOX) {
            return Err(ArchiveError::Unsupported(
                "big-endian console archive".to_string(),
            ));
        }
        debug!(
            "Archive version {version}, {} folders, {} files, flags {:#x}",
            header.folder_count, header.file_count, header.archive_flags.value
        );

        let mut folders = read_folders(&mut source, &header, version, &config)?;
        let names_offset = folders
            .last()
            .map_or(folder_table_end(&header, version), |folder| {
                folder.records_offset + u64::from(folder.file_count) * FILE_RECORD_SIZE as u64
            });

        let declared: u64 = folders.iter().map(|f| u64::from(f.file_count)).sum();
        if declared != u64::from(header.file_count) {
            return Err(ArchiveError::CorruptArchive {
                offset: u64::from(header.folder_offset),
                reason: format!(
                    "folders list {declared} files, header declares {}",
                    header.file_count
                ),
            });
        }

        if header.archive_flags.has(ArchiveFlags::FILE_NAMES) {
            assign_file_names(&mut source, &header, names_offset, &mut folders)?;
        }

        let mut by_hash = HashMap::with_capacity(folders.len());
        for (idx, folder) in folders.iter().enumerate() {
            if by_hash.insert(folder.hash, idx).is_some() {
                warn!("Duplicate folder hash {}, keeping the later folder", folder.hash);
            }
        }

        info!(
            "Indexed archive version {version}: {} folders, {} files",
            folders.len(),
            header.file_count
        );

        Ok(Self {
            source,
            config,
            header,
            version,
            folders,
            by_hash,
        })
    }

    /// Decoded header
    pub const fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Archive version
    pub const fn version(&self) -> ArchiveVersion {
        self.version
    }

    /// Configuration the index was opened with
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Entries are compressed unless their record toggles it
    pub const fn is_compressed_by_default(&self) -> bool {
        self.header.archive_flags.has(ArchiveFlags::COMPRESSED)
    }

    /// Entry data is prefixed with the entry's full path
    pub const fn has_embedded_file_names(&self) -> bool {
        self.header.archive_flags.has(ArchiveFlags::EMBEDDED_FILE_NAMES)
    }

    /// Folder names are stored
    pub const fn has_directory_names(&self) -> bool {
        self.header.archive_flags.has(ArchiveFlags::DIRECTORY_NAMES)
    }

    /// The file name block is stored
    pub const fn has_file_names(&self) -> bool {
        self.header.archive_flags.has(ArchiveFlags::FILE_NAMES)
    }

    /// All folders in table order
    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.folders.iter()
    }

    /// Folder for a path, ignoring case and separator style
    ///
    /// Paths are matched as bytes, so names outside UTF-8 (Windows code page
    /// text) can be passed as byte slices.
    pub fn folder(&self, path: impl AsRef<[u8]>) -> ArchiveResult<&Folder> {
        self.folder_position(path.as_ref()).map(|idx| &self.folders[idx])
    }

    /// Whether a folder exists
    pub fn contains_folder(&self, path: impl AsRef<[u8]>) -> bool {
        self.folder_position(path.as_ref()).is_ok()
    }

    /// Every file record of one folder, in stored order
    pub fn file_records(
        &mut self,
        folder_path: impl AsRef<[u8]>,
    ) -> ArchiveResult<Vec<FileRecord>> {
        let idx = self.folder_position(folder_path.as_ref())?;
        let (base, count) = {
            let folder = &self.folders[idx];
            (folder.records_offset, folder.file_count)
        };
        (0..u64::from(count))
            .map(|slot| read_file_record(&mut self.source, base + slot * FILE_RECORD_SIZE as u64))
            .collect()
    }

    /// File record for one file of a folder
    ///
    /// Uses the folder's file name list when the archive stores one and
    /// falls back to matching file name hashes otherwise.
    pub fn file_record(
        &mut self,
        folder_path: impl AsRef<[u8]>,
        file_name: impl AsRef<[u8]>,
    ) -> ArchiveResult<FileRecord> {
        let (folder_path, file_name) = (folder_path.as_ref(), file_name.as_ref());
        let idx = self.folder_position(folder_path)?;
        let wanted = hash_file_bytes(file_name);
        let folder = &self.folders[idx];
        let base = folder.records_offset;

        if self.has_file_names() {
            let slot = folder
                .position_of(file_name)
                .ok_or_else(|| not_found(folder_path, file_name))?;
            let record_offset = base + slot as u64 * FILE_RECORD_SIZE as u64;
            let record = read_file_record(&mut self.source, record_offset)?;
            if record.name_hash != wanted {
                return Err(ArchiveError::CorruptArchive {
                    offset: record_offset,
                    reason: format!(
                        "file record hash {:016x} does not match name {:?} ({wanted:016x})",
                        record.name_hash,
                        lossy(file_name)
                    ),
                });
            }
            return Ok(record);
        }

        let count = folder.file_count;
        for slot in 0..u64::from(count) {
            let record = read_file_record(&mut self.source, base + slot * FILE_RECORD_SIZE as u64)?;
            if record.name_hash == wanted {
                return Ok(record);
            }
        }
        Err(not_found(folder_path, file_name))
    }

    /// Extract one file's bytes, decompressing when needed
    pub fn extract(
        &mut self,
        folder_path: impl AsRef<[u8]>,
        file_name: impl AsRef<[u8]>,
    ) -> ArchiveResult<Vec<u8>> {
        let (folder_path, file_name) = (folder_path.as_ref(), file_name.as_ref());
        let record = self.file_record(folder_path, file_name)?;
        debug!(
            "Extracting {}\\{}: {} bytes at {}",
            lossy(folder_path),
            lossy(file_name),
            record.size(),
            record.offset
        );
        self.read_entry(&record)
    }

    /// Extract a file by its full path, e.g. `strings\skyrim_english.dlstrings`
    pub fn extract_path(&mut self, path: impl AsRef<[u8]>) -> ArchiveResult<Vec<u8>> {
        let path = path.as_ref();
        let normalized = normalize_path_bytes(path);
        let split = normalized.iter().rposition(|&b| b == b'\\').ok_or_else(|| {
            ArchiveError::NotFound(format!("{:?} has no folder component", lossy(path)))
        })?;
        self.extract(&normalized[..split], &normalized[split + 1..])
    }

    /// Raw bytes of an arbitrary file range
    pub fn read_range(&mut self, range: Range<u64>) -> ArchiveResult<Vec<u8>> {
        let length = range.end.saturating_sub(range.start);
        let length = usize::try_from(length).map_err(|_| ArchiveError::Truncated {
            offset: range.start,
            needed: length,
            available: self.source.remaining(range.start),
        })?;
        Ok(self.source.read_at(range.start, length)?)
    }

    /// Decode the data an entry points at
    pub fn read_entry(&mut self, record: &FileRecord) -> ArchiveResult<Vec<u8>> {
        let offset = u64::from(record.offset);
        let data = self.source.read_at(offset, record.size() as usize)?;

        let mut body = data.as_slice();
        if self.has_embedded_file_names() {
            body = body
                .split_first()
                .and_then(|(&len, rest)| rest.get(usize::from(len)..))
                .ok_or_else(|| ArchiveError::CorruptArchive {
                    offset,
                    reason: "entry shorter than its embedded name".to_string(),
                })?;
        }

        if !record.is_compressed(self.is_compressed_by_default()) {
            return Ok(body.to_vec());
        }
        if self.header.archive_flags.has(ArchiveFlags::XMEM_CODEC) {
            return Err(ArchiveError::Unsupported(
                "XMem compressed entries".to_string(),
            ));
        }

        let Some((prefix, stream)) = body.split_first_chunk::<4>() else {
            return Err(ArchiveError::CorruptArchive {
                offset,
                reason: "compressed entry has no original size".to_string(),
            });
        };
        let expected = u32::from_le_bytes(*prefix) as usize;
        let limit = self.config.max_decompressed_size;

        let decoded = match self.version {
            ArchiveVersion::V104 => inflate_zlib(stream, expected, limit),
            ArchiveVersion::V105 => decode_lz4_frame(stream, expected, limit),
        }
        .map_err(|source| ArchiveError::Decompression { offset, source })?;

        if decoded.len() != expected {
            return Err(ArchiveError::DecompressionMismatch {
                offset,
                expected,
                actual: decoded.len(),
            });
        }
        Ok(decoded)
    }

    fn folder_position(&self, path: &[u8]) -> ArchiveResult<usize> {
        let hash = PathHash::from_raw(hash_folder_bytes(path));
        self.by_hash
            .get(&hash)
            .copied()
            .ok_or_else(|| ArchiveError::NotFound(format!("folder {:?}", lossy(path))))
    }
}

fn folder_table_end(header: &ArchiveHeader, version: ArchiveVersion) -> u64 {
    u64::from(header.folder_offset)
        + u64::from(header.folder_count) * version.folder_record_size() as u64
}

fn read_folders<R: Read + Seek>(
    source: &mut ByteSource<R>,
    header: &ArchiveHeader,
    version: ArchiveVersion,
    config: &ReaderConfig,
) -> ArchiveResult<Vec<Folder>> {
    let record_size = version.folder_record_size();
    let table = u64::from(header.folder_offset);
    let table_len = u64::from(header.folder_count) * record_size as u64;
    if table_len > source.remaining(table) {
        return Err(ArchiveError::Truncated {
            offset: table,
            needed: table_len,
            available: source.remaining(table),
        });
    }

    let mut records = Vec::with_capacity(header.folder_count as usize);
    for i in 0..u64::from(header.folder_count) {
        let record: FolderRecord =
            source.decode_le(table + i * record_size as u64, record_size, (version,))?;
        records.push(record);
    }

    let has_names = header.archive_flags.has(ArchiveFlags::DIRECTORY_NAMES);
    let mut expected_block = table + table_len;
    let mut folders = Vec::with_capacity(records.len());

    for record in records {
        let name_block = record
            .offset
            .checked_sub(u64::from(header.total_file_name_length))
            .filter(|&block| block == expected_block)
            .ok_or_else(|| ArchiveError::CorruptArchive {
                offset: expected_block,
                reason: format!(
                    "folder {:016x} points at {}, expected its name block at {expected_block}",
                    record.name_hash,
                    record.offset.saturating_sub(u64::from(header.total_file_name_length))
                ),
            })?;

        let (name, records_offset) = if has_names {
            let length = source.read_u8(name_block)?;
            let name = source.read_cstring_bytes(name_block + 1)?;
            if name.len() + 1 != usize::from(length) {
                return Err(ArchiveError::CorruptArchive {
                    offset: name_block,
                    reason: format!(
                        "folder name {:?} does not match its length byte {length}",
                        lossy(&name)
                    ),
                });
            }
            (Some(name), name_block + 1 + u64::from(length))
        } else {
            (None, name_block)
        };

        let hash = PathHash::from_raw(record.name_hash);
        if let Some(name) = &name {
            let computed = PathHash::from_raw(hash_folder_bytes(name));
            if computed != hash {
                if config.verify_folder_hashes {
                    return Err(ArchiveError::CorruptArchive {
                        offset: name_block,
                        reason: format!(
                            "folder {:?} hashes to {computed}, record stores {hash}",
                            lossy(name)
                        ),
                    });
                }
                warn!(
                    "Folder {:?} hashes to {computed}, record stores {hash}",
                    lossy(name)
                );
            }
        }
        debug!(
            "Folder {:?} ({hash}): {} files at {records_offset}",
            name.as_deref().map_or(Cow::Borrowed("<unnamed>"), lossy),
            record.file_count
        );

        expected_block = records_offset + u64::from(record.file_count) * FILE_RECORD_SIZE as u64;
        folders.push(Folder {
            name,
            hash,
            file_count: record.file_count,
            records_offset,
            file_names: Vec::new(),
        });
    }

    Ok(folders)
}

fn assign_file_names<R: Read + Seek>(
    source: &mut ByteSource<R>,
    header: &ArchiveHeader,
    offset: u64,
    folders: &mut [Folder],
) -> ArchiveResult<()> {
    let block = source.read_at(offset, header.total_file_name_length as usize)?;
    let names = split_names(&block, offset)?;
    if names.len() != header.file_count as usize {
        return Err(ArchiveError::CorruptArchive {
            offset,
            reason: format!(
                "file name block holds {} names, header declares {} files",
                names.len(),
                header.file_count
            ),
        });
    }

    let mut names = names.into_iter();
    for folder in folders.iter_mut() {
        folder.file_names = names.by_ref().take(folder.file_count as usize).collect();
        if folder.file_names.len() != folder.file_count as usize {
            return Err(ArchiveError::CorruptArchive {
                offset,
                reason: "file name block ran out before the last folder".to_string(),
            });
        }
    }
    if names.next().is_some() {
        return Err(ArchiveError::CorruptArchive {
            offset,
            reason: "file names left over after the last folder".to_string(),
        });
    }
    Ok(())
}

fn split_names(block: &[u8], offset: u64) -> ArchiveResult<Vec<Vec<u8>>> {
    let mut names = Vec::new();
    let mut rest = block;
    while !rest.is_empty() {
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(ArchiveError::CorruptArchive {
                offset: offset + (block.len() - rest.len()) as u64,
                reason: "unterminated file name".to_string(),
            });
        };
        names.push(rest[..end].to_vec());
        rest = &rest[end + 1..];
    }
    Ok(names)
}

fn read_file_record<R: Read + Seek>(
    source: &mut ByteSource<R>,
    offset: u64,
) -> ArchiveResult<FileRecord> {
    Ok(source.decode_le(offset, FILE_RECORD_SIZE, ())?)
}

fn not_found(folder_path: &[u8], file_name: &[u8]) -> ArchiveError {
    ArchiveError::NotFound(format!(
        "file {:?} in folder {:?}",
        lossy(file_name),
        lossy(folder_path)
    ))
}

fn lossy(name: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(name)
}
