//! Folder records and resolved folders

use super::header::ArchiveVersion;
use binrw::{BinRead, BinResult, Endian};
use std::borrow::Cow;
use std::io::{Read, Seek};
use tesfile_hash::{PathHash, normalize_path_bytes};

/// Folder record as stored in the folder table
///
/// The offset points at the folder's name block plus the total length of the
/// file name block, not at its file records.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little, import(version: ArchiveVersion))]
pub struct FolderRecord {
    /// Hash of the folder path
    pub name_hash: u64,
    /// Number of files in the folder
    pub file_count: u32,
    /// Padding before the wide offset of version 105
    #[br(if(version == ArchiveVersion::V105))]
    pub padding: u32,
    /// Stored name block offset
    #[br(parse_with = parse_folder_offset, args(version))]
    pub offset: u64,
}

fn parse_folder_offset<R: Read + Seek>(
    reader: &mut R,
    endian: Endian,
    (version,): (ArchiveVersion,),
) -> BinResult<u64> {
    match version {
        ArchiveVersion::V104 => u32::read_options(reader, endian, ()).map(u64::from),
        ArchiveVersion::V105 => u64::read_options(reader, endian, ()),
    }
}

/// A folder with its resolved name and file names
///
/// Names are kept as the raw code page bytes the archive stores. The string
/// accessors decode them lossily for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub(crate) name: Option<Vec<u8>>,
    pub(crate) hash: PathHash,
    pub(crate) file_count: u32,
    pub(crate) records_offset: u64,
    pub(crate) file_names: Vec<Vec<u8>>,
}

impl Folder {
    /// Folder path, when the archive stores folder names
    pub fn name(&self) -> Option<Cow<'_, str>> {
        self.name.as_deref().map(String::from_utf8_lossy)
    }

    /// Folder path as stored
    pub fn name_bytes(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    /// Stored path hash
    pub const fn hash(&self) -> PathHash {
        self.hash
    }

    /// Number of files
    pub const fn file_count(&self) -> u32 {
        self.file_count
    }

    /// Absolute offset of the folder's first file record
    pub const fn records_offset(&self) -> u64 {
        self.records_offset
    }

    /// File names in record order; empty when the archive stores none
    pub fn file_names(&self) -> Vec<Cow<'_, str>> {
        self.file_names
            .iter()
            .map(|name| String::from_utf8_lossy(name))
            .collect()
    }

    /// File names as stored, in record order
    pub fn file_name_bytes(&self) -> &[Vec<u8>] {
        &self.file_names
    }

    /// Whether a file with this name is listed, ignoring case and separators
    pub fn contains_file(&self, file_name: impl AsRef<[u8]>) -> bool {
        self.position_of(file_name.as_ref()).is_some()
    }

    pub(crate) fn position_of(&self, file_name: &[u8]) -> Option<usize> {
        let wanted = normalize_path_bytes(file_name);
        self.file_names
            .iter()
            .position(|name| normalize_path_bytes(name) == wanted)
    }
}
