//! Archive header, version and flag words

use super::error::{ArchiveError, ArchiveResult};
use binrw::BinRead;
use std::fmt;

/// Size of the archive header in bytes
pub const ARCHIVE_HEADER_SIZE: usize = 36;

/// Archive signature
pub const ARCHIVE_MAGIC: [u8; 4] = *b"BSA\0";

/// Supported archive versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveVersion {
    /// Skyrim (and Fallout 3 / New Vegas): zlib entries, 16-byte folder records
    V104,
    /// Skyrim Special Edition: LZ4 frame entries, 24-byte folder records
    V105,
}

impl ArchiveVersion {
    /// Numeric version stored in the header
    pub const fn number(self) -> u32 {
        match self {
            Self::V104 => 104,
            Self::V105 => 105,
        }
    }

    /// Size of one folder record
    pub const fn folder_record_size(self) -> usize {
        match self {
            Self::V104 => 16,
            Self::V105 => 24,
        }
    }
}

impl TryFrom<u32> for ArchiveVersion {
    type Error = ArchiveError;

    fn try_from(value: u32) -> ArchiveResult<Self> {
        match value {
            104 => Ok(Self::V104),
            105 => Ok(Self::V105),
            other => Err(ArchiveError::UnsupportedVersion(other)),
        }
    }
}

impl fmt::Display for ArchiveVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Archive-wide flag word
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArchiveFlags {
    /// Raw flag value
    pub value: u32,
}

impl ArchiveFlags {
    /// Folder names are stored (bit 0)
    pub const DIRECTORY_NAMES: u32 = 0x0001;

    /// File names are stored (bit 1)
    pub const FILE_NAMES: u32 = 0x0002;

    /// Entries are compressed unless their size toggles it (bit 2)
    pub const COMPRESSED: u32 = 0x0004;

    /// Retain directory names (bit 3)
    pub const RETAIN_DIRECTORY_NAMES: u32 = 0x0008;

    /// Retain file names (bit 4)
    pub const RETAIN_FILE_NAMES: u32 = 0x0010;

    /// Retain file name offsets (bit 5)
    pub const RETAIN_FILE_NAME_OFFSETS: u32 = 0x0020;

    /// Big-endian console archive (bit 6)
    pub const XBOX: u32 = 0x0040;

    /// Retain strings during startup (bit 7)
    pub const RETAIN_STRINGS: u32 = 0x0080;

    /// Entry data starts with its full path as a length-prefixed string (bit 8)
    pub const EMBEDDED_FILE_NAMES: u32 = 0x0100;

    /// Console XMem codec (bit 9)
    pub const XMEM_CODEC: u32 = 0x0200;

    /// Create flags from a raw value
    pub const fn new(value: u32) -> Self {
        Self { value }
    }

    /// Check if a flag is set
    pub const fn has(&self, flag: u32) -> bool {
        (self.value & flag) != 0
    }
}

/// Content-type hint word
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileFlags {
    /// Raw flag value
    pub value: u16,
}

impl FileFlags {
    /// `.nif` meshes
    pub const MESHES: u16 = 0x0001;
    /// `.dds` textures
    pub const TEXTURES: u16 = 0x0002;
    /// Interface files
    pub const MENUS: u16 = 0x0004;
    /// `.wav` sounds
    pub const SOUNDS: u16 = 0x0008;
    /// Voice files
    pub const VOICES: u16 = 0x0010;
    /// Shaders
    pub const SHADERS: u16 = 0x0020;
    /// SpeedTree files
    pub const TREES: u16 = 0x0040;
    /// Fonts
    pub const FONTS: u16 = 0x0080;
    /// Anything else, including string tables
    pub const MISCELLANEOUS: u16 = 0x0100;

    /// Check if a flag is set
    pub const fn has(&self, flag: u16) -> bool {
        (self.value & flag) != 0
    }
}

/// Decoded 36-byte archive header
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little, magic = b"BSA\0")]
pub struct ArchiveHeader {
    /// Format version number
    pub version: u32,
    /// Offset of the folder record table
    pub folder_offset: u32,
    /// Archive flags
    pub archive_flags: ArchiveFlags,
    /// Number of folders
    pub folder_count: u32,
    /// Number of files across all folders
    pub file_count: u32,
    /// Total length of all folder names with terminators, length bytes excluded
    pub total_folder_name_length: u32,
    /// Total length of the file name block
    pub total_file_name_length: u32,
    /// Content-type hints
    pub file_flags: FileFlags,
    /// Padding
    pub padding: u16,
}

impl ArchiveHeader {
    /// Validated version
    pub fn archive_version(&self) -> ArchiveResult<ArchiveVersion> {
        ArchiveVersion::try_from(self.version)
    }
}
