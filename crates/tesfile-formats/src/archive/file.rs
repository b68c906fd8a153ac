//! File records

use binrw::BinRead;

/// Size of one file record
pub const FILE_RECORD_SIZE: usize = 16;

/// Bit in the stored size that inverts the archive's default compression
pub const COMPRESSION_TOGGLE: u32 = 0x4000_0000;

/// Bits of the stored size holding the byte count
pub const SIZE_MASK: u32 = 0x3FFF_FFFF;

/// File record as stored after its folder's name
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct FileRecord {
    /// Hash of the file name
    pub name_hash: u64,
    /// Stored size with the compression toggle bit
    pub raw_size: u32,
    /// Absolute offset of the entry data
    pub offset: u32,
}

impl FileRecord {
    /// Bytes stored in the archive for this entry
    pub const fn size(&self) -> u32 {
        self.raw_size & SIZE_MASK
    }

    /// Whether the entry's compression differs from the archive default
    pub const fn toggles_compression(&self) -> bool {
        self.raw_size & COMPRESSION_TOGGLE != 0
    }

    /// Whether the entry is compressed given the archive default
    pub const fn is_compressed(&self, compressed_by_default: bool) -> bool {
        compressed_by_default != self.toggles_compression()
    }
}
