//! BSA archives (versions 104 and 105)
//!
//! Archives are a hashed virtual filesystem: folders and files are found by
//! the 64-bit path hash from [`tesfile_hash`], not by a name directory.
//!
//! ```text
//! Header (36 bytes)
//! Folder records  (16 bytes for v104, 24 bytes for v105)
//! For each folder:
//!   [1B name length][folder name\0]      (if directory names are stored)
//!   File records (16 bytes each)
//! File name block: name\0name\0...        (if file names are stored)
//! Entry data
//! ```
//!
//! Entry data may start with its full path (embedded file names) and may be
//! compressed: zlib for version 104, an LZ4 frame for version 105, both
//! behind a 4-byte original size.
//!
//! ```rust,no_run
//! use tesfile_formats::archive::ArchiveIndex;
//!
//! let mut archive = ArchiveIndex::open("Skyrim - Interface.bsa")?;
//! let folder = archive.folder("Strings")?;
//! println!("{} files", folder.file_count());
//! let table = archive.extract("strings", "skyrim_english.dlstrings")?;
//! println!("{} bytes", table.len());
//! # Ok::<(), tesfile_formats::archive::ArchiveError>(())
//! ```

pub mod error;
pub mod file;
pub mod folder;
pub mod header;
pub mod index;

pub use error::{ArchiveError, ArchiveResult};
pub use file::{FILE_RECORD_SIZE, FileRecord};
pub use folder::{Folder, FolderRecord};
pub use header::{
    ARCHIVE_HEADER_SIZE, ARCHIVE_MAGIC, ArchiveFlags, ArchiveHeader, ArchiveVersion, FileFlags,
};
pub use index::ArchiveIndex;
