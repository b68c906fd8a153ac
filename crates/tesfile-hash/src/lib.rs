//! Path hashing for Bethesda archive (BSA) lookups
//!
//! Archives never store a searchable directory tree. Folders and files are
//! addressed by a 64-bit key derived from their normalized, lowercased path,
//! and readers must derive the same key to find anything. This crate provides
//! that key derivation, bit-exact with the one used by version 103-105
//! archives.
//!
//! # Examples
//!
//! ```
//! use tesfile_hash::{PathHash, hash_path};
//!
//! // Case and separators do not matter
//! assert_eq!(hash_path("Strings"), 5594201102607673203);
//! assert_eq!(PathHash::of("interface/controls/orbis"), PathHash::of("Interface\\Controls\\Orbis"));
//! ```

#![warn(missing_docs)]

pub mod path_hash;

pub use path_hash::{
    PathHash, hash_file, hash_file_bytes, hash_folder, hash_folder_bytes, hash_path,
    hash_path_bytes, normalize_path, normalize_path_bytes,
};
