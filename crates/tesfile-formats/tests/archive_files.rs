#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for archive indexing and extraction
//!
//! Archives are laid out the way the game's packer writes them: header,
//! folder records, per-folder name and file records, the file name block,
//! then entry data. Each test builds one, writes it to a temporary
//! directory and opens it by path.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;
use tesfile_formats::archive::{ArchiveFlags, ArchiveVersion, FileRecord};
use tesfile_formats::{ArchiveError, ArchiveIndex, ReaderConfig, StringTable};
use tesfile_hash::{hash_file, hash_file_bytes, hash_folder, hash_folder_bytes};

const NAMED: u32 = ArchiveFlags::DIRECTORY_NAMES | ArchiveFlags::FILE_NAMES;
const TOGGLE: u32 = 0x4000_0000;

struct Entry {
    name: Vec<u8>,
    stored: Vec<u8>,
    toggled: bool,
}

impl Entry {
    fn new(name: impl Into<Vec<u8>>, stored: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            stored,
            toggled: false,
        }
    }

    fn toggled(mut self) -> Self {
        self.toggled = true;
        self
    }
}

struct ArchiveBuilder {
    version: u32,
    flags: u32,
    folders: Vec<(Vec<u8>, Vec<Entry>)>,
}

impl ArchiveBuilder {
    fn new(version: u32, flags: u32) -> Self {
        Self {
            version,
            flags,
            folders: Vec::new(),
        }
    }

    fn folder(mut self, name: impl Into<Vec<u8>>, entries: Vec<Entry>) -> Self {
        self.folders.push((name.into(), entries));
        self
    }

    fn build(&self) -> Vec<u8> {
        let dir_names = self.flags & ArchiveFlags::DIRECTORY_NAMES != 0;
        let file_names = self.flags & ArchiveFlags::FILE_NAMES != 0;
        let record_size: u32 = if self.version == 105 { 24 } else { 16 };

        let folder_count = self.folders.len() as u32;
        let file_count: u32 = self.folders.iter().map(|(_, e)| e.len() as u32).sum();
        let folder_name_len: u32 = self.folders.iter().map(|(n, _)| n.len() as u32 + 1).sum();
        let file_name_len: u32 = if file_names {
            self.folders
                .iter()
                .flat_map(|(_, entries)| entries.iter())
                .map(|e| e.name.len() as u32 + 1)
                .sum()
        } else {
            0
        };

        // layout pass: name blocks, then data offsets
        let mut pos = 36 + folder_count * record_size;
        let mut name_blocks = Vec::new();
        for (name, entries) in &self.folders {
            name_blocks.push(pos);
            if dir_names {
                pos += name.len() as u32 + 2;
            }
            pos += entries.len() as u32 * 16;
        }
        let mut data_offset = pos + file_name_len;

        let mut out = b"BSA\0".to_vec();
        for value in [
            self.version,
            36,
            self.flags,
            folder_count,
            file_count,
            folder_name_len,
            file_name_len,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&0x0100u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());

        for ((name, entries), block) in self.folders.iter().zip(&name_blocks) {
            out.extend_from_slice(&hash_folder_bytes(name).to_le_bytes());
            out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
            let offset = block + file_name_len;
            if self.version == 105 {
                out.extend_from_slice(&0u32.to_le_bytes());
                out.extend_from_slice(&u64::from(offset).to_le_bytes());
            } else {
                out.extend_from_slice(&offset.to_le_bytes());
            }
        }

        let mut data = Vec::new();
        for (name, entries) in &self.folders {
            if dir_names {
                out.push(name.len() as u8 + 1);
                out.extend_from_slice(name);
                out.push(0);
            }
            for entry in entries {
                let size = entry.stored.len() as u32 | if entry.toggled { TOGGLE } else { 0 };
                out.extend_from_slice(&hash_file_bytes(&entry.name).to_le_bytes());
                out.extend_from_slice(&size.to_le_bytes());
                out.extend_from_slice(&data_offset.to_le_bytes());
                data_offset += entry.stored.len() as u32;
                data.extend_from_slice(&entry.stored);
            }
        }

        if file_names {
            for entry in self.folders.iter().flat_map(|(_, entries)| entries.iter()) {
                out.extend_from_slice(&entry.name);
                out.push(0);
            }
        }
        out.extend(data);
        out
    }
}

fn zlib_entry(content: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    let mut out = (content.len() as u32).to_le_bytes().to_vec();
    out.extend(encoder.finish().unwrap());
    out
}

fn lz4_entry(content: &[u8]) -> Vec<u8> {
    let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
    encoder.write_all(content).unwrap();
    let mut out = (content.len() as u32).to_le_bytes().to_vec();
    out.extend(encoder.finish().unwrap());
    out
}

/// A small `.dlstrings` table: length-prefixed entries
fn dlstrings() -> Vec<u8> {
    let entries: [(u32, &str); 3] = [
        (0x0001_0F6D, "The Lusty Argonian Maid"),
        (0x0001_0F6E, "Crantius Colto's tale continues."),
        (0x0002_2A4C, ""),
    ];
    let mut directory = Vec::new();
    let mut data = Vec::new();
    for (id, text) in entries {
        directory.extend_from_slice(&id.to_le_bytes());
        directory.extend_from_slice(&(data.len() as u32).to_le_bytes());
        data.extend_from_slice(&(text.len() as u32 + 1).to_le_bytes());
        data.extend_from_slice(text.as_bytes());
        data.push(0);
    }
    let mut out = (entries.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend(directory);
    out.extend(data);
    out
}

const CONTROLS: &[u8] = b"<controls>\n  <keyboard/>\n</controls>\n";

fn interface_archive(version: u32, encode: fn(&[u8]) -> Vec<u8>) -> Vec<u8> {
    ArchiveBuilder::new(version, NAMED | ArchiveFlags::COMPRESSED)
        .folder(
            "interface\\controls",
            vec![Entry::new("controlmap.txt", CONTROLS.to_vec()).toggled()],
        )
        .folder(
            "strings",
            vec![
                Entry::new("skyrim_english.dlstrings", encode(&dlstrings())),
                Entry::new("skyrim_english.strings", encode(b"\0\0\0\0\0\0\0\0")),
            ],
        )
        .build()
}

fn write_archive(dir: &TempDir, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join("Skyrim - Interface.bsa");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn check_interface_archive(archive: &mut ArchiveIndex) {
    assert!(archive.is_compressed_by_default());
    assert!(archive.has_directory_names());
    assert!(archive.has_file_names());
    assert!(!archive.has_embedded_file_names());

    let folder = archive.folder("Strings").unwrap();
    assert_eq!(folder.name().as_deref(), Some("strings"));
    assert_eq!(folder.file_count(), 2);
    assert_eq!(
        folder.file_names(),
        ["skyrim_english.dlstrings", "skyrim_english.strings"]
    );
    assert!(folder.contains_file("Skyrim_English.DLSTRINGS"));

    let table = archive.extract("strings", "skyrim_english.dlstrings").unwrap();
    assert_eq!(table, dlstrings());
    assert_eq!(u32::from_le_bytes(table[0..4].try_into().unwrap()), 3);

    let strings = StringTable::parse_named("skyrim_english.dlstrings", &table).unwrap();
    assert_eq!(strings.get(0x0001_0F6D).unwrap(), "The Lusty Argonian Maid");
    assert_eq!(strings.get(0x0002_2A4C).unwrap(), "");

    assert_eq!(
        archive.extract_path("Strings/Skyrim_English.DLSTRINGS").unwrap(),
        table
    );
    assert_eq!(
        archive.extract_path("strings\\skyrim_english.dlstrings").unwrap(),
        table
    );

    // stored uncompressed in a compressed archive
    assert_eq!(
        archive.extract_path("Interface/Controls/ControlMap.txt").unwrap(),
        CONTROLS
    );
}

#[test]
fn test_version_104_zlib_archive() {
    let dir = TempDir::new().unwrap();
    let path = write_archive(&dir, &interface_archive(104, zlib_entry));
    let mut archive = ArchiveIndex::open(&path).unwrap();

    assert_eq!(archive.version(), ArchiveVersion::V104);
    assert_eq!(archive.folders().count(), 2);
    check_interface_archive(&mut archive);
}

#[test]
fn test_version_105_lz4_archive() {
    let dir = TempDir::new().unwrap();
    let path = write_archive(&dir, &interface_archive(105, lz4_entry));
    let mut archive = ArchiveIndex::open(&path).unwrap();

    assert_eq!(archive.version(), ArchiveVersion::V105);
    check_interface_archive(&mut archive);
}

#[test]
fn test_file_records_carry_name_hashes() {
    let mut archive = ArchiveIndex::from_bytes(interface_archive(105, lz4_entry)).unwrap();
    let records: Vec<FileRecord> = archive.file_records("strings").unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name_hash, hash_file("skyrim_english.dlstrings"));
    assert_eq!(records[1].name_hash, hash_file("skyrim_english.strings"));
    assert!(records.iter().all(|r| !r.toggles_compression()));

    let controls = archive.file_record("interface/controls", "controlmap.txt").unwrap();
    assert!(controls.toggles_compression());
    assert!(!controls.is_compressed(archive.is_compressed_by_default()));

    let range = u64::from(controls.offset)..u64::from(controls.offset) + u64::from(controls.size());
    assert_eq!(archive.read_range(range).unwrap(), CONTROLS);
}

#[test]
fn test_missing_folder_and_file() {
    let mut archive = ArchiveIndex::from_bytes(interface_archive(104, zlib_entry)).unwrap();

    let err = archive.folder("meshes").unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(!archive.contains_folder("meshes"));

    let err = archive.extract("strings", "skyrim_german.strings").unwrap_err();
    assert!(err.is_not_found(), "{err}");

    let err = archive.extract_path("controlmap.txt").unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[test]
fn test_corrupt_folder_hash() {
    let mut bytes = interface_archive(104, zlib_entry);
    bytes[36..44].copy_from_slice(&0x0123_4567_89AB_CDEFu64.to_le_bytes());

    let err = ArchiveIndex::from_bytes(bytes.clone()).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptArchive { .. }), "{err}");
    assert!(err.is_corruption());

    // without verification the stored hash stays the lookup key
    let dir = TempDir::new().unwrap();
    let path = write_archive(&dir, &bytes);
    let config = ReaderConfig::default().with_folder_hash_verification(false);
    let archive = ArchiveIndex::open_with_config(&path, config).unwrap();

    assert!(archive.folder("interface\\controls").unwrap_err().is_not_found());
    let names: Vec<Option<&[u8]>> = archive.folders().map(|f| f.name_bytes()).collect();
    assert_eq!(
        names,
        vec![Some(&b"interface\\controls"[..]), Some(&b"strings"[..])]
    );
    assert!(archive.folder("strings").is_ok());
}

#[test]
fn test_file_name_count_mismatch() {
    let mut bytes = interface_archive(104, zlib_entry);
    let block = bytes
        .windows(15)
        .position(|w| w == b"controlmap.txt\0")
        .unwrap();
    // merge the first two names into one
    bytes[block + 14] = b'_';

    let err = ArchiveIndex::from_bytes(bytes).unwrap_err();
    assert!(
        matches!(&err, ArchiveError::CorruptArchive { reason, .. } if reason.contains("2 names")),
        "{err}"
    );
}

#[test]
fn test_folder_file_count_mismatch() {
    let mut bytes = interface_archive(104, zlib_entry);
    // header file count
    bytes[20..24].copy_from_slice(&4u32.to_le_bytes());

    let err = ArchiveIndex::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptArchive { .. }), "{err}");
}

#[test]
fn test_misplaced_name_block() {
    let mut bytes = interface_archive(105, lz4_entry);
    // second folder record's offset field (v105: after hash, count, padding)
    let field = 36 + 24 + 16;
    let offset = u64::from_le_bytes(bytes[field..field + 8].try_into().unwrap());
    bytes[field..field + 8].copy_from_slice(&(offset + 3).to_le_bytes());

    let err = ArchiveIndex::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptArchive { .. }), "{err}");
}

#[test]
fn test_lookup_by_hash_without_file_names() {
    let bytes = ArchiveBuilder::new(104, ArchiveFlags::DIRECTORY_NAMES)
        .folder(
            "textures\\actors",
            vec![
                Entry::new("skin.dds", b"DDS skin".to_vec()),
                Entry::new("hair.dds", b"DDS hair".to_vec()),
            ],
        )
        .build();
    let mut archive = ArchiveIndex::from_bytes(bytes).unwrap();

    let folder = archive.folder("Textures/Actors").unwrap();
    assert!(folder.file_names().is_empty());
    assert_eq!(archive.extract("textures\\actors", "HAIR.dds").unwrap(), b"DDS hair");
    assert!(
        archive
            .extract("textures\\actors", "eyes.dds")
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn test_unnamed_folders() {
    let bytes = ArchiveBuilder::new(105, ArchiveFlags::FILE_NAMES)
        .folder("sound\\fx", vec![Entry::new("step.wav", b"RIFF".to_vec())])
        .build();
    let mut archive = ArchiveIndex::from_bytes(bytes).unwrap();

    let folder = archive.folder("sound\\fx").unwrap();
    assert_eq!(folder.name(), None);
    assert_eq!(folder.hash().value(), hash_folder("sound\\fx"));
    assert_eq!(archive.extract_path("Sound/FX/Step.wav").unwrap(), b"RIFF");
}

#[test]
fn test_embedded_file_names() {
    let path = b"meshes\\clutter\\bucket.nif";
    let mut stored = vec![path.len() as u8];
    stored.extend_from_slice(path);
    stored.extend(zlib_entry(b"NIF body"));

    let bytes = ArchiveBuilder::new(
        104,
        NAMED | ArchiveFlags::COMPRESSED | ArchiveFlags::EMBEDDED_FILE_NAMES,
    )
    .folder("meshes\\clutter", vec![Entry::new("bucket.nif", stored)])
    .build();
    let mut archive = ArchiveIndex::from_bytes(bytes).unwrap();

    assert!(archive.has_embedded_file_names());
    assert_eq!(archive.extract_path("meshes/clutter/bucket.nif").unwrap(), b"NIF body");
}

#[test]
fn test_code_page_names() {
    let folder_name = b"textures\\caf\xe9";
    let file_name = b"men\xfa.dds";
    let bytes = ArchiveBuilder::new(104, NAMED)
        .folder(
            folder_name.to_vec(),
            vec![Entry::new(file_name.to_vec(), b"DDS menu".to_vec())],
        )
        .build();
    let dir = TempDir::new().unwrap();
    let path = write_archive(&dir, &bytes);
    let mut archive = ArchiveIndex::open(&path).unwrap();

    let folder = archive.folder(b"Textures/CAF\xe9").unwrap();
    assert_eq!(folder.name_bytes(), Some(&folder_name[..]));
    assert_eq!(folder.name().as_deref(), Some("textures\\caf\u{fffd}"));
    assert_eq!(folder.file_name_bytes(), [file_name.to_vec()]);
    assert!(folder.contains_file(b"MEN\xfa.DDS"));

    assert_eq!(archive.extract(folder_name, file_name).unwrap(), b"DDS menu");
    assert_eq!(
        archive.extract_path(b"Textures/Caf\xe9/Men\xfa.dds").unwrap(),
        b"DDS menu"
    );
    let record = archive.file_record(folder_name, file_name).unwrap();
    assert_eq!(record.name_hash, hash_file_bytes(file_name));
    // the decoded display name is a different path
    assert!(!archive.contains_folder("textures\\caf\u{fffd}"));

    // without a file name block the lookup goes through the name hash
    let bytes = ArchiveBuilder::new(105, ArchiveFlags::DIRECTORY_NAMES)
        .folder(
            folder_name.to_vec(),
            vec![Entry::new(file_name.to_vec(), b"DDS menu".to_vec())],
        )
        .build();
    let mut archive = ArchiveIndex::from_bytes(bytes).unwrap();
    assert_eq!(archive.extract(folder_name, b"MEN\xfa.dds").unwrap(), b"DDS menu");
}

#[test]
fn test_decompression_mismatch() {
    let mut stored = zlib_entry(b"twelve bytes");
    stored[0..4].copy_from_slice(&20u32.to_le_bytes());
    let bytes = ArchiveBuilder::new(104, NAMED | ArchiveFlags::COMPRESSED)
        .folder("strings", vec![Entry::new("broken.strings", stored)])
        .build();
    let mut archive = ArchiveIndex::from_bytes(bytes).unwrap();

    let err = archive.extract("strings", "broken.strings").unwrap_err();
    assert!(
        matches!(
            err,
            ArchiveError::DecompressionMismatch {
                expected: 20,
                actual: 12,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn test_console_archives_unsupported() {
    let bytes = ArchiveBuilder::new(104, NAMED | ArchiveFlags::XBOX).build();
    assert!(matches!(
        ArchiveIndex::from_bytes(bytes),
        Err(ArchiveError::Unsupported(_))
    ));

    let bytes = ArchiveBuilder::new(
        104,
        NAMED | ArchiveFlags::COMPRESSED | ArchiveFlags::XMEM_CODEC,
    )
    .folder(
        "strings",
        vec![
            Entry::new("packed.strings", zlib_entry(b"x")),
            Entry::new("plain.strings", b"plain".to_vec()).toggled(),
        ],
    )
    .build();
    let mut archive = ArchiveIndex::from_bytes(bytes).unwrap();
    assert!(matches!(
        archive.extract("strings", "packed.strings"),
        Err(ArchiveError::Unsupported(_))
    ));
    assert_eq!(archive.extract("strings", "plain.strings").unwrap(), b"plain");
}

#[test]
fn test_truncated_folder_table() {
    let mut bytes = interface_archive(104, zlib_entry);
    bytes.truncate(50);
    let err = ArchiveIndex::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::Truncated { .. }), "{err}");
}

proptest! {
    #[test]
    fn every_stored_file_is_found(
        stems in prop::collection::btree_set("[a-z][a-z0-9_]{0,11}", 1..8),
        uppercase in any::<bool>(),
    ) {
        let names: Vec<String> = stems.iter().map(|stem| format!("{stem}.txt")).collect();
        let entries = names
            .iter()
            .map(|name| Entry::new(name.as_str(), name.as_bytes().to_vec()))
            .collect();
        let bytes = ArchiveBuilder::new(105, NAMED).folder("data", entries).build();
        let mut archive = ArchiveIndex::from_bytes(bytes).unwrap();

        for name in &names {
            let query = if uppercase { name.to_ascii_uppercase() } else { name.to_string() };
            prop_assert_eq!(archive.extract("DATA", &query).unwrap(), name.as_bytes());
        }
    }
}
