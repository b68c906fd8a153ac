//! Folder and file name hash used as the archive lookup key
//!
//! The low 32 bits pack the last character, the second-to-last character,
//! the length and the first character of the name stem, OR'd with a fixed
//! pattern for a handful of well-known extensions. The high 32 bits are a
//! rolling multiply-add over the stem's interior characters plus the same
//! rolling hash over the extension.

use std::fmt;

/// Rolling hash multiplier
const MULTIPLIER: u32 = 0x1003F;

/// Extensions that contribute a fixed bit pattern to the low half
const EXTENSION_BITS: [(&[u8], u32); 4] = [
    (b".kf", 0x0000_0080),
    (b".nif", 0x0000_8000),
    (b".dds", 0x0000_8080),
    (b".wav", 0x8000_0000),
];

/// 64-bit archive lookup key for a folder or file path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PathHash(u64);

impl PathHash {
    /// Hash a path, peeling the extension off its last component
    pub fn of(path: &str) -> Self {
        Self(hash_path(path))
    }

    /// Wrap a raw hash value read from an archive
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Raw 64-bit value
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Packed character/length half
    pub const fn low(self) -> u32 {
        self.0 as u32
    }

    /// Rolling hash half
    pub const fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl From<u64> for PathHash {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<PathHash> for u64 {
    fn from(hash: PathHash) -> Self {
        hash.0
    }
}

impl fmt::Display for PathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Normalize a path the way archives store it
///
/// ASCII letters are lowercased, `/` becomes `\` and leading or trailing
/// separators are removed.
///
/// # Examples
///
/// ```
/// use tesfile_hash::normalize_path;
///
/// assert_eq!(normalize_path("/Interface/Controls/"), "interface\\controls");
/// ```
pub fn normalize_path(path: &str) -> String {
    let normalized: String = path
        .chars()
        .map(|c| if c == '/' { '\\' } else { c.to_ascii_lowercase() })
        .collect();
    normalized.trim_matches('\\').to_string()
}

/// Normalize raw path bytes the way archives store them
///
/// Archive names are single-byte code page text, so only ASCII bytes are
/// folded and bytes above 0x7F pass through untouched.
///
/// # Examples
///
/// ```
/// use tesfile_hash::normalize_path_bytes;
///
/// assert_eq!(normalize_path_bytes(b"/Caf\xE9/"), b"caf\xE9");
/// ```
pub fn normalize_path_bytes(path: &[u8]) -> Vec<u8> {
    let start = path.iter().position(|&b| !is_separator(b));
    let end = path.iter().rposition(|&b| !is_separator(b));
    let trimmed = match (start, end) {
        (Some(start), Some(end)) => &path[start..=end],
        _ => &path[..0],
    };
    trimmed
        .iter()
        .map(|&b| if b == b'/' { b'\\' } else { b.to_ascii_lowercase() })
        .collect()
}

const fn is_separator(byte: u8) -> bool {
    byte == b'\\' || byte == b'/'
}

/// Hash a path, treating a `.` in its last component as the extension start
///
/// Dots in parent components (e.g. `sound\voice\skyrim.esm\guard`) are part of
/// the stem.
pub fn hash_path(path: &str) -> u64 {
    hash_path_bytes(path.as_bytes())
}

/// Byte-slice form of [`hash_path`]
pub fn hash_path_bytes(path: &[u8]) -> u64 {
    let normalized = normalize_path_bytes(path);
    let name_start = normalized
        .iter()
        .rposition(|&b| b == b'\\')
        .map_or(0, |pos| pos + 1);

    match normalized[name_start..].iter().rposition(|&b| b == b'.') {
        Some(dot) => {
            let (stem, extension) = normalized.split_at(name_start + dot);
            hash_parts(stem, extension)
        }
        None => hash_parts(&normalized, b""),
    }
}

/// Hash a folder path (no extension handling)
pub fn hash_folder(path: &str) -> u64 {
    hash_folder_bytes(path.as_bytes())
}

/// Byte-slice form of [`hash_folder`]
pub fn hash_folder_bytes(path: &[u8]) -> u64 {
    hash_parts(&normalize_path_bytes(path), b"")
}

/// Hash a file name
///
/// Any directory components are dropped before hashing, matching how file
/// records are keyed inside their folder.
pub fn hash_file(name: &str) -> u64 {
    hash_file_bytes(name.as_bytes())
}

/// Byte-slice form of [`hash_file`]
pub fn hash_file_bytes(name: &[u8]) -> u64 {
    let normalized = normalize_path_bytes(name);
    let file_name = normalized
        .rsplit(|&b| b == b'\\')
        .next()
        .unwrap_or(&normalized);
    hash_path_bytes(file_name)
}

fn hash_parts(stem: &[u8], extension: &[u8]) -> u64 {
    let len = stem.len();

    let mut low = match (stem.first(), stem.last()) {
        (Some(&first), Some(&last)) => {
            let second_last = if len > 2 { stem[len - 2] } else { 0 };
            // length truncates to one byte, as the engine does
            u32::from_le_bytes([last, second_last, len as u8, first])
        }
        _ => 0,
    };
    low |= extension_bits(extension);

    let interior: &[u8] = if len > 3 { &stem[1..len - 2] } else { &[] };
    let high = rolling_hash(interior).wrapping_add(rolling_hash(extension));

    (u64::from(high) << 32) | u64::from(low)
}

fn extension_bits(extension: &[u8]) -> u32 {
    EXTENSION_BITS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map_or(0, |(_, bits)| *bits)
}

fn rolling_hash(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |hash, &b| {
        hash.wrapping_mul(MULTIPLIER).wrapping_add(u32::from(b))
    })
}
