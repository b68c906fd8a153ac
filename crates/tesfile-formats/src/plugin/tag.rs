//! Four-character type tags used by records, groups and fields

use super::error::PluginError;
use binrw::BinRead;
use std::fmt;
use std::str::FromStr;

/// Four-byte type code such as `NPC_`, `EDID` or `GRUP`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BinRead)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    /// Group container marker
    pub const GROUP: Self = Self(*b"GRUP");
    /// Plugin header record
    pub const HEADER: Self = Self(*b"TES4");
    /// Field carrying the 32-bit length of the field that follows it
    pub const EXTENDED_SIZE: Self = Self(*b"XXXX");

    /// Create a tag from raw bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Whether this is the group marker
    pub fn is_group(&self) -> bool {
        *self == Self::GROUP
    }

    /// Whether the tag follows the four uppercase/digit/underscore convention
    pub fn is_conventional(&self) -> bool {
        self.0
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Tag {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <[u8; 4]>::try_from(s.as_bytes())
            .map(Self)
            .map_err(|_| PluginError::InvalidTag(s.to_string()))
    }
}

impl PartialEq<[u8; 4]> for Tag {
    fn eq(&self, other: &[u8; 4]) -> bool {
        self.0 == *other
    }
}

impl PartialEq<&[u8; 4]> for Tag {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        self.0 == **other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", char::from(b))?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(\"{self}\")")
    }
}
