//! Record identifiers (FormIDs)
//!
//! A FormID is a little-endian value of one to four bytes. With four bytes
//! the high byte is the mod index (which loaded file defined the record) and
//! the low three bytes are the object index within that file. Identifiers
//! written as short hex text (`0x13bab`) carry no mod index.

use super::error::{PluginError, PluginResult};
use std::fmt;
use std::str::FromStr;

/// Unique record key within one plugin file
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormId {
    bytes: [u8; 4],
    width: u8,
}

impl FormId {
    /// Build from 1-4 little-endian bytes
    pub fn from_bytes(bytes: &[u8]) -> PluginResult<Self> {
        if bytes.is_empty() || bytes.len() > 4 {
            return Err(PluginError::InvalidFormId(format!(
                "expected 1-4 bytes, got {}",
                bytes.len()
            )));
        }
        let mut raw = [0u8; 4];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: raw,
            width: bytes.len() as u8,
        })
    }

    /// Parse hexadecimal text such as `0x13bab` or `0013bab`
    ///
    /// Up to six digits yield a three-byte identifier without mod index;
    /// seven or eight digits yield a full four-byte identifier.
    pub fn from_hex(text: &str) -> PluginResult<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(PluginError::InvalidFormId(format!(
                "{text:?} is not a hexadecimal identifier"
            )));
        }

        let value = u32::from_str_radix(digits, 16)
            .map_err(|e| PluginError::InvalidFormId(format!("{text:?}: {e}")))?;
        let width = if digits.len() > 6 { 4 } else { 3 };
        Self::from_bytes(&value.to_le_bytes()[..width])
    }

    /// Build a full four-byte identifier from a header value
    pub const fn from_u32(value: u32) -> Self {
        Self {
            bytes: value.to_le_bytes(),
            width: 4,
        }
    }

    /// Raw little-endian bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.width)]
    }

    /// Byte width (1-4)
    pub const fn width(&self) -> usize {
        self.width as usize
    }

    /// Index of the file that defined the record, present for four-byte identifiers
    pub const fn mod_index(&self) -> Option<u8> {
        if self.width == 4 {
            Some(self.bytes[3])
        } else {
            None
        }
    }

    /// Low three bytes
    pub const fn object_index(&self) -> u32 {
        u32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], 0])
    }

    /// Numeric value with a missing mod index read as zero
    ///
    /// This is the key records are indexed under.
    pub const fn value(&self) -> u32 {
        u32::from_le_bytes(self.bytes)
    }
}

impl From<u32> for FormId {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl TryFrom<&[u8]> for FormId {
    type Error = PluginError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl FromStr for FormId {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.object_index())
    }
}

impl fmt::Debug for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mod_index() {
            Some(index) => write!(f, "FormId({self}, mod {index:#04x})"),
            None => write!(f, "FormId({self})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_four_byte_identifier() {
        let form_id = FormId::from_bytes(&[0x07, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(form_id.mod_index(), Some(1));
        assert_eq!(form_id.width(), 4);
        assert_eq!(form_id.to_string(), "0x7");
        assert_eq!(form_id.value(), 0x0100_0007);
    }

    #[test]
    fn test_short_hex_has_no_mod_index() {
        let form_id = FormId::from_hex("0x7").unwrap();
        assert_eq!(form_id.mod_index(), None);
        assert_eq!(form_id.width(), 3);
        assert_eq!(form_id.to_string(), "0x7");

        let ysolda: FormId = "0x13bab".parse().unwrap();
        assert_eq!(ysolda.mod_index(), None);
        assert_eq!(ysolda.width(), 3);
        assert_eq!(ysolda.to_string(), "0x13bab");
        assert_eq!(ysolda.value(), 0x13bab);
    }

    #[test]
    fn test_long_hex_has_mod_index() {
        let form_id = FormId::from_hex("0x0013bab").unwrap();
        assert_eq!(form_id.mod_index(), Some(0));
        assert_eq!(form_id.width(), 4);
        assert_eq!(form_id.to_string(), "0x13bab");

        let form_id = FormId::from_hex("0x0213BAB").unwrap();
        assert_eq!(form_id.mod_index(), Some(2));
        assert_eq!(form_id.object_index(), 0x13bab);
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(FormId::from_hex("mistake").is_err());
        assert!(FormId::from_hex("0x").is_err());
        assert!(FormId::from_hex("0x123456789").is_err());
        assert!(FormId::from_bytes(&[0x07, 0x00, 0x00, 0x01, 0x20]).is_err());
        assert!(FormId::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_equality_compares_raw_bytes() {
        let short = FormId::from_hex("0x13bab").unwrap();
        let long = FormId::from_u32(0x13bab);
        assert_ne!(short, long);
        assert_eq!(short.value(), long.value());
        assert_eq!(long, FormId::from_bytes(&[0xab, 0x3b, 0x01, 0x00]).unwrap());
    }

    proptest! {
        #[test]
        fn bytes_round_trip(bytes in prop::collection::vec(any::<u8>(), 1..=4)) {
            let form_id = FormId::from_bytes(&bytes).unwrap();
            prop_assert_eq!(form_id.as_bytes(), bytes.as_slice());
            prop_assert_eq!(FormId::from_bytes(form_id.as_bytes()).unwrap(), form_id);
        }

        #[test]
        fn header_value_round_trip(value in any::<u32>()) {
            let form_id = FormId::from_u32(value);
            prop_assert_eq!(form_id.value(), value);
            prop_assert_eq!(FormId::from_bytes(&value.to_le_bytes()).unwrap(), form_id);
        }
    }
}
