//! Sub-records ("fields") inside a record payload
//!
//! Layout: `[4B tag][2B length LE][length bytes payload]`. A field whose
//! payload would exceed 65535 bytes is preceded by an `XXXX` field holding
//! the real length as a u32, and its own length is written as zero.

use super::error::{PluginError, PluginResult};
use super::tag::Tag;
use std::borrow::Cow;
use tracing::warn;

/// Size of a field header
pub const FIELD_HEADER_SIZE: usize = 6;

/// One tagged, length-prefixed value borrowed from a record's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    tag: Tag,
    payload: &'a [u8],
    position: usize,
}

impl<'a> Field<'a> {
    /// Decode the field at the start of `window`
    pub fn parse(window: &'a [u8]) -> PluginResult<Self> {
        Self::parse_at(window, 0, None)
    }

    /// Decode a field whose window starts at `position` in its record content
    fn parse_at(
        window: &'a [u8],
        position: usize,
        length_override: Option<u32>,
    ) -> PluginResult<Self> {
        if window.len() < FIELD_HEADER_SIZE {
            return Err(PluginError::TruncatedInput {
                offset: position as u64,
                needed: FIELD_HEADER_SIZE,
                available: window.len(),
            });
        }

        let tag = Tag::new([window[0], window[1], window[2], window[3]]);
        let length = length_override.map_or_else(
            || usize::from(u16::from_le_bytes([window[4], window[5]])),
            |len| len as usize,
        );

        let needed = FIELD_HEADER_SIZE + length;
        if window.len() < needed {
            return Err(PluginError::TruncatedInput {
                offset: position as u64,
                needed,
                available: window.len(),
            });
        }

        Ok(Self {
            tag,
            payload: &window[FIELD_HEADER_SIZE..needed],
            position,
        })
    }

    /// Type tag
    pub const fn tag(&self) -> Tag {
        self.tag
    }

    /// Payload bytes
    pub const fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Position of the field header within its record content
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Bytes consumed from the content stream, header included
    pub const fn encoded_len(&self) -> usize {
        FIELD_HEADER_SIZE + self.payload.len()
    }

    /// Payload as text, cut at the first NUL
    pub fn as_str_lossy(&self) -> Cow<'a, str> {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        String::from_utf8_lossy(&self.payload[..end])
    }

    /// First payload byte
    pub fn as_u8(&self) -> PluginResult<u8> {
        Ok(self.le_array::<1>()?[0])
    }

    /// Payload as a little-endian u16
    pub fn as_u16(&self) -> PluginResult<u16> {
        self.le_array().map(u16::from_le_bytes)
    }

    /// Payload as a little-endian u32
    pub fn as_u32(&self) -> PluginResult<u32> {
        self.le_array().map(u32::from_le_bytes)
    }

    /// Payload as a little-endian f32
    pub fn as_f32(&self) -> PluginResult<f32> {
        self.le_array().map(f32::from_le_bytes)
    }

    fn le_array<const N: usize>(&self) -> PluginResult<[u8; N]> {
        self.payload
            .get(..N)
            .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
            .ok_or_else(|| PluginError::TruncatedInput {
                offset: (self.position + FIELD_HEADER_SIZE) as u64,
                needed: N,
                available: self.payload.len(),
            })
    }
}

/// Lazy iterator over the fields of a record's content
///
/// Each call re-parses from the content buffer; iteration stops cleanly when
/// the content is consumed exactly and yields one error, then stops, if a
/// trailing fragment is too short to be a field.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    content: &'a [u8],
    position: usize,
    record_offset: u64,
    finished: bool,
}

impl<'a> Fields<'a> {
    /// Iterate over `content`, reporting errors against `record_offset`
    pub const fn new(content: &'a [u8], record_offset: u64) -> Self {
        Self {
            content,
            position: 0,
            record_offset,
            finished: false,
        }
    }

    /// Position of the next field within the content
    pub const fn position(&self) -> usize {
        self.position
    }

    fn fail(&mut self, err: PluginError) -> Option<PluginResult<Field<'a>>> {
        self.finished = true;
        Some(Err(err))
    }

    fn malformed(&self, err: &PluginError) -> PluginError {
        PluginError::MalformedPayload {
            offset: self.record_offset,
            reason: format!(
                "{} trailing bytes at content position {} do not form a field ({err})",
                self.content.len() - self.position,
                self.position
            ),
        }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = PluginResult<Field<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.position == self.content.len() {
            return None;
        }

        let mut length_override = None;
        loop {
            let window = &self.content[self.position..];
            if window.starts_with(Tag::GROUP.as_bytes()) {
                warn!(
                    "Group marker inside record at offset {} (content position {}), not descending",
                    self.record_offset, self.position
                );
                let err = PluginError::UnexpectedGroup {
                    offset: self.record_offset,
                    position: self.position,
                };
                return self.fail(err);
            }

            let field = match Field::parse_at(window, self.position, length_override) {
                Ok(field) => field,
                Err(err) => {
                    let err = self.malformed(&err);
                    return self.fail(err);
                }
            };
            self.position += field.encoded_len();

            if field.tag() == Tag::EXTENDED_SIZE && length_override.is_none() {
                match field.as_u32() {
                    Ok(len) => {
                        length_override = Some(len);
                        if self.position == self.content.len() {
                            let err = PluginError::MalformedPayload {
                                offset: self.record_offset,
                                reason: "XXXX field at end of content".to_string(),
                            };
                            return self.fail(err);
                        }
                        continue;
                    }
                    Err(err) => {
                        let err = self.malformed(&err);
                        return self.fail(err);
                    }
                }
            }

            return Some(Ok(field));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_parse_field() {
        let data = field(b"EDID", b"Ysolda\0");
        let parsed = Field::parse(&data).unwrap();
        assert_eq!(parsed.tag(), *b"EDID");
        assert_eq!(parsed.payload(), b"Ysolda\0");
        assert_eq!(parsed.encoded_len(), 13);
        assert_eq!(parsed.as_str_lossy(), "Ysolda");
    }

    #[test]
    fn test_parse_too_short() {
        assert!(matches!(
            Field::parse(b"EDI"),
            Err(PluginError::TruncatedInput {
                offset: 0,
                needed: 6,
                available: 3
            })
        ));
        // declared payload longer than the window
        assert!(matches!(
            Field::parse(b"EDID\x05\x00ab"),
            Err(PluginError::TruncatedInput {
                offset: 0,
                needed: 11,
                available: 8
            })
        ));
    }

    #[test]
    fn test_numeric_accessors() {
        let data = field(b"DATA", &[0x01, 0x00, 0x00, 0x80, 0xFF]);
        let parsed = Field::parse(&data).unwrap();
        assert_eq!(parsed.as_u8().unwrap(), 1);
        assert_eq!(parsed.as_u16().unwrap(), 1);
        assert_eq!(parsed.as_u32().unwrap(), 0x8000_0001);

        let data = field(b"HEDR", &1.7f32.to_le_bytes());
        assert!((Field::parse(&data).unwrap().as_f32().unwrap() - 1.7).abs() < f32::EPSILON);

        let data = field(b"DATA", &[1]);
        assert!(Field::parse(&data).unwrap().as_u32().is_err());
    }

    #[test]
    fn test_iterate_fields() {
        let mut content = field(b"EDID", b"Book\0");
        content.extend(field(b"FULL", b"Title\0"));
        content.extend(field(b"DESC", b""));

        let tags: Vec<Tag> = Fields::new(&content, 0)
            .map(|f| f.unwrap().tag())
            .collect();
        assert_eq!(
            tags,
            vec![Tag::new(*b"EDID"), Tag::new(*b"FULL"), Tag::new(*b"DESC")]
        );
    }

    #[test]
    fn test_short_payload_reports_its_position() {
        let mut content = field(b"EDID", b"Book\0");
        content.extend(field(b"DATA", &[1]));

        let fields: Vec<Field<'_>> = Fields::new(&content, 0).map(|f| f.unwrap()).collect();
        assert_eq!(fields[1].position(), 11);
        // payload starts after the 6-byte header
        assert!(matches!(
            fields[1].as_u32(),
            Err(PluginError::TruncatedInput {
                offset: 17,
                needed: 4,
                available: 1
            })
        ));
    }

    #[test]
    fn test_trailing_fragment_is_malformed() {
        let mut content = field(b"EDID", b"Book\0");
        content.extend_from_slice(b"FUL");

        let results: Vec<_> = Fields::new(&content, 1234).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(PluginError::MalformedPayload { offset: 1234, .. })
        ));
    }

    #[test]
    fn test_group_marker_in_fields_is_reported() {
        let mut content = field(b"EDID", b"Book\0");
        content.extend_from_slice(b"GRUP\x18\x00\x00\x00");

        let results: Vec<_> = Fields::new(&content, 50).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(PluginError::UnexpectedGroup {
                offset: 50,
                position: 11
            })
        ));
    }

    #[test]
    fn test_extended_size_field() {
        let big = vec![0xAB; 70_000];
        let mut content = field(b"XXXX", &(big.len() as u32).to_le_bytes());
        content.extend_from_slice(b"NVNM\x00\x00");
        content.extend_from_slice(&big);
        content.extend(field(b"EDID", b"x\0"));

        let fields: Vec<_> = Fields::new(&content, 0).map(Result::unwrap).collect();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].tag(), *b"NVNM");
        assert_eq!(fields[0].payload().len(), 70_000);
        assert_eq!(fields[1].tag(), *b"EDID");
    }

    #[test]
    fn test_restartable() {
        let content = field(b"EDID", b"a\0");
        let fields = Fields::new(&content, 0);
        assert_eq!(fields.clone().count(), 1);
        assert_eq!(fields.count(), 1);
    }
}
