//! Typed views over loaded records
//!
//! Views only read fields through the generic [`Record`] accessors; they
//! never change how a record is decoded. [`RecordKind::classify`] picks the
//! view that matches a record's type tag.

use super::error::{PluginError, PluginResult};
use super::field::Field;
use super::header::PluginHeader;
use super::record::Record;
use super::tag::Tag;

const ACBS: Tag = Tag::new(*b"ACBS");
const FULL: Tag = Tag::new(*b"FULL");
const DESC: Tag = Tag::new(*b"DESC");

/// Text stored either inline or as an id into a string table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizedText {
    /// NUL-terminated text stored in the field
    Inline(String),
    /// Id resolved through the plugin's `.strings`, `.dlstrings` or `.ilstrings` table
    Id(u32),
}

impl LocalizedText {
    /// Interpret a text field of a plugin that is (or is not) localized
    pub fn from_field(field: &Field<'_>, localized: bool) -> PluginResult<Self> {
        if localized {
            Ok(Self::Id(field.as_u32()?))
        } else {
            Ok(Self::Inline(field.as_str_lossy().into_owned()))
        }
    }
}

/// A typed view over one record type
pub trait RecordView<'a>: Sized {
    /// Type tag the view applies to
    const RECORD_TYPE: Tag;

    /// Wrap a record without checking its type
    fn wrap(record: &'a Record, localized: bool) -> Self;

    /// Underlying record
    fn record(&self) -> &'a Record;

    /// Wrap a record if its type matches
    fn try_from_record(record: &'a Record) -> Option<Self> {
        (record.record_type() == Self::RECORD_TYPE).then(|| Self::wrap(record, false))
    }

    /// Editor identifier
    fn editor_id(&self) -> PluginResult<Option<String>> {
        self.record().editor_id()
    }
}

/// Non-player character (`NPC_`)
#[derive(Debug, Clone, Copy)]
pub struct Npc<'a> {
    record: &'a Record,
}

impl<'a> RecordView<'a> for Npc<'a> {
    const RECORD_TYPE: Tag = Tag::new(*b"NPC_");

    fn wrap(record: &'a Record, _localized: bool) -> Self {
        Self { record }
    }

    fn record(&self) -> &'a Record {
        self.record
    }
}

impl Npc<'_> {
    /// Female flag (`ACBS` bit 0)
    pub fn is_female(&self) -> PluginResult<bool> {
        Ok(self.base_flags()? & 0x1 != 0)
    }

    /// Essential flag (`ACBS` bit 1)
    pub fn is_essential(&self) -> PluginResult<bool> {
        Ok(self.base_flags()? & 0x2 != 0)
    }

    fn base_flags(&self) -> PluginResult<u32> {
        self.record
            .first_field(ACBS)?
            .ok_or_else(|| PluginError::MalformedPayload {
                offset: self.record.offset(),
                reason: "NPC_ record has no ACBS field".to_string(),
            })?
            .as_u32()
    }
}

/// Book (`BOOK`)
#[derive(Debug, Clone, Copy)]
pub struct Book<'a> {
    record: &'a Record,
    localized: bool,
}

impl<'a> RecordView<'a> for Book<'a> {
    const RECORD_TYPE: Tag = Tag::new(*b"BOOK");

    fn wrap(record: &'a Record, localized: bool) -> Self {
        Self { record, localized }
    }

    fn record(&self) -> &'a Record {
        self.record
    }
}

impl Book<'_> {
    /// Display name (`FULL`)
    pub fn full_name(&self) -> PluginResult<Option<LocalizedText>> {
        self.text(FULL)
    }

    /// Book text (`DESC`)
    pub fn description(&self) -> PluginResult<Option<LocalizedText>> {
        self.text(DESC)
    }

    fn text(&self, tag: Tag) -> PluginResult<Option<LocalizedText>> {
        self.record
            .first_field(tag)?
            .map(|field| LocalizedText::from_field(&field, self.localized))
            .transpose()
    }
}

/// Record paired with the view for its type
#[derive(Debug, Clone, Copy)]
pub enum RecordKind<'a> {
    /// `NPC_`
    Npc(Npc<'a>),
    /// `BOOK`
    Book(Book<'a>),
    /// Any type without a dedicated view
    Other(&'a Record),
}

impl<'a> RecordKind<'a> {
    /// Select the view for a record, treating text fields as inline
    pub fn classify(record: &'a Record) -> Self {
        Self::classify_localized(record, false)
    }

    /// Select the view for a record of the plugin described by `header`
    pub fn classify_in(record: &'a Record, header: &PluginHeader) -> Self {
        Self::classify_localized(record, header.is_localized)
    }

    fn classify_localized(record: &'a Record, localized: bool) -> Self {
        let record_type = record.record_type();
        if record_type == Npc::RECORD_TYPE {
            Self::Npc(Npc::wrap(record, localized))
        } else if record_type == Book::RECORD_TYPE {
            Self::Book(Book::wrap(record, localized))
        } else {
            Self::Other(record)
        }
    }

    /// Underlying record
    pub fn record(&self) -> &'a Record {
        match self {
            Self::Npc(view) => view.record(),
            Self::Book(view) => view.record(),
            Self::Other(record) => record,
        }
    }
}
