//! Core data models used throughout booksearch.
//!
//! A [`Record`] is the canonical book entry stored in the catalog. Every
//! descriptive field carries a [`FieldValue`], which is either a concrete
//! value or [`FieldValue::Unknown`]: "checked, value not determined". An
//! unknown field is never the same thing as an empty string.
//!
//! Sources report their findings as a [`PartialRecord`], a sparse map that
//! is merged into a working record with either [`Record::update`]
//! (overwrite) or [`Record::update_unknowns`] (fill).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::traits::ConflictResolver;

/// Text written to the catalog file for an unknown field.
pub const UNKNOWN: &str = "UNKNOWN";

/// Lookup mode. Selects both the key validation rules and the source list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Isbn,
    Lccn,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Isbn, Mode::Lccn];

    /// Lowercase name used in config files and on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            Mode::Isbn => "isbn",
            Mode::Lccn => "lccn",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Isbn => write!(f, "ISBN"),
            Mode::Lccn => write!(f, "LCCN"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isbn" => Ok(Mode::Isbn),
            "lccn" => Ok(Mode::Lccn),
            other => Err(format!("unknown mode '{}': expected isbn or lccn", other)),
        }
    }
}

/// The fixed field set of a [`Record`], in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Isbn,
    Isbn10,
    Isbn13,
    Lccn,
    Title,
    Author,
    Publisher,
    Published,
    Binding,
    UsedPrice,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Isbn,
        Field::Isbn10,
        Field::Isbn13,
        Field::Lccn,
        Field::Title,
        Field::Author,
        Field::Publisher,
        Field::Published,
        Field::Binding,
        Field::UsedPrice,
    ];

    /// Name used in the catalog header, config files, and JSON export.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Isbn => "isbn",
            Field::Isbn10 => "isbn10",
            Field::Isbn13 => "isbn13",
            Field::Lccn => "lccn",
            Field::Title => "title",
            Field::Author => "author",
            Field::Publisher => "publisher",
            Field::Published => "published",
            Field::Binding => "binding",
            Field::UsedPrice => "usedPrice",
        }
    }

    /// Human-readable label for prompts and listings.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Isbn => "ISBN",
            Field::Isbn10 => "ISBN-10",
            Field::Isbn13 => "ISBN-13",
            Field::Lccn => "LCCN",
            Field::Title => "Title",
            Field::Author => "Author",
            Field::Publisher => "Publisher",
            Field::Published => "Published",
            Field::Binding => "Binding",
            Field::UsedPrice => "Used price",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}

impl<'de> serde::Deserialize<'de> for Field {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Value of a single record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FieldValue {
    Known(String),
    #[default]
    Unknown,
}

impl FieldValue {
    pub fn known(value: impl Into<String>) -> Self {
        FieldValue::Known(value.into())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldValue::Unknown)
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            FieldValue::Known(v) => Some(v),
            FieldValue::Unknown => None,
        }
    }

    /// Text form used in the catalog file.
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Known(v) => v,
            FieldValue::Unknown => UNKNOWN,
        }
    }

    /// Inverse of [`as_str`](FieldValue::as_str).
    pub fn parse(text: &str) -> Self {
        if text == UNKNOWN {
            FieldValue::Unknown
        } else {
            FieldValue::Known(text.to_string())
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Known(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Known(value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Known(v) => serializer.serialize_str(v),
            FieldValue::Unknown => serializer.serialize_none(),
        }
    }
}

/// Sparse field → value mapping produced by one source fetch.
///
/// Absent fields are left alone by the merge; fields present as
/// [`FieldValue::Unknown`] mean the source looked and found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialRecord {
    fields: BTreeMap<Field, FieldValue>,
}

impl PartialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](PartialRecord::set).
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) {
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.fields.iter().map(|(f, v)| (*f, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A catalog entry.
///
/// `isbn` is the primary key and is always set; it is never unknown. All
/// other fields start out [`FieldValue::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub isbn: String,
    pub isbn10: FieldValue,
    pub isbn13: FieldValue,
    pub lccn: FieldValue,
    pub title: FieldValue,
    pub author: FieldValue,
    pub publisher: FieldValue,
    pub published: FieldValue,
    pub binding: FieldValue,
    pub used_price: FieldValue,
}

impl Record {
    pub fn new(isbn: impl Into<String>) -> Self {
        Self {
            isbn: isbn.into(),
            isbn10: FieldValue::Unknown,
            isbn13: FieldValue::Unknown,
            lccn: FieldValue::Unknown,
            title: FieldValue::Unknown,
            author: FieldValue::Unknown,
            publisher: FieldValue::Unknown,
            published: FieldValue::Unknown,
            binding: FieldValue::Unknown,
            used_price: FieldValue::Unknown,
        }
    }

    /// Builder-style [`set`](Record::set).
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Read a field. `Field::Isbn` is always known.
    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::Isbn => FieldValue::Known(self.isbn.clone()),
            other => self.slot(other).clone(),
        }
    }

    /// Overwrite a field. Setting `Field::Isbn` to unknown or to a blank
    /// string is ignored: the key of a record cannot be erased.
    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) {
        let value = value.into();
        match field {
            Field::Isbn => {
                if let FieldValue::Known(isbn) = value {
                    let isbn = isbn.trim();
                    if !isbn.is_empty() && isbn != UNKNOWN {
                        self.isbn = isbn.to_string();
                    }
                }
            }
            other => *self.slot_mut(other) = value,
        }
    }

    /// Overwrite every field named in `data` (overwrite mode).
    pub fn update(&mut self, data: &PartialRecord) {
        for (field, value) in data.iter() {
            self.set(field, value.clone());
        }
    }

    /// Merge `data` into the record, only filling gaps (fill mode).
    ///
    /// - current unknown: take the incoming value
    /// - equal values, or incoming unknown: keep the current value
    /// - two different known values: ask `resolver`
    pub fn update_unknowns(&mut self, data: &PartialRecord, resolver: &mut dyn ConflictResolver) {
        for (field, incoming) in data.iter() {
            let current = self.get(field);
            match (&current, incoming) {
                (_, FieldValue::Unknown) => {}
                (FieldValue::Unknown, known) => self.set(field, known.clone()),
                (FieldValue::Known(a), FieldValue::Known(b)) if a == b => {}
                (FieldValue::Known(a), FieldValue::Known(b)) => {
                    let chosen = resolver.resolve(field, a, b);
                    self.set(field, chosen);
                }
            }
        }
    }

    pub fn has_unknowns(&self) -> bool {
        Field::ALL.iter().any(|f| self.get(*f).is_unknown())
    }

    /// Fields that are still unknown, in canonical order.
    pub fn unknown_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_unknown())
            .collect()
    }

    fn slot(&self, field: Field) -> &FieldValue {
        match field {
            Field::Isbn10 => &self.isbn10,
            Field::Isbn13 => &self.isbn13,
            Field::Lccn => &self.lccn,
            Field::Title => &self.title,
            Field::Author => &self.author,
            Field::Publisher => &self.publisher,
            Field::Published => &self.published,
            Field::Binding => &self.binding,
            Field::UsedPrice => &self.used_price,
            Field::Isbn => unreachable!("isbn is stored as a plain key"),
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut FieldValue {
        match field {
            Field::Isbn10 => &mut self.isbn10,
            Field::Isbn13 => &mut self.isbn13,
            Field::Lccn => &mut self.lccn,
            Field::Title => &mut self.title,
            Field::Author => &mut self.author,
            Field::Publisher => &mut self.publisher,
            Field::Published => &mut self.published,
            Field::Binding => &mut self.binding,
            Field::UsedPrice => &mut self.used_price,
            Field::Isbn => unreachable!("isbn is stored as a plain key"),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in Field::ALL {
            writeln!(f, "{:<11} {}", format!("{}:", field.label()), self.get(field))?;
        }
        Ok(())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(Field::ALL.len()))?;
        for field in Field::ALL {
            map.serialize_entry(field.name(), &self.get(field))?;
        }
        map.end()
    }
}
