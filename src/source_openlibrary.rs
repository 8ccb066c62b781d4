//! openlibrary.org source.
//!
//! Queries the Open Library books API
//! (`/api/books?bibkeys=ISBN:<key>&format=json&jscmd=data`) and maps the
//! JSON response onto record fields. Supports both ISBN and LCCN lookups.
//!
//! | JSON | Field |
//! |------|-------|
//! | `title` + `subtitle` | `title` (`"title : subtitle"`) |
//! | `authors[].name` | `author` (joined with `;`) |
//! | `publishers[].name` | `publisher` (joined with `;`) |
//! | `publish_date` | `published` |
//! | `identifiers.isbn_10/isbn_13/lccn` | `isbn10`, `isbn13`, `lccn` |
//!
//! Binding and used price are not part of the schema and are never reported.
//! In LCCN mode a reported ISBN-13 becomes the record key.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::models::{Field, FieldValue, Mode, PartialRecord};
use crate::traits::Source;

/// Provenance name of this source.
pub const NAME: &str = "openlibrary.org";

pub struct OpenLibrarySource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OpenLibrarySource {
    pub fn new(base_url: String, client: reqwest::blocking::Client) -> Self {
        Self { base_url, client }
    }
}

impl Source for OpenLibrarySource {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Open Library books API (JSON)"
    }

    fn fetch(&self, key: &str, mode: Mode) -> Result<PartialRecord> {
        let bibkey = format!("{}:{}", mode, key);
        debug!(url = %self.base_url, %bibkey, "querying openlibrary");

        let body = self
            .client
            .get(&self.base_url)
            .query(&[("bibkeys", bibkey.as_str()), ("format", "json"), ("jscmd", "data")])
            .send()
            .with_context(|| format!("request to {} failed", self.base_url))?
            .error_for_status()?
            .text()?;

        parse_books_response(&body, mode)
    }
}

#[derive(Debug, Deserialize)]
struct BookData {
    title: Option<String>,
    subtitle: Option<String>,
    #[serde(default)]
    authors: Vec<Named>,
    #[serde(default)]
    publishers: Vec<Named>,
    publish_date: Option<String>,
    #[serde(default)]
    identifiers: Identifiers,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize, Default)]
struct Identifiers {
    #[serde(default)]
    isbn_10: Vec<String>,
    #[serde(default)]
    isbn_13: Vec<String>,
    #[serde(default)]
    lccn: Vec<String>,
}

/// Map a books API response body onto record fields.
///
/// An empty object means the key is unknown to Open Library: only the
/// title is reported, as unknown.
pub fn parse_books_response(body: &str, mode: Mode) -> Result<PartialRecord> {
    let books: BTreeMap<String, BookData> =
        serde_json::from_str(body).context("malformed openlibrary response")?;

    let Some(book) = books.into_values().next() else {
        debug!("key not found at openlibrary");
        return Ok(PartialRecord::new().with(Field::Title, FieldValue::Unknown));
    };

    let mut data = PartialRecord::new();

    let title = match (non_empty(book.title), non_empty(book.subtitle)) {
        (Some(t), Some(s)) => FieldValue::Known(format!("{} : {}", t, s)),
        (Some(t), None) => FieldValue::Known(t),
        (None, _) => FieldValue::Unknown,
    };
    data.set(Field::Title, title);
    data.set(Field::Author, join_names(&book.authors));
    data.set(Field::Publisher, join_names(&book.publishers));
    data.set(Field::Published, optional(non_empty(book.publish_date)));

    let ids = book.identifiers;
    let isbn13 = last_non_empty(&ids.isbn_13);
    data.set(Field::Isbn10, optional(last_non_empty(&ids.isbn_10)));
    data.set(Field::Isbn13, optional(isbn13.clone()));
    data.set(Field::Lccn, optional(last_non_empty(&ids.lccn)));

    if mode == Mode::Lccn {
        if let Some(isbn13) = isbn13 {
            data.set(Field::Isbn, isbn13);
        }
    }

    Ok(data)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn last_non_empty(values: &[String]) -> Option<String> {
    values
        .iter()
        .rev()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn optional(value: Option<String>) -> FieldValue {
    value.map(FieldValue::Known).unwrap_or(FieldValue::Unknown)
}

fn join_names(names: &[Named]) -> FieldValue {
    let joined = names
        .iter()
        .map(|n| n.name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    if joined.is_empty() {
        FieldValue::Unknown
    } else {
        FieldValue::Known(joined)
    }
}
