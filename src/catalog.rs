//! The catalog store: an ordered list of [`Record`]s backed by a flat,
//! delimited text file.
//!
//! # File format
//!
//! One record per line, columns in the configured field order, separated by
//! the configured delimiter (default `|`). Unknown fields are written as
//! [`UNKNOWN`](crate::models::UNKNOWN). An optional header row carries the
//! field names. There is no quoting: a value containing the delimiter or a
//! line break cannot be stored, and neither can a known value spelled
//! `UNKNOWN` or a record without a key. [`Catalog::save`] refuses them
//! rather than writing a file that would not load back.
//!
//! # Invariants
//!
//! - insertion order is preserved
//! - the `isbn → position` index always matches the list
//! - [`Catalog::add`] does not reject duplicate keys; [`Catalog::add_strict`] does

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::CatalogConfig;
use crate::models::{Field, FieldValue, Record, UNKNOWN};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("catalog file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("catalog I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{}: header row does not match the configured field order", path.display())]
    BadHeader { path: PathBuf },

    #[error("cannot save record {isbn}: {field} contains the delimiter, a line break, or the word UNKNOWN")]
    Unencodable { isbn: String, field: Field },

    #[error("cannot save a record without a key (title: {title})")]
    MissingKey { title: String },

    #[error("a record with key {0} is already in the catalog")]
    DuplicateKey(String),

    #[error("no record with key {0} in the catalog")]
    NotFound(String),
}

/// Layout of the backing file.
#[derive(Debug, Clone)]
pub struct FileLayout {
    pub delimiter: u8,
    pub header: bool,
    pub fields: Vec<Field>,
}

impl Default for FileLayout {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            header: false,
            fields: Field::ALL.to_vec(),
        }
    }
}

impl From<&CatalogConfig> for FileLayout {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            delimiter: config.delimiter_byte(),
            header: config.header,
            fields: config.fields.clone(),
        }
    }
}

/// In-memory catalog bound to a backing file.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    layout: FileLayout,
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// An empty catalog that will be saved to `path`. Nothing is read.
    pub fn new(path: impl Into<PathBuf>, layout: FileLayout) -> Self {
        Self {
            path: path.into(),
            layout,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Read the catalog at `path`. A missing or malformed file is an error.
    pub fn open(path: impl Into<PathBuf>, layout: FileLayout) -> Result<Self, CatalogError> {
        let mut catalog = Self::new(path, layout);
        catalog.load()?;
        Ok(catalog)
    }

    /// Create an empty catalog file at `path`. Fails if the file exists.
    pub fn create(path: impl Into<PathBuf>, layout: FileLayout) -> Result<Self, CatalogError> {
        let catalog = Self::new(path, layout);
        if catalog.path.exists() {
            return Err(CatalogError::AlreadyExists(catalog.path.clone()));
        }
        catalog.save()?;
        Ok(catalog)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory records with the contents of the backing file.
    pub fn load(&mut self) -> Result<(), CatalogError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::Missing(self.path.clone()))
            }
            Err(e) => {
                return Err(CatalogError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let records = parse(&content, &self.layout, &self.path)?;
        self.records = records;
        self.reindex();
        info!(path = %self.path.display(), count = self.records.len(), "catalog loaded");
        Ok(())
    }

    /// Write every record to the backing file.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a crash mid-write leaves the previous version intact.
    pub fn save(&self) -> Result<(), CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: self.path.clone(),
            source,
        };

        let bytes = serialize(&self.records, &self.layout).map_err(|e| match e {
            SerializeError::Record(e) => e,
            SerializeError::Io(e) => io_err(e),
        })?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        info!(path = %self.path.display(), count = self.records.len(), "catalog saved");
        Ok(())
    }

    /// Append a record. Duplicate keys are accepted; the index then points
    /// at the newest entry.
    pub fn add(&mut self, record: Record) {
        debug!(isbn = %record.isbn, "adding record");
        self.index.insert(record.isbn.clone(), self.records.len());
        self.records.push(record);
    }

    /// Append a record unless its key is already present.
    pub fn add_strict(&mut self, record: Record) -> Result<(), CatalogError> {
        if self.contains(&record.isbn) {
            return Err(CatalogError::DuplicateKey(record.isbn));
        }
        self.add(record);
        Ok(())
    }

    /// Record for `isbn`, if any.
    pub fn exists(&self, isbn: &str) -> Option<&Record> {
        self.index.get(isbn).map(|&i| &self.records[i])
    }

    pub fn contains(&self, isbn: &str) -> bool {
        self.index.contains_key(isbn)
    }

    /// Remove the first entry equal to `record`. Returns `false` if none.
    pub fn remove(&mut self, record: &Record) -> bool {
        match self.records.iter().position(|r| r == record) {
            Some(pos) => {
                self.remove_at(pos);
                true
            }
            None => false,
        }
    }

    /// Like [`remove`](Catalog::remove), but absence is an error.
    pub fn remove_strict(&mut self, record: &Record) -> Result<(), CatalogError> {
        if self.remove(record) {
            Ok(())
        } else {
            Err(CatalogError::NotFound(record.isbn.clone()))
        }
    }

    /// Remove the first entry with key `isbn`, returning it.
    pub fn remove_isbn(&mut self, isbn: &str) -> Option<Record> {
        let pos = self.records.iter().position(|r| r.isbn == isbn)?;
        Some(self.remove_at(pos))
    }

    /// Overwrite the record at `pos` (insertion order is kept) and return
    /// the previous one. `None`, and no change, if `pos` is out of range.
    pub fn replace_at(&mut self, pos: usize, record: Record) -> Option<Record> {
        let slot = self.records.get_mut(pos)?;
        let previous = std::mem::replace(slot, record);
        self.reindex();
        Some(previous)
    }

    pub fn get(&self, pos: usize) -> Option<&Record> {
        self.records.get(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn remove_at(&mut self, pos: usize) -> Record {
        let removed = self.records.remove(pos);
        debug!(isbn = %removed.isbn, "removed record");
        self.reindex();
        removed
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, r) in self.records.iter().enumerate() {
            self.index.insert(r.isbn.clone(), i);
        }
    }
}

fn parse(content: &str, layout: &FileLayout, path: &Path) -> Result<Vec<Record>, CatalogError> {
    let malformed = |line: u64, reason: String| CatalogError::Malformed {
        path: path.to_path_buf(),
        line: line as usize,
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(layout.delimiter)
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    let mut header_pending = layout.header;

    for row in reader.records() {
        let row = row.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            malformed(line, e.to_string())
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.len() == 1 && row[0].trim().is_empty() {
            continue;
        }

        if header_pending {
            header_pending = false;
            let expected = layout.fields.iter().map(|f| f.name());
            if !row.iter().eq(expected) {
                return Err(CatalogError::BadHeader {
                    path: path.to_path_buf(),
                });
            }
            continue;
        }

        if row.len() != layout.fields.len() {
            return Err(malformed(
                line,
                format!(
                    "expected {} columns, found {}",
                    layout.fields.len(),
                    row.len()
                ),
            ));
        }

        let mut record = Record::new("");
        for (field, text) in layout.fields.iter().zip(row.iter()) {
            if *field == Field::Isbn {
                if text.is_empty() || text == UNKNOWN {
                    return Err(malformed(line, "missing isbn".to_string()));
                }
                record.isbn = text.to_string();
            } else {
                record.set(*field, FieldValue::parse(text));
            }
        }
        records.push(record);
    }

    Ok(records)
}

enum SerializeError {
    Record(CatalogError),
    Io(std::io::Error),
}

impl From<csv::Error> for SerializeError {
    fn from(e: csv::Error) -> Self {
        SerializeError::Io(e.into())
    }
}

fn serialize(records: &[Record], layout: &FileLayout) -> Result<Vec<u8>, SerializeError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(layout.delimiter)
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if layout.header {
        writer.write_record(layout.fields.iter().map(|f| f.name()))?;
    }

    let delimiter = char::from(layout.delimiter);
    for record in records {
        if record.isbn.trim().is_empty() || record.isbn == UNKNOWN {
            return Err(SerializeError::Record(CatalogError::MissingKey {
                title: record.title.as_str().to_string(),
            }));
        }

        let mut columns = Vec::with_capacity(layout.fields.len());
        for &field in &layout.fields {
            let value = record.get(field);
            let text = value.as_str();
            let reserved = field != Field::Isbn && value.as_known() == Some(UNKNOWN);
            if reserved || text.contains(delimiter) || text.contains('\n') || text.contains('\r') {
                return Err(SerializeError::Record(CatalogError::Unencodable {
                    isbn: record.isbn.clone(),
                    field,
                }));
            }
            columns.push(text.to_string());
        }
        writer.write_record(&columns)?;
    }

    writer
        .into_inner()
        .map_err(|e| SerializeError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(isbn: &str, title: &str) -> Record {
        Record::new(isbn)
            .with(Field::Title, title)
            .with(Field::Author, "Someone")
    }

    #[test]
    fn test_add_and_exists() {
        let mut c = Catalog::new("unused.csv", FileLayout::default());
        assert!(c.is_empty());
        c.add(Record::new("1111"));
        assert_eq!(c.exists("1111"), Some(&Record::new("1111")));
        assert!(c.exists("2222").is_none());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_add_allows_duplicates() {
        let mut c = Catalog::new("unused.csv", FileLayout::default());
        c.add(sample("1", "First"));
        c.add(sample("1", "Second"));
        assert_eq!(c.len(), 2);
        assert_eq!(c.exists("1").unwrap().title, FieldValue::known("Second"));
    }

    #[test]
    fn test_add_strict_rejects_duplicates() {
        let mut c = Catalog::new("unused.csv", FileLayout::default());
        c.add_strict(sample("1", "First")).unwrap();
        let err = c.add_strict(sample("1", "Second")).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(k) if k == "1"));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_remove_first_equal_and_reindex() {
        let mut c = Catalog::new("unused.csv", FileLayout::default());
        c.add(sample("1", "First"));
        c.add(sample("2", "Other"));
        c.add(sample("1", "Second"));
        assert!(c.remove(&sample("1", "Second")));
        assert_eq!(c.len(), 2);
        assert_eq!(c.exists("1").unwrap().title, FieldValue::known("First"));
        assert_eq!(c.exists("2").unwrap().title, FieldValue::known("Other"));
    }

    #[test]
    fn test_remove_absent_is_silent() {
        let mut c = Catalog::new("unused.csv", FileLayout::default());
        c.add(sample("1", "First"));
        assert!(!c.remove(&sample("1", "Different")));
        assert_eq!(c.len(), 1);
        assert!(matches!(
            c.remove_strict(&sample("9", "x")),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_isbn() {
        let mut c = Catalog::new("unused.csv", FileLayout::default());
        c.add(sample("1", "First"));
        c.add(sample("2", "Other"));
        let removed = c.remove_isbn("1").unwrap();
        assert_eq!(removed.title, FieldValue::known("First"));
        assert!(!c.contains("1"));
        assert_eq!(c.exists("2").unwrap().isbn, "2");
        assert!(c.remove_isbn("1").is_none());
    }

    #[test]
    fn test_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        let mut c = Catalog::new(&path, FileLayout::default());
        c.add(sample("9780004704814", "Sample Book"));
        c.add(Record::new("0006174280").with(Field::Title, ""));
        c.add(sample("2", "Third"));
        c.save().unwrap();

        let loaded = Catalog::open(&path, FileLayout::default()).unwrap();
        assert_eq!(loaded.records(), c.records());
        assert_eq!(loaded.get(1).unwrap().title, FieldValue::known(""));
    }

    #[test]
    fn test_round_trip_with_header_and_custom_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.txt");
        let mut fields = Field::ALL.to_vec();
        fields.reverse();
        let layout = FileLayout {
            delimiter: b';',
            header: true,
            fields,
        };
        let mut c = Catalog::new(&path, layout.clone());
        c.add(sample("1", "One"));
        c.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("usedPrice;binding;"));

        let loaded = Catalog::open(&path, layout).unwrap();
        assert_eq!(loaded.records(), c.records());
    }

    #[test]
    fn test_unknown_written_as_sentinel() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        let mut c = Catalog::new(&path, FileLayout::default());
        c.add(Record::new("1"));
        c.save().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), format!("1{}", "|UNKNOWN".repeat(9)));
    }

    #[test]
    fn test_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = Catalog::open(tmp.path().join("nope.csv"), FileLayout::default()).unwrap_err();
        assert!(matches!(err, CatalogError::Missing(_)));
    }

    #[test]
    fn test_malformed_row_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        let good = format!("1{}", "|UNKNOWN".repeat(9));
        std::fs::write(&path, format!("{}\n\n2|only|three\n", good)).unwrap();
        let err = Catalog::open(&path, FileLayout::default()).unwrap_err();
        match err {
            CatalogError::Malformed { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_isbn_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        std::fs::write(&path, format!("{}\n", "|UNKNOWN".repeat(9))).unwrap();
        assert!(matches!(
            Catalog::open(&path, FileLayout::default()),
            Err(CatalogError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_header_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        std::fs::write(&path, "title|isbn\n").unwrap();
        let layout = FileLayout {
            header: true,
            ..FileLayout::default()
        };
        assert!(matches!(
            Catalog::open(&path, layout),
            Err(CatalogError::BadHeader { .. })
        ));
    }

    #[test]
    fn test_delimiter_in_value_refused_on_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        let mut c = Catalog::new(&path, FileLayout::default());
        c.add(sample("1", "Either|Or"));
        let err = c.save().unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Unencodable { field: Field::Title, .. }
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_known_unknown_word_refused_on_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        let mut c = Catalog::new(&path, FileLayout::default());
        c.add(sample("1", UNKNOWN));
        assert!(matches!(
            c.save(),
            Err(CatalogError::Unencodable { field: Field::Title, .. })
        ));
    }

    #[test]
    fn test_empty_key_refused_on_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        std::fs::write(&path, format!("1{}\n", "|UNKNOWN".repeat(9))).unwrap();

        let mut c = Catalog::open(&path, FileLayout::default()).unwrap();
        c.add(Record::new("").with(Field::Title, "T"));
        assert!(matches!(c.save(), Err(CatalogError::MissingKey { .. })));

        let reopened = Catalog::open(&path, FileLayout::default()).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_replace_at() {
        let mut c = Catalog::new("unused.csv", FileLayout::default());
        c.add(sample("1", "First"));
        let previous = c.replace_at(0, sample("2", "Second")).unwrap();
        assert_eq!(previous.isbn, "1");
        assert!(c.contains("2"));
        assert!(!c.contains("1"));
        assert!(c.replace_at(5, sample("3", "Third")).is_none());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_quote_characters_are_literal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        let mut c = Catalog::new(&path, FileLayout::default());
        c.add(sample("1", "The \"Gem\" Guide, 2nd ed."));
        c.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("|The \"Gem\" Guide, 2nd ed.|"));
        let loaded = Catalog::open(&path, FileLayout::default()).unwrap();
        assert_eq!(loaded.records(), c.records());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        let mut c = Catalog::create(&path, FileLayout::default()).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        c.add(sample("1", "One"));
        c.save().unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("library.csv");
        let c = Catalog::create(&path, FileLayout::default()).unwrap();
        assert!(c.is_empty());
        assert!(path.exists());
        assert!(matches!(
            Catalog::create(&path, FileLayout::default()),
            Err(CatalogError::AlreadyExists(_))
        ));
    }
}
