//! Integration tests for the `Source` trait.
//!
//! These tests prove that custom sources plugged into a `SourceRegistry`
//! work end-to-end through the resolution engine and the catalog file.

use anyhow::{bail, Result};
use booksearch::catalog::{Catalog, FileLayout};
use booksearch::conflict::{KeepExisting, KeepIncoming};
use booksearch::engine::{requery, LookupOptions, ResolutionEngine};
use booksearch::models::{Field, FieldValue, Mode, PartialRecord, Record};
use booksearch::traits::{Source, SourceRegistry};
use std::collections::HashMap;
use tempfile::TempDir;

const BIRDS: &str = "9780004704814";
const TREES: &str = "0002199807";

// ─── Test Source ────────────────────────────────────────────────────

/// A shelf of canned answers keyed by lookup key.
struct InMemorySource {
    name: &'static str,
    books: HashMap<String, PartialRecord>,
}

impl InMemorySource {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            books: HashMap::new(),
        }
    }

    fn with(mut self, key: &str, data: PartialRecord) -> Self {
        self.books.insert(key.to_string(), data);
        self
    }
}

impl Source for InMemorySource {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "In-memory test source"
    }

    fn fetch(&self, key: &str, _mode: Mode) -> Result<PartialRecord> {
        match self.books.get(key) {
            Some(data) => Ok(data.clone()),
            None => bail!("{} has no entry for {}", self.name, key),
        }
    }
}

/// A source that only answers LCCN lookups and rekeys to the ISBN-13.
struct LccnOnly;

impl Source for LccnOnly {
    fn name(&self) -> &str {
        "lccn-only"
    }

    fn description(&self) -> &str {
        "LCCN test source"
    }

    fn supports(&self, mode: Mode) -> bool {
        mode == Mode::Lccn
    }

    fn fetch(&self, key: &str, _mode: Mode) -> Result<PartialRecord> {
        Ok(PartialRecord::new()
            .with(Field::Isbn, BIRDS)
            .with(Field::Isbn13, BIRDS)
            .with(Field::Lccn, key)
            .with(Field::Title, "Birds"))
    }
}

fn two_sources() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(
        Box::new(
            InMemorySource::new("first")
                .with(
                    BIRDS,
                    PartialRecord::new()
                        .with(Field::Title, "Collins Gem Birds")
                        .with(Field::Binding, "Paperback")
                        .with(Field::Author, FieldValue::Unknown),
                )
                .with(TREES, PartialRecord::new().with(Field::Title, "Trees")),
        ),
        &[Mode::Isbn],
    );
    registry.register(
        Box::new(
            InMemorySource::new("second").with(
                BIRDS,
                PartialRecord::new()
                    .with(Field::Title, "Birds: Collins Gem")
                    .with(Field::Author, "Peter Holden")
                    .with(Field::Publisher, "Collins"),
            ),
        ),
        &[Mode::Isbn],
    );
    registry
}

fn temp_catalog(tmp: &TempDir) -> Catalog {
    Catalog::create(tmp.path().join("library.csv"), FileLayout::default()).unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[test]
fn test_overwrite_lookup_saved_and_reloaded() {
    let tmp = TempDir::new().unwrap();
    let registry = two_sources();
    let engine = ResolutionEngine::new(&registry, LookupOptions::default());

    let resolution = engine
        .resolve(BIRDS, Mode::Isbn, &mut KeepIncoming, None)
        .unwrap();
    assert_eq!(resolution.queried, vec!["first", "second"]);
    assert!(resolution.satisfied);

    let record = resolution.record;
    assert_eq!(record.title, FieldValue::known("Birds: Collins Gem"));
    assert_eq!(record.author, FieldValue::known("Peter Holden"));
    assert_eq!(record.binding, FieldValue::known("Paperback"));

    let mut catalog = temp_catalog(&tmp);
    catalog.add(record.clone());
    catalog.save().unwrap();

    let reopened = Catalog::open(tmp.path().join("library.csv"), FileLayout::default()).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.exists(BIRDS), Some(&record));
}

#[test]
fn test_fill_lookup_keeps_first_values_with_keep_existing() {
    let registry = two_sources();
    let engine = ResolutionEngine::new(
        &registry,
        LookupOptions {
            fill: true,
            ..LookupOptions::default()
        },
    );

    let record = engine
        .resolve(BIRDS, Mode::Isbn, &mut KeepExisting, None)
        .unwrap()
        .record;
    assert_eq!(record.title, FieldValue::known("Collins Gem Birds"));
    assert_eq!(record.author, FieldValue::known("Peter Holden"));
    assert_eq!(record.publisher, FieldValue::known("Collins"));
}

#[test]
fn test_fill_lookup_records_conflicts() {
    let registry = two_sources();
    let engine = ResolutionEngine::new(
        &registry,
        LookupOptions {
            fill: true,
            ..LookupOptions::default()
        },
    );

    let mut seen = Vec::new();
    let mut resolver = |field: Field, current: &str, incoming: &str| {
        seen.push((field, current.to_string(), incoming.to_string()));
        incoming.to_string()
    };
    let record = engine
        .resolve(BIRDS, Mode::Isbn, &mut resolver, None)
        .unwrap()
        .record;

    assert_eq!(
        seen,
        vec![(
            Field::Title,
            "Collins Gem Birds".to_string(),
            "Birds: Collins Gem".to_string()
        )]
    );
    assert_eq!(record.title, FieldValue::known("Birds: Collins Gem"));
}

#[test]
fn test_unknown_book_everywhere_is_all_unknown() {
    let registry = two_sources();
    let engine = ResolutionEngine::new(&registry, LookupOptions::default());

    let resolution = engine
        .resolve("0-306-40615-2", Mode::Isbn, &mut KeepIncoming, None)
        .unwrap();
    assert_eq!(resolution.record.isbn, "0306406152");
    assert_eq!(resolution.record.unknown_fields().len(), Field::ALL.len() - 1);
    assert!(!resolution.satisfied);
}

#[test]
fn test_lccn_lookup_skips_isbn_only_sources_and_rekeys() {
    let mut registry = two_sources();
    registry.register(Box::new(LccnOnly), &Mode::ALL);
    assert_eq!(registry.sources_for(Mode::Lccn).len(), 1);

    let engine = ResolutionEngine::new(&registry, LookupOptions::default());
    let resolution = engine
        .resolve("85-2", Mode::Lccn, &mut KeepIncoming, None)
        .unwrap();
    assert_eq!(resolution.queried, vec!["lccn-only"]);
    assert_eq!(resolution.record.isbn, BIRDS);
    assert_eq!(resolution.record.lccn, FieldValue::known("85000002"));
}

#[test]
fn test_requery_fills_catalog_and_persists() {
    let tmp = TempDir::new().unwrap();
    let registry = two_sources();
    let engine = ResolutionEngine::new(&registry, LookupOptions::default());

    let mut catalog = temp_catalog(&tmp);
    catalog.add(Record::new(BIRDS).with(Field::Title, "My Birds"));
    catalog.add(Record::new(TREES));
    catalog.save().unwrap();

    let mut catalog = Catalog::open(tmp.path().join("library.csv"), FileLayout::default()).unwrap();
    let report = requery(&engine, &mut catalog, &mut KeepExisting);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.improved, 2);
    catalog.save().unwrap();

    let reopened = Catalog::open(tmp.path().join("library.csv"), FileLayout::default()).unwrap();
    let birds = reopened.exists(BIRDS).unwrap();
    assert_eq!(birds.title, FieldValue::known("My Birds"));
    assert_eq!(birds.author, FieldValue::known("Peter Holden"));
    assert_eq!(birds.binding, FieldValue::known("Paperback"));
    assert_eq!(reopened.exists(TREES).unwrap().title, FieldValue::known("Trees"));
}
