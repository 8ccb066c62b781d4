//! Extension traits for lookup sources and the presentation layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             SourceRegistry               │
//! │  ┌────────────┐ ┌──────────┐ ┌────────┐  │
//! │  │isbnsearch  │ │openlib.  │ │ Custom │  │
//! │  │  (HTML)    │ │  (JSON)  │ │ (Rust) │  │
//! │  └────────────┘ └──────────┘ └────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼   ordered per Mode
//!         ResolutionEngine::resolve()
//!                │
//!        ConflictResolver / Prompter
//!          (console, GUI, tests)
//! ```
//!
//! A [`Source`] only has to implement [`fetch`](Source::fetch). The merge
//! discipline shared by every provider (fresh record vs. existing one,
//! overwrite vs. fill, failure downgraded to unknown) lives in the provided
//! [`lookup`](Source::lookup) method.
//!
//! # Usage
//!
//! ```rust
//! use booksearch::traits::SourceRegistry;
//! use booksearch::models::Mode;
//!
//! let mut sources = SourceRegistry::new();
//! // sources.register(Box::new(MySource::new()), &[Mode::Isbn]);
//! assert!(sources.sources_for(Mode::Isbn).is_empty());
//! ```

use anyhow::Result;
use tracing::warn;

use crate::config::Config;
use crate::models::{Field, FieldValue, Mode, PartialRecord, Record};

// ═══════════════════════════════════════════════════════════════════════
// Source Trait
// ═══════════════════════════════════════════════════════════════════════

/// An external bibliographic provider.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use booksearch::models::{Field, Mode, PartialRecord};
/// use booksearch::traits::Source;
///
/// pub struct ShelfSource;
///
/// impl Source for ShelfSource {
///     fn name(&self) -> &str { "shelf" }
///     fn description(&self) -> &str { "Books already on the shelf" }
///
///     fn fetch(&self, key: &str, _mode: Mode) -> Result<PartialRecord> {
///         Ok(PartialRecord::new().with(Field::Title, format!("Shelf copy of {}", key)))
///     }
/// }
/// ```
pub trait Source: Send + Sync {
    /// Provenance string, e.g. `"openlibrary.org"`.
    fn name(&self) -> &str;

    /// One-line description for `booksearch sources`.
    fn description(&self) -> &str;

    /// Whether the provider can be queried in `mode`. Defaults to both modes.
    fn supports(&self, mode: Mode) -> bool {
        let _ = mode;
        true
    }

    /// Field reported unknown when the provider cannot be reached.
    fn required_field(&self) -> Field {
        Field::Title
    }

    /// Query the provider and extract whatever it knows about `key`.
    ///
    /// Fields the provider's schema carries but the response lacks are
    /// reported as [`FieldValue::Unknown`]; fields the schema never carries
    /// are omitted.
    fn fetch(&self, key: &str, mode: Mode) -> Result<PartialRecord>;

    /// Look up `key` and merge the result into `existing` (or a fresh
    /// record for `key`).
    ///
    /// With `fill` false the provider's values overwrite the record; with
    /// `fill` true only unknown fields are filled and disagreements go to
    /// `resolver`. A failed fetch never escapes: it is logged and the
    /// [`required_field`](Source::required_field) is reported unknown.
    fn lookup(
        &self,
        key: &str,
        mode: Mode,
        existing: Option<Record>,
        fill: bool,
        resolver: &mut dyn ConflictResolver,
    ) -> Record {
        // In ISBN mode the key is the record key. An LCCN key never is, and an
        // earlier source may already have rekeyed the record to its ISBN-13.
        let mut record = match existing {
            Some(mut record) => {
                if mode == Mode::Isbn {
                    record.set(Field::Isbn, key);
                }
                record
            }
            None => Record::new(key),
        };

        let data = match self.fetch(key, mode) {
            Ok(data) => data,
            Err(e) => {
                warn!(source = self.name(), %mode, key, error = %e, "lookup failed");
                PartialRecord::new().with(self.required_field(), FieldValue::Unknown)
            }
        };

        if fill {
            record.update_unknowns(&data, resolver);
        } else {
            record.update(&data);
        }
        record
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Presentation seams
// ═══════════════════════════════════════════════════════════════════════

/// Chooses between two different known values during a fill merge.
///
/// Implemented for any `FnMut(Field, &str, &str) -> String`, so a closure
/// can be passed wherever a resolver is expected.
pub trait ConflictResolver {
    fn resolve(&mut self, field: Field, current: &str, incoming: &str) -> String;
}

impl<F> ConflictResolver for F
where
    F: FnMut(Field, &str, &str) -> String,
{
    fn resolve(&mut self, field: Field, current: &str, incoming: &str) -> String {
        self(field, current, incoming)
    }
}

/// Asks the user for a field no source could determine.
///
/// Returning `None` (or an empty string) leaves the field unknown.
pub trait Prompter {
    fn prompt(&mut self, field: Field, record: &Record) -> Option<String>;
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Ordered source lists, one per [`Mode`].
///
/// Order is priority: the engine queries sources front to back.
pub struct SourceRegistry {
    sources: Vec<Box<dyn Source>>,
    isbn: Vec<usize>,
    lccn: Vec<usize>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            isbn: Vec::new(),
            lccn: Vec::new(),
        }
    }

    /// Build the built-in sources from the config, ordered as `[modes]` says.
    ///
    /// Disabled sources are skipped. Fails if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        use crate::config::{ISBNSEARCH, OPENLIBRARY};
        use crate::source_isbnsearch::IsbnSearchSource;
        use crate::source_openlibrary::OpenLibrarySource;
        use crate::sources::build_http_client;

        let client = build_http_client(&config.lookup)?;
        let mut registry = Self::new();
        let mut ids: Vec<&str> = Vec::new();

        if config.sources.isbnsearch.enabled {
            registry.sources.push(Box::new(IsbnSearchSource::new(
                config.sources.isbnsearch.base_url.clone(),
                client.clone(),
            )));
            ids.push(ISBNSEARCH);
        }
        if config.sources.openlibrary.enabled {
            registry.sources.push(Box::new(OpenLibrarySource::new(
                config.sources.openlibrary.base_url.clone(),
                client,
            )));
            ids.push(OPENLIBRARY);
        }

        for mode in Mode::ALL {
            for id in config.modes.order(mode) {
                let Some(index) = ids.iter().position(|i| *i == id.as_str()) else {
                    continue;
                };
                if registry.sources[index].supports(mode) {
                    registry.list_mut(mode).push(index);
                }
            }
        }

        Ok(registry)
    }

    /// Register a source and append it to the list of each given mode it supports.
    pub fn register(&mut self, source: Box<dyn Source>, modes: &[Mode]) {
        let index = self.sources.len();
        for &mode in modes {
            if source.supports(mode) {
                self.list_mut(mode).push(index);
            }
        }
        self.sources.push(source);
    }

    /// Sources to query for `mode`, in priority order.
    pub fn sources_for(&self, mode: Mode) -> Vec<&dyn Source> {
        self.list(mode)
            .iter()
            .map(|&i| self.sources[i].as_ref())
            .collect()
    }

    /// Every registered source, in registration order.
    pub fn sources(&self) -> &[Box<dyn Source>] {
        &self.sources
    }

    /// Find a source by its provenance name.
    pub fn find(&self, name: &str) -> Option<&dyn Source> {
        self.sources
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    fn list(&self, mode: Mode) -> &Vec<usize> {
        match mode {
            Mode::Isbn => &self.isbn,
            Mode::Lccn => &self.lccn,
        }
    }

    fn list_mut(&mut self, mode: Mode) -> &mut Vec<usize> {
        match mode {
            Mode::Isbn => &mut self.isbn,
            Mode::Lccn => &mut self.lccn,
        }
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
