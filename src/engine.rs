//! Multi-source record resolution.
//!
//! The engine walks the ordered source list for a [`Mode`], threading one
//! working [`Record`] through every [`Source::lookup`] call:
//!
//! ```text
//!   key ─▶ normalize ─▶ source 1 ─▶ source 2 ─▶ … ─▶ prompt? ─▶ Resolution
//!                          │            │
//!                   overwrite (update) or fill (update_unknowns)
//! ```
//!
//! - **Overwrite mode** (`fill == false`): each source overwrites what it
//!   reports; the walk stops as soon as the satisfying field (author by
//!   default) is known.
//! - **Fill mode** (`fill == true`): every source is queried exactly once and
//!   may only fill unknown fields; disagreements go to the
//!   [`ConflictResolver`].
//!
//! Sources are queried sequentially on the calling thread. A later source's
//! merge depends on the record the earlier ones produced.

use anyhow::Result;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::LookupConfig;
use crate::identifiers::{is_valid_isbn, normalize_key};
use crate::models::{Field, FieldValue, Mode, Record};
use crate::traits::{ConflictResolver, Prompter, SourceRegistry};

/// Per-run engine settings.
#[derive(Debug, Clone, Copy)]
pub struct LookupOptions {
    pub fill: bool,
    /// Whether the prompter may be asked for the missing `prompt_for` field.
    pub interactive: bool,
    pub satisfied_by: Field,
    pub prompt_for: Field,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            fill: false,
            interactive: false,
            satisfied_by: Field::Author,
            prompt_for: Field::Title,
        }
    }
}

impl From<&LookupConfig> for LookupOptions {
    fn from(config: &LookupConfig) -> Self {
        Self {
            fill: config.fill,
            interactive: !config.no_questions,
            satisfied_by: config.satisfied_by,
            prompt_for: config.prompt_for,
        }
    }
}

/// Outcome of one resolution run.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: Record,
    /// Names of the sources queried, in order.
    pub queried: Vec<String>,
    /// Whether the satisfying field ended up known.
    pub satisfied: bool,
    /// Whether the prompter supplied the `prompt_for` field.
    pub prompted: bool,
}

pub struct ResolutionEngine<'a> {
    registry: &'a SourceRegistry,
    options: LookupOptions,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(registry: &'a SourceRegistry, options: LookupOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &LookupOptions {
        &self.options
    }

    /// Resolve `key` from scratch.
    ///
    /// The key is validated and normalized for `mode` first; an invalid key
    /// is an error and no source is queried.
    pub fn resolve(
        &self,
        key: &str,
        mode: Mode,
        resolver: &mut dyn ConflictResolver,
        prompter: Option<&mut dyn Prompter>,
    ) -> Result<Resolution> {
        let key = normalize_key(key, mode)?;
        Ok(self.run(&key, mode, None, resolver, prompter))
    }

    /// Resolve `key`, extending an existing record instead of a fresh one.
    pub fn resolve_from(
        &self,
        key: &str,
        mode: Mode,
        existing: Record,
        resolver: &mut dyn ConflictResolver,
        prompter: Option<&mut dyn Prompter>,
    ) -> Result<Resolution> {
        let key = normalize_key(key, mode)?;
        Ok(self.run(&key, mode, Some(existing), resolver, prompter))
    }

    fn run(
        &self,
        key: &str,
        mode: Mode,
        existing: Option<Record>,
        resolver: &mut dyn ConflictResolver,
        prompter: Option<&mut dyn Prompter>,
    ) -> Resolution {
        let opts = self.options;
        let mut book = existing;
        let mut queried = Vec::new();

        for source in self.registry.sources_for(mode) {
            info!(source = source.name(), %mode, key, "checking source");
            let record = source.lookup(key, mode, book.take(), opts.fill, resolver);
            queried.push(source.name().to_string());

            let unknown = record.unknown_fields();
            if !unknown.is_empty() {
                let names: Vec<&str> = unknown.iter().map(|f| f.name()).collect();
                debug!(source = source.name(), unknown = ?names, "fields still unknown");
            }

            let satisfied = !record.get(opts.satisfied_by).is_unknown();
            book = Some(record);
            if satisfied && !opts.fill {
                debug!(source = source.name(), "satisfied, stopping");
                break;
            }
        }

        let mut record = book.unwrap_or_else(|| Record::new(key));
        let satisfied = !record.get(opts.satisfied_by).is_unknown();

        let mut prompted = false;
        if record.get(opts.prompt_for).is_unknown() && opts.interactive {
            if let Some(prompter) = prompter {
                if let Some(answer) = prompter.prompt(opts.prompt_for, &record) {
                    let answer = answer.trim();
                    if !answer.is_empty() {
                        record.set(opts.prompt_for, FieldValue::known(answer));
                        prompted = true;
                    }
                }
            }
        }

        Resolution {
            record,
            queried,
            satisfied,
            prompted,
        }
    }
}

/// Summary of a [`requery`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequeryReport {
    /// Records with unknown fields that were re-resolved.
    pub attempted: usize,
    /// Records that gained at least one field.
    pub improved: usize,
    /// Records whose key fits neither mode and had no LCCN to fall back on.
    pub skipped: usize,
}

/// Re-resolve, in fill mode, every catalog record that still has unknown
/// fields. Records are updated in place.
///
/// A record is looked up by ISBN when its key is a valid ISBN, otherwise by
/// its LCCN (the key itself, or the `lccn` field).
pub fn requery(
    engine: &ResolutionEngine<'_>,
    catalog: &mut Catalog,
    resolver: &mut dyn ConflictResolver,
) -> RequeryReport {
    let fill_engine = ResolutionEngine::new(
        engine.registry,
        LookupOptions {
            fill: true,
            interactive: false,
            ..engine.options
        },
    );

    let mut report = RequeryReport::default();
    for pos in 0..catalog.len() {
        let Some(existing) = catalog.get(pos).cloned() else {
            continue;
        };
        if !existing.has_unknowns() {
            continue;
        }

        let (key, mode) = if is_valid_isbn(&existing.isbn) {
            (existing.isbn.clone(), Mode::Isbn)
        } else if let Some(lccn) = existing.lccn.as_known() {
            (lccn.to_string(), Mode::Lccn)
        } else {
            (existing.isbn.clone(), Mode::Lccn)
        };

        let before = existing.unknown_fields().len();
        match fill_engine.resolve_from(&key, mode, existing, resolver, None) {
            Ok(resolution) => {
                report.attempted += 1;
                if resolution.record.unknown_fields().len() < before {
                    report.improved += 1;
                }
                catalog.replace_at(pos, resolution.record);
            }
            Err(e) => {
                debug!(%key, error = %e, "skipping record");
                report.skipped += 1;
            }
        }
    }

    info!(
        attempted = report.attempted,
        improved = report.improved,
        skipped = report.skipped,
        "requery finished"
    );
    report
}
