//! # booksearch CLI
//!
//! The `booksearch` binary manages a personal book catalog stored in a flat
//! delimited file. Books are keyed by ISBN (or LCCN) and their details are
//! resolved from online bibliographic sources.
//!
//! ## Usage
//!
//! ```bash
//! booksearch --config ./config/booksearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `booksearch init` | Create an empty catalog file |
//! | `booksearch lookup <key>` | Resolve a book from the sources and add it |
//! | `booksearch add --isbn <key> ...` | Add a book by hand |
//! | `booksearch remove <key>` | Remove a book |
//! | `booksearch list` | One line per book |
//! | `booksearch show <key>` | Every field of one book |
//! | `booksearch requery` | Fill unknown fields of every book |
//! | `booksearch export` | Dump the catalog as JSON |
//! | `booksearch sources` | List the configured sources |
//!
//! ## Examples
//!
//! ```bash
//! # Start a new catalog next to the config
//! booksearch init --library ./books.csv
//!
//! # Look a book up, answering conflict questions on the console
//! booksearch --fill lookup 978-0-00-470481-4
//!
//! # Batch use: never ask, later sources win conflicts
//! booksearch --no-questions lookup 85000002 --mode lccn
//! ```

use std::cell::RefCell;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use booksearch::catalog::{Catalog, CatalogError, FileLayout};
use booksearch::config::{self, Config};
use booksearch::conflict::{self, ConflictPolicy};
use booksearch::console::{Console, Shared};
use booksearch::engine::{self, LookupOptions, ResolutionEngine};
use booksearch::export;
use booksearch::identifiers::normalize_key;
use booksearch::models::{Field, FieldValue, Mode, Record, UNKNOWN};
use booksearch::sources;
use booksearch::traits::{ConflictResolver, Prompter, SourceRegistry};

type StdConsole = Console<std::io::StdinLock<'static>, std::io::Stdout>;

/// booksearch: a personal book catalog keyed by ISBN/LCCN.
///
/// Settings are read from a TOML file (`--config`); a missing file means
/// built-in defaults. The global flags override the file.
#[derive(Parser)]
#[command(
    name = "booksearch",
    about = "Personal book catalog keyed by ISBN/LCCN",
    version,
    long_about = "booksearch resolves book details from several online sources \
    (isbnsearch.org, openlibrary.org), merges them into one record, and keeps \
    the catalog in a flat delimited text file."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/booksearch.toml")]
    config: PathBuf,

    /// Catalog file, overriding `[catalog].path`.
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Field delimiter, overriding `[catalog].delimiter`.
    #[arg(long, global = true)]
    delimiter: Option<String>,

    /// Fill mode: query every source and only fill unknown fields.
    #[arg(long, global = true)]
    fill: bool,

    /// Never ask questions; conflicts follow the configured policy.
    #[arg(long, global = true)]
    no_questions: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty catalog file. Refuses to overwrite an existing one.
    Init,

    /// Resolve a book from the configured sources and add it to the catalog.
    Lookup {
        /// ISBN-10/13 or LCCN, hyphens allowed.
        key: String,

        /// Lookup mode: `isbn` or `lccn`.
        #[arg(long, default_value = "isbn")]
        mode: Mode,

        /// Search again even if the key is already in the catalog.
        #[arg(long)]
        again: bool,
    },

    /// Add a book by hand.
    Add {
        /// Catalog key.
        #[arg(long)]
        isbn: String,
        #[arg(long)]
        isbn10: Option<String>,
        #[arg(long)]
        isbn13: Option<String>,
        #[arg(long)]
        lccn: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        publisher: Option<String>,
        #[arg(long)]
        published: Option<String>,
        #[arg(long)]
        binding: Option<String>,
        #[arg(long)]
        used_price: Option<String>,

        /// Add even if the key is already in the catalog.
        #[arg(long)]
        again: bool,
    },

    /// Remove a book by key.
    Remove {
        isbn: String,

        /// Fail if the key is not in the catalog.
        #[arg(long)]
        strict: bool,
    },

    /// List every book, one per line.
    List,

    /// Print every field of one book.
    Show { isbn: String },

    /// Re-resolve, in fill mode, every book that still has unknown fields.
    Requery,

    /// Export the catalog as JSON.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List the configured sources and the modes that query them.
    Sources,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut cfg = config::load_or_default(&cli.config)?;
    if let Some(path) = cli.library {
        cfg.catalog.path = path;
    }
    if let Some(delimiter) = cli.delimiter {
        cfg.catalog.delimiter = delimiter;
    }
    if cli.fill {
        cfg.lookup.fill = true;
    }
    if cli.no_questions {
        cfg.lookup.no_questions = true;
    }
    config::validate(&cfg)?;

    let layout = FileLayout::from(&cfg.catalog);

    match cli.command {
        Commands::Init => {
            let catalog = Catalog::create(&cfg.catalog.path, layout)?;
            println!("Created empty catalog at {}", catalog.path().display());
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Lookup { key, mode, again } => {
            let mut catalog = Catalog::open(&cfg.catalog.path, layout)?;
            run_lookup(&cfg, &mut catalog, &key, mode, again)?;
        }
        Commands::Add {
            isbn,
            isbn10,
            isbn13,
            lccn,
            title,
            author,
            publisher,
            published,
            binding,
            used_price,
            again,
        } => {
            let mut catalog = Catalog::open(&cfg.catalog.path, layout)?;
            let key = isbn.trim();
            if key.is_empty() || key == UNKNOWN {
                bail!("--isbn must be a real key, not empty or {}", UNKNOWN);
            }
            if catalog.contains(key) && !again {
                println!("{} is already in the catalog (use --again to add it anyway)", key);
                return Ok(());
            }

            let mut record = Record::new(key);
            let given = [
                (Field::Isbn10, isbn10),
                (Field::Isbn13, isbn13),
                (Field::Lccn, lccn),
                (Field::Title, title),
                (Field::Author, author),
                (Field::Publisher, publisher),
                (Field::Published, published),
                (Field::Binding, binding),
                (Field::UsedPrice, used_price),
            ];
            for (field, value) in given {
                if let Some(value) = value {
                    record.set(field, FieldValue::parse(&value));
                }
            }

            catalog.add(record.clone());
            catalog.save()?;
            println!("{}", record);
        }
        Commands::Remove { isbn, strict } => {
            let mut catalog = Catalog::open(&cfg.catalog.path, layout)?;
            match catalog.remove_isbn(isbn.trim()) {
                Some(record) => {
                    catalog.save()?;
                    println!("Removed {} ({})", record.isbn, record.title.as_str());
                }
                None if strict => return Err(CatalogError::NotFound(isbn).into()),
                None => println!("{} is not in the catalog", isbn),
            }
        }
        Commands::List => {
            let catalog = Catalog::open(&cfg.catalog.path, layout)?;
            for record in catalog.iter() {
                println!(
                    "{}  {}  {}",
                    record.isbn,
                    record.title.as_str(),
                    record.author.as_str()
                );
            }
            println!("{} records", catalog.len());
        }
        Commands::Show { isbn } => {
            let catalog = Catalog::open(&cfg.catalog.path, layout)?;
            match catalog.exists(isbn.trim()) {
                Some(record) => println!("{}", record),
                None => return Err(CatalogError::NotFound(isbn).into()),
            }
        }
        Commands::Requery => {
            let mut catalog = Catalog::open(&cfg.catalog.path, layout)?;
            let registry = SourceRegistry::from_config(&cfg)?;
            let engine = ResolutionEngine::new(&registry, LookupOptions::from(&cfg.lookup));
            let console = RefCell::new(Console::stdio());
            let mut resolver = conflict_resolver(&cfg, &console);

            let report = engine::requery(&engine, &mut catalog, resolver.as_mut());
            catalog.save()?;
            println!(
                "Requeried {} records: {} improved, {} skipped",
                report.attempted, report.improved, report.skipped
            );
        }
        Commands::Export { output } => {
            let catalog = Catalog::open(&cfg.catalog.path, layout)?;
            export::run_export(&catalog, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("BOOKSEARCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The console when the policy is `ask` and questions are allowed,
/// otherwise the fixed policy.
fn conflict_resolver<'a>(
    cfg: &Config,
    console: &'a RefCell<StdConsole>,
) -> Box<dyn ConflictResolver + 'a> {
    if cfg.lookup.conflict == ConflictPolicy::Ask && !cfg.lookup.no_questions {
        Box::new(Shared(console))
    } else {
        conflict::non_interactive(cfg.lookup.conflict)
    }
}

fn run_lookup(cfg: &Config, catalog: &mut Catalog, key: &str, mode: Mode, again: bool) -> Result<()> {
    let key = normalize_key(key, mode)?;
    let console = RefCell::new(Console::stdio());
    let interactive = !cfg.lookup.no_questions;

    let existing = catalog.exists(&key).cloned();
    if let Some(existing) = &existing {
        println!("{}", existing);
        let search_again = again
            || (interactive
                && console
                    .borrow_mut()
                    .confirm("Book exists. Search again? [y/N] "));
        if !search_again {
            println!("{} is already in the catalog", key);
            return Ok(());
        }
    }

    let registry = SourceRegistry::from_config(cfg)?;
    if registry.sources_for(mode).is_empty() {
        tracing::warn!(%mode, "no sources enabled for this mode");
    }
    let engine = ResolutionEngine::new(&registry, LookupOptions::from(&cfg.lookup));

    let mut resolver = conflict_resolver(cfg, &console);
    let mut console_prompter = Shared(&console);
    let prompter: Option<&mut dyn Prompter> = if interactive {
        Some(&mut console_prompter)
    } else {
        None
    };

    // Fill mode extends the entry already on file; overwrite mode starts fresh.
    let resolution = match existing {
        Some(existing) if cfg.lookup.fill => {
            engine.resolve_from(&key, mode, existing, resolver.as_mut(), prompter)?
        }
        _ => engine.resolve(&key, mode, resolver.as_mut(), prompter)?,
    };
    let record = resolution.record;

    // An LCCN lookup may rekey the record to its ISBN-13.
    catalog.remove_isbn(&key);
    if record.isbn != key {
        catalog.remove_isbn(&record.isbn);
    }
    catalog.add(record.clone());
    catalog.save()?;

    println!("{}", record);
    if !resolution.satisfied {
        println!(
            "{} is still unknown after querying: {}",
            cfg.lookup.satisfied_by.label(),
            resolution.queried.join(", ")
        );
    }
    Ok(())
}
