use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::conflict::ConflictPolicy;
use crate::models::{Field, Mode};

/// Config id of the isbnsearch.org source.
pub const ISBNSEARCH: &str = "isbnsearch";
/// Config id of the openlibrary.org source.
pub const OPENLIBRARY: &str = "openlibrary";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub modes: ModesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub header: bool,
    #[serde(default = "default_fields")]
    pub fields: Vec<Field>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            delimiter: default_delimiter(),
            header: false,
            fields: default_fields(),
        }
    }
}

impl CatalogConfig {
    /// The delimiter as a single byte. Only valid after validation.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.bytes().next().unwrap_or(b'|')
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("./auto_library.csv")
}
fn default_delimiter() -> String {
    "|".to_string()
}
fn default_fields() -> Vec<Field> {
    Field::ALL.to_vec()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LookupConfig {
    #[serde(default)]
    pub fill: bool,
    #[serde(default)]
    pub no_questions: bool,
    #[serde(default)]
    pub conflict: ConflictPolicy,
    #[serde(default = "default_satisfied_by")]
    pub satisfied_by: Field,
    #[serde(default = "default_prompt_for")]
    pub prompt_for: Field,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            fill: false,
            no_questions: false,
            conflict: ConflictPolicy::default(),
            satisfied_by: default_satisfied_by(),
            prompt_for: default_prompt_for(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_satisfied_by() -> Field {
    Field::Author
}
fn default_prompt_for() -> Field {
    Field::Title
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("booksearch/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_isbnsearch")]
    pub isbnsearch: SourceConfig,
    #[serde(default = "default_openlibrary")]
    pub openlibrary: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            isbnsearch: default_isbnsearch(),
            openlibrary: default_openlibrary(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
}

fn default_enabled() -> bool {
    true
}
fn default_isbnsearch() -> SourceConfig {
    SourceConfig {
        enabled: true,
        base_url: "https://www.isbnsearch.org/isbn/".to_string(),
    }
}
fn default_openlibrary() -> SourceConfig {
    SourceConfig {
        enabled: true,
        base_url: "https://openlibrary.org/api/books".to_string(),
    }
}

/// Source order per lookup mode, by config id.
#[derive(Debug, Deserialize, Clone)]
pub struct ModesConfig {
    #[serde(default = "default_isbn_order")]
    pub isbn: Vec<String>,
    #[serde(default = "default_lccn_order")]
    pub lccn: Vec<String>,
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            isbn: default_isbn_order(),
            lccn: default_lccn_order(),
        }
    }
}

impl ModesConfig {
    pub fn order(&self, mode: Mode) -> &[String] {
        match mode {
            Mode::Isbn => &self.isbn,
            Mode::Lccn => &self.lccn,
        }
    }
}

fn default_isbn_order() -> Vec<String> {
    vec![ISBNSEARCH.to_string(), OPENLIBRARY.to_string()]
}
fn default_lccn_order() -> Vec<String> {
    vec![OPENLIBRARY.to_string()]
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to the built-in defaults.
///
/// A file that exists but does not parse or validate is still an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate catalog
    let mut chars = config.catalog.delimiter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '\n' && c != '\r' => {}
        _ => bail!(
            "catalog.delimiter must be exactly one ASCII character (got {:?})",
            config.catalog.delimiter
        ),
    }

    let mut fields = config.catalog.fields.clone();
    fields.sort();
    fields.dedup();
    if fields.len() != Field::ALL.len() || config.catalog.fields.len() != Field::ALL.len() {
        bail!(
            "catalog.fields must list each of the {} record fields exactly once",
            Field::ALL.len()
        );
    }

    // Validate lookup
    if config.lookup.timeout_secs == 0 {
        bail!("lookup.timeout_secs must be > 0");
    }
    if config.lookup.satisfied_by == Field::Isbn || config.lookup.prompt_for == Field::Isbn {
        bail!("lookup.satisfied_by and lookup.prompt_for cannot be 'isbn'");
    }

    // Validate mode lists
    for mode in Mode::ALL {
        for id in config.modes.order(mode) {
            match id.as_str() {
                ISBNSEARCH if mode == Mode::Lccn => {
                    bail!("modes.lccn: source '{}' only supports ISBN lookups", id)
                }
                ISBNSEARCH | OPENLIBRARY => {}
                other => bail!(
                    "modes.{}: unknown source '{}'. Must be {} or {}.",
                    mode.key(),
                    other,
                    ISBNSEARCH,
                    OPENLIBRARY
                ),
            }
        }
    }

    Ok(())
}
