//! Export the catalog as JSON.
//!
//! Produces a document with an export timestamp and every record in
//! catalog order. Unknown fields are written as `null`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::catalog::Catalog;
use crate::models::Record;

#[derive(Serialize)]
struct ExportData<'a> {
    exported_at: DateTime<Utc>,
    source_file: String,
    count: usize,
    records: &'a [Record],
}

/// Render the catalog as pretty-printed JSON.
pub fn to_json(catalog: &Catalog) -> Result<String> {
    let data = ExportData {
        exported_at: Utc::now(),
        source_file: catalog.path().display().to_string(),
        count: catalog.len(),
        records: catalog.records(),
    };
    Ok(serde_json::to_string_pretty(&data)?)
}

/// Export the catalog as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn run_export(catalog: &Catalog, output: Option<&Path>) -> Result<()> {
    let json = to_json(catalog)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} records to {}", catalog.len(), path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
