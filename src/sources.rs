//! Source configuration and status listing.
//!
//! Reports which lookup sources are configured, whether they are enabled,
//! and which modes query them. Used by the `booksearch sources` command.
//! Also builds the blocking HTTP client shared by the built-in sources.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::{Config, LookupConfig, SourceConfig, ISBNSEARCH, OPENLIBRARY};
use crate::models::Mode;

/// Status of a single configured source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    /// Config id (`isbnsearch`, `openlibrary`).
    pub name: String,
    pub enabled: bool,
    pub base_url: String,
    /// Modes whose source list includes this source, with its position (1-based).
    pub modes: Vec<String>,
}

/// Status of every built-in source.
pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    let entries: [(&str, &SourceConfig); 2] = [
        (ISBNSEARCH, &config.sources.isbnsearch),
        (OPENLIBRARY, &config.sources.openlibrary),
    ];

    entries
        .iter()
        .map(|(name, cfg)| {
            let modes = Mode::ALL
                .iter()
                .filter_map(|m| {
                    config
                        .modes
                        .order(*m)
                        .iter()
                        .position(|id| id.as_str() == *name)
                        .map(|pos| format!("{}#{}", m, pos + 1))
                })
                .collect();
            SourceStatus {
                name: name.to_string(),
                enabled: cfg.enabled,
                base_url: cfg.base_url.clone(),
                modes,
            }
        })
        .collect()
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<14} {:<9} {:<16} URL", "SOURCE", "ENABLED", "MODES");
    for s in get_sources(config) {
        let modes = if s.modes.is_empty() {
            "-".to_string()
        } else {
            s.modes.join(",")
        };
        println!("{:<14} {:<9} {:<16} {}", s.name, s.enabled, modes, s.base_url);
    }
    Ok(())
}

/// Blocking client with the configured timeout and user agent.
pub fn build_http_client(lookup: &LookupConfig) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(lookup.timeout_secs))
        .user_agent(lookup.user_agent.clone())
        .build()
        .context("Failed to build HTTP client")
}
