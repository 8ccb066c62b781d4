//! Named conflict-resolution policies for fill-mode merges.
//!
//! When two sources report different known values for the same field,
//! [`Record::update_unknowns`](crate::models::Record::update_unknowns) asks a
//! [`ConflictResolver`]. Callers that have nobody to ask use one of the
//! policies here; [`KeepIncoming`] is the default and matches the historical
//! "later source wins" behavior.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::models::Field;
use crate::traits::ConflictResolver;

/// Always take the value from the source queried later.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepIncoming;

impl ConflictResolver for KeepIncoming {
    fn resolve(&mut self, field: Field, current: &str, incoming: &str) -> String {
        debug!(%field, current, incoming, "conflict: keeping incoming value");
        incoming.to_string()
    }
}

/// Always keep the value already on the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepExisting;

impl ConflictResolver for KeepExisting {
    fn resolve(&mut self, field: Field, current: &str, incoming: &str) -> String {
        debug!(%field, current, incoming, "conflict: keeping existing value");
        current.to_string()
    }
}

/// Policy selected in `[lookup].conflict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Ask the user; falls back to [`KeepIncoming`] when questions are off.
    #[default]
    Ask,
    Incoming,
    Existing,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Ask => write!(f, "ask"),
            ConflictPolicy::Incoming => write!(f, "incoming"),
            ConflictPolicy::Existing => write!(f, "existing"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(ConflictPolicy::Ask),
            "incoming" => Ok(ConflictPolicy::Incoming),
            "existing" => Ok(ConflictPolicy::Existing),
            other => Err(format!(
                "unknown conflict policy '{}': expected ask, incoming, or existing",
                other
            )),
        }
    }
}

/// Resolver for a non-interactive policy. `Ask` maps to the default.
pub fn non_interactive(policy: ConflictPolicy) -> Box<dyn ConflictResolver> {
    match policy {
        ConflictPolicy::Existing => Box::new(KeepExisting),
        ConflictPolicy::Ask | ConflictPolicy::Incoming => Box::new(KeepIncoming),
    }
}
