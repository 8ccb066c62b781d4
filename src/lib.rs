//! # booksearch
//!
//! A personal book catalog keyed by ISBN/LCCN, stored in a flat delimited
//! file and enriched from several bibliographic sources.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │  Sources    │──▶│ ResolutionEngine │──▶│   Catalog    │
//! │ isbnsearch  │   │ overwrite / fill │   │ |-delimited  │
//! │ openlibrary │   └────────┬─────────┘   │    file      │
//! └─────────────┘            │             └──────┬───────┘
//!                  ConflictResolver /             │
//!                      Prompter                   ▼
//!                                           ┌──────────┐
//!                                           │   CLI    │
//!                                           └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! booksearch init                         # create an empty catalog file
//! booksearch lookup 9780004704814         # resolve and add a book
//! booksearch lookup 85000002 --mode lccn  # by Library of Congress number
//! booksearch --fill requery               # fill gaps in existing entries
//! booksearch list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Record, fields, lookup modes |
//! | [`identifiers`] | ISBN/LCCN validation and normalization |
//! | [`traits`] | `Source` trait, registry, presentation seams |
//! | [`conflict`] | Named conflict-resolution policies |
//! | [`engine`] | Multi-source resolution and requery |
//! | [`catalog`] | Flat-file catalog store |
//! | [`source_isbnsearch`] | isbnsearch.org source |
//! | [`source_openlibrary`] | openlibrary.org source |
//! | [`sources`] | Source status and HTTP client |
//! | [`console`] | Text-console resolver and prompter |
//! | [`export`] | JSON export |

pub mod catalog;
pub mod config;
pub mod conflict;
pub mod console;
pub mod engine;
pub mod export;
pub mod identifiers;
pub mod models;
pub mod source_isbnsearch;
pub mod source_openlibrary;
pub mod sources;
pub mod traits;
