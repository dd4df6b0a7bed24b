//! mangavault: backup and restore for manga reading libraries.
//!
//! This crate snapshots a manga library (entries, chapters, categories,
//! tracking records, reading history) into a single versioned, compressed
//! archive, and merges such archives back into a local store using
//! field-level rules that never regress user progress: read flags only
//! turn on, tracking progress takes the maximum of both sides, and
//! history durations grow by the increment beyond what is recorded.
//!
//! # Features
//!
//! - Compact binary archives (bincode + gzip) with a version gate
//! - Optional sections per archive: categories, chapters, tracking, history
//! - Progress-preserving merge on restore, idempotent across repeats
//! - Automatic backups with timestamped names and retention pruning
//! - Source metadata carried for entries whose source is uninstalled

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Backup archive creation, validation and restore.
pub mod backup;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Source registry.
pub mod source;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use source::SourceRegistry;
