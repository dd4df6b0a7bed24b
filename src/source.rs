//! Source registry: resolves numeric source ids to metadata.

use crate::db::{Database, SourceInfo};
use crate::error::Result;

/// Resolves source ids against the installed-source table, falling back
/// to a stub for sources that are no longer installed. Backups carry the
/// resolved names so entries stay labelled after the source is gone.
#[derive(Clone)]
pub struct SourceRegistry {
    db: Database,
}

impl SourceRegistry {
    /// Create a registry over the given store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register or update an installed source.
    pub fn register(&self, source: &SourceInfo) -> Result<()> {
        self.db.upsert_source(source)
    }

    /// Resolve a source id, returning a stub when not installed.
    pub fn get_or_stub(&self, id: i64) -> Result<SourceInfo> {
        match self.db.get_source(id)? {
            Some(source) => Ok(source),
            None => Ok(stub_source(id)),
        }
    }
}

/// Placeholder for a source that is not installed locally.
pub fn stub_source(id: i64) -> SourceInfo {
    SourceInfo {
        id,
        name: format!("Unknown ({})", id),
        lang: String::new(),
    }
}
