//! Backup archive creation, validation and restore.

mod decoder;
mod encoder;
mod models;
mod restore;

pub use decoder::{decode_backup, read_backup_file, validate_backup};
pub use encoder::{BackupEncoder, encode_backup, write_backup_file};
pub use models::{
    Backup, BackupCategory, BackupChapter, BackupHistory, BackupManga, BackupSource,
    BackupTracking, CURRENT_BACKUP_VERSION,
};
pub use restore::{RestoreEngine, RestoreReport};

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Include categories in the archive.
pub const BACKUP_CATEGORY: i32 = 0x1;
/// Mask for the category bit.
pub const BACKUP_CATEGORY_MASK: i32 = 0x1;
/// Include chapters in the archive.
pub const BACKUP_CHAPTER: i32 = 0x2;
/// Mask for the chapter bit.
pub const BACKUP_CHAPTER_MASK: i32 = 0x2;
/// Include reading history in the archive.
pub const BACKUP_HISTORY: i32 = 0x4;
/// Mask for the history bit.
pub const BACKUP_HISTORY_MASK: i32 = 0x4;
/// Include tracking records in the archive.
pub const BACKUP_TRACK: i32 = 0x8;
/// Mask for the tracking bit.
pub const BACKUP_TRACK_MASK: i32 = 0x8;
/// All optional sections.
pub const BACKUP_ALL: i32 = BACKUP_CATEGORY | BACKUP_CHAPTER | BACKUP_HISTORY | BACKUP_TRACK;

/// Filename prefix for automatic backups.
const FILENAME_PREFIX: &str = "mangavault_";
/// Filename suffix for automatic backups.
const FILENAME_SUFFIX: &str = ".bak.gz";

/// Build the timestamped filename for an automatic backup,
/// `mangavault_YYYY-MM-DD_HH-MM.bak.gz`.
pub fn backup_filename(time: DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        FILENAME_PREFIX,
        time.format("%Y-%m-%d_%H-%M"),
        FILENAME_SUFFIX
    )
}

/// Whether a filename follows the automatic-backup convention.
pub fn is_backup_filename(name: &str) -> bool {
    let Some(stamp) = name
        .strip_prefix(FILENAME_PREFIX)
        .and_then(|rest| rest.strip_suffix(FILENAME_SUFFIX))
    else {
        return false;
    };
    !stamp.is_empty() && stamp.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '_')
}

/// Delete old automatic backups, keeping room for one new file so that
/// `retention` backups exist after it is written. Returns the number of
/// files deleted. Selection is by filename-descending sort, which matches
/// timestamp order for the naming convention.
pub fn prune_automatic_backups(dir: &Path, retention: usize) -> Result<usize> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_backup_filename(name))
        .collect();

    names.sort_unstable_by(|a, b| b.cmp(a));

    let mut deleted = 0;
    for name in names.iter().skip(retention.saturating_sub(1)) {
        std::fs::remove_file(dir.join(name))?;
        deleted += 1;
    }

    if deleted > 0 {
        tracing::debug!(deleted, dir = %dir.display(), "Pruned old automatic backups");
    }

    Ok(deleted)
}
