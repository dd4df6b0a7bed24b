//! Archive creation.
//!
//! The encoder is read-only against the store: it snapshots favorite
//! entries and their optional sections into a [`Backup`] graph, encodes it
//! with bincode and compresses the bytes with gzip.

use crate::backup::models::{
    Backup, BackupCategory, BackupChapter, BackupHistory, BackupManga, BackupSource,
    BackupTracking, CURRENT_BACKUP_VERSION,
};
use crate::backup::{
    BACKUP_CATEGORY, BACKUP_CATEGORY_MASK, BACKUP_CHAPTER, BACKUP_CHAPTER_MASK, BACKUP_HISTORY,
    BACKUP_HISTORY_MASK, BACKUP_TRACK, BACKUP_TRACK_MASK, backup_filename,
    prune_automatic_backups,
};
use crate::db::{Database, Manga};
use crate::error::{AppError, Result};
use crate::source::SourceRegistry;
use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Builds archive snapshots from the store.
pub struct BackupEncoder<'a> {
    db: &'a Database,
    sources: &'a SourceRegistry,
}

impl<'a> BackupEncoder<'a> {
    /// Create an encoder over the given store and source registry.
    pub fn new(db: &'a Database, sources: &'a SourceRegistry) -> Self {
        Self { db, sources }
    }

    /// Snapshot all favorite entries into an archive, honoring the
    /// section flags. An empty library produces a valid empty archive.
    pub fn snapshot(&self, flags: i32) -> Result<Backup> {
        let favorites = self.db.get_favorites()?;

        let mangas = favorites
            .iter()
            .map(|manga| self.snapshot_entry(manga, flags))
            .collect::<Result<Vec<_>>>()?;

        Ok(Backup {
            version: CURRENT_BACKUP_VERSION,
            mangas,
            categories: self.snapshot_categories(flags)?,
            sources: self.snapshot_sources(&favorites)?,
        })
    }

    fn snapshot_entry(&self, manga: &Manga, flags: i32) -> Result<BackupManga> {
        let mut entry = BackupManga::from_entry(manga);

        if flags & BACKUP_CHAPTER_MASK == BACKUP_CHAPTER {
            entry.chapters = self
                .db
                .get_chapters_by_manga_id(manga.id)?
                .iter()
                .map(BackupChapter::from_chapter)
                .collect();
        }

        if flags & BACKUP_CATEGORY_MASK == BACKUP_CATEGORY {
            // Entries reference categories by order-index, not store id
            entry.categories = self
                .db
                .get_categories_for_manga(manga.id)?
                .iter()
                .map(|category| category.sort)
                .collect();
        }

        if flags & BACKUP_TRACK_MASK == BACKUP_TRACK {
            entry.tracking = self
                .db
                .get_tracks_by_manga_id(manga.id)?
                .iter()
                .map(BackupTracking::from_track)
                .collect();
        }

        if flags & BACKUP_HISTORY_MASK == BACKUP_HISTORY {
            for history in self.db.get_history_by_manga_id(manga.id)? {
                if history.last_read == 0 && history.time_read == 0 {
                    continue;
                }
                if let Some(chapter) = self.db.get_chapter_by_id(history.chapter_id)? {
                    entry
                        .history
                        .push(BackupHistory::from_history(&chapter.url, &history));
                }
            }
        }

        Ok(entry)
    }

    fn snapshot_categories(&self, flags: i32) -> Result<Vec<BackupCategory>> {
        if flags & BACKUP_CATEGORY_MASK != BACKUP_CATEGORY {
            return Ok(Vec::new());
        }

        Ok(self
            .db
            .list_categories()?
            .iter()
            .map(BackupCategory::from_category)
            .collect())
    }

    /// One source record per distinct source referenced by the entries,
    /// stubbed when the source is not installed.
    fn snapshot_sources(&self, mangas: &[Manga]) -> Result<Vec<BackupSource>> {
        let mut seen = Vec::new();
        let mut sources = Vec::new();

        for manga in mangas {
            if seen.contains(&manga.source) {
                continue;
            }
            seen.push(manga.source);
            let info = self.sources.get_or_stub(manga.source)?;
            sources.push(BackupSource::from_source(&info));
        }

        Ok(sources)
    }
}

/// Encode an archive into compressed bytes.
pub fn encode_backup(backup: &Backup) -> Result<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(backup, bincode::config::standard())
        .map_err(|e| AppError::Internal(format!("Failed to encode backup: {}", e)))?;

    // Never let an empty archive reach disk
    if body.is_empty() {
        return Err(AppError::EmptyBackup);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&body)?;
    Ok(encoder.finish()?)
}

/// Snapshot the store and write an archive file.
///
/// In automatic mode `dest` is the backup directory: the file lands in
/// its `automatic/` subdirectory under the timestamped naming convention,
/// and older automatic backups beyond the retention count are deleted
/// first. Otherwise `dest` is the exact output path.
///
/// The archive is written to a temporary file, decoded back as a sanity
/// check, and only then moved into place; on any failure the temporary
/// file is removed.
pub fn write_backup_file(
    db: &Database,
    sources: &SourceRegistry,
    dest: &Path,
    flags: i32,
    auto: bool,
    retention: usize,
) -> Result<PathBuf> {
    let path = if auto {
        let dir = dest.join("automatic");
        std::fs::create_dir_all(&dir)?;
        prune_automatic_backups(&dir, retention)?;
        dir.join(backup_filename(Utc::now()))
    } else {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        dest.to_path_buf()
    };

    let tmp = path.with_extension("bak.gz.tmp");
    let result = write_and_verify(db, sources, &tmp, &path, flags);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn write_and_verify(
    db: &Database,
    sources: &SourceRegistry,
    tmp: &Path,
    path: &Path,
    flags: i32,
) -> Result<PathBuf> {
    // Open the destination before any encode work so permission
    // failures surface immediately
    let mut file = std::fs::File::create(tmp)?;

    let backup = BackupEncoder::new(db, sources).snapshot(flags)?;
    let bytes = encode_backup(&backup)?;

    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    // Make sure what landed on disk is a readable archive
    crate::backup::read_backup_file(tmp)?;

    std::fs::rename(tmp, path)?;

    tracing::info!(
        path = %path.display(),
        entries = backup.mangas.len(),
        bytes = bytes.len(),
        "Backup written"
    );

    Ok(path.to_path_buf())
}
