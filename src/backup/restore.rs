//! Archive restore: reconciles a decoded backup against the local store.
//!
//! Merging is done entity type by entity type and never regresses user
//! progress: read/bookmark flags only ever turn on, tracking progress
//! takes the maximum of both sides, and history durations grow by the
//! increment beyond what is already recorded. Individual records that
//! cannot be resolved (unknown category name, unknown chapter url) are
//! skipped and counted, not treated as errors; only I/O and decode
//! failures abort a restore.

use crate::backup::models::{
    Backup, BackupCategory, BackupChapter, BackupHistory, BackupManga, BackupTracking,
};
use crate::db::{Database, HistoryUpdate, Manga};
use crate::error::Result;
use std::collections::HashSet;
use std::fmt;

/// Preference key set when category display flags are mixed.
pub const CATEGORIZED_DISPLAY_PREF: &str = "categorized_display";

/// Tallies of what a restore did and what it had to skip.
#[derive(Debug, Default, Clone)]
pub struct RestoreReport {
    /// Library entries inserted.
    pub manga_added: usize,
    /// Library entries merged onto existing rows.
    pub manga_updated: usize,
    /// Chapters inserted.
    pub chapters_added: usize,
    /// Chapters whose progress was merged.
    pub chapters_updated: usize,
    /// Categories inserted.
    pub categories_added: usize,
    /// Tracking records inserted.
    pub tracks_added: usize,
    /// Tracking records merged.
    pub tracks_updated: usize,
    /// History rows upserted.
    pub history_applied: usize,
    /// Category references that could not be resolved.
    pub skipped_categories: usize,
    /// History records whose chapter could not be resolved.
    pub skipped_history: usize,
}

impl fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries added, {} updated; {} chapters added, {} updated; \
             {} categories added; {} tracks added, {} updated; {} history rows; \
             {} category refs skipped, {} history records skipped",
            self.manga_added,
            self.manga_updated,
            self.chapters_added,
            self.chapters_updated,
            self.categories_added,
            self.tracks_added,
            self.tracks_updated,
            self.history_applied,
            self.skipped_categories,
            self.skipped_history,
        )
    }
}

/// Merges decoded archives into the store.
pub struct RestoreEngine {
    db: Database,
}

impl RestoreEngine {
    /// Create a restore engine over the given store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Restore a full archive.
    ///
    /// Each store batch commits atomically, but the sequence as a whole
    /// is not one transaction: interrupting a restore leaves the store at
    /// the last completed batch. Restores must not run concurrently for
    /// the same store.
    pub fn restore(&self, backup: &Backup) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();

        self.restore_categories(&backup.categories, &mut report)?;

        for entry in &backup.mangas {
            let manga = self.restore_entry(entry, &mut report)?;

            if !entry.categories.is_empty() {
                self.restore_entry_categories(
                    manga.id,
                    &entry.categories,
                    &backup.categories,
                    &mut report,
                )?;
            }
            if !entry.chapters.is_empty() {
                self.restore_chapters(manga.id, &entry.chapters, &mut report)?;
            }
            if !entry.tracking.is_empty() {
                self.restore_tracking(manga.id, &entry.tracking, &mut report)?;
            }
            if !entry.history.is_empty() {
                self.restore_history(&entry.history, &mut report)?;
            }
        }

        tracing::info!(%report, "Restore finished");
        Ok(report)
    }

    /// Match backup categories to local ones by name, inserting the rest.
    fn restore_categories(
        &self,
        categories: &[BackupCategory],
        report: &mut RestoreReport,
    ) -> Result<()> {
        if categories.is_empty() {
            return Ok(());
        }

        let local = self.db.list_categories()?;
        let mut restored = Vec::with_capacity(categories.len());

        for backup_category in categories {
            let mut category = backup_category.to_category();
            match local.iter().find(|c| c.name == category.name) {
                // Already present: adopt the local id
                Some(db_category) => category.id = db_category.id,
                None => {
                    category.id =
                        self.db
                            .insert_category(&category.name, category.sort, category.flags)?;
                    report.categories_added += 1;
                }
            }
            restored.push(category);
        }

        // Mixed display flags imply the user relies on per-category
        // display settings
        let distinct_flags: HashSet<i64> = local
            .iter()
            .chain(restored.iter())
            .map(|category| category.flags)
            .collect();
        self.db
            .set_flag_pref(CATEGORIZED_DISPLAY_PREF, distinct_flags.len() > 1)?;

        Ok(())
    }

    /// Resolve an entry by its natural key, merging onto the existing row
    /// or inserting a new one.
    fn restore_entry(&self, entry: &BackupManga, report: &mut RestoreReport) -> Result<Manga> {
        let mut manga = entry.to_entry();

        match self
            .db
            .get_manga_by_url_and_source(&entry.url, entry.source)?
        {
            Some(local) => {
                manga.id = local.id;
                manga.favorite = manga.favorite || local.favorite;
                manga.initialized = local.initialized || manga.description.is_some();
                self.db.update_manga(&manga)?;
                report.manga_updated += 1;
            }
            None => {
                manga.initialized = manga.description.is_some();
                manga.id = self.db.insert_manga(&manga)?;
                report.manga_added += 1;
            }
        }

        Ok(manga)
    }

    /// Resolve category order-indices to local ids and replace the
    /// entry's assignment set. Unresolvable references are skipped.
    fn restore_entry_categories(
        &self,
        manga_id: i64,
        order_indices: &[i64],
        backup_categories: &[BackupCategory],
        report: &mut RestoreReport,
    ) -> Result<()> {
        let local = self.db.list_categories()?;
        let mut resolved = Vec::new();

        for order in order_indices {
            let category_id = backup_categories
                .iter()
                .find(|c| c.order == *order)
                .and_then(|backup_category| {
                    local.iter().find(|c| c.name == backup_category.name)
                })
                .map(|category| category.id);

            match category_id {
                Some(id) => resolved.push(id),
                None => report.skipped_categories += 1,
            }
        }

        if !resolved.is_empty() {
            self.db.set_manga_categories(manga_id, &resolved)?;
        }

        Ok(())
    }

    /// Merge chapters by url. Matched chapters keep the local row's
    /// descriptive data and merge progress conservatively; unmatched ones
    /// are inserted. Updates and inserts commit as two separate batches.
    fn restore_chapters(
        &self,
        manga_id: i64,
        chapters: &[BackupChapter],
        report: &mut RestoreReport,
    ) -> Result<()> {
        let local = self.db.get_chapters_by_manga_id(manga_id)?;

        let mut to_update = Vec::new();
        let mut to_insert = Vec::new();

        for backup_chapter in chapters {
            let mut chapter = backup_chapter.to_chapter(manga_id);

            match local.iter().find(|c| c.url == chapter.url) {
                Some(db_chapter) => {
                    chapter.id = db_chapter.id;

                    // Local descriptive data wins once matched
                    chapter.name = db_chapter.name.clone();
                    chapter.scanlator = db_chapter.scanlator.clone();
                    chapter.chapter_number = db_chapter.chapter_number;
                    chapter.source_order = db_chapter.source_order;
                    chapter.date_fetch = db_chapter.date_fetch;
                    chapter.date_upload = db_chapter.date_upload;

                    // Never un-read; adopting the local read flag also
                    // adopts its page offset
                    if db_chapter.read && !chapter.read {
                        chapter.read = true;
                        chapter.last_page_read = db_chapter.last_page_read;
                    } else if chapter.last_page_read == 0 && db_chapter.last_page_read != 0 {
                        chapter.last_page_read = db_chapter.last_page_read;
                    }
                    // Never un-bookmark
                    if !chapter.bookmark && db_chapter.bookmark {
                        chapter.bookmark = true;
                    }

                    to_update.push(chapter);
                }
                None => to_insert.push(chapter),
            }
        }

        report.chapters_updated += to_update.len();
        report.chapters_added += to_insert.len();

        self.db.update_chapter_progress(&to_update)?;
        self.db.insert_chapters(&to_insert)
    }

    /// Merge tracking records by service id, never regressing the
    /// last-chapter-read value.
    fn restore_tracking(
        &self,
        manga_id: i64,
        tracking: &[BackupTracking],
        report: &mut RestoreReport,
    ) -> Result<()> {
        let local = self.db.get_tracks_by_manga_id(manga_id)?;

        let mut to_update = Vec::new();
        let mut to_insert = Vec::new();

        for backup_track in tracking {
            let incoming = backup_track.to_track(manga_id);

            match local.iter().find(|t| t.sync_id == incoming.sync_id) {
                Some(db_track) => {
                    let mut merged = db_track.clone();
                    merged.remote_id = incoming.remote_id;
                    merged.library_id = incoming.library_id;
                    merged.last_chapter_read =
                        db_track.last_chapter_read.max(incoming.last_chapter_read);
                    to_update.push(merged);
                }
                // New record; the store assigns the id
                None => to_insert.push(incoming),
            }
        }

        report.tracks_updated += to_update.len();
        report.tracks_added += to_insert.len();

        self.db.update_tracks(&to_update)?;
        self.db.insert_tracks(&to_insert)
    }

    /// Merge history records by chapter url.
    ///
    /// For existing history only the increment beyond the recorded
    /// duration is applied; records whose chapter does not exist locally
    /// are skipped. All resolved rows commit as one upsert batch.
    fn restore_history(
        &self,
        history: &[BackupHistory],
        report: &mut RestoreReport,
    ) -> Result<()> {
        let mut to_update = Vec::new();

        for record in history {
            if let Some(local) = self.db.get_history_by_chapter_url(&record.url)? {
                to_update.push(HistoryUpdate {
                    chapter_id: local.chapter_id,
                    last_read: record.last_read.max(local.last_read),
                    session_read_duration: record.time_read.max(local.time_read)
                        - local.time_read,
                });
            } else if let Some(chapter) = self.db.get_chapter_by_url(&record.url)? {
                to_update.push(HistoryUpdate {
                    chapter_id: chapter.id,
                    last_read: record.last_read,
                    session_read_duration: record.time_read,
                });
            } else {
                report.skipped_history += 1;
            }
        }

        report.history_applied += to_update.len();
        self.db.upsert_history(&to_update)
    }
}
