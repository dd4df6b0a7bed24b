//! On-the-wire shape of a backup archive.
//!
//! The archive body is a bincode-encoded [`Backup`] graph, gzip-compressed
//! on disk. The version number is the first field of the stream so a
//! decoder can reject unknown formats before touching the rest. bincode
//! requires every field to be present, so compatibility across format
//! revisions is handled by the version gate rather than per-field
//! defaulting; the serde defaults below still give safe empty values for
//! optional sections when constructing archives in code.

use crate::db::{Category, Chapter, History, Manga, SourceInfo, Track};
use serde::{Deserialize, Serialize};

/// Current archive format version.
pub const CURRENT_BACKUP_VERSION: u32 = 2;

/// A full library snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    /// Archive format version.
    pub version: u32,
    /// Backed-up library entries with their optional sections.
    #[serde(default)]
    pub mangas: Vec<BackupManga>,
    /// Non-system categories, when the category section is enabled.
    #[serde(default)]
    pub categories: Vec<BackupCategory>,
    /// One record per distinct source referenced by the entries.
    #[serde(default)]
    pub sources: Vec<BackupSource>,
}

impl Default for Backup {
    fn default() -> Self {
        Self {
            version: CURRENT_BACKUP_VERSION,
            mangas: Vec::new(),
            categories: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// A library entry in serializable form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupManga {
    /// Source id.
    pub source: i64,
    /// Source-local URL (natural key together with `source`).
    pub url: String,
    /// Display title.
    pub title: String,
    /// Artist name.
    #[serde(default)]
    pub artist: Option<String>,
    /// Author name.
    #[serde(default)]
    pub author: Option<String>,
    /// Long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Genre tags.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Publication status code.
    #[serde(default)]
    pub status: i64,
    /// Thumbnail URL.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Favorite flag; entries in a backup are favorites.
    #[serde(default)]
    pub favorite: bool,
    /// Last chapter-list refresh time.
    #[serde(default)]
    pub last_update: i64,
    /// Reader display flags.
    #[serde(default)]
    pub viewer_flags: i64,
    /// Chapter list display flags.
    #[serde(default)]
    pub chapter_flags: i64,
    /// Last cover replacement time.
    #[serde(default)]
    pub cover_last_modified: i64,
    /// When the entry was added to the library.
    #[serde(default)]
    pub date_added: i64,
    /// Chapters, when the chapter section is enabled.
    #[serde(default)]
    pub chapters: Vec<BackupChapter>,
    /// Category order-indices (not ids), when the category section is enabled.
    #[serde(default)]
    pub categories: Vec<i64>,
    /// Tracking records, when the tracking section is enabled.
    #[serde(default)]
    pub tracking: Vec<BackupTracking>,
    /// History records keyed by chapter url, when the history section is enabled.
    #[serde(default)]
    pub history: Vec<BackupHistory>,
}

impl BackupManga {
    /// Build the serializable form of a library entry.
    pub fn from_entry(manga: &Manga) -> Self {
        Self {
            source: manga.source,
            url: manga.url.clone(),
            title: manga.title.clone(),
            artist: manga.artist.clone(),
            author: manga.author.clone(),
            description: manga.description.clone(),
            genres: manga.genres(),
            status: manga.status,
            thumbnail_url: manga.thumbnail_url.clone(),
            favorite: manga.favorite,
            last_update: manga.last_update,
            viewer_flags: manga.viewer_flags,
            chapter_flags: manga.chapter_flags,
            cover_last_modified: manga.cover_last_modified,
            date_added: manga.date_added,
            chapters: Vec::new(),
            categories: Vec::new(),
            tracking: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Convert back into a store row. The id is left unassigned.
    pub fn to_entry(&self) -> Manga {
        Manga {
            id: 0,
            source: self.source,
            url: self.url.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            genres_json: Manga::encode_genres(&self.genres),
            status: self.status,
            thumbnail_url: self.thumbnail_url.clone(),
            favorite: self.favorite,
            last_update: self.last_update,
            initialized: false,
            viewer_flags: self.viewer_flags,
            chapter_flags: self.chapter_flags,
            cover_last_modified: self.cover_last_modified,
            date_added: self.date_added,
        }
    }
}

/// A chapter in serializable form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupChapter {
    /// Source-local URL, unique within the parent entry.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Scanlator group.
    #[serde(default)]
    pub scanlator: Option<String>,
    /// Read flag.
    #[serde(default)]
    pub read: bool,
    /// Bookmark flag.
    #[serde(default)]
    pub bookmark: bool,
    /// Last page read.
    #[serde(default)]
    pub last_page_read: i64,
    /// Chapter number.
    #[serde(default)]
    pub chapter_number: f64,
    /// Position in the source's chapter list.
    #[serde(default)]
    pub source_order: i64,
    /// First fetch time.
    #[serde(default)]
    pub date_fetch: i64,
    /// Source publication time.
    #[serde(default)]
    pub date_upload: i64,
}

impl BackupChapter {
    /// Build the serializable form of a chapter.
    pub fn from_chapter(chapter: &Chapter) -> Self {
        Self {
            url: chapter.url.clone(),
            name: chapter.name.clone(),
            scanlator: chapter.scanlator.clone(),
            read: chapter.read,
            bookmark: chapter.bookmark,
            last_page_read: chapter.last_page_read,
            chapter_number: chapter.chapter_number,
            source_order: chapter.source_order,
            date_fetch: chapter.date_fetch,
            date_upload: chapter.date_upload,
        }
    }

    /// Convert back into a store row under the given parent entry.
    pub fn to_chapter(&self, manga_id: i64) -> Chapter {
        Chapter {
            id: 0,
            manga_id,
            url: self.url.clone(),
            name: self.name.clone(),
            scanlator: self.scanlator.clone(),
            read: self.read,
            bookmark: self.bookmark,
            last_page_read: self.last_page_read,
            chapter_number: self.chapter_number,
            source_order: self.source_order,
            date_fetch: self.date_fetch,
            date_upload: self.date_upload,
        }
    }
}

/// A category in serializable form. The order value doubles as the
/// cross-reference key used by [`BackupManga::categories`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupCategory {
    /// Display name.
    pub name: String,
    /// Position in the category list; referenced by entries as order-index.
    #[serde(default)]
    pub order: i64,
    /// Display-flag bitmask.
    #[serde(default)]
    pub flags: i64,
}

impl BackupCategory {
    /// Build the serializable form of a category.
    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            order: category.sort,
            flags: category.flags,
        }
    }

    /// Convert back into a store row. The id is left unassigned.
    pub fn to_category(&self) -> Category {
        Category {
            id: 0,
            name: self.name.clone(),
            sort: self.order,
            flags: self.flags,
        }
    }
}

/// A tracking record in serializable form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupTracking {
    /// Tracking service id.
    pub sync_id: i64,
    /// Entry id on the remote service.
    #[serde(default)]
    pub remote_id: i64,
    /// Library id on the remote service.
    #[serde(default)]
    pub library_id: Option<i64>,
    /// Title on the remote service.
    #[serde(default)]
    pub title: String,
    /// Last chapter marked read on the service.
    #[serde(default)]
    pub last_chapter_read: f64,
    /// Total chapters reported by the service.
    #[serde(default)]
    pub total_chapters: i64,
    /// Status code on the service.
    #[serde(default)]
    pub status: i64,
    /// User score on the service.
    #[serde(default)]
    pub score: f64,
    /// URL of the entry on the remote service.
    #[serde(default)]
    pub remote_url: String,
    /// Date reading started.
    #[serde(default)]
    pub start_date: i64,
    /// Date reading finished.
    #[serde(default)]
    pub finish_date: i64,
}

impl BackupTracking {
    /// Build the serializable form of a tracking record.
    pub fn from_track(track: &Track) -> Self {
        Self {
            sync_id: track.sync_id,
            remote_id: track.remote_id,
            library_id: track.library_id,
            title: track.title.clone(),
            last_chapter_read: track.last_chapter_read,
            total_chapters: track.total_chapters,
            status: track.status,
            score: track.score,
            remote_url: track.remote_url.clone(),
            start_date: track.start_date,
            finish_date: track.finish_date,
        }
    }

    /// Convert back into a store row under the given parent entry.
    pub fn to_track(&self, manga_id: i64) -> Track {
        Track {
            id: 0,
            manga_id,
            sync_id: self.sync_id,
            remote_id: self.remote_id,
            library_id: self.library_id,
            title: self.title.clone(),
            last_chapter_read: self.last_chapter_read,
            total_chapters: self.total_chapters,
            status: self.status,
            score: self.score,
            remote_url: self.remote_url.clone(),
            start_date: self.start_date,
            finish_date: self.finish_date,
        }
    }
}

/// A history record in serializable form, keyed by chapter url so it can
/// be re-attached on a store with different chapter ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupHistory {
    /// URL of the chapter the session belongs to.
    pub url: String,
    /// Last read timestamp (epoch millis).
    #[serde(default)]
    pub last_read: i64,
    /// Cumulative read duration (millis).
    #[serde(default)]
    pub time_read: i64,
}

impl BackupHistory {
    /// Build the serializable form of a history row.
    pub fn from_history(url: &str, history: &History) -> Self {
        Self {
            url: url.to_string(),
            last_read: history.last_read,
            time_read: history.time_read,
        }
    }
}

/// Source metadata carried for labelling entries whose source is not
/// installed on the restoring device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupSource {
    /// Source id.
    pub id: i64,
    /// Display name at backup time.
    pub name: String,
    /// Language code.
    #[serde(default)]
    pub lang: String,
}

impl BackupSource {
    /// Build the serializable form of a source record.
    pub fn from_source(source: &SourceInfo) -> Self {
        Self {
            id: source.id,
            name: source.name.clone(),
            lang: source.lang.clone(),
        }
    }
}
