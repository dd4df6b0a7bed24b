mod schema;

pub use schema::Database;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Library entry (a manga the user follows or has discovered).
///
/// Identified naturally by `(source, url)`; the integer id is assigned
/// by the store. Only favorite entries are included in backups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manga {
    /// Store-assigned ID.
    pub id: i64,
    /// ID of the content source this entry came from.
    pub source: i64,
    /// Source-local URL, unique within a source.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Artist name.
    pub artist: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Genre tags (JSON array).
    pub genres_json: Option<String>,
    /// Publication status code.
    pub status: i64,
    /// Thumbnail/cover URL.
    pub thumbnail_url: Option<String>,
    /// Whether the entry is in the user's library.
    pub favorite: bool,
    /// Last time the chapter list was refreshed.
    pub last_update: i64,
    /// Whether full details have been fetched at least once.
    pub initialized: bool,
    /// Per-entry reader display flags.
    pub viewer_flags: i64,
    /// Per-entry chapter list display flags.
    pub chapter_flags: i64,
    /// Last time the cover was replaced.
    pub cover_last_modified: i64,
    /// When the entry was added to the library.
    pub date_added: i64,
}

impl Manga {
    /// Decode the genre tags column into a list.
    pub fn genres(&self) -> Vec<String> {
        self.genres_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default()
    }

    /// Encode a list of genre tags for storage.
    pub fn encode_genres(genres: &[String]) -> Option<String> {
        if genres.is_empty() {
            None
        } else {
            serde_json::to_string(genres).ok()
        }
    }
}

/// Chapter belonging to a library entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// Store-assigned ID.
    pub id: i64,
    /// Owning entry ID.
    pub manga_id: i64,
    /// Source-local URL, unique within the parent entry.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Scanlator group.
    pub scanlator: Option<String>,
    /// Whether the chapter has been read.
    pub read: bool,
    /// Whether the chapter is bookmarked.
    pub bookmark: bool,
    /// Last page the user stopped at.
    pub last_page_read: i64,
    /// Chapter number (decimal, e.g. 10.5).
    pub chapter_number: f64,
    /// Position in the source's chapter list.
    pub source_order: i64,
    /// When the chapter was first fetched.
    pub date_fetch: i64,
    /// When the chapter was published by the source.
    pub date_upload: i64,
}

/// User-defined library grouping.
///
/// The built-in default category is not stored as a row and never
/// appears in backups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Store-assigned ID.
    pub id: i64,
    /// Display name, unique.
    pub name: String,
    /// Position in the category list.
    pub sort: i64,
    /// Display-flag bitmask.
    pub flags: i64,
}

/// Link between a library entry and an external tracking service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Store-assigned ID.
    pub id: i64,
    /// Owning entry ID.
    pub manga_id: i64,
    /// Tracking service ID.
    pub sync_id: i64,
    /// Entry ID on the remote service.
    pub remote_id: i64,
    /// Library ID on the remote service, if any.
    pub library_id: Option<i64>,
    /// Title on the remote service.
    pub title: String,
    /// Last chapter marked read on the service (decimal).
    pub last_chapter_read: f64,
    /// Total chapters reported by the service.
    pub total_chapters: i64,
    /// Reading status code on the service.
    pub status: i64,
    /// User score on the service.
    pub score: f64,
    /// URL of the entry on the remote service.
    pub remote_url: String,
    /// Date reading started.
    pub start_date: i64,
    /// Date reading finished.
    pub finish_date: i64,
}

/// Read-session record, one logical row per chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    /// Store-assigned ID.
    pub id: i64,
    /// Chapter this history belongs to (unique).
    pub chapter_id: i64,
    /// Last time the chapter was read (epoch millis).
    pub last_read: i64,
    /// Cumulative read duration (millis).
    pub time_read: i64,
}

/// Pending history write, keyed by chapter.
#[derive(Debug, Clone)]
pub struct HistoryUpdate {
    /// Target chapter ID.
    pub chapter_id: i64,
    /// New last-read timestamp (epoch millis).
    pub last_read: i64,
    /// Session duration to add to the stored total (millis).
    pub session_read_duration: i64,
}

/// Metadata about an installed content source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Source ID (assigned by the source itself, not the store).
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Language code.
    pub lang: String,
}

/// Timestamp helper (epoch seconds).
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}
