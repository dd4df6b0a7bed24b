use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Library entries
            CREATE TABLE IF NOT EXISTS mangas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source INTEGER NOT NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                artist TEXT,
                author TEXT,
                description TEXT,
                genres_json TEXT,
                status INTEGER NOT NULL DEFAULT 0,
                thumbnail_url TEXT,
                favorite INTEGER NOT NULL DEFAULT 0,
                last_update INTEGER NOT NULL DEFAULT 0,
                initialized INTEGER NOT NULL DEFAULT 0,
                viewer_flags INTEGER NOT NULL DEFAULT 0,
                chapter_flags INTEGER NOT NULL DEFAULT 0,
                cover_last_modified INTEGER NOT NULL DEFAULT 0,
                date_added INTEGER NOT NULL DEFAULT 0,
                UNIQUE (source, url)
            );

            -- Chapters
            CREATE TABLE IF NOT EXISTS chapters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                manga_id INTEGER NOT NULL,
                url TEXT NOT NULL,
                name TEXT NOT NULL,
                scanlator TEXT,
                read INTEGER NOT NULL DEFAULT 0,
                bookmark INTEGER NOT NULL DEFAULT 0,
                last_page_read INTEGER NOT NULL DEFAULT 0,
                chapter_number REAL NOT NULL DEFAULT -1,
                source_order INTEGER NOT NULL DEFAULT 0,
                date_fetch INTEGER NOT NULL DEFAULT 0,
                date_upload INTEGER NOT NULL DEFAULT 0,
                UNIQUE (manga_id, url),
                FOREIGN KEY (manga_id) REFERENCES mangas(id) ON DELETE CASCADE
            );

            -- User categories
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                sort INTEGER NOT NULL DEFAULT 0,
                flags INTEGER NOT NULL DEFAULT 0
            );

            -- Entry <-> category assignments
            CREATE TABLE IF NOT EXISTS mangas_categories (
                manga_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (manga_id, category_id),
                FOREIGN KEY (manga_id) REFERENCES mangas(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );

            -- Tracking service links
            CREATE TABLE IF NOT EXISTS manga_sync (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                manga_id INTEGER NOT NULL,
                sync_id INTEGER NOT NULL,
                remote_id INTEGER NOT NULL DEFAULT 0,
                library_id INTEGER,
                title TEXT NOT NULL DEFAULT '',
                last_chapter_read REAL NOT NULL DEFAULT 0,
                total_chapters INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 0,
                score REAL NOT NULL DEFAULT 0,
                remote_url TEXT NOT NULL DEFAULT '',
                start_date INTEGER NOT NULL DEFAULT 0,
                finish_date INTEGER NOT NULL DEFAULT 0,
                UNIQUE (manga_id, sync_id),
                FOREIGN KEY (manga_id) REFERENCES mangas(id) ON DELETE CASCADE
            );

            -- Reading history, one row per chapter
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chapter_id INTEGER UNIQUE NOT NULL,
                last_read INTEGER NOT NULL DEFAULT 0,
                time_read INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (chapter_id) REFERENCES chapters(id) ON DELETE CASCADE
            );

            -- Installed source metadata
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                lang TEXT NOT NULL DEFAULT ''
            );

            -- Key/value preferences
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_chapters_manga ON chapters(manga_id);
            CREATE INDEX IF NOT EXISTS idx_chapters_url ON chapters(url);
            CREATE INDEX IF NOT EXISTS idx_sync_manga ON manga_sync(manga_id);
            CREATE INDEX IF NOT EXISTS idx_history_chapter ON history(chapter_id);
            CREATE INDEX IF NOT EXISTS idx_mangas_favorite ON mangas(favorite);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== MANGA OPERATIONS ==========

    /// Insert a library entry and return the store-assigned id.
    pub fn insert_manga(&self, manga: &Manga) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO mangas
             (source, url, title, artist, author, description, genres_json, status,
              thumbnail_url, favorite, last_update, initialized, viewer_flags,
              chapter_flags, cover_last_modified, date_added)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                manga.source,
                manga.url,
                manga.title,
                manga.artist,
                manga.author,
                manga.description,
                manga.genres_json,
                manga.status,
                manga.thumbnail_url,
                manga.favorite,
                manga.last_update,
                manga.initialized,
                manga.viewer_flags,
                manga.chapter_flags,
                manga.cover_last_modified,
                manga.date_added,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to insert manga: {}", e)))?;
        Ok(conn.last_insert_rowid())
    }

    /// Update all fields of an existing library entry.
    pub fn update_manga(&self, manga: &Manga) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE mangas SET
                source = ?1, url = ?2, title = ?3, artist = ?4, author = ?5,
                description = ?6, genres_json = ?7, status = ?8, thumbnail_url = ?9,
                favorite = ?10, last_update = ?11, initialized = ?12, viewer_flags = ?13,
                chapter_flags = ?14, cover_last_modified = ?15, date_added = ?16
             WHERE id = ?17",
            params![
                manga.source,
                manga.url,
                manga.title,
                manga.artist,
                manga.author,
                manga.description,
                manga.genres_json,
                manga.status,
                manga.thumbnail_url,
                manga.favorite,
                manga.last_update,
                manga.initialized,
                manga.viewer_flags,
                manga.chapter_flags,
                manga.cover_last_modified,
                manga.date_added,
                manga.id,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update manga: {}", e)))?;
        Ok(())
    }

    /// Get a library entry by id.
    pub fn get_manga_by_id(&self, id: i64) -> Result<Option<Manga>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE id = ?1", MANGA_SELECT),
            params![id],
            Self::row_to_manga,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get manga: {}", e)))
    }

    /// Get a library entry by its natural key.
    pub fn get_manga_by_url_and_source(&self, url: &str, source: i64) -> Result<Option<Manga>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE url = ?1 AND source = ?2", MANGA_SELECT),
            params![url, source],
            Self::row_to_manga,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get manga: {}", e)))
    }

    /// Get all favorite entries, ordered by title.
    pub fn get_favorites(&self) -> Result<Vec<Manga>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE favorite = 1 ORDER BY title",
                MANGA_SELECT
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let mangas = stmt
            .query_map([], Self::row_to_manga)
            .map_err(|e| AppError::Internal(format!("Failed to get favorites: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect favorites: {}", e)))?;

        Ok(mangas)
    }

    fn row_to_manga(row: &rusqlite::Row<'_>) -> rusqlite::Result<Manga> {
        Ok(Manga {
            id: row.get(0)?,
            source: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
            artist: row.get(4)?,
            author: row.get(5)?,
            description: row.get(6)?,
            genres_json: row.get(7)?,
            status: row.get(8)?,
            thumbnail_url: row.get(9)?,
            favorite: row.get(10)?,
            last_update: row.get(11)?,
            initialized: row.get(12)?,
            viewer_flags: row.get(13)?,
            chapter_flags: row.get(14)?,
            cover_last_modified: row.get(15)?,
            date_added: row.get(16)?,
        })
    }

    // ========== CHAPTER OPERATIONS ==========

    /// Get all chapters of an entry, in source order.
    pub fn get_chapters_by_manga_id(&self, manga_id: i64) -> Result<Vec<Chapter>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE manga_id = ?1 ORDER BY source_order",
                CHAPTER_SELECT
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let chapters = stmt
            .query_map(params![manga_id], Self::row_to_chapter)
            .map_err(|e| AppError::Internal(format!("Failed to get chapters: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect chapters: {}", e)))?;

        Ok(chapters)
    }

    /// Get a chapter by id.
    pub fn get_chapter_by_id(&self, id: i64) -> Result<Option<Chapter>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE id = ?1", CHAPTER_SELECT),
            params![id],
            Self::row_to_chapter,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get chapter: {}", e)))
    }

    /// Get a chapter by url.
    pub fn get_chapter_by_url(&self, url: &str) -> Result<Option<Chapter>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE url = ?1", CHAPTER_SELECT),
            params![url],
            Self::row_to_chapter,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get chapter: {}", e)))
    }

    /// Insert a batch of chapters as one transaction.
    pub fn insert_chapters(&self, chapters: &[Chapter]) -> Result<()> {
        if chapters.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        for chapter in chapters {
            tx.execute(
                "INSERT INTO chapters
                 (manga_id, url, name, scanlator, read, bookmark, last_page_read,
                  chapter_number, source_order, date_fetch, date_upload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    chapter.manga_id,
                    chapter.url,
                    chapter.name,
                    chapter.scanlator,
                    chapter.read,
                    chapter.bookmark,
                    chapter.last_page_read,
                    chapter.chapter_number,
                    chapter.source_order,
                    chapter.date_fetch,
                    chapter.date_upload,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to insert chapter: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit chapters: {}", e)))
    }

    /// Update only the progress fields of known chapters, as one transaction.
    pub fn update_chapter_progress(&self, chapters: &[Chapter]) -> Result<()> {
        if chapters.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        for chapter in chapters {
            tx.execute(
                "UPDATE chapters SET read = ?1, bookmark = ?2, last_page_read = ?3
                 WHERE id = ?4",
                params![
                    chapter.read,
                    chapter.bookmark,
                    chapter.last_page_read,
                    chapter.id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update chapter: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit chapters: {}", e)))
    }

    fn row_to_chapter(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chapter> {
        Ok(Chapter {
            id: row.get(0)?,
            manga_id: row.get(1)?,
            url: row.get(2)?,
            name: row.get(3)?,
            scanlator: row.get(4)?,
            read: row.get(5)?,
            bookmark: row.get(6)?,
            last_page_read: row.get(7)?,
            chapter_number: row.get(8)?,
            source_order: row.get(9)?,
            date_fetch: row.get(10)?,
            date_upload: row.get(11)?,
        })
    }

    // ========== CATEGORY OPERATIONS ==========

    /// List all user categories, ordered by position.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, name, sort, flags FROM categories ORDER BY sort")
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let categories = stmt
            .query_map([], Self::row_to_category)
            .map_err(|e| AppError::Internal(format!("Failed to list categories: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect categories: {}", e)))?;

        Ok(categories)
    }

    /// Get the categories an entry is assigned to, ordered by position.
    pub fn get_categories_for_manga(&self, manga_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.name, c.sort, c.flags
                 FROM categories c
                 JOIN mangas_categories mc ON c.id = mc.category_id
                 WHERE mc.manga_id = ?1
                 ORDER BY c.sort",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let categories = stmt
            .query_map(params![manga_id], Self::row_to_category)
            .map_err(|e| AppError::Internal(format!("Failed to get categories: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect categories: {}", e)))?;

        Ok(categories)
    }

    /// Insert a category and return the store-assigned id.
    pub fn insert_category(&self, name: &str, sort: i64, flags: i64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO categories (name, sort, flags) VALUES (?1, ?2, ?3)",
            params![name, sort, flags],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Internal(format!("Category '{}' already exists", name))
            } else {
                AppError::Internal(format!("Failed to insert category: {}", e))
            }
        })?;
        Ok(conn.last_insert_rowid())
    }

    /// Replace an entry's category assignments, as one transaction.
    pub fn set_manga_categories(&self, manga_id: i64, category_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM mangas_categories WHERE manga_id = ?1",
            params![manga_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to clear categories: {}", e)))?;

        for category_id in category_ids {
            tx.execute(
                "INSERT OR IGNORE INTO mangas_categories (manga_id, category_id) VALUES (?1, ?2)",
                params![manga_id, category_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to assign category: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit categories: {}", e)))
    }

    fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            sort: row.get(2)?,
            flags: row.get(3)?,
        })
    }

    // ========== TRACKING OPERATIONS ==========

    /// Get the tracking records of an entry.
    pub fn get_tracks_by_manga_id(&self, manga_id: i64) -> Result<Vec<Track>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("{} WHERE manga_id = ?1", TRACK_SELECT))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let tracks = stmt
            .query_map(params![manga_id], Self::row_to_track)
            .map_err(|e| AppError::Internal(format!("Failed to get tracks: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect tracks: {}", e)))?;

        Ok(tracks)
    }

    /// Insert a batch of tracking records as one transaction.
    pub fn insert_tracks(&self, tracks: &[Track]) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        for track in tracks {
            tx.execute(
                "INSERT INTO manga_sync
                 (manga_id, sync_id, remote_id, library_id, title, last_chapter_read,
                  total_chapters, status, score, remote_url, start_date, finish_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    track.manga_id,
                    track.sync_id,
                    track.remote_id,
                    track.library_id,
                    track.title,
                    track.last_chapter_read,
                    track.total_chapters,
                    track.status,
                    track.score,
                    track.remote_url,
                    track.start_date,
                    track.finish_date,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to insert track: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit tracks: {}", e)))
    }

    /// Update a batch of tracking records as one transaction.
    pub fn update_tracks(&self, tracks: &[Track]) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        for track in tracks {
            tx.execute(
                "UPDATE manga_sync SET
                    manga_id = ?1, sync_id = ?2, remote_id = ?3, library_id = ?4,
                    title = ?5, last_chapter_read = ?6, total_chapters = ?7, status = ?8,
                    score = ?9, remote_url = ?10, start_date = ?11, finish_date = ?12
                 WHERE id = ?13",
                params![
                    track.manga_id,
                    track.sync_id,
                    track.remote_id,
                    track.library_id,
                    track.title,
                    track.last_chapter_read,
                    track.total_chapters,
                    track.status,
                    track.score,
                    track.remote_url,
                    track.start_date,
                    track.finish_date,
                    track.id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update track: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit tracks: {}", e)))
    }

    fn row_to_track(row: &rusqlite::Row<'_>) -> rusqlite::Result<Track> {
        Ok(Track {
            id: row.get(0)?,
            manga_id: row.get(1)?,
            sync_id: row.get(2)?,
            remote_id: row.get(3)?,
            library_id: row.get(4)?,
            title: row.get(5)?,
            last_chapter_read: row.get(6)?,
            total_chapters: row.get(7)?,
            status: row.get(8)?,
            score: row.get(9)?,
            remote_url: row.get(10)?,
            start_date: row.get(11)?,
            finish_date: row.get(12)?,
        })
    }

    // ========== HISTORY OPERATIONS ==========

    /// Get all history rows of an entry's chapters.
    pub fn get_history_by_manga_id(&self, manga_id: i64) -> Result<Vec<History>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT h.id, h.chapter_id, h.last_read, h.time_read
                 FROM history h
                 JOIN chapters c ON h.chapter_id = c.id
                 WHERE c.manga_id = ?1",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let history = stmt
            .query_map(params![manga_id], Self::row_to_history)
            .map_err(|e| AppError::Internal(format!("Failed to get history: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect history: {}", e)))?;

        Ok(history)
    }

    /// Get the history row for the chapter with the given url.
    pub fn get_history_by_chapter_url(&self, url: &str) -> Result<Option<History>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT h.id, h.chapter_id, h.last_read, h.time_read
             FROM history h
             JOIN chapters c ON h.chapter_id = c.id
             WHERE c.url = ?1",
            params![url],
            Self::row_to_history,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get history: {}", e)))
    }

    /// Apply a batch of history updates as one transaction.
    ///
    /// The session duration is added to the stored total; the last-read
    /// timestamp is replaced.
    pub fn upsert_history(&self, updates: &[HistoryUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        for update in updates {
            tx.execute(
                "INSERT INTO history (chapter_id, last_read, time_read)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (chapter_id) DO UPDATE SET
                    last_read = excluded.last_read,
                    time_read = history.time_read + excluded.time_read",
                params![update.chapter_id, update.last_read, update.session_read_duration],
            )
            .map_err(|e| AppError::Internal(format!("Failed to upsert history: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit history: {}", e)))
    }

    fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<History> {
        Ok(History {
            id: row.get(0)?,
            chapter_id: row.get(1)?,
            last_read: row.get(2)?,
            time_read: row.get(3)?,
        })
    }

    // ========== SOURCE OPERATIONS ==========

    /// Register or update an installed source.
    pub fn upsert_source(&self, source: &SourceInfo) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sources (id, name, lang) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                lang = excluded.lang",
            params![source.id, source.name, source.lang],
        )
        .map_err(|e| AppError::Internal(format!("Failed to upsert source: {}", e)))?;
        Ok(())
    }

    /// Get an installed source by id.
    pub fn get_source(&self, id: i64) -> Result<Option<SourceInfo>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, lang FROM sources WHERE id = ?1",
            params![id],
            |row| {
                Ok(SourceInfo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    lang: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get source: {}", e)))
    }

    // ========== PREFERENCE OPERATIONS ==========

    /// Set a boolean preference.
    pub fn set_flag_pref(&self, key: &str, value: bool) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, if value { "1" } else { "0" }],
        )
        .map_err(|e| AppError::Internal(format!("Failed to set preference: {}", e)))?;
        Ok(())
    }

    /// Get a boolean preference, if set.
    pub fn get_flag_pref(&self, key: &str) -> Result<Option<bool>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM preferences WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get preference: {}", e)))
        .map(|value| value.map(|v| v == "1"))
    }
}

const MANGA_SELECT: &str = "SELECT id, source, url, title, artist, author, description, genres_json,
            status, thumbnail_url, favorite, last_update, initialized, viewer_flags,
            chapter_flags, cover_last_modified, date_added
     FROM mangas";

const CHAPTER_SELECT: &str = "SELECT id, manga_id, url, name, scanlator, read, bookmark, last_page_read,
            chapter_number, source_order, date_fetch, date_upload
     FROM chapters";

const TRACK_SELECT: &str = "SELECT id, manga_id, sync_id, remote_id, library_id, title, last_chapter_read,
            total_chapters, status, score, remote_url, start_date, finish_date
     FROM manga_sync";
