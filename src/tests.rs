use crate::backup::{
    BACKUP_ALL, BACKUP_CATEGORY, BACKUP_CHAPTER, Backup, BackupCategory, BackupChapter,
    BackupEncoder, BackupHistory, BackupManga, BackupSource, BackupTracking,
    CURRENT_BACKUP_VERSION, RestoreEngine, backup_filename, decode_backup, encode_backup,
    is_backup_filename, prune_automatic_backups, read_backup_file, validate_backup,
    write_backup_file,
};
use crate::config::Config;
use crate::db::{Chapter, Database, HistoryUpdate, Manga, SourceInfo, Track, now_timestamp};
use crate::error::AppError;
use crate::source::SourceRegistry;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn sample_manga(source: i64, url: &str, title: &str) -> Manga {
    Manga {
        id: 0,
        source,
        url: url.to_string(),
        title: title.to_string(),
        artist: Some("Artist".to_string()),
        author: Some("Author".to_string()),
        description: Some("A description".to_string()),
        genres_json: Manga::encode_genres(&["Action".to_string(), "Drama".to_string()]),
        status: 1,
        thumbnail_url: Some("https://example.org/cover.png".to_string()),
        favorite: true,
        last_update: 1000,
        initialized: true,
        viewer_flags: 0,
        chapter_flags: 0,
        cover_last_modified: 0,
        date_added: now_timestamp(),
    }
}

fn sample_chapter(manga_id: i64, url: &str, number: f64, order: i64) -> Chapter {
    Chapter {
        id: 0,
        manga_id,
        url: url.to_string(),
        name: format!("Chapter {}", number),
        scanlator: Some("Group".to_string()),
        read: false,
        bookmark: false,
        last_page_read: 0,
        chapter_number: number,
        source_order: order,
        date_fetch: 100,
        date_upload: 50,
    }
}

fn sample_track(manga_id: i64, sync_id: i64, last_chapter_read: f64) -> Track {
    Track {
        id: 0,
        manga_id,
        sync_id,
        remote_id: 77,
        library_id: None,
        title: "Tracked title".to_string(),
        last_chapter_read,
        total_chapters: 100,
        status: 1,
        score: 8.0,
        remote_url: "https://tracker.example/77".to_string(),
        start_date: 0,
        finish_date: 0,
    }
}

fn insert_favorite(db: &Database, source: i64, url: &str, title: &str) -> i64 {
    db.insert_manga(&sample_manga(source, url, title)).unwrap()
}

fn snapshot_all(db: &Database) -> Backup {
    let registry = SourceRegistry::new(db.clone());
    BackupEncoder::new(db, &registry).snapshot(BACKUP_ALL).unwrap()
}

// ========== DATABASE ==========

#[test]
fn db_insert_and_get_manga() {
    let db = test_db();
    let id = insert_favorite(&db, 1, "/manga/1", "Alpha");

    let by_id = db.get_manga_by_id(id).unwrap().unwrap();
    assert_eq!(by_id.title, "Alpha");
    assert_eq!(by_id.genres(), vec!["Action", "Drama"]);

    let by_key = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    assert_eq!(by_key.id, id);

    assert!(db.get_manga_by_url_and_source("/manga/1", 2).unwrap().is_none());
}

#[test]
fn db_natural_key_is_unique() {
    let db = test_db();
    insert_favorite(&db, 1, "/manga/1", "Alpha");
    assert!(db.insert_manga(&sample_manga(1, "/manga/1", "Copy")).is_err());
}

#[test]
fn db_get_favorites_filters_non_favorites() {
    let db = test_db();
    insert_favorite(&db, 1, "/manga/1", "Alpha");

    let mut browsed = sample_manga(1, "/manga/2", "Beta");
    browsed.favorite = false;
    db.insert_manga(&browsed).unwrap();

    let favorites = db.get_favorites().unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].title, "Alpha");
}

#[test]
fn db_insert_and_get_chapters() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");

    db.insert_chapters(&[
        sample_chapter(manga_id, "/c/1", 1.0, 0),
        sample_chapter(manga_id, "/c/2", 2.0, 1),
    ])
    .unwrap();

    let chapters = db.get_chapters_by_manga_id(manga_id).unwrap();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].url, "/c/1");

    let by_url = db.get_chapter_by_url("/c/2").unwrap().unwrap();
    assert_eq!(by_url.chapter_number, 2.0);
}

#[test]
fn db_update_chapter_progress_touches_progress_only() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    db.insert_chapters(&[sample_chapter(manga_id, "/c/1", 1.0, 0)])
        .unwrap();

    let mut chapter = db.get_chapter_by_url("/c/1").unwrap().unwrap();
    chapter.read = true;
    chapter.last_page_read = 12;
    chapter.name = "Renamed".to_string();
    db.update_chapter_progress(&[chapter]).unwrap();

    let found = db.get_chapter_by_url("/c/1").unwrap().unwrap();
    assert!(found.read);
    assert_eq!(found.last_page_read, 12);
    // Descriptive fields are not part of the progress update
    assert_eq!(found.name, "Chapter 1");
}

#[test]
fn db_category_assignment_is_replaced() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    let action = db.insert_category("Action", 0, 0).unwrap();
    let drama = db.insert_category("Drama", 1, 0).unwrap();

    db.set_manga_categories(manga_id, &[action]).unwrap();
    db.set_manga_categories(manga_id, &[drama]).unwrap();

    let assigned = db.get_categories_for_manga(manga_id).unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].name, "Drama");
}

#[test]
fn db_history_upsert_is_additive() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    db.insert_chapters(&[sample_chapter(manga_id, "/c/1", 1.0, 0)])
        .unwrap();
    let chapter = db.get_chapter_by_url("/c/1").unwrap().unwrap();

    db.upsert_history(&[HistoryUpdate {
        chapter_id: chapter.id,
        last_read: 1000,
        session_read_duration: 50,
    }])
    .unwrap();
    db.upsert_history(&[HistoryUpdate {
        chapter_id: chapter.id,
        last_read: 2000,
        session_read_duration: 25,
    }])
    .unwrap();

    let history = db.get_history_by_chapter_url("/c/1").unwrap().unwrap();
    assert_eq!(history.last_read, 2000);
    assert_eq!(history.time_read, 75);
}

#[test]
fn db_flag_preferences() {
    let db = test_db();
    assert!(db.get_flag_pref("categorized_display").unwrap().is_none());

    db.set_flag_pref("categorized_display", true).unwrap();
    assert_eq!(db.get_flag_pref("categorized_display").unwrap(), Some(true));

    db.set_flag_pref("categorized_display", false).unwrap();
    assert_eq!(db.get_flag_pref("categorized_display").unwrap(), Some(false));
}

#[test]
fn source_registry_stubs_unknown_sources() {
    let db = test_db();
    let registry = SourceRegistry::new(db.clone());

    registry
        .register(&SourceInfo {
            id: 1,
            name: "MangaSource".to_string(),
            lang: "en".to_string(),
        })
        .unwrap();

    assert_eq!(registry.get_or_stub(1).unwrap().name, "MangaSource");

    let stub = registry.get_or_stub(99).unwrap();
    assert_eq!(stub.name, "Unknown (99)");
    assert!(stub.lang.is_empty());
}

// ========== ENCODE / DECODE ==========

#[test]
fn backup_roundtrip_preserves_all_sections() {
    let db = test_db();
    let registry = SourceRegistry::new(db.clone());
    registry
        .register(&SourceInfo {
            id: 1,
            name: "MangaSource".to_string(),
            lang: "en".to_string(),
        })
        .unwrap();

    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    let action = db.insert_category("Action", 0, 4).unwrap();
    db.set_manga_categories(manga_id, &[action]).unwrap();

    let mut chapter = sample_chapter(manga_id, "/c/1", 1.0, 0);
    chapter.read = true;
    chapter.last_page_read = 12;
    db.insert_chapters(&[chapter]).unwrap();
    let chapter = db.get_chapter_by_url("/c/1").unwrap().unwrap();

    db.insert_tracks(&[sample_track(manga_id, 3, 42.0)]).unwrap();
    db.upsert_history(&[HistoryUpdate {
        chapter_id: chapter.id,
        last_read: 1000,
        session_read_duration: 50,
    }])
    .unwrap();

    let backup = snapshot_all(&db);
    let bytes = encode_backup(&backup).unwrap();
    let decoded = decode_backup(&bytes).unwrap();

    assert_eq!(decoded.version, CURRENT_BACKUP_VERSION);
    assert_eq!(decoded.mangas.len(), 1);

    let entry = &decoded.mangas[0];
    assert_eq!(entry.title, "Alpha");
    assert_eq!(entry.genres, vec!["Action", "Drama"]);
    assert_eq!(entry.chapters.len(), 1);
    assert!(entry.chapters[0].read);
    assert_eq!(entry.chapters[0].last_page_read, 12);
    assert_eq!(entry.categories, vec![0]);
    assert_eq!(entry.tracking.len(), 1);
    assert_eq!(entry.tracking[0].last_chapter_read, 42.0);
    assert_eq!(entry.history.len(), 1);
    assert_eq!(entry.history[0].url, "/c/1");
    assert_eq!(entry.history[0].time_read, 50);

    assert_eq!(decoded.categories.len(), 1);
    assert_eq!(decoded.categories[0].flags, 4);
    assert_eq!(decoded.sources.len(), 1);
    assert_eq!(decoded.sources[0].name, "MangaSource");
}

#[test]
fn backup_of_empty_library_is_valid() {
    let db = test_db();
    let backup = snapshot_all(&db);

    let bytes = encode_backup(&backup).unwrap();
    let decoded = decode_backup(&bytes).unwrap();

    assert!(decoded.mangas.is_empty());
    assert!(validate_backup(&decoded).is_ok());
}

#[test]
fn encoder_skips_sections_per_flags() {
    let db = test_db();
    let registry = SourceRegistry::new(db.clone());
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    let action = db.insert_category("Action", 0, 0).unwrap();
    db.set_manga_categories(manga_id, &[action]).unwrap();
    db.insert_chapters(&[sample_chapter(manga_id, "/c/1", 1.0, 0)])
        .unwrap();

    let backup = BackupEncoder::new(&db, &registry)
        .snapshot(BACKUP_CHAPTER)
        .unwrap();

    assert_eq!(backup.mangas[0].chapters.len(), 1);
    assert!(backup.mangas[0].categories.is_empty());
    assert!(backup.categories.is_empty());

    let backup = BackupEncoder::new(&db, &registry)
        .snapshot(BACKUP_CATEGORY)
        .unwrap();
    assert!(backup.mangas[0].chapters.is_empty());
    assert_eq!(backup.categories.len(), 1);
}

#[test]
fn encoder_stubs_uninstalled_sources() {
    let db = test_db();
    insert_favorite(&db, 42, "/manga/1", "Alpha");

    let backup = snapshot_all(&db);
    assert_eq!(backup.sources.len(), 1);
    assert_eq!(backup.sources[0].id, 42);
    assert_eq!(backup.sources[0].name, "Unknown (42)");
}

#[test]
fn encoder_skips_blank_history_rows() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    db.insert_chapters(&[
        sample_chapter(manga_id, "/c/1", 1.0, 0),
        sample_chapter(manga_id, "/c/2", 2.0, 1),
    ])
    .unwrap();
    let read = db.get_chapter_by_url("/c/1").unwrap().unwrap();
    let blank = db.get_chapter_by_url("/c/2").unwrap().unwrap();

    db.upsert_history(&[
        HistoryUpdate {
            chapter_id: read.id,
            last_read: 1000,
            session_read_duration: 50,
        },
        HistoryUpdate {
            chapter_id: blank.id,
            last_read: 0,
            session_read_duration: 0,
        },
    ])
    .unwrap();

    let backup = snapshot_all(&db);
    assert_eq!(backup.mangas[0].history.len(), 1);
    assert_eq!(backup.mangas[0].history[0].url, "/c/1");
}

#[test]
fn decode_rejects_garbage() {
    assert!(matches!(
        decode_backup(b"definitely not gzip"),
        Err(AppError::InvalidBackup(_))
    ));
    assert!(matches!(
        decode_backup(&[]),
        Err(AppError::InvalidBackup(_))
    ));
}

#[test]
fn decode_rejects_future_version() {
    let backup = Backup {
        version: CURRENT_BACKUP_VERSION + 1,
        ..Default::default()
    };
    let bytes = encode_backup(&backup).unwrap();

    assert!(matches!(
        decode_backup(&bytes),
        Err(AppError::UnsupportedVersion(v)) if v == CURRENT_BACKUP_VERSION + 1
    ));
}

#[test]
fn validate_rejects_missing_source_metadata() {
    let mut backup = Backup::default();
    backup.mangas.push(BackupManga {
        source: 1,
        url: "/manga/1".to_string(),
        title: "Alpha".to_string(),
        favorite: true,
        ..Default::default()
    });

    assert!(matches!(
        validate_backup(&backup),
        Err(AppError::InvalidBackup(_))
    ));

    backup.sources.push(BackupSource {
        id: 1,
        name: "MangaSource".to_string(),
        lang: "en".to_string(),
    });
    assert!(validate_backup(&backup).is_ok());
}

// ========== FILE HANDLING ==========

#[test]
fn backup_filename_convention() {
    let time = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let name = backup_filename(time);
    assert!(name.starts_with("mangavault_"));
    assert!(name.ends_with(".bak.gz"));
    assert!(is_backup_filename(&name));

    assert!(!is_backup_filename("mangavault_.bak.gz"));
    assert!(!is_backup_filename("other_2024-01-01_00-00.bak.gz"));
    assert!(!is_backup_filename("mangavault_notes.bak.gz"));
}

#[test]
fn prune_keeps_most_recent_backups() {
    let dir = tempfile::tempdir().unwrap();
    for stamp in ["2024-01-01_00-00", "2024-02-01_00-00", "2024-03-01_00-00"] {
        std::fs::write(dir.path().join(format!("mangavault_{}.bak.gz", stamp)), b"x").unwrap();
    }
    std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

    // Keep room for one new file so two backups exist afterwards
    let deleted = prune_automatic_backups(dir.path(), 2).unwrap();
    assert_eq!(deleted, 2);

    assert!(dir.path().join("mangavault_2024-03-01_00-00.bak.gz").exists());
    assert!(!dir.path().join("mangavault_2024-01-01_00-00.bak.gz").exists());
    assert!(dir.path().join("unrelated.txt").exists());
}

#[test]
fn write_backup_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db();
    let registry = SourceRegistry::new(db.clone());
    insert_favorite(&db, 1, "/manga/1", "Alpha");

    let path = write_backup_file(&db, &registry, dir.path(), BACKUP_ALL, true, 2).unwrap();
    assert!(path.exists());
    assert!(is_backup_filename(
        path.file_name().unwrap().to_str().unwrap()
    ));

    let decoded = read_backup_file(&path).unwrap();
    assert_eq!(decoded.mangas.len(), 1);

    // No leftover temp file
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn write_backup_file_manual_destination() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db();
    let registry = SourceRegistry::new(db.clone());
    insert_favorite(&db, 1, "/manga/1", "Alpha");

    let dest = dir.path().join("export").join("my-library.bak.gz");
    let path = write_backup_file(&db, &registry, &dest, BACKUP_ALL, false, 2).unwrap();
    assert_eq!(path, dest);
    assert!(read_backup_file(&path).is_ok());
}

// ========== RESTORE ==========

#[test]
fn restore_inserts_new_entries() {
    let db = test_db();
    let source_db = test_db();
    insert_favorite(&source_db, 1, "/manga/1", "Alpha");
    let backup = snapshot_all(&source_db);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.manga_added, 1);
    assert_eq!(report.manga_updated, 0);

    let restored = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    assert_eq!(restored.title, "Alpha");
    assert!(restored.favorite);
    // Description present, so the entry counts as initialized
    assert!(restored.initialized);
}

#[test]
fn restore_new_entry_without_description_is_uninitialized() {
    let db = test_db();
    let mut backup = Backup::default();
    backup.mangas.push(BackupManga {
        source: 1,
        url: "/manga/1".to_string(),
        title: "Alpha".to_string(),
        favorite: true,
        ..Default::default()
    });

    RestoreEngine::new(db.clone()).restore(&backup).unwrap();

    let restored = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    assert!(!restored.initialized);
}

#[test]
fn restore_updates_existing_entry_in_place() {
    let db = test_db();
    let local_id = insert_favorite(&db, 1, "/manga/1", "Old Title");

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "New Title"));
    entry.favorite = false;
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.manga_updated, 1);

    let merged = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    assert_eq!(merged.id, local_id);
    assert_eq!(merged.title, "New Title");
    // Favorite never downgrades
    assert!(merged.favorite);
}

#[test]
fn restore_is_idempotent() {
    let source_db = test_db();
    let manga_id = insert_favorite(&source_db, 1, "/manga/1", "Alpha");
    source_db
        .insert_chapters(&[sample_chapter(manga_id, "/c/1", 1.0, 0)])
        .unwrap();
    source_db
        .insert_tracks(&[sample_track(manga_id, 3, 42.0)])
        .unwrap();
    let backup = snapshot_all(&source_db);

    let db = test_db();
    let engine = RestoreEngine::new(db.clone());
    engine.restore(&backup).unwrap();
    let report = engine.restore(&backup).unwrap();

    assert_eq!(report.manga_added, 0);
    assert_eq!(report.manga_updated, 1);
    assert_eq!(report.chapters_added, 0);
    assert_eq!(report.tracks_added, 0);

    assert_eq!(db.get_favorites().unwrap().len(), 1);
    let manga = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    assert_eq!(db.get_chapters_by_manga_id(manga.id).unwrap().len(), 1);
    assert_eq!(db.get_tracks_by_manga_id(manga.id).unwrap().len(), 1);
}

#[test]
fn restore_chapter_progress_is_monotonic() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    let mut chapter = sample_chapter(manga_id, "/c/1", 1.0, 0);
    chapter.read = true;
    chapter.last_page_read = 120;
    db.insert_chapters(&[chapter]).unwrap();

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.chapters.push(BackupChapter {
        url: "/c/1".to_string(),
        name: "Chapter 1".to_string(),
        read: false,
        last_page_read: 0,
        chapter_number: 1.0,
        ..Default::default()
    });
    backup.mangas.push(entry);

    RestoreEngine::new(db.clone()).restore(&backup).unwrap();

    let merged = db.get_chapter_by_url("/c/1").unwrap().unwrap();
    assert!(merged.read);
    assert_eq!(merged.last_page_read, 120);
}

#[test]
fn restore_chapter_keeps_local_page_offset_and_bookmark() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    let mut chapter = sample_chapter(manga_id, "/c/1", 1.0, 0);
    chapter.last_page_read = 8;
    chapter.bookmark = true;
    db.insert_chapters(&[chapter]).unwrap();

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.chapters.push(BackupChapter {
        url: "/c/1".to_string(),
        name: "Chapter 1".to_string(),
        read: false,
        bookmark: false,
        last_page_read: 0,
        chapter_number: 1.0,
        ..Default::default()
    });
    backup.mangas.push(entry);

    RestoreEngine::new(db.clone()).restore(&backup).unwrap();

    let merged = db.get_chapter_by_url("/c/1").unwrap().unwrap();
    assert_eq!(merged.last_page_read, 8);
    assert!(merged.bookmark);
}

#[test]
fn restore_inserts_unmatched_chapters() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    db.insert_chapters(&[sample_chapter(manga_id, "/c/1", 1.0, 0)])
        .unwrap();

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.chapters.push(BackupChapter {
        url: "/c/2".to_string(),
        name: "Chapter 2".to_string(),
        read: true,
        last_page_read: 5,
        chapter_number: 2.0,
        source_order: 1,
        ..Default::default()
    });
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.chapters_added, 1);

    let chapters = db.get_chapters_by_manga_id(manga_id).unwrap();
    assert_eq!(chapters.len(), 2);
    let new_chapter = db.get_chapter_by_url("/c/2").unwrap().unwrap();
    assert_eq!(new_chapter.manga_id, manga_id);
    assert!(new_chapter.read);
}

#[test]
fn restore_category_adopts_local_id() {
    let db = test_db();
    let local_id = db.insert_category("Action", 5, 0).unwrap();

    let mut backup = Backup::default();
    backup.categories.push(BackupCategory {
        name: "Action".to_string(),
        order: 0,
        flags: 0,
    });
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.categories = vec![0];
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.categories_added, 0);

    let manga = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    let assigned = db.get_categories_for_manga(manga.id).unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].id, local_id);

    // Only the pre-existing category row, no duplicate by name
    assert_eq!(db.list_categories().unwrap().len(), 1);
}

#[test]
fn restore_inserts_unknown_categories() {
    let db = test_db();

    let mut backup = Backup::default();
    backup.categories.push(BackupCategory {
        name: "Ongoing".to_string(),
        order: 1,
        flags: 0,
    });
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.categories = vec![1];
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.categories_added, 1);

    let manga = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    let assigned = db.get_categories_for_manga(manga.id).unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].name, "Ongoing");
}

#[test]
fn restore_skips_unresolved_order_indices() {
    let db = test_db();

    let mut backup = Backup::default();
    backup.categories.push(BackupCategory {
        name: "Action".to_string(),
        order: 0,
        flags: 0,
    });
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    // 7 matches no backup category
    entry.categories = vec![0, 7];
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.skipped_categories, 1);

    let manga = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    assert_eq!(db.get_categories_for_manga(manga.id).unwrap().len(), 1);
}

#[test]
fn restore_sets_categorized_display_on_mixed_flags() {
    let db = test_db();
    db.insert_category("Action", 0, 0).unwrap();

    let mut backup = Backup::default();
    backup.categories.push(BackupCategory {
        name: "Ongoing".to_string(),
        order: 1,
        flags: 8,
    });

    RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(db.get_flag_pref("categorized_display").unwrap(), Some(true));

    // Uniform flags turn the preference back off
    let mut uniform = Backup::default();
    uniform.categories.push(BackupCategory {
        name: "Action".to_string(),
        order: 0,
        flags: 0,
    });
    let db2 = test_db();
    RestoreEngine::new(db2.clone()).restore(&uniform).unwrap();
    assert_eq!(db2.get_flag_pref("categorized_display").unwrap(), Some(false));
}

#[test]
fn restore_tracking_never_regresses() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    db.insert_tracks(&[sample_track(manga_id, 3, 42.0)]).unwrap();

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.tracking.push(BackupTracking {
        sync_id: 3,
        remote_id: 88,
        last_chapter_read: 10.0,
        ..Default::default()
    });
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.tracks_updated, 1);

    let tracks = db.get_tracks_by_manga_id(manga_id).unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].last_chapter_read, 42.0);
    assert_eq!(tracks[0].remote_id, 88);
    // Local descriptive fields survive the merge
    assert_eq!(tracks[0].title, "Tracked title");
}

#[test]
fn restore_inserts_new_tracking_service() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    db.insert_tracks(&[sample_track(manga_id, 3, 42.0)]).unwrap();

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.tracking.push(BackupTracking {
        sync_id: 5,
        remote_id: 900,
        last_chapter_read: 7.0,
        ..Default::default()
    });
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.tracks_added, 1);
    assert_eq!(db.get_tracks_by_manga_id(manga_id).unwrap().len(), 2);
}

#[test]
fn restore_history_applies_incremental_delta() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    db.insert_chapters(&[sample_chapter(manga_id, "/c/1", 1.0, 0)])
        .unwrap();
    let chapter = db.get_chapter_by_url("/c/1").unwrap().unwrap();
    db.upsert_history(&[HistoryUpdate {
        chapter_id: chapter.id,
        last_read: 1000,
        session_read_duration: 50,
    }])
    .unwrap();

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.history.push(BackupHistory {
        url: "/c/1".to_string(),
        last_read: 1000,
        time_read: 80,
    });
    backup.mangas.push(entry);

    RestoreEngine::new(db.clone()).restore(&backup).unwrap();

    // Delta of max(50, 80) - 50 = 30 is added on top of the stored 50
    let history = db.get_history_by_chapter_url("/c/1").unwrap().unwrap();
    assert_eq!(history.last_read, 1000);
    assert_eq!(history.time_read, 80);
}

#[test]
fn restore_history_attaches_to_chapter_without_history() {
    let db = test_db();
    let manga_id = insert_favorite(&db, 1, "/manga/1", "Alpha");
    db.insert_chapters(&[sample_chapter(manga_id, "/c/1", 1.0, 0)])
        .unwrap();

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.history.push(BackupHistory {
        url: "/c/1".to_string(),
        last_read: 5000,
        time_read: 120,
    });
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.history_applied, 1);

    let history = db.get_history_by_chapter_url("/c/1").unwrap().unwrap();
    assert_eq!(history.last_read, 5000);
    assert_eq!(history.time_read, 120);
}

#[test]
fn restore_skips_history_for_unknown_chapters() {
    let db = test_db();

    let mut backup = Backup::default();
    let mut entry = BackupManga::from_entry(&sample_manga(1, "/manga/1", "Alpha"));
    entry.history.push(BackupHistory {
        url: "/c/does-not-exist".to_string(),
        last_read: 5000,
        time_read: 120,
    });
    backup.mangas.push(entry);

    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();
    assert_eq!(report.skipped_history, 1);
    assert_eq!(report.history_applied, 0);
}

#[test]
fn restore_full_roundtrip_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let source_db = test_db();
    let registry = SourceRegistry::new(source_db.clone());
    let manga_id = insert_favorite(&source_db, 1, "/manga/1", "Alpha");
    let action = source_db.insert_category("Action", 0, 0).unwrap();
    source_db.set_manga_categories(manga_id, &[action]).unwrap();
    let mut chapter = sample_chapter(manga_id, "/c/1", 1.0, 0);
    chapter.read = true;
    source_db.insert_chapters(&[chapter]).unwrap();

    let path =
        write_backup_file(&source_db, &registry, dir.path(), BACKUP_ALL, true, 2).unwrap();

    let db = test_db();
    let backup = read_backup_file(&path).unwrap();
    let report = RestoreEngine::new(db.clone()).restore(&backup).unwrap();

    assert_eq!(report.manga_added, 1);
    assert_eq!(report.chapters_added, 1);
    assert_eq!(report.categories_added, 1);

    let manga = db.get_manga_by_url_and_source("/manga/1", 1).unwrap().unwrap();
    assert!(db.get_chapter_by_url("/c/1").unwrap().unwrap().read);
    assert_eq!(db.get_categories_for_manga(manga.id).unwrap().len(), 1);
}

// ========== CONFIG ==========

#[test]
fn config_parse_toml() {
    let toml = r#"
[database]
path = "/tmp/test.db"

[backup]
dir = "/tmp/backups"
retention = 5
history = false
"#;
    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.database.path.to_str(), Some("/tmp/test.db"));
    assert_eq!(config.backup.retention, 5);
    assert!(config.backup.categories);
    assert!(!config.backup.history);

    let flags = config.backup.flags();
    assert_eq!(flags & crate::backup::BACKUP_CATEGORY_MASK, BACKUP_CATEGORY);
    assert_ne!(
        flags & crate::backup::BACKUP_HISTORY_MASK,
        crate::backup::BACKUP_HISTORY
    );
}

#[test]
fn config_default_values() {
    let config = Config::default();
    assert_eq!(config.backup.retention, 2);
    assert_eq!(config.backup.flags(), BACKUP_ALL);
}
