//! Archive decoding and structural validation.

use crate::backup::models::{Backup, CURRENT_BACKUP_VERSION};
use crate::error::{AppError, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;

/// Decompress and decode an archive.
///
/// The version number is the first field of the encoded stream and is
/// checked before the rest of the graph is decoded, so an archive from a
/// newer app version fails with [`AppError::UnsupportedVersion`] instead
/// of a generic decode error.
pub fn decode_backup(bytes: &[u8]) -> Result<Backup> {
    if bytes.is_empty() {
        return Err(AppError::InvalidBackup("file is empty".to_string()));
    }

    let mut body = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut body)
        .map_err(|e| AppError::InvalidBackup(format!("not a gzip archive: {}", e)))?;

    let config = bincode::config::standard();

    let (version, _) = bincode::serde::decode_from_slice::<u32, _>(&body, config)
        .map_err(|e| AppError::InvalidBackup(format!("unreadable header: {}", e)))?;
    if version > CURRENT_BACKUP_VERSION {
        return Err(AppError::UnsupportedVersion(version));
    }

    let (backup, _) = bincode::serde::decode_from_slice::<Backup, _>(&body, config)
        .map_err(|e| AppError::InvalidBackup(format!("malformed archive: {}", e)))?;

    Ok(backup)
}

/// Check archive well-formedness before use.
///
/// This is purely structural: every entry's source id must be covered by
/// the archive's source list. Store consistency is not checked here.
pub fn validate_backup(backup: &Backup) -> Result<()> {
    if !backup.mangas.is_empty() && backup.sources.is_empty() {
        return Err(AppError::InvalidBackup(
            "archive contains entries but no source metadata".to_string(),
        ));
    }

    for manga in &backup.mangas {
        if !backup.sources.iter().any(|s| s.id == manga.source) {
            return Err(AppError::InvalidBackup(format!(
                "entry '{}' references source {} missing from the archive",
                manga.title, manga.source
            )));
        }
    }

    Ok(())
}

/// Read, decode and validate an archive file.
pub fn read_backup_file(path: &Path) -> Result<Backup> {
    let bytes = std::fs::read(path)?;
    let backup = decode_backup(&bytes)?;
    validate_backup(&backup)?;
    Ok(backup)
}
