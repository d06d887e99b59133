//! Schéma et requêtes SQLite du store persistant (niveau 2).
//!
//! Trois tables :
//! - `FILES` : enregistrement parsé par fichier, clé `(FILENAME, MODIFIED)` —
//!   un MODIFIED différent de l'horodatage courant du fichier rend la ligne
//!   périmée (traitée comme absente, puis écrasée après re-parse)
//! - `VIDEO_METADATA` : sous-enregistrement vidéo sérialisé en JSON
//! - `TV_SERIES` : lignes minimales de catalogue de séries

use dmcmetadata::{MediaInfo, MediaKind, VideoMetadata};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;

/// Crée les tables si nécessaire.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS FILES (
            FILENAME    TEXT PRIMARY KEY,
            MODIFIED    INTEGER NOT NULL,
            FORMAT_TYPE TEXT,
            DURATION    REAL,
            MIMETYPE    TEXT,
            CONTAINER   TEXT,
            PARSED      INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS VIDEO_METADATA (
            FILENAME TEXT PRIMARY KEY,
            MODIFIED INTEGER NOT NULL,
            METADATA TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS TV_SERIES (
            SIMPLIFIED_TITLE TEXT PRIMARY KEY,
            TITLE            TEXT NOT NULL
        );",
    )
}

fn kind_to_str(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "audio",
        MediaKind::Video => "video",
        MediaKind::Image => "image",
        MediaKind::Unknown => "unknown",
    }
}

/// Relit un enregistrement pour `(filename, modified)`.
///
/// Une ligne dont le MODIFIED ne correspond pas est périmée : elle est
/// ignorée (miss) et sera écrasée par le write-back du re-parse. Les
/// métadonnées vidéo associées sont rattachées quand elles existent.
pub fn get_media_info(
    conn: &Connection,
    filename: &str,
    modified: i64,
) -> rusqlite::Result<Option<Arc<MediaInfo>>> {
    let row = conn
        .query_row(
            "SELECT MODIFIED, DURATION, MIMETYPE, CONTAINER, PARSED
             FROM FILES WHERE FILENAME = ?1",
            [filename],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((stored_modified, duration, mime, container, parsed)) = row else {
        return Ok(None);
    };

    if stored_modified != modified {
        tracing::trace!(
            filename,
            stored_modified,
            modified,
            "stale cache entry, discarding"
        );
        return Ok(None);
    }

    let info = Arc::new(MediaInfo::new());
    info.set_duration(duration);
    info.set_mime_type(mime);
    info.set_container(container);
    if let Some(video) = get_video_metadata(conn, filename)? {
        info.set_video_metadata(video);
    }
    if parsed {
        info.finish_parsing();
    }
    Ok(Some(info))
}

/// Insère ou écrase l'enregistrement d'un fichier.
pub fn insert_or_update(
    conn: &Connection,
    filename: &str,
    modified: i64,
    kind: MediaKind,
    info: &MediaInfo,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO FILES (FILENAME, MODIFIED, FORMAT_TYPE, DURATION, MIMETYPE, CONTAINER, PARSED)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(FILENAME) DO UPDATE SET
             MODIFIED = excluded.MODIFIED,
             FORMAT_TYPE = excluded.FORMAT_TYPE,
             DURATION = excluded.DURATION,
             MIMETYPE = excluded.MIMETYPE,
             CONTAINER = excluded.CONTAINER,
             PARSED = excluded.PARSED",
        params![
            filename,
            modified,
            kind_to_str(kind),
            info.duration_secs(),
            info.mime_type(),
            info.container(),
            info.is_parsed(),
        ],
    )?;
    Ok(())
}

/// Relit les métadonnées vidéo d'un fichier.
pub fn get_video_metadata(
    conn: &Connection,
    filename: &str,
) -> rusqlite::Result<Option<VideoMetadata>> {
    let json = conn
        .query_row(
            "SELECT METADATA FROM VIDEO_METADATA WHERE FILENAME = ?1",
            [filename],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    Ok(json.and_then(|j| match serde_json::from_str(&j) {
        Ok(video) => Some(video),
        Err(e) => {
            tracing::warn!(filename, error = %e, "unreadable video metadata row, ignoring");
            None
        }
    }))
}

/// Insère ou écrase les métadonnées vidéo d'un fichier.
pub fn insert_video_metadata(
    conn: &Connection,
    filename: &str,
    modified: i64,
    video: &VideoMetadata,
) -> rusqlite::Result<()> {
    let json = serde_json::to_string(video)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO VIDEO_METADATA (FILENAME, MODIFIED, METADATA)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(FILENAME) DO UPDATE SET
             MODIFIED = excluded.MODIFIED,
             METADATA = excluded.METADATA",
        params![filename, modified, json],
    )?;
    Ok(())
}

/// Cherche un titre de série dont la forme simplifiée est `simplified`.
pub fn find_series_title(
    conn: &Connection,
    simplified: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT TITLE FROM TV_SERIES WHERE SIMPLIFIED_TITLE = ?1",
        [simplified],
        |row| row.get(0),
    )
    .optional()
}

/// Crée une ligne de série minimale (titre seul) si absente.
pub fn seed_series(conn: &Connection, title: &str, simplified: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO TV_SERIES (SIMPLIFIED_TITLE, TITLE) VALUES (?1, ?2)",
        params![simplified, title],
    )?;
    Ok(())
}
