//! SQLite-backed media index.
//!
//! This module provides the `MediaStore` struct which plays the role of the
//! platform media database for the picker:
//! - Media records (path, MIME type, size, duration, date added)
//! - Ordered id snapshots filtered by media type mode
//! - Registration of freshly captured files

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::models::{Item, ItemId, MediaTypeMode, Uri};

/// SQLite-backed storage for media records.
///
/// The database is stored at `XDG_DATA_HOME/mediapick/index.sqlite` and uses
/// WAL mode for concurrent read/write performance.
pub struct MediaStore {
    conn: Connection,
}

/// A media record as written by the scanner or by capture registration.
#[derive(Debug, Clone)]
pub struct MediaRecord {
    pub path: PathBuf,
    pub mime_type: String,
    pub size: i64,
    pub duration_ms: i64,
    /// Seconds since the epoch; newest first in the grid.
    pub date_added: i64,
    pub last_seen: i64,
}

const SELECT_ITEM: &str = "SELECT id, path, mime_type, size, duration_ms FROM media";

impl MediaStore {
    /// Opens or creates the database at the default XDG location.
    pub fn open_default() -> Result<Self> {
        let db_path = Self::default_db_path()?;
        Self::open(&db_path)
    }

    /// Returns the default database path based on XDG directories.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "mediapick")
            .context("Failed to determine project directories")?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        Ok(data_dir.join("index.sqlite"))
    }

    /// Opens or creates the database at the specified path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA cache_size = -16000;
            ",
        )
        .context("Failed to configure SQLite pragmas")?;

        let store = Self { conn };
        store.create_tables()?;

        info!("Opened media store at {:?}", path);
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                mime_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                date_added INTEGER NOT NULL,
                last_seen INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_date_added ON media(date_added);
            CREATE INDEX IF NOT EXISTS idx_media_last_seen ON media(last_seen);
            ",
            )
            .context("Failed to create database tables")?;

        debug!("Database tables created/verified");
        Ok(())
    }

    // =========================================================================
    // Media Record Operations
    // =========================================================================

    /// Inserts or updates a single record, returning its id.
    ///
    /// Ids are stable across updates of the same path.
    pub fn upsert_media(&self, record: &MediaRecord) -> Result<ItemId> {
        let id: i64 = self
            .conn
            .query_row(
                "
            INSERT INTO media (path, mime_type, size, duration_ms, date_added, last_seen)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(path) DO UPDATE SET
                mime_type = excluded.mime_type,
                size = excluded.size,
                duration_ms = excluded.duration_ms,
                date_added = excluded.date_added,
                last_seen = excluded.last_seen
            RETURNING id
            ",
                params![
                    record.path.to_string_lossy(),
                    record.mime_type,
                    record.size,
                    record.duration_ms,
                    record.date_added,
                    record.last_seen,
                ],
                |row| row.get(0),
            )
            .context("Failed to upsert media record")?;

        Ok(ItemId(id))
    }

    /// Batch inserts or updates records in a single transaction.
    pub fn upsert_media_batch(&mut self, records: &[MediaRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let count = Self::upsert_media_batch_in_tx(&tx, records)?;
        tx.commit()?;

        debug!("Batch upserted {} media records", count);
        Ok(count)
    }

    fn upsert_media_batch_in_tx(tx: &Transaction, records: &[MediaRecord]) -> Result<usize> {
        let mut stmt = tx.prepare_cached(
            "
            INSERT INTO media (path, mime_type, size, duration_ms, date_added, last_seen)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(path) DO UPDATE SET
                mime_type = excluded.mime_type,
                size = excluded.size,
                duration_ms = excluded.duration_ms,
                date_added = excluded.date_added,
                last_seen = excluded.last_seen
            ",
        )?;

        let mut count = 0;
        for record in records {
            stmt.execute(params![
                record.path.to_string_lossy(),
                record.mime_type,
                record.size,
                record.duration_ms,
                record.date_added,
                record.last_seen,
            ])?;
            count += 1;
        }

        Ok(count)
    }

    pub fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        self.conn
            .query_row(
                &format!("{SELECT_ITEM} WHERE id = ?1"),
                params![id.0],
                item_from_row,
            )
            .optional()
            .context("Failed to query media item")
    }

    /// Ids in grid order (newest first) for the given mode.
    pub fn ordered_ids(&self, mode: MediaTypeMode) -> Result<Vec<ItemId>> {
        let filter = match mode {
            MediaTypeMode::ImagesOnly => "WHERE mime_type LIKE 'image/%'",
            MediaTypeMode::VideosOnly => "WHERE mime_type LIKE 'video/%'",
            MediaTypeMode::Mixed => "",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id FROM media {filter} ORDER BY date_added DESC, id DESC"
        ))?;

        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(ItemId))
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load ordered media ids")?;

        Ok(ids)
    }

    /// Path -> (date_added, size) for every record, used to skip unchanged files.
    pub fn get_cache_map(&self) -> Result<HashMap<PathBuf, (i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, date_added, size FROM media")?;

        let map = stmt
            .query_map([], |row| {
                Ok((
                    PathBuf::from(row.get::<_, String>(0)?),
                    (row.get::<_, i64>(1)?, row.get::<_, i64>(2)?),
                ))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .context("Failed to load cache map")?;

        Ok(map)
    }

    /// Marks paths as seen at `timestamp`.
    pub fn touch_last_seen(&mut self, paths: &[PathBuf], timestamp: i64) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached("UPDATE media SET last_seen = ?1 WHERE path = ?2")?;
            for path in paths {
                count += stmt.execute(params![timestamp, path.to_string_lossy()])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Deletes records not seen since `older_than` and returns their paths.
    pub fn delete_stale(&self, older_than: i64) -> Result<Vec<PathBuf>> {
        let mut stmt = self
            .conn
            .prepare("DELETE FROM media WHERE last_seen < ?1 RETURNING path")?;

        let deleted = stmt
            .query_map(params![older_than], |row| {
                row.get::<_, String>(0).map(PathBuf::from)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to delete stale media")?;

        if !deleted.is_empty() {
            debug!("Deleted {} stale media records", deleted.len());
        }
        Ok(deleted)
    }

    pub fn delete_media(&self, path: &Path) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM media WHERE path = ?1",
                params![path.to_string_lossy()],
            )
            .context("Failed to delete media record")?;
        Ok(rows > 0)
    }

    pub fn count_media(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))
            .context("Failed to count media")
    }

    /// Current Unix timestamp in seconds.
    pub fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let path = PathBuf::from(row.get::<_, String>(1)?);
    Ok(Item::new(
        ItemId(row.get(0)?),
        row.get::<_, String>(2)?,
        row.get::<_, i64>(3)?.max(0) as u64,
        row.get::<_, i64>(4)?.max(0) as u64,
        Uri::from_path(&path),
    ))
}
