//! SQLite-backed catalog store

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::models::{MediaRecord, MediaType};
use crate::store::CatalogStore;

/// Catalog store persisted in a SQLite database
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    /// Open or create database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS media (
                path TEXT PRIMARY KEY,
                media_type TEXT NOT NULL,
                artist TEXT,
                album TEXT,
                genre TEXT,
                added_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_media_type ON media(media_type);

            CREATE TABLE IF NOT EXISTS media_dirs (
                path TEXT PRIMARY KEY
            );
            ",
        )?;
        Ok(())
    }

    /// Get record count
    pub fn record_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Load a single record
    pub fn get_record(&self, path: &Path) -> Result<Option<MediaRecord>> {
        let key = path_key(path)?;
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT path, media_type, artist, album, genre, added_at FROM media WHERE path = ?1",
                [key],
                read_row,
            )
            .optional()?;
        row.map(RawRecord::into_record).transpose()
    }
}

/// Row as stored, before type conversion
struct RawRecord {
    path: String,
    media_type: String,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    added_at: String,
}

impl RawRecord {
    fn into_record(self) -> Result<MediaRecord> {
        let path = PathBuf::from(self.path);
        let media_type = MediaType::parse(&self.media_type)
            .unwrap_or_else(|| MediaType::from_path(&path));
        let added_at = DateTime::parse_from_rfc3339(&self.added_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                IndexError::database_error(format!("bad added_at {:?}: {}", self.added_at, e))
                    .with_path(path.clone())
            })?;
        Ok(MediaRecord {
            path,
            media_type,
            artist: self.artist,
            album: self.album,
            genre: self.genre,
            added_at,
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        path: row.get(0)?,
        media_type: row.get(1)?,
        artist: row.get(2)?,
        album: row.get(3)?,
        genre: row.get(4)?,
        added_at: row.get(5)?,
    })
}

fn path_key(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| IndexError::invalid_path(path.to_path_buf()))
}

impl CatalogStore for SqliteCatalogStore {
    fn persisted_roots(&self) -> Result<Vec<PathBuf>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT path FROM media_dirs ORDER BY path")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut roots = Vec::new();
        for row in rows {
            roots.push(PathBuf::from(row?));
        }
        Ok(roots)
    }

    fn add_root(&self, root: &Path) -> Result<()> {
        let key = path_key(root)?;
        self.conn
            .lock()
            .execute("INSERT OR IGNORE INTO media_dirs (path) VALUES (?1)", [key])?;
        Ok(())
    }

    fn remove_root(&self, root: &Path) -> Result<()> {
        let key = path_key(root)?;
        self.conn
            .lock()
            .execute("DELETE FROM media_dirs WHERE path = ?1", [key])?;
        Ok(())
    }

    fn all_records(&self) -> Result<HashMap<PathBuf, MediaRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT path, media_type, artist, album, genre, added_at FROM media")?;
        let rows = stmt.query_map([], read_row)?;

        let mut index = HashMap::new();
        for row in rows {
            let record = row?.into_record()?;
            index.insert(record.path.clone(), record);
        }
        Ok(index)
    }

    fn upsert_record(&self, record: &MediaRecord) -> Result<()> {
        let key = path_key(&record.path)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO media (path, media_type, artist, album, genre, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key,
                record.media_type.as_str(),
                record.artist,
                record.album,
                record.genre,
                record.added_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_record(&self, path: &Path) -> Result<()> {
        let key = path_key(path)?;
        self.conn
            .lock()
            .execute("DELETE FROM media WHERE path = ?1", [key])?;
        Ok(())
    }
}
