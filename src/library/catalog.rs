//! SQLite-backed catalog of imported videos.
//!
//! Every operation is a single, independently atomic round trip to the
//! database. `remove` is a sequence of steps (file deletes, row delete,
//! pointer reset) that is not atomic as a whole; a crash in between is
//! repaired by `cleanup_orphaned` on the next startup.
//!
//! Mutating operations are crate-private: outside callers go through the
//! orchestrator so change events are never skipped.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::settings::{SettingsStore, DEFAULT_VIDEO_KEY};
use crate::domain::{MediaId, MediaItem};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Media (
        Id TEXT PRIMARY KEY,
        DisplayName TEXT NOT NULL,
        OriginalSourcePath TEXT NOT NULL UNIQUE,
        StoredPath TEXT NOT NULL UNIQUE,
        DateAdded TEXT NOT NULL,
        ThumbnailPath TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_media_original_source ON Media(OriginalSourcePath);
    CREATE INDEX IF NOT EXISTS idx_media_stored_path ON Media(StoredPath);
";

const SELECT_COLUMNS: &str =
    "SELECT Id, DisplayName, OriginalSourcePath, StoredPath, DateAdded, ThumbnailPath FROM Media";

/// Errors that can occur in the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Media not found: {0}")]
    NotFound(MediaId),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Catalog connection lock poisoned")]
    Poisoned,
}

/// Durable store of `MediaItem`s plus the default video pointer
pub struct CatalogStore {
    conn: Mutex<Connection>,
    settings: Arc<dyn SettingsStore>,
}

impl CatalogStore {
    /// Open (or create) the catalog database at `path`
    pub fn open(path: &Path, settings: Arc<dyn SettingsStore>) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn, settings)
    }

    /// Catalog in an in-memory database
    pub fn open_in_memory(settings: Arc<dyn SettingsStore>) -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?, settings)
    }

    fn with_connection(
        conn: Connection,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            settings,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Poisoned)
    }

    /// All items, newest first
    pub fn get_all(&self) -> Result<Vec<MediaItem>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY DateAdded DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map([], row_to_item)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Look up an item by id
    pub fn get_by_id(&self, id: &MediaId) -> Result<Option<MediaItem>, CatalogError> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE Id = ?1"),
                params![id.as_str()],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Dedup lookup by the source path the item was imported from
    pub fn get_by_original_path(&self, path: &Path) -> Result<Option<MediaItem>, CatalogError> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE OriginalSourcePath = ?1"),
                params![path_text(path)],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Whether some row already claims `path` as its managed copy
    pub fn is_stored_path_taken(&self, path: &Path) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        let taken = conn
            .query_row(
                "SELECT 1 FROM Media WHERE StoredPath = ?1",
                params![path_text(path)],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(taken)
    }

    /// Number of cataloged items
    pub fn count(&self) -> Result<usize, CatalogError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM Media", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Insert a new row. Fails on a duplicate id, source path or stored path.
    pub(crate) fn add(&self, item: &MediaItem) -> Result<(), CatalogError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO Media (Id, DisplayName, OriginalSourcePath, StoredPath, DateAdded, ThumbnailPath)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id.as_str(),
                item.display_name,
                path_text(&item.original_source_path),
                path_text(&item.stored_path),
                item.date_added.to_rfc3339_opts(SecondsFormat::Micros, true),
                item.thumbnail_path.as_deref().map(path_text),
            ],
        )?;

        debug!(id = %item.id, name = %item.display_name, "Cataloged media");
        Ok(())
    }

    /// Record a generated thumbnail. Returns false if the row is gone.
    pub(crate) fn set_thumbnail(&self, id: &MediaId, path: &Path) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE Media SET ThumbnailPath = ?1 WHERE Id = ?2",
            params![path_text(path), id.as_str()],
        )?;
        Ok(updated > 0)
    }

    /// Remove an item: delete its files (best effort), its row, and reset the
    /// default pointer if it referenced `id`.
    ///
    /// Returns the removed row, or `None` if no row existed.
    pub(crate) fn remove(&self, id: &MediaId) -> Result<Option<MediaItem>, CatalogError> {
        let existing = self.get_by_id(id)?;

        if let Some(item) = &existing {
            report_delete("video", &item.stored_path, delete_file_best_effort(&item.stored_path));
            if let Some(thumb) = &item.thumbnail_path {
                report_delete("thumbnail", thumb, delete_file_best_effort(thumb));
            }
        }

        let rows = {
            let conn = self.conn()?;
            conn.execute("DELETE FROM Media WHERE Id = ?1", params![id.as_str()])?
        };
        debug!(%id, rows, "Deleted catalog rows");

        if self.default_id().as_ref() == Some(id) {
            self.write_default("")?;
            info!(%id, "Reset default video pointer");
        }

        Ok(existing)
    }

    /// Point the default video at `id`, or clear it with `None`
    pub(crate) fn set_default(&self, id: Option<&MediaId>) -> Result<(), CatalogError> {
        match id {
            Some(id) => {
                if self.get_by_id(id)?.is_none() {
                    return Err(CatalogError::NotFound(id.clone()));
                }
                self.write_default(id.as_str())
            }
            None => self.write_default(""),
        }
    }

    /// Id currently held by the default video pointer
    pub fn default_id(&self) -> Option<MediaId> {
        self.settings
            .get(DEFAULT_VIDEO_KEY)
            .filter(|value| !value.is_empty())
            .map(MediaId::from)
    }

    /// The item referenced by the default video pointer, if any
    pub fn get_default(&self) -> Result<Option<MediaItem>, CatalogError> {
        match self.default_id() {
            Some(id) => self.get_by_id(&id),
            None => Ok(None),
        }
    }

    /// Remove every row whose stored file no longer exists on disk.
    ///
    /// Returns the rows that were removed.
    pub(crate) fn cleanup_orphaned(&self) -> Result<Vec<MediaItem>, CatalogError> {
        let orphaned: Vec<MediaId> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare("SELECT Id, StoredPath FROM Media")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut orphaned = Vec::new();
            for row in rows {
                let (id, stored_path) = row?;
                if !Path::new(&stored_path).exists() {
                    orphaned.push(MediaId::from(id));
                }
            }
            orphaned
        };

        let mut removed = Vec::with_capacity(orphaned.len());
        for id in orphaned {
            match self.remove(&id) {
                Ok(Some(item)) => {
                    info!(%id, path = %item.stored_path.display(), "Cleaned up orphaned entry");
                    removed.push(item);
                }
                Ok(None) => {}
                Err(e) => warn!(%id, error = %e, "Failed to clean up orphaned entry"),
            }
        }

        Ok(removed)
    }

    fn write_default(&self, value: &str) -> Result<(), CatalogError> {
        self.settings
            .set(DEFAULT_VIDEO_KEY, value)
            .map_err(|e| CatalogError::Settings(e.to_string()))
    }
}

/// Delete a file if present. `Ok(false)` means it was already gone.
pub fn delete_file_best_effort(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn report_delete(kind: &str, path: &Path, result: io::Result<bool>) {
    match result {
        Ok(true) => debug!(kind, path = %path.display(), "Deleted file"),
        Ok(false) => debug!(kind, path = %path.display(), "File already absent, skipping"),
        Err(e) => warn!(kind, path = %path.display(), error = %e, "Could not delete file"),
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<MediaItem> {
    let date_text: String = row.get(4)?;
    let date_added = DateTime::parse_from_rfc3339(&date_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    let thumbnail: Option<String> = row.get(5)?;

    Ok(MediaItem {
        id: MediaId::from(row.get::<_, String>(0)?),
        display_name: row.get(1)?,
        original_source_path: PathBuf::from(row.get::<_, String>(2)?),
        stored_path: PathBuf::from(row.get::<_, String>(3)?),
        date_added,
        thumbnail_path: thumbnail.filter(|t| !t.is_empty()).map(PathBuf::from),
    })
}
