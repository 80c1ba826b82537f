use crate::error::{Error, Result};
use crate::protocol::TrackInfo;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// Owned SQLite handle for the track and playlist tables.
///
/// The connection is opened once per index and closed when the manager drops.
pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::io(parent, source))?;
            }
        }

        let conn = Connection::open(path).map_err(|source| Error::StorageUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let db_manager = Self { conn };
        db_manager.initialize_schema().map_err(Error::Schema)?;
        Ok(db_manager)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::StorageUnavailable {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db_manager = Self { conn };
        db_manager.initialize_schema().map_err(Error::Schema)?;
        Ok(db_manager)
    }

    fn initialize_schema(&self) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tracks (
                id INTEGER PRIMARY KEY,
                abs_file_path TEXT NOT NULL UNIQUE,
                file_name TEXT NOT NULL,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                album TEXT NOT NULL,
                duration_secs INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks(artist)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS playlists (
                id INTEGER PRIMARY KEY,
                abs_file_path TEXT NOT NULL UNIQUE
            )",
            [],
        )?;
        Ok(())
    }

    fn track_from_row(row: &Row<'_>) -> std::result::Result<TrackInfo, rusqlite::Error> {
        Ok(TrackInfo {
            path: PathBuf::from(row.get::<_, String>(0)?),
            file_name: row.get(1)?,
            title: row.get(2)?,
            artist: row.get(3)?,
            album: row.get(4)?,
            duration_secs: row.get::<_, i64>(5)?.max(0) as u64,
        })
    }

    /// Insert-only. An existing path yields `Error::DuplicateKey`.
    pub fn insert_track(&self, track: &TrackInfo) -> Result<()> {
        let path = track.path.to_string_lossy();
        self.conn
            .execute(
                "INSERT INTO tracks (abs_file_path, file_name, title, artist, album, duration_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    path.as_ref(),
                    track.file_name,
                    track.title,
                    track.artist,
                    track.album,
                    track.duration_secs as i64
                ],
            )
            .map_err(|error| Error::from_insert(&path, error))?;
        Ok(())
    }

    pub fn delete_track(&self, path: &Path) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM tracks WHERE abs_file_path = ?1",
            params![path.to_string_lossy().as_ref()],
        )?;
        Ok(deleted)
    }

    pub fn delete_tracks_by_artist(&self, artist: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM tracks WHERE artist = ?1", params![artist])?;
        Ok(deleted)
    }

    /// Re-keys every row of `old_name` in a single statement.
    pub fn rename_artist(&self, old_name: &str, new_name: &str) -> Result<usize> {
        let updated = self.conn.execute(
            "UPDATE tracks SET artist = ?1 WHERE artist = ?2",
            params![new_name, old_name],
        )?;
        Ok(updated)
    }

    pub fn artists(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT artist FROM tracks ORDER BY artist ASC")?;
        let artist_iter = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut artists = Vec::new();
        for artist in artist_iter {
            artists.push(artist?);
        }
        Ok(artists)
    }

    pub fn tracks_by_artist(&self, artist: &str) -> Result<Vec<TrackInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT abs_file_path, file_name, title, artist, album, duration_secs
             FROM tracks WHERE artist = ?1 ORDER BY title ASC",
        )?;
        let track_iter = stmt.query_map(params![artist], Self::track_from_row)?;

        let mut tracks = Vec::new();
        for track in track_iter {
            tracks.push(track?);
        }
        Ok(tracks)
    }

    pub fn track_by_path(&self, path: &Path) -> Result<Option<TrackInfo>> {
        let track = self
            .conn
            .query_row(
                "SELECT abs_file_path, file_name, title, artist, album, duration_secs
                 FROM tracks WHERE abs_file_path = ?1",
                params![path.to_string_lossy().as_ref()],
                Self::track_from_row,
            )
            .optional()?;
        Ok(track)
    }

    pub fn contains_track(&self, path: &Path) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE abs_file_path = ?1",
            params![path.to_string_lossy().as_ref()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_playlist(&self, path: &Path) -> Result<()> {
        let key = path.to_string_lossy();
        self.conn
            .execute(
                "INSERT INTO playlists (abs_file_path) VALUES (?1)",
                params![key.as_ref()],
            )
            .map_err(|error| Error::from_insert(&key, error))?;
        Ok(())
    }

    pub fn delete_playlist(&self, path: &Path) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM playlists WHERE abs_file_path = ?1",
            params![path.to_string_lossy().as_ref()],
        )?;
        Ok(deleted)
    }

    pub fn playlist_paths(&self) -> Result<Vec<PathBuf>> {
        let mut stmt = self
            .conn
            .prepare("SELECT abs_file_path FROM playlists ORDER BY abs_file_path ASC")?;
        let path_iter = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut paths = Vec::new();
        for path in path_iter {
            paths.push(PathBuf::from(path?));
        }
        Ok(paths)
    }
}
