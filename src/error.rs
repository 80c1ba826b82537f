//! Error types shared by the library, playlist and storage layers.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The database file could not be opened.
    #[error("storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Table creation failed while opening storage.
    #[error("failed to create schema: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// An insert hit an existing unique path.
    #[error("{0} is already present")]
    DuplicateKey(String),

    #[error("file is missing: {0}")]
    FileMissing(PathBuf),

    /// Tag extraction failed for a media file.
    #[error("unreadable media {path}: {reason}")]
    UnreadableMedia { path: PathBuf, reason: String },

    #[error("failed to write tags to {path}: {reason}")]
    TagWrite { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// A row or range outside the current queue bounds.
    #[error("index {index} out of range for length {len}")]
    InvalidIndex { index: usize, len: usize },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps a unique-constraint failure onto `DuplicateKey`, leaving other
    /// statement errors as `Query`.
    pub(crate) fn from_insert(key: &str, error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::DuplicateKey(key.to_string())
            }
            _ => Error::Query(error),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateKey(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_maps_to_duplicate_key() {
        let conn = rusqlite::Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch("CREATE TABLE t (p TEXT UNIQUE); INSERT INTO t (p) VALUES ('a');")
            .expect("schema");
        let error = conn
            .execute("INSERT INTO t (p) VALUES ('a')", [])
            .expect_err("duplicate insert should fail");
        let mapped = Error::from_insert("a", error);
        assert!(mapped.is_duplicate());
        assert_eq!(mapped.to_string(), "a is already present");
    }

    #[test]
    fn test_other_sqlite_errors_stay_query_errors() {
        let conn = rusqlite::Connection::open_in_memory().expect("in-memory db");
        let error = conn
            .execute("INSERT INTO missing_table (p) VALUES ('a')", [])
            .expect_err("missing table should fail");
        assert!(matches!(Error::from_insert("a", error), Error::Query(_)));
    }
}
