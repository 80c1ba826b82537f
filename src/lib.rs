//! Music library and playback-queue engine.
//!
//! A sorted artist/song index mirrored in SQLite and in file tags, an ordered
//! play queue with repeat/shuffle semantics and drag-reorder, and a catalog of
//! saved `.m3u` playlists, kept in sync over a broadcast bus.

pub mod app_runtime;
pub mod config;
pub mod config_persistence;
pub mod db_manager;
pub mod error;
pub mod import_dirs;
pub mod library;
pub mod media_file_discovery;
pub mod metadata;
pub mod model_observer;
pub mod playlist;
pub mod playlist_library;
pub mod playlist_manager;
pub mod protocol;
#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Error, Result};
