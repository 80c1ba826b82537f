//! Catalog of saved `.m3u` playlists, mirrored with the `playlists` table.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::sync::broadcast::Sender;

use crate::db_manager::DbManager;
use crate::error::{Error, Result};
use crate::import_dirs::ImportDirList;
use crate::media_file_discovery::{collect_playlist_files_from_folder, PLAYLIST_EXTENSION};
use crate::model_observer::ModelObservers;
use crate::protocol::{Message, ModelChange, PlaylistEntry, PlaylistLibraryMessage, RowParent};

fn entry_for(path: &Path) -> PlaylistEntry {
    PlaylistEntry {
        name: path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.to_path_buf(),
    }
}

pub struct PlaylistLibraryManager {
    bus_producer: Sender<Message>,
    db_manager: DbManager,
    import_dirs: ImportDirList,
    /// Sorted by name, then path.
    entries: Vec<PlaylistEntry>,
    observers: ModelObservers,
}

impl PlaylistLibraryManager {
    pub fn new(
        bus_producer: Sender<Message>,
        db_manager: DbManager,
        import_dirs: ImportDirList,
    ) -> Self {
        Self {
            bus_producer,
            db_manager,
            import_dirs,
            entries: Vec::new(),
            observers: ModelObservers::new(),
        }
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ModelChange) + 'static,
    {
        self.observers.subscribe(observer);
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|entry| entry.path == path)
    }

    fn insert_entry(&mut self, entry: PlaylistEntry) -> usize {
        let row = self.entries.partition_point(|existing| {
            (existing.name.as_str(), existing.path.as_path())
                < (entry.name.as_str(), entry.path.as_path())
        });
        let entries = &mut self.entries;
        self.observers
            .insert_rows(RowParent::Root, row, row, || entries.insert(row, entry));
        row
    }

    fn remove_entry(&mut self, row: usize) -> PlaylistEntry {
        let entries = &mut self.entries;
        self.observers
            .remove_rows(RowParent::Root, row, row, || entries.remove(row))
    }

    /// Reads stored playlists, dropping rows whose files are gone, then picks
    /// up unknown `.m3u` files under the import directories. Returns the number
    /// of pruned rows.
    pub fn load(&mut self) -> Result<usize> {
        let mut pruned = 0;
        for path in self.db_manager.playlist_paths()? {
            if !path.exists() {
                debug!("Pruning missing playlist {}", path.display());
                self.db_manager.delete_playlist(&path)?;
                if let Some(row) = self.position_of(&path) {
                    self.remove_entry(row);
                }
                pruned += 1;
                continue;
            }
            if self.position_of(&path).is_none() {
                self.insert_entry(entry_for(&path));
            }
        }

        let dirs = self.import_dirs.dirs().to_vec();
        for dir in dirs {
            for path in collect_playlist_files_from_folder(&dir) {
                if let Err(error) = self.register(&path) {
                    debug!("Skipping playlist {}: {}", path.display(), error);
                }
            }
        }
        info!(
            "Playlist catalog loaded: {} entries, {} pruned",
            self.entries.len(),
            pruned
        );
        Ok(pruned)
    }

    /// Adds a playlist file. Returns `false` when it is already catalogued.
    pub fn register(&mut self, path: &Path) -> Result<bool> {
        let path = path.canonicalize().map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                Error::FileMissing(path.to_path_buf())
            } else {
                Error::io(path, error)
            }
        })?;
        if self.position_of(&path).is_some() {
            return Ok(false);
        }

        match self.db_manager.insert_playlist(&path) {
            Ok(()) | Err(Error::DuplicateKey(_)) => {}
            Err(error) => return Err(error),
        }
        let entry = entry_for(&path);
        self.insert_entry(entry.clone());
        let _ = self.bus_producer.send(Message::PlaylistLibrary(
            PlaylistLibraryMessage::PlaylistRegistered(entry),
        ));
        Ok(true)
    }

    /// Removes the entry and its row, and deletes the playlist file.
    pub fn unregister(&mut self, path: &Path) -> Result<()> {
        let row = self
            .position_of(path)
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        self.db_manager.delete_playlist(path)?;
        self.remove_entry(row);
        if let Err(error) = fs::remove_file(path) {
            warn!("Failed to delete playlist file {}: {}", path.display(), error);
        }
        let _ = self.bus_producer.send(Message::PlaylistLibrary(
            PlaylistLibraryMessage::PlaylistUnregistered(path.to_path_buf()),
        ));
        Ok(())
    }

    /// Renames the file to `<dir>/<new_name>.m3u` and re-registers it. The old
    /// entry is gone before the new one is added.
    pub fn rename(&mut self, path: &Path, new_name: &str) -> Result<PathBuf> {
        let row = self
            .position_of(path)
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        let target = path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{new_name}.{PLAYLIST_EXTENSION}"));
        if target == path {
            return Ok(target);
        }
        if target.exists() {
            return Err(Error::DuplicateKey(target.display().to_string()));
        }

        fs::rename(path, &target).map_err(|source| Error::io(path, source))?;
        self.db_manager.delete_playlist(path)?;
        self.remove_entry(row);
        self.register(&target)?;
        info!("Renamed playlist {} to {}", path.display(), target.display());
        Ok(target)
    }

    /// Rebuilds the catalog from storage and the import directories.
    pub fn refresh(&mut self) -> Result<usize> {
        let entries = &mut self.entries;
        self.observers.reset(|| entries.clear());
        self.import_dirs.reload()?;
        self.load()
    }

    /// Asks the queue to load the playlist at `row`.
    pub fn request_load(&self, row: usize) -> Result<PathBuf> {
        let entry = self.entries.get(row).ok_or(Error::InvalidIndex {
            index: row,
            len: self.entries.len(),
        })?;
        let _ = self.bus_producer.send(Message::PlaylistLibrary(
            PlaylistLibraryMessage::LoadPlaylist(entry.path.clone()),
        ));
        Ok(entry.path.clone())
    }
}
