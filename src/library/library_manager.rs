//! Library index runtime component.
//!
//! Keeps the sorted artist/song tree, the `tracks` table and the media files'
//! tags consistent. Directory imports feed new files through the same insert
//! path as tracks reported by the queue.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info, warn};
use tokio::sync::broadcast::Sender;

use crate::db_manager::DbManager;
use crate::error::{Error, Result};
use crate::import_dirs::ImportDirList;
use crate::library::library_tree::{LibraryTree, TreePosition};
use crate::media_file_discovery::collect_audio_files_from_folder;
use crate::metadata::{read_track_info, MetadataReader};
use crate::protocol::{
    DragPayload, LibraryMessage, LibraryMetadataChange, Message, MetadataField, ModelChange,
    TrackInfo,
};

/// Outcome of scanning one or more import roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub duplicates: usize,
    pub unreadable: usize,
    /// Readable files whose row could not be stored.
    pub failed: usize,
}

impl ImportReport {
    fn merge(&mut self, other: ImportReport) {
        self.added += other.added;
        self.duplicates += other.duplicates;
        self.unreadable += other.unreadable;
        self.failed += other.failed;
    }
}

pub struct LibraryManager {
    bus_producer: Sender<Message>,
    db_manager: DbManager,
    reader: Rc<dyn MetadataReader>,
    tree: LibraryTree,
    import_dirs: ImportDirList,
}

impl LibraryManager {
    pub fn new(
        bus_producer: Sender<Message>,
        db_manager: DbManager,
        reader: Rc<dyn MetadataReader>,
        import_dirs: ImportDirList,
    ) -> Self {
        Self {
            bus_producer,
            db_manager,
            reader,
            tree: LibraryTree::new(),
            import_dirs,
        }
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ModelChange) + 'static,
    {
        self.tree.observers_mut().subscribe(observer);
    }

    pub fn tree(&self) -> &LibraryTree {
        &self.tree
    }

    pub fn import_dirs(&self) -> &ImportDirList {
        &self.import_dirs
    }

    /// Builds the tree from storage, deleting rows whose files are gone.
    /// Returns the number of pruned rows.
    pub fn load(&mut self) -> Result<usize> {
        let mut pruned = 0;
        for artist in self.db_manager.artists()? {
            for track in self.db_manager.tracks_by_artist(&artist)? {
                if !track.path.exists() {
                    debug!("Pruning missing library file {}", track.path.display());
                    self.db_manager.delete_track(&track.path)?;
                    pruned += 1;
                    continue;
                }
                self.tree.insert(&track.artist, &track.title, &track.path);
            }
        }
        info!(
            "Library loaded: {} artists, {} songs, {} pruned",
            self.tree.artists().len(),
            self.tree.song_count(),
            pruned
        );
        Ok(pruned)
    }

    /// Persists `track` and adds it to the tree. Returns `false` when the path
    /// is already known.
    pub fn insert_track(&mut self, track: &TrackInfo) -> Result<bool> {
        if self.tree.contains_path(&track.path) {
            return Ok(false);
        }
        match self.db_manager.insert_track(track) {
            Ok(()) => {}
            Err(Error::DuplicateKey(_)) => {
                debug!("Track already stored: {}", track.path.display());
                return Ok(false);
            }
            Err(error) => return Err(error),
        }
        self.tree.insert(&track.artist, &track.title, &track.path);
        Ok(true)
    }

    /// Removes the row and node for `path` under `artist`. Nothing is touched
    /// unless the node exists.
    pub fn remove_track(&mut self, path: &Path, artist: &str) -> Result<()> {
        if self.tree.lookup_song_index(artist, path).is_none() {
            return Err(Error::NotFound(format!("{} under {}", path.display(), artist)));
        }
        self.db_manager.delete_track(path)?;
        self.tree.remove(artist, path);
        Ok(())
    }

    /// Retags, re-keys and re-homes every song of `old_name`. Files whose tags
    /// cannot be written keep their old tag but still move in the index.
    pub fn rename_artist(&mut self, old_name: &str, new_name: &str) -> Result<usize> {
        let new_name = new_name.trim();
        let Some(artist_row) = self.tree.lookup_artist_index(old_name) else {
            return Err(Error::NotFound(format!("artist {old_name}")));
        };
        if old_name == new_name {
            return Ok(0);
        }

        let paths: Vec<PathBuf> = self.tree.artists()[artist_row]
            .songs
            .iter()
            .map(|song| song.path.clone())
            .collect();
        for path in &paths {
            if let Err(error) = self.reader.write(path, MetadataField::Artist, new_name) {
                warn!("{}", error);
            }
        }

        self.db_manager.rename_artist(old_name, new_name)?;
        let moved = self.tree.rename_artist(old_name, new_name);
        info!("Renamed artist {} to {} ({} songs)", old_name, new_name, moved);

        let _ = self.bus_producer.send(Message::Library(LibraryMessage::MetadataChanged(
            LibraryMetadataChange::Artist {
                old_name: old_name.to_string(),
                new_name: new_name.to_string(),
            },
        )));
        Ok(moved)
    }

    /// Retitles one song. The node is removed and reinserted so the title
    /// order holds.
    pub fn rename_track_title(&mut self, path: &Path, new_title: &str) -> Result<()> {
        let new_title = new_title.trim();
        let Some(mut record) = self.db_manager.track_by_path(path)? else {
            return Err(Error::NotFound(path.display().to_string()));
        };

        self.reader.write(path, MetadataField::Title, new_title)?;

        self.remove_track(path, &record.artist)?;
        record.title = new_title.to_string();
        self.insert_track(&record)?;

        let _ = self.bus_producer.send(Message::Library(LibraryMessage::MetadataChanged(
            LibraryMetadataChange::Title {
                path: path.to_path_buf(),
                new_title: new_title.to_string(),
            },
        )));
        Ok(())
    }

    pub fn lookup_artist_index(&self, name: &str) -> Option<usize> {
        self.tree.lookup_artist_index(name)
    }

    pub fn lookup_song_index(&self, artist: &str, path: &Path) -> Option<usize> {
        self.tree.lookup_song_index(artist, path)
    }

    /// Records behind a tree position: every track of an artist, or one song.
    pub fn tracks_at(&self, position: TreePosition) -> Result<Vec<TrackInfo>> {
        match position {
            TreePosition::Artist(row) => {
                let artist = self
                    .tree
                    .artist(row)
                    .ok_or_else(|| Error::NotFound(format!("artist row {row}")))?;
                self.db_manager.tracks_by_artist(&artist.name)
            }
            TreePosition::Song {
                artist_row,
                song_row,
            } => {
                let song = self.tree.song(artist_row, song_row).ok_or_else(|| {
                    Error::NotFound(format!("song row {artist_row}/{song_row}"))
                })?;
                let track = self
                    .db_manager
                    .track_by_path(&song.path)?
                    .ok_or_else(|| Error::NotFound(song.path.display().to_string()))?;
                Ok(vec![track])
            }
        }
    }

    pub fn drag_payload(&self, positions: &[TreePosition]) -> Result<DragPayload> {
        let mut tracks = Vec::new();
        for position in positions {
            tracks.extend(self.tracks_at(*position)?);
        }
        Ok(DragPayload::LibraryItems(tracks))
    }

    /// Scans `dir` and adds every readable, unseen media file.
    pub fn import_from_dir(&mut self, dir: &Path, add_to_import_dirs: bool) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for candidate in collect_audio_files_from_folder(dir) {
            let canonical = match candidate.canonicalize() {
                Ok(path) => path,
                Err(error) => {
                    debug!("Skipping {}: {}", candidate.display(), error);
                    report.unreadable += 1;
                    continue;
                }
            };
            if self.tree.contains_path(&canonical) {
                report.duplicates += 1;
                continue;
            }

            let track = match read_track_info(self.reader.as_ref(), &canonical) {
                Ok(track) => track,
                Err(error) => {
                    debug!("Skipping unreadable media: {}", error);
                    report.unreadable += 1;
                    continue;
                }
            };
            match self.insert_track(&track) {
                Ok(true) => report.added += 1,
                Ok(false) => report.duplicates += 1,
                Err(error) => {
                    warn!("Could not store {}: {}", track.path.display(), error);
                    report.failed += 1;
                }
            }
        }

        if add_to_import_dirs {
            let root = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
            self.import_dirs.append(&root)?;
        }

        info!(
            "Imported {}: {} added, {} duplicates, {} unreadable, {} failed",
            dir.display(),
            report.added,
            report.duplicates,
            report.unreadable,
            report.failed
        );
        let _ = self
            .bus_producer
            .send(Message::Library(LibraryMessage::ImportFinished {
                root: dir.to_path_buf(),
                added: report.added,
            }));
        Ok(report)
    }

    /// Rescans every listed import directory without re-listing it.
    pub fn populate_from_dirs(&mut self) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        let dirs = self.import_dirs.dirs().to_vec();
        for dir in dirs {
            report.merge(self.import_from_dir(&dir, false)?);
        }
        Ok(report)
    }

    /// Clears the tree, reloads it from storage and rescans import roots.
    pub fn refresh(&mut self) -> Result<ImportReport> {
        self.tree.clear();
        self.import_dirs.reload()?;
        self.load()?;
        let report = self.populate_from_dirs()?;
        let _ = self
            .bus_producer
            .send(Message::Library(LibraryMessage::Refreshed {
                artists: self.tree.artists().len(),
            }));
        Ok(report)
    }

    /// A file was queued directly; index it if the library lacks it.
    pub fn add_track_from_path(&mut self, path: &Path) -> Result<bool> {
        if self.tree.contains_path(path) {
            return Ok(false);
        }
        let track = read_track_info(self.reader.as_ref(), path)?;
        self.insert_track(&track)
    }

    /// A queue entry's tags were edited; replace the stored record and node.
    /// The stored duration is kept.
    pub fn apply_playlist_metadata_edit(&mut self, edited: &TrackInfo) -> Result<()> {
        let mut record = edited.clone();
        if let Some(previous) = self.db_manager.track_by_path(&edited.path)? {
            record.duration_secs = previous.duration_secs;
            self.remove_track(&previous.path, &previous.artist)?;
        }
        self.insert_track(&record)?;
        Ok(())
    }
}
