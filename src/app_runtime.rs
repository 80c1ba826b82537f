//! Runtime bootstrap and cross-component sync.
//!
//! Owns the library index, the queue and the playlist catalog, and routes
//! their bus notifications to each other.

use std::path::Path;
use std::rc::Rc;

use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::TryRecvError, Receiver};

use crate::config::Config;
use crate::db_manager::DbManager;
use crate::error::Result;
use crate::import_dirs::ImportDirList;
use crate::library::{LibraryManager, TreePosition};
use crate::metadata::{LoftyMetadataReader, MetadataReader};
use crate::playlist::Playlist;
use crate::playlist_library::PlaylistLibraryManager;
use crate::playlist_manager::PlaylistManager;
use crate::protocol::{LibraryMessage, Message, PlaylistLibraryMessage, PlaylistMessage};

pub struct AppRuntime {
    library: LibraryManager,
    queue: PlaylistManager,
    playlists: PlaylistLibraryManager,
    bus_consumer: Receiver<Message>,
}

impl AppRuntime {
    /// Opens storage, loads both catalogs and optionally rescans the import
    /// directories. Storage and schema failures abort startup.
    pub fn build(config: &Config) -> Result<Self> {
        Self::build_with_reader(config, Rc::new(LoftyMetadataReader))
    }

    pub fn build_with_reader(config: &Config, reader: Rc<dyn MetadataReader>) -> Result<Self> {
        let (bus_producer, bus_consumer) = broadcast::channel(config.runtime.bus_capacity.max(1));

        let import_dirs = ImportDirList::load(&config.library.import_dirs_file)?;
        let library_db = DbManager::open(&config.storage.database_path)?;
        let playlists_db = DbManager::open(&config.storage.database_path)?;

        let mut library = LibraryManager::new(
            bus_producer.clone(),
            library_db,
            Rc::clone(&reader),
            import_dirs.clone(),
        );
        let mut playlists = PlaylistLibraryManager::new(bus_producer.clone(), playlists_db, import_dirs);

        let mut playlist = Playlist::new();
        let mode = config.playback.mode();
        playlist.set_mode(mode, true);
        let queue = PlaylistManager::new(playlist, bus_producer, reader);

        library.load()?;
        playlists.load()?;
        if config.library.scan_on_startup {
            library.populate_from_dirs()?;
        }

        let mut runtime = Self {
            library,
            queue,
            playlists,
            bus_consumer,
        };
        runtime.dispatch_pending();
        info!(
            "Runtime ready: {} artists, {} saved playlists",
            runtime.library.tree().artists().len(),
            runtime.playlists.entries().len()
        );
        Ok(runtime)
    }

    pub fn library(&self) -> &LibraryManager {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut LibraryManager {
        &mut self.library
    }

    pub fn queue(&self) -> &PlaylistManager {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut PlaylistManager {
        &mut self.queue
    }

    pub fn playlists(&self) -> &PlaylistLibraryManager {
        &self.playlists
    }

    pub fn playlists_mut(&mut self) -> &mut PlaylistLibraryManager {
        &mut self.playlists
    }

    /// Drains the bus, applying each notification to the component that
    /// mirrors it. Returns the number of messages handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let message = match self.bus_consumer.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Sync bus lagged; {} messages dropped", skipped);
                    continue;
                }
            };
            self.route(message);
            handled += 1;
        }
        handled
    }

    fn route(&mut self, message: Message) {
        match message {
            Message::Playlist(PlaylistMessage::MediaAdded(paths)) => {
                for path in paths {
                    if let Err(error) = self.library.add_track_from_path(&path) {
                        warn!("Could not index queued file {}: {}", path.display(), error);
                    }
                }
            }
            Message::Playlist(PlaylistMessage::TrackMetadataEdited(record)) => {
                if let Err(error) = self.library.apply_playlist_metadata_edit(&record) {
                    warn!(
                        "Could not sync edited track {}: {}",
                        record.path.display(),
                        error
                    );
                }
            }
            Message::Playlist(PlaylistMessage::PlaylistFileOpened(path))
            | Message::Playlist(PlaylistMessage::NewPlaylistCreated { path, .. }) => {
                if let Err(error) = self.playlists.register(&path) {
                    warn!("Could not register playlist {}: {}", path.display(), error);
                }
            }
            Message::Library(LibraryMessage::MetadataChanged(change)) => {
                let updated = self.queue.apply_library_metadata_change(&change);
                debug!("Library edit touched {} queue entries", updated);
            }
            Message::PlaylistLibrary(PlaylistLibraryMessage::LoadPlaylist(path)) => {
                if let Err(error) = self.queue.load_from_file(&path) {
                    warn!("Could not load playlist {}: {}", path.display(), error);
                }
            }
            other => debug!("Unrouted bus message: {:?}", other),
        }
    }

    /// Queues the tracks behind an activated library row.
    pub fn activate_library_item(&mut self, position: TreePosition) -> Result<usize> {
        let tracks = self.library.tracks_at(position)?;
        let queued = self.queue.append_tracks(tracks);
        self.dispatch_pending();
        Ok(queued)
    }

    /// Loads a catalog entry into the queue.
    pub fn open_saved_playlist(&mut self, row: usize) -> Result<()> {
        self.playlists.request_load(row)?;
        self.dispatch_pending();
        Ok(())
    }

    /// Queues files and lets the library and catalog pick up what they lack.
    pub fn queue_paths(&mut self, paths: &[std::path::PathBuf]) -> usize {
        let queued = self.queue.append_paths(paths);
        self.dispatch_pending();
        queued
    }

    pub fn save_queue(&mut self, path: &Path) -> Result<std::path::PathBuf> {
        let written = self.queue.persist_to_file(path)?;
        self.dispatch_pending();
        Ok(written)
    }
}
