//! Playback queue runtime component.
//!
//! Wraps the `Playlist` algebra with tag I/O, `.m3u` persistence and the bus
//! notifications the library index and playlist catalog consume.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info};
use tokio::sync::broadcast::Sender;

use crate::error::{Error, Result};
use crate::media_file_discovery::{is_playlist_file, PLAYLIST_EXTENSION};
use crate::metadata::{read_track_info, MetadataReader};
use crate::playlist::{DropTarget, PlaybackMode, Playlist};
use crate::protocol::{
    DragPayload, LibraryMetadataChange, Message, MetadataField, ModelChange, PlaylistMessage,
    TrackInfo,
};

fn playlist_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct PlaylistManager {
    playlist: Playlist,
    bus_producer: Sender<Message>,
    reader: Rc<dyn MetadataReader>,
}

impl PlaylistManager {
    pub fn new(
        playlist: Playlist,
        bus_producer: Sender<Message>,
        reader: Rc<dyn MetadataReader>,
    ) -> Self {
        Self {
            playlist,
            bus_producer,
            reader,
        }
    }

    fn emit(&self, message: PlaylistMessage) {
        let _ = self.bus_producer.send(Message::Playlist(message));
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ModelChange) + 'static,
    {
        self.playlist.observers_mut().subscribe(observer);
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn set_mode(&mut self, flag: PlaybackMode, enabled: bool) {
        self.playlist.set_mode(flag, enabled);
    }

    pub fn should_continue(&self) -> bool {
        self.playlist.should_continue()
    }

    fn append_records(&mut self, tracks: Vec<TrackInfo>) -> usize {
        let count = tracks.len();
        if self.playlist.append(tracks) {
            self.emit(PlaylistMessage::MediaAvailable);
        }
        count
    }

    /// Queues media files. `.m3u` paths are announced as opened playlists
    /// instead, and unreadable files are skipped. Returns the number queued.
    pub fn append_paths(&mut self, paths: &[PathBuf]) -> usize {
        let mut tracks: Vec<TrackInfo> = Vec::new();
        for path in paths {
            if is_playlist_file(path) {
                self.emit(PlaylistMessage::PlaylistFileOpened(path.clone()));
                continue;
            }
            match read_track_info(self.reader.as_ref(), path) {
                Ok(track) => tracks.push(track),
                Err(error) => debug!("Not queuing {}: {}", path.display(), error),
            }
        }
        if !tracks.is_empty() {
            self.emit(PlaylistMessage::MediaAdded(
                tracks.iter().map(|track| track.path.clone()).collect(),
            ));
        }
        self.append_records(tracks)
    }

    /// Queues records produced by the library index.
    pub fn append_tracks(&mut self, tracks: Vec<TrackInfo>) -> usize {
        self.append_records(tracks)
    }

    fn announce_current(&self) -> Option<PathBuf> {
        let path = self.playlist.current_track().map(|track| track.path.clone());
        if path.is_some() {
            self.emit(PlaylistMessage::CurrentIndexChanged(
                self.playlist.current_index(),
            ));
        }
        path
    }

    /// Position after a track ended on its own. The transport checks
    /// `should_continue` before starting the returned media.
    pub fn advance_natural(&mut self) -> Option<PathBuf> {
        self.playlist.advance_natural();
        self.announce_current()
    }

    pub fn advance_manual(&mut self) -> Option<PathBuf> {
        self.playlist.advance_manual();
        self.announce_current()
    }

    pub fn retreat(&mut self) -> Option<PathBuf> {
        self.playlist.retreat();
        self.announce_current()
    }

    pub fn jump_to(&mut self, index: usize) -> Option<PathBuf> {
        self.playlist.jump_to(index)?;
        self.announce_current()
    }

    pub fn current_media(&self) -> Option<&Path> {
        self.playlist
            .current_track()
            .map(|track| track.path.as_path())
    }

    pub fn current_title(&self) -> Option<&str> {
        self.playlist
            .current_track()
            .map(|track| track.title.as_str())
    }

    /// `"Artist - Album"` of the current entry.
    pub fn current_album_artist(&self) -> Option<String> {
        self.playlist
            .current_track()
            .map(|track| format!("{} - {}", track.artist, track.album))
    }

    pub fn remove(&mut self, start: usize, end: usize) -> Result<()> {
        if self.playlist.remove(start, end)? {
            self.emit(PlaylistMessage::CurrentMediaRemoved(
                self.playlist.current_index(),
            ));
        }
        Ok(())
    }

    pub fn reorder(&mut self, target: DropTarget, moving: &[usize], offset: isize) -> Result<()> {
        self.playlist.reorder(target, moving, offset)
    }

    pub fn clear(&mut self) {
        self.playlist.clear();
        self.emit(PlaylistMessage::Cleared);
    }

    /// Writes the tag first; the entry only changes once the file does.
    pub fn edit_field(&mut self, index: usize, field: MetadataField, value: &str) -> Result<()> {
        let path = self
            .playlist
            .track(index)
            .map(|track| track.path.clone())
            .ok_or(Error::InvalidIndex {
                index,
                len: self.playlist.len(),
            })?;

        self.reader.write(&path, field, value)?;
        self.playlist.set_field(index, field, value)?;

        if let Some(record) = self.playlist.track(index) {
            self.emit(PlaylistMessage::TrackMetadataEdited(record.clone()));
        }
        Ok(())
    }

    /// Writes queue paths one per line. A missing `.m3u` suffix is appended.
    /// Returns the written path.
    pub fn persist_to_file(&self, path: &Path) -> Result<PathBuf> {
        let path = if is_playlist_file(path) {
            path.to_path_buf()
        } else {
            let mut raw: OsString = path.as_os_str().to_owned();
            raw.push(".");
            raw.push(PLAYLIST_EXTENSION);
            PathBuf::from(raw)
        };

        let mut contents = String::new();
        for track in self.playlist.tracks() {
            contents.push_str(&track.path.to_string_lossy());
            contents.push('\n');
        }
        fs::write(&path, contents).map_err(|source| Error::io(&path, source))?;
        info!(
            "Saved {} entries to {}",
            self.playlist.len(),
            path.display()
        );

        self.emit(PlaylistMessage::NewPlaylistCreated {
            name: playlist_name(&path),
            path: path.clone(),
        });
        Ok(path)
    }

    /// Replaces the queue with the entries listed in `path`. Returns the
    /// number queued.
    pub fn load_from_file(&mut self, path: &Path) -> Result<usize> {
        let contents = fs::read_to_string(path).map_err(|source| Error::io(path, source))?;
        let paths: Vec<PathBuf> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();

        self.clear();
        let queued = self.append_paths(&paths);
        self.emit(PlaylistMessage::PlaylistLoaded {
            path: path.to_path_buf(),
            name: playlist_name(path),
        });
        Ok(queued)
    }

    /// Payload for dragging queue rows.
    pub fn drag_payload(&self, rows: &[usize]) -> DragPayload {
        let mut rows = rows.to_vec();
        rows.sort_unstable();
        rows.dedup();
        DragPayload::PlaylistRows(rows)
    }

    /// Applies a drop onto the queue. `drop_row` is `None` below the last row.
    pub fn drop_payload(&mut self, payload: DragPayload, drop_row: Option<usize>) -> Result<()> {
        match payload {
            DragPayload::LibraryItems(tracks) => {
                self.append_tracks(tracks);
                Ok(())
            }
            DragPayload::PlaylistRows(mut rows) => {
                rows.sort_unstable();
                let Some(&last) = rows.last() else {
                    return Ok(());
                };
                match drop_row {
                    None => self.reorder(DropTarget::End, &rows, 0),
                    Some(row) => {
                        let offset = row as isize - last as isize;
                        self.reorder(DropTarget::Row(row), &rows, offset)
                    }
                }
            }
        }
    }

    /// Mirrors a library-side edit onto matching entries.
    pub fn apply_library_metadata_change(&mut self, change: &LibraryMetadataChange) -> usize {
        match change {
            LibraryMetadataChange::Title { path, new_title } => {
                self.playlist.retitle_path(path, new_title)
            }
            LibraryMetadataChange::Artist { old_name, new_name } => {
                self.playlist.rename_artist(old_name, new_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{drain_messages, touch, FakeMetadataReader};
    use tokio::sync::broadcast::{self, Receiver};

    struct QueueHarness {
        manager: PlaylistManager,
        reader: FakeMetadataReader,
        receiver: Receiver<Message>,
        dir: tempfile::TempDir,
    }

    impl QueueHarness {
        fn new() -> Self {
            let (bus_producer, receiver) = broadcast::channel(256);
            let reader = FakeMetadataReader::new();
            let manager =
                PlaylistManager::new(Playlist::with_seed(11), bus_producer, Rc::new(reader.clone()));
            Self {
                manager,
                reader,
                receiver,
                dir: tempfile::tempdir().expect("tempdir"),
            }
        }

        fn media(&self, name: &str) -> PathBuf {
            let path = touch(&self.dir.path().join(name));
            self.reader.set_tags(name, name, "Artist", "Album", 90);
            path
        }

        fn titles(&self) -> Vec<String> {
            self.manager
                .playlist()
                .tracks()
                .iter()
                .map(|track| track.title.clone())
                .collect()
        }
    }

    #[test]
    fn test_append_paths_routes_playlists_and_skips_unreadable() {
        let mut harness = QueueHarness::new();
        let a = harness.media("a.mp3");
        let broken = touch(&harness.dir.path().join("broken.mp3"));
        let list = harness.dir.path().join("mix.m3u");

        let queued = harness
            .manager
            .append_paths(&[a.clone(), broken, list.clone()]);
        assert_eq!(queued, 1);
        assert_eq!(harness.manager.playlist().current_index(), Some(0));

        let messages = drain_messages(&mut harness.receiver);
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playlist(PlaylistMessage::PlaylistFileOpened(path)) if path == &list
        )));
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playlist(PlaylistMessage::MediaAdded(added)) if added == &vec![a.clone()]
        )));
        assert_eq!(
            messages
                .iter()
                .filter(|message| matches!(
                    message,
                    Message::Playlist(PlaylistMessage::MediaAvailable)
                ))
                .count(),
            1
        );

        let b = harness.media("b.mp3");
        harness.manager.append_paths(&[b]);
        assert!(!drain_messages(&mut harness.receiver)
            .iter()
            .any(|message| matches!(message, Message::Playlist(PlaylistMessage::MediaAvailable))));
    }

    #[test]
    fn test_remove_current_emits_new_index() {
        let mut harness = QueueHarness::new();
        let paths: Vec<PathBuf> = ["t0.mp3", "t1.mp3", "t2.mp3", "t3.mp3"]
            .iter()
            .map(|name| harness.media(name))
            .collect();
        harness.manager.append_paths(&paths);
        harness.manager.jump_to(2);
        drain_messages(&mut harness.receiver);

        harness.manager.remove(1, 2).expect("remove");
        assert_eq!(harness.titles(), vec!["t0.mp3", "t3.mp3"]);
        assert_eq!(harness.manager.playlist().current_index(), Some(0));
        let messages = drain_messages(&mut harness.receiver);
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playlist(PlaylistMessage::CurrentMediaRemoved(Some(0)))
        )));
    }

    #[test]
    fn test_persist_then_load_round_trips_paths() {
        let mut harness = QueueHarness::new();
        let paths: Vec<PathBuf> = ["c.mp3", "a.mp3", "b.mp3"]
            .iter()
            .map(|name| harness.media(name))
            .collect();
        harness.manager.append_paths(&paths);

        let written = harness
            .manager
            .persist_to_file(&harness.dir.path().join("Evening"))
            .expect("persist");
        assert_eq!(written.extension().and_then(|e| e.to_str()), Some("m3u"));
        let messages = drain_messages(&mut harness.receiver);
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playlist(PlaylistMessage::NewPlaylistCreated { name, .. }) if name == "Evening"
        )));

        let (bus_producer, mut receiver) = broadcast::channel(64);
        let mut fresh =
            PlaylistManager::new(Playlist::with_seed(2), bus_producer, Rc::new(harness.reader.clone()));
        assert_eq!(fresh.load_from_file(&written).expect("load"), 3);
        assert_eq!(fresh.playlist().paths(), paths);
        assert!(drain_messages(&mut receiver).iter().any(|message| matches!(
            message,
            Message::Playlist(PlaylistMessage::PlaylistLoaded { name, .. }) if name == "Evening"
        )));
    }

    #[test]
    fn test_load_missing_file_fails_without_clearing() {
        let mut harness = QueueHarness::new();
        let a = harness.media("a.mp3");
        harness.manager.append_paths(&[a]);
        let error = harness
            .manager
            .load_from_file(&harness.dir.path().join("missing.m3u"))
            .expect_err("missing file should fail");
        assert!(matches!(error, Error::Io { .. }));
        assert_eq!(harness.manager.playlist().len(), 1);
    }

    #[test]
    fn test_edit_field_writes_tag_then_emits_record() {
        let mut harness = QueueHarness::new();
        let a = harness.media("a.mp3");
        harness.manager.append_paths(&[a]);
        drain_messages(&mut harness.receiver);

        harness
            .manager
            .edit_field(0, MetadataField::Album, "New Album")
            .expect("edit");
        assert_eq!(
            harness.reader.tags_for("a.mp3").expect("tags").album,
            "New Album"
        );
        let messages = drain_messages(&mut harness.receiver);
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playlist(PlaylistMessage::TrackMetadataEdited(record)) if record.album == "New Album"
        )));
    }

    #[test]
    fn test_edit_field_tag_failure_leaves_entry() {
        let mut harness = QueueHarness::new();
        let a = harness.media("a.mp3");
        harness.manager.append_paths(&[a]);
        harness.reader.make_read_only("a.mp3");

        assert!(harness
            .manager
            .edit_field(0, MetadataField::Title, "Changed")
            .is_err());
        assert_eq!(harness.titles(), vec!["a.mp3"]);
        assert!(harness
            .manager
            .edit_field(3, MetadataField::Title, "Changed")
            .is_err());
    }

    #[test]
    fn test_drop_playlist_rows_reorders() {
        let mut harness = QueueHarness::new();
        let paths: Vec<PathBuf> = ["t0.mp3", "t1.mp3", "t2.mp3"]
            .iter()
            .map(|name| harness.media(name))
            .collect();
        harness.manager.append_paths(&paths);

        let payload = harness.manager.drag_payload(&[2]);
        harness
            .manager
            .drop_payload(payload, Some(0))
            .expect("drop");
        assert_eq!(harness.titles(), vec!["t2.mp3", "t0.mp3", "t1.mp3"]);

        let payload = harness.manager.drag_payload(&[0]);
        harness.manager.drop_payload(payload, None).expect("drop");
        assert_eq!(harness.titles(), vec!["t0.mp3", "t1.mp3", "t2.mp3"]);
    }

    #[test]
    fn test_drop_library_items_appends_records() {
        let mut harness = QueueHarness::new();
        let record = TrackInfo {
            path: PathBuf::from("/music/x.mp3"),
            file_name: "x.mp3".to_string(),
            title: "X".to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration_secs: 5,
        };
        harness
            .manager
            .drop_payload(DragPayload::LibraryItems(vec![record]), None)
            .expect("drop");
        assert_eq!(harness.manager.current_title(), Some("X"));
        assert_eq!(
            harness.manager.current_album_artist(),
            Some("Artist - Album".to_string())
        );
    }

    #[test]
    fn test_library_changes_rewrite_entries() {
        let mut harness = QueueHarness::new();
        let a = harness.media("a.mp3");
        harness.manager.append_paths(&[a.clone()]);

        assert_eq!(
            harness
                .manager
                .apply_library_metadata_change(&LibraryMetadataChange::Title {
                    path: a,
                    new_title: "Renamed".to_string(),
                }),
            1
        );
        assert_eq!(
            harness
                .manager
                .apply_library_metadata_change(&LibraryMetadataChange::Artist {
                    old_name: "Artist".to_string(),
                    new_name: "Someone".to_string(),
                }),
            1
        );
        assert_eq!(harness.manager.current_title(), Some("Renamed"));
        assert_eq!(
            harness.manager.current_album_artist(),
            Some("Someone - Album".to_string())
        );
    }

    #[test]
    fn test_natural_advance_reports_continuation() {
        let mut harness = QueueHarness::new();
        let paths: Vec<PathBuf> = ["t0.mp3", "t1.mp3"]
            .iter()
            .map(|name| harness.media(name))
            .collect();
        harness.manager.append_paths(&paths);

        assert_eq!(harness.manager.advance_natural(), Some(paths[1].clone()));
        assert!(harness.manager.should_continue());
        assert_eq!(harness.manager.advance_natural(), Some(paths[0].clone()));
        assert!(!harness.manager.should_continue());

        harness.manager.set_mode(PlaybackMode::REPEAT_ALL, true);
        harness.manager.jump_to(1);
        harness.manager.advance_natural();
        assert!(harness.manager.should_continue());
        assert_eq!(harness.manager.current_media(), Some(paths[0].as_path()));
    }
}
