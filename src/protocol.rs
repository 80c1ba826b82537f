//! Event-bus protocol and shared record types.
//!
//! This module defines the track record passed between the library index and
//! the playback queue, the drag payloads, structural change notifications for
//! model observers, and all message payloads exchanged on the sync bus.

use std::path::PathBuf;

/// Metadata for one playable media file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct TrackInfo {
    /// Absolute, canonical path. Unique key across library and store.
    pub path: PathBuf,
    pub file_name: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: u64,
}

impl TrackInfo {
    /// Duration rendered as `m:ss`.
    pub fn formatted_length(&self) -> String {
        format_duration(self.duration_secs)
    }
}

pub fn format_duration(duration_secs: u64) -> String {
    format!("{}:{:02}", duration_secs / 60, duration_secs % 60)
}

/// Editable tag fields. Duration is derived from the stream and never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum MetadataField {
    Title,
    Artist,
    Album,
}

/// Metadata edit performed through the library index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryMetadataChange {
    /// One track was retitled. Queue entries match by path.
    Title { path: PathBuf, new_title: String },
    /// Every track of an artist was moved to a new artist name.
    Artist { old_name: String, new_name: String },
}

/// One saved playlist in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PlaylistEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Drag-and-drop payloads exchanged between the library view and the queue.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum DragPayload {
    /// Full track records. Dragging an artist carries all of its tracks.
    LibraryItems(Vec<TrackInfo>),
    /// Source rows of a reorder within the same queue, ascending.
    PlaylistRows(Vec<usize>),
}

impl DragPayload {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Parent of a changed row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowParent {
    Root,
    /// Song rows under the artist at this row.
    Artist(usize),
}

/// Structural notifications delivered synchronously to model observers.
///
/// Every `RowsAboutTo*` is followed by its matching commit before the
/// mutating call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChange {
    RowsAboutToBeInserted {
        parent: RowParent,
        first: usize,
        last: usize,
    },
    RowsInserted {
        parent: RowParent,
        first: usize,
        last: usize,
    },
    RowsAboutToBeRemoved {
        parent: RowParent,
        first: usize,
        last: usize,
    },
    RowsRemoved {
        parent: RowParent,
        first: usize,
        last: usize,
    },
    RowsAboutToBeMoved {
        from: usize,
        to: usize,
    },
    RowsMoved {
        from: usize,
        to: usize,
    },
    DataChanged {
        parent: RowParent,
        row: usize,
    },
    ModelAboutToBeReset,
    ModelReset,
}

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Library(LibraryMessage),
    Playlist(PlaylistMessage),
    PlaylistLibrary(PlaylistLibraryMessage),
}

/// Notifications produced by the library index.
#[derive(Debug, Clone)]
pub enum LibraryMessage {
    MetadataChanged(LibraryMetadataChange),
    ImportFinished {
        root: PathBuf,
        added: usize,
    },
    Refreshed {
        artists: usize,
    },
}

/// Notifications produced by the playback queue.
#[derive(Debug, Clone)]
pub enum PlaylistMessage {
    /// Media files queued directly by one append; the library adds any it
    /// lacks. One message per batch so a large append cannot overrun the bus.
    MediaAdded(Vec<PathBuf>),
    /// The queue went from empty to non-empty.
    MediaAvailable,
    /// A `.m3u` path was handed to the queue instead of a media file.
    PlaylistFileOpened(PathBuf),
    CurrentIndexChanged(Option<usize>),
    /// The current entry was removed; carries the new current index.
    CurrentMediaRemoved(Option<usize>),
    /// A queue entry's tags were edited; carries the full updated record.
    TrackMetadataEdited(TrackInfo),
    NewPlaylistCreated {
        path: PathBuf,
        name: String,
    },
    PlaylistLoaded {
        path: PathBuf,
        name: String,
    },
    Cleared,
}

/// Notifications produced by the saved-playlist catalog.
#[derive(Debug, Clone)]
pub enum PlaylistLibraryMessage {
    PlaylistRegistered(PlaylistEntry),
    PlaylistUnregistered(PathBuf),
    /// User activated a catalog entry; the queue loads it.
    LoadPlaylist(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_pads_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3725), "62:05");
    }

    #[test]
    fn test_drag_payload_survives_json_transport() {
        let payload = DragPayload::LibraryItems(vec![TrackInfo {
            path: PathBuf::from("/music/a.mp3"),
            file_name: "a.mp3".to_string(),
            title: "Alpha".to_string(),
            artist: "X".to_string(),
            album: "Unknown".to_string(),
            duration_secs: 201,
        }]);
        let raw = payload.encode().expect("payload should encode");
        assert_eq!(DragPayload::decode(&raw).expect("payload should decode"), payload);
        assert!(DragPayload::decode("not json").is_err());
    }
}
