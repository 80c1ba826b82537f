//! In-memory tag codec and fixtures shared by unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tokio::sync::broadcast::{error::TryRecvError, Receiver};

use crate::error::{Error, Result};
use crate::metadata::{MetadataReader, RawTags};
use crate::protocol::{Message, MetadataField, TrackInfo};

fn key_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Tags keyed by file name. Files without an entry are unreadable.
#[derive(Clone, Default)]
pub struct FakeMetadataReader {
    tags: Rc<RefCell<HashMap<String, RawTags>>>,
    read_only: Rc<RefCell<HashSet<String>>>,
}

impl FakeMetadataReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tags(&self, file_name: &str, title: &str, artist: &str, album: &str, secs: u64) {
        self.tags.borrow_mut().insert(
            file_name.to_string(),
            RawTags {
                title: title.to_string(),
                artist: artist.to_string(),
                album: album.to_string(),
                duration_secs: secs,
            },
        );
    }

    pub fn tags_for(&self, file_name: &str) -> Option<RawTags> {
        self.tags.borrow().get(file_name).cloned()
    }

    pub fn make_read_only(&self, file_name: &str) {
        self.read_only.borrow_mut().insert(file_name.to_string());
    }
}

impl MetadataReader for FakeMetadataReader {
    fn read(&self, path: &Path) -> Result<RawTags> {
        self.tags
            .borrow()
            .get(&key_for(path))
            .cloned()
            .ok_or_else(|| Error::UnreadableMedia {
                path: path.to_path_buf(),
                reason: "no tags".to_string(),
            })
    }

    fn write(&self, path: &Path, field: MetadataField, value: &str) -> Result<()> {
        let key = key_for(path);
        if self.read_only.borrow().contains(&key) {
            return Err(Error::TagWrite {
                path: path.to_path_buf(),
                reason: "read-only".to_string(),
            });
        }
        let mut tags = self.tags.borrow_mut();
        let entry = tags.entry(key).or_default();
        match field {
            MetadataField::Title => entry.title = value.to_string(),
            MetadataField::Artist => entry.artist = value.to_string(),
            MetadataField::Album => entry.album = value.to_string(),
        }
        Ok(())
    }
}

/// Creates an empty file (and parents) and returns its canonical path.
pub fn touch(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture directory should be creatable");
    }
    fs::write(path, b"").expect("fixture file should be writable");
    path.canonicalize().expect("fixture path should canonicalize")
}

/// Creates a backing file for a track and returns its record.
pub fn track_file(dir: &Path, file_name: &str, title: &str, artist: &str) -> TrackInfo {
    let path = touch(&dir.join(file_name));
    TrackInfo {
        path,
        file_name: file_name.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        album: "Unknown".to_string(),
        duration_secs: 120,
    }
}

/// Collects every message currently queued on the bus.
pub fn drain_messages(receiver: &mut Receiver<Message>) -> Vec<Message> {
    let mut messages = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(message) => messages.push(message),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => break,
        }
    }
    messages
}
