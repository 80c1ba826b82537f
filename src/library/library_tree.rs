//! Sorted Root → Artist → Song index.
//!
//! Artists are kept ascending by name and songs ascending by title. A song's
//! parent is addressed by position (`TreePosition`), never by reference, so
//! songs can be detached and re-homed by moving them between `Vec`s.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::path::{Path, PathBuf};

use crate::model_observer::ModelObservers;
use crate::protocol::RowParent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongNode {
    pub title: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistNode {
    pub name: String,
    pub songs: Vec<SongNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreePosition {
    Artist(usize),
    Song { artist_row: usize, song_row: usize },
}

#[derive(Debug, Default)]
pub struct LibraryTree {
    artists: Vec<ArtistNode>,
    /// Live song count per artist; mirrors each node's child count.
    item_counts: HashMap<String, usize>,
    paths: HashSet<PathBuf>,
    observers: ModelObservers,
}

impl LibraryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observers_mut(&mut self) -> &mut ModelObservers {
        &mut self.observers
    }

    pub fn artists(&self) -> &[ArtistNode] {
        &self.artists
    }

    pub fn artist(&self, row: usize) -> Option<&ArtistNode> {
        self.artists.get(row)
    }

    pub fn song(&self, artist_row: usize, song_row: usize) -> Option<&SongNode> {
        self.artists.get(artist_row)?.songs.get(song_row)
    }

    pub fn item_count(&self, artist: &str) -> Option<usize> {
        self.item_counts.get(artist).copied()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn song_count(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }

    pub fn lookup_artist_index(&self, name: &str) -> Option<usize> {
        self.artists
            .binary_search_by(|artist| artist.name.as_str().cmp(name))
            .ok()
    }

    pub fn lookup_song_index(&self, artist: &str, path: &Path) -> Option<usize> {
        let artist_row = self.lookup_artist_index(artist)?;
        self.artists[artist_row]
            .songs
            .iter()
            .position(|song| song.path == path)
    }

    /// Row of `name`, creating the node at its sorted position when missing.
    fn ensure_artist(&mut self, name: &str) -> usize {
        if let Some(row) = self.lookup_artist_index(name) {
            return row;
        }

        let row = self
            .artists
            .partition_point(|artist| artist.name.as_str() < name);
        let artists = &mut self.artists;
        self.observers.insert_rows(RowParent::Root, row, row, || {
            artists.insert(
                row,
                ArtistNode {
                    name: name.to_string(),
                    songs: Vec::new(),
                },
            )
        });
        row
    }

    /// Places `song` under `artist` in title order. Equal titles keep the new
    /// song first.
    fn attach_song(&mut self, artist: &str, song: SongNode) -> TreePosition {
        let artist_row = self.ensure_artist(artist);
        let songs = &mut self.artists[artist_row].songs;
        let song_row = songs.partition_point(|existing| existing.title < song.title);
        self.observers
            .insert_rows(RowParent::Artist(artist_row), song_row, song_row, || {
                songs.insert(song_row, song)
            });
        *self.item_counts.entry(artist.to_string()).or_insert(0) += 1;
        TreePosition::Song {
            artist_row,
            song_row,
        }
    }

    /// Inserts a song. Returns `None` when the path is already indexed.
    pub fn insert(&mut self, artist: &str, title: &str, path: &Path) -> Option<TreePosition> {
        if self.paths.contains(path) {
            return None;
        }
        self.paths.insert(path.to_path_buf());
        Some(self.attach_song(
            artist,
            SongNode {
                title: title.to_string(),
                path: path.to_path_buf(),
            },
        ))
    }

    /// Removes the song at `path` under `artist`, dropping the artist node when
    /// it was the last song.
    pub fn remove(&mut self, artist: &str, path: &Path) -> Option<SongNode> {
        let artist_row = self.lookup_artist_index(artist)?;
        let song_row = self.lookup_song_index(artist, path)?;

        let songs = &mut self.artists[artist_row].songs;
        let removed = self
            .observers
            .remove_rows(RowParent::Artist(artist_row), song_row, song_row, || {
                songs.remove(song_row)
            });
        self.paths.remove(path);

        let remaining = match self.item_counts.get_mut(artist) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.item_counts.remove(artist);
            let artists = &mut self.artists;
            self.observers
                .remove_rows(RowParent::Root, artist_row, artist_row, || {
                    artists.remove(artist_row)
                });
        }
        Some(removed)
    }

    /// Moves every song of `old_name` under `new_name`. The old node is removed
    /// only after its songs have been moved out. Returns the number of songs
    /// re-homed.
    pub fn rename_artist(&mut self, old_name: &str, new_name: &str) -> usize {
        let Some(old_row) = self.lookup_artist_index(old_name) else {
            return 0;
        };

        let orphans = mem::take(&mut self.artists[old_row].songs);
        self.item_counts.remove(old_name);
        let artists = &mut self.artists;
        self.observers
            .remove_rows(RowParent::Root, old_row, old_row, || {
                artists.remove(old_row)
            });

        let moved = orphans.len();
        for song in orphans {
            self.attach_song(new_name, song);
        }
        moved
    }

    pub fn clear(&mut self) {
        let artists = &mut self.artists;
        let item_counts = &mut self.item_counts;
        let paths = &mut self.paths;
        self.observers.reset(|| {
            artists.clear();
            item_counts.clear();
            paths.clear();
        });
    }
}
