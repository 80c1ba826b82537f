use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use log::warn;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::model_observer::ModelObservers;
use crate::protocol::{MetadataField, ModelChange, RowParent, TrackInfo};

bitflags! {
    /// Playback mode flags. The empty set is normal, in-order playback.
    ///
    /// Shuffle is independent of the repeat flags and may combine with them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PlaybackMode: u8 {
        const REPEAT_ONE = 1 << 0;
        const REPEAT_ALL = 1 << 1;
        const SHUFFLE = 1 << 2;
    }
}

/// Where a drag of queue rows was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Below the last row.
    End,
    Row(usize),
}

pub struct Playlist {
    tracks: Vec<TrackInfo>,
    current_index: Option<usize>,
    mode: PlaybackMode,
    /// Set when a natural advance ran off the last entry.
    finished_playlist: bool,
    rng: StdRng,
    observers: ModelObservers,
}

fn seeded_rng() -> StdRng {
    let mut seed = [0u8; 32];
    match getrandom::fill(&mut seed) {
        Ok(()) => StdRng::from_seed(seed),
        Err(error) => {
            warn!("Falling back to a clock-derived shuffle seed: {}", error);
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos() as u64)
                .unwrap_or_default();
            StdRng::seed_from_u64(nanos)
        }
    }
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new()
    }
}

impl Playlist {
    pub fn new() -> Playlist {
        Self::with_rng(seeded_rng())
    }

    /// Deterministic shuffle order for tests and reproducible sessions.
    pub fn with_seed(seed: u64) -> Playlist {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Playlist {
        Playlist {
            tracks: Vec::new(),
            current_index: None,
            mode: PlaybackMode::empty(),
            finished_playlist: false,
            rng,
            observers: ModelObservers::new(),
        }
    }

    pub fn observers_mut(&mut self) -> &mut ModelObservers {
        &mut self.observers
    }

    pub fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&TrackInfo> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.tracks.iter().map(|track| track.path.clone()).collect()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&TrackInfo> {
        self.current_index.and_then(|index| self.tracks.get(index))
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Sets or clears a single flag, leaving the others untouched.
    pub fn set_mode(&mut self, flag: PlaybackMode, enabled: bool) {
        self.mode.set(flag, enabled);
    }

    pub fn is_finished(&self) -> bool {
        self.finished_playlist
    }

    /// Whether the transport should keep playing after a natural advance.
    pub fn should_continue(&self) -> bool {
        !(self.finished_playlist && self.mode.is_empty())
    }

    /// Appends entries. Returns `true` when the queue was empty before and now
    /// has a current entry.
    pub fn append<I>(&mut self, tracks: I) -> bool
    where
        I: IntoIterator<Item = TrackInfo>,
    {
        let incoming: Vec<TrackInfo> = tracks.into_iter().collect();
        if incoming.is_empty() {
            return false;
        }

        let was_empty = self.tracks.is_empty();
        let first = self.tracks.len();
        let last = first + incoming.len() - 1;
        let entries = &mut self.tracks;
        self.observers
            .insert_rows(RowParent::Root, first, last, || entries.extend(incoming));

        if was_empty {
            self.current_index = Some(0);
        }
        was_empty
    }

    fn random_index(&mut self) -> usize {
        self.rng.random_range(0..self.tracks.len())
    }

    /// Track finished on its own. Returns the new current entry.
    pub fn advance_natural(&mut self) -> Option<&TrackInfo> {
        if self.tracks.is_empty() {
            return None;
        }

        let current = self.current_index.unwrap_or(0);
        self.finished_playlist = current + 1 == self.tracks.len();

        let next = if self.mode.contains(PlaybackMode::REPEAT_ONE) {
            current
        } else if self.mode.contains(PlaybackMode::SHUFFLE) {
            self.random_index()
        } else if self.finished_playlist {
            0
        } else {
            current + 1
        };

        self.current_index = Some(next);
        self.tracks.get(next)
    }

    /// User pressed next. Never gated by the finished flag.
    pub fn advance_manual(&mut self) -> Option<&TrackInfo> {
        if self.tracks.is_empty() {
            return None;
        }

        self.finished_playlist = false;
        let next = if self.mode.contains(PlaybackMode::SHUFFLE) {
            self.random_index()
        } else {
            (self.current_index.unwrap_or(0) + 1) % self.tracks.len()
        };

        self.current_index = Some(next);
        self.tracks.get(next)
    }

    pub fn retreat(&mut self) -> Option<&TrackInfo> {
        if self.tracks.is_empty() {
            return None;
        }

        let previous = match self.current_index.unwrap_or(0) {
            0 => self.tracks.len() - 1,
            current => current - 1,
        };
        self.current_index = Some(previous);
        self.tracks.get(previous)
    }

    /// Out-of-range jumps leave the current entry unchanged.
    pub fn jump_to(&mut self, index: usize) -> Option<&TrackInfo> {
        if index >= self.tracks.len() {
            return None;
        }
        self.current_index = Some(index);
        self.tracks.get(index)
    }

    /// Removes `start..=end`. Returns `true` when the current entry was
    /// inside the range; current then falls back to the first entry.
    pub fn remove(&mut self, start: usize, end: usize) -> Result<bool> {
        let len = self.tracks.len();
        if start > end || end >= len {
            return Err(Error::InvalidIndex {
                index: end.max(start),
                len,
            });
        }

        let entries = &mut self.tracks;
        self.observers.remove_rows(RowParent::Root, start, end, || {
            entries.drain(start..=end);
        });

        let removed_count = end - start + 1;
        match self.current_index {
            Some(current) if (start..=end).contains(&current) => {
                self.current_index = if self.tracks.is_empty() { None } else { Some(0) };
                Ok(true)
            }
            Some(current) if current > end => {
                self.current_index = Some(current - removed_count);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    pub fn clear(&mut self) {
        let entries = &mut self.tracks;
        self.observers.reset(|| entries.clear());
        self.current_index = None;
        self.finished_playlist = false;
    }

    /// Moves one entry so it ends up at `to`. The current index follows the
    /// entry it designates.
    fn move_entry(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }

        let entries = &mut self.tracks;
        self.observers
            .notify(ModelChange::RowsAboutToBeMoved { from, to });
        let entry = entries.remove(from);
        entries.insert(to, entry);
        self.observers.notify(ModelChange::RowsMoved { from, to });

        if let Some(current) = self.current_index {
            self.current_index = Some(if current == from {
                to
            } else if from < current && current <= to {
                current - 1
            } else if to <= current && current < from {
                current + 1
            } else {
                current
            });
        }
    }

    /// Drag-reorder of `moving` rows (ascending) dropped at `target`.
    /// `offset` is the drop row minus the last moving row.
    pub fn reorder(&mut self, target: DropTarget, moving: &[usize], offset: isize) -> Result<()> {
        let len = self.tracks.len();
        let mut moving = moving.to_vec();
        moving.sort_unstable();
        moving.dedup();
        if let Some(&last) = moving.last() {
            if last >= len {
                return Err(Error::InvalidIndex { index: last, len });
            }
        } else {
            return Ok(());
        }

        match target {
            DropTarget::End => {
                for (i, &from) in moving.iter().enumerate() {
                    self.move_entry(from - i, len - 1);
                }
            }
            DropTarget::Row(target) => {
                if target >= len {
                    return Err(Error::InvalidIndex { index: target, len });
                }
                if offset > 0 {
                    // Each earlier move pulled the remaining rows up by one.
                    for (i, &from) in moving.iter().enumerate() {
                        self.move_entry(from - i, target);
                    }
                } else if offset < 0 && target == 0 {
                    for (i, &from) in moving.iter().enumerate() {
                        self.move_entry(from, i);
                    }
                } else if offset < 0 {
                    for (i, &from) in moving.iter().enumerate() {
                        self.move_entry(from, (target + i).min(len - 1));
                    }
                }
            }
        }
        Ok(())
    }

    /// Replaces one tag field of an entry in memory.
    pub fn set_field(&mut self, index: usize, field: MetadataField, value: &str) -> Result<()> {
        let len = self.tracks.len();
        let track = self
            .tracks
            .get_mut(index)
            .ok_or(Error::InvalidIndex { index, len })?;
        let value = value.trim().to_string();
        match field {
            MetadataField::Title => track.title = value,
            MetadataField::Artist => track.artist = value,
            MetadataField::Album => track.album = value,
        }
        self.observers.notify(ModelChange::DataChanged {
            parent: RowParent::Root,
            row: index,
        });
        Ok(())
    }

    /// Retitles every entry backed by `path`. Returns the number changed.
    pub fn retitle_path(&mut self, path: &Path, new_title: &str) -> usize {
        let rows: Vec<usize> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.path == path)
            .map(|(row, _)| row)
            .collect();
        for &row in &rows {
            self.tracks[row].title = new_title.to_string();
            self.observers.notify(ModelChange::DataChanged {
                parent: RowParent::Root,
                row,
            });
        }
        rows.len()
    }

    pub fn rename_artist(&mut self, old_name: &str, new_name: &str) -> usize {
        let rows: Vec<usize> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.artist == old_name)
            .map(|(row, _)| row)
            .collect();
        for &row in &rows {
            self.tracks[row].artist = new_name.to_string();
            self.observers.notify(ModelChange::DataChanged {
                parent: RowParent::Root,
                row,
            });
        }
        rows.len()
    }
}
