//! Tag readers and writers backed by `lofty`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use lofty::config::{ParseOptions, ParsingMode, WriteOptions};
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::read_from_path;
use lofty::tag::Tag;
use log::debug;

use crate::error::{Error, Result};
use crate::protocol::{MetadataField, TrackInfo};

/// Literal fallback for empty artist and album tags.
pub const UNKNOWN_TAG_VALUE: &str = "Unknown";

/// Tag values as stored in the file, before fallbacks are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: u64,
}

/// External tag codec seam.
pub trait MetadataReader {
    fn read(&self, path: &Path) -> Result<RawTags>;
    fn write(&self, path: &Path, field: MetadataField, value: &str) -> Result<()>;
}

fn first_non_empty_value<F>(primary_tag: Option<&Tag>, tags: &[Tag], mut extractor: F) -> String
where
    F: FnMut(&Tag) -> Option<String>,
{
    primary_tag
        .into_iter()
        .chain(tags.iter())
        .filter_map(|tag| extractor(tag))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn metadata_parse_options(parsing_mode: ParsingMode, max_junk_bytes: usize) -> ParseOptions {
    ParseOptions::new()
        .read_properties(true)
        .read_cover_art(false)
        .parsing_mode(parsing_mode)
        .max_junk_bytes(max_junk_bytes)
}

fn read_tagged_file(path: &Path) -> std::result::Result<TaggedFile, String> {
    let primary_options = metadata_parse_options(ParsingMode::BestAttempt, 1024);
    let relaxed_options = metadata_parse_options(ParsingMode::Relaxed, 64 * 1024);

    match Probe::open(path) {
        Ok(probe) => match probe.options(primary_options).read() {
            Ok(tagged_file) => return Ok(tagged_file),
            Err(primary_error) => {
                debug!(
                    "Primary tag parse failed for {}: {}",
                    path.display(),
                    primary_error
                );
            }
        },
        Err(open_error) => {
            debug!(
                "Extension-based probe could not open {}: {}",
                path.display(),
                open_error
            );
        }
    }

    let file = File::open(path).map_err(|error| error.to_string())?;
    let tagged_file = Probe::new(BufReader::new(file))
        .options(relaxed_options)
        .guess_file_type()
        .map_err(|error| error.to_string())?
        .read()
        .map_err(|error| error.to_string())?;
    debug!("Recovered tags via content-based parsing for {}", path.display());
    Ok(tagged_file)
}

/// Production reader over the `lofty` codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyMetadataReader;

impl MetadataReader for LoftyMetadataReader {
    fn read(&self, path: &Path) -> Result<RawTags> {
        let tagged_file = read_tagged_file(path).map_err(|reason| Error::UnreadableMedia {
            path: path.to_path_buf(),
            reason,
        })?;
        let primary_tag = tagged_file.primary_tag();
        let tags = tagged_file.tags();

        Ok(RawTags {
            title: first_non_empty_value(primary_tag, tags, |tag| {
                tag.title().map(|value| value.into_owned())
            }),
            artist: first_non_empty_value(primary_tag, tags, |tag| {
                tag.artist().map(|value| value.into_owned())
            }),
            album: first_non_empty_value(primary_tag, tags, |tag| {
                tag.album().map(|value| value.into_owned())
            }),
            duration_secs: tagged_file.properties().duration().as_secs(),
        })
    }

    fn write(&self, path: &Path, field: MetadataField, value: &str) -> Result<()> {
        let tag_write_error = |reason: String| Error::TagWrite {
            path: path.to_path_buf(),
            reason,
        };

        let mut tagged_file = read_from_path(path)
            .map_err(|error| tag_write_error(format!("failed to read tags: {error}")))?;
        let tag_type = tagged_file.primary_tag_type();
        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }

        let tag = tagged_file
            .tag_mut(tag_type)
            .ok_or_else(|| tag_write_error(format!("no writable tag for {tag_type:?}")))?;
        let value = value.trim().to_string();
        match field {
            MetadataField::Title => tag.set_title(value),
            MetadataField::Artist => tag.set_artist(value),
            MetadataField::Album => tag.set_album(value),
        }

        tagged_file
            .save_to_path(path, WriteOptions::default())
            .map_err(|error| tag_write_error(format!("failed to save tags: {error}")))
    }
}

/// Builds a track record for `path`, canonicalizing it and applying the
/// title / artist / album fallbacks.
pub fn read_track_info(reader: &dyn MetadataReader, path: &Path) -> Result<TrackInfo> {
    let path = path.canonicalize().map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            Error::FileMissing(path.to_path_buf())
        } else {
            Error::io(path, error)
        }
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let raw = reader.read(&path)?;

    let or_unknown = |value: String| {
        if value.trim().is_empty() {
            UNKNOWN_TAG_VALUE.to_string()
        } else {
            value
        }
    };

    Ok(TrackInfo {
        title: if raw.title.trim().is_empty() {
            file_name.clone()
        } else {
            raw.title
        },
        artist: or_unknown(raw.artist),
        album: or_unknown(raw.album),
        duration_secs: raw.duration_secs,
        file_name,
        path,
    })
}
