//! Tag reading and writing (reader trait, lofty-backed implementation, and
//! track-record construction).

pub mod metadata_tags;

pub use metadata_tags::{read_track_info, LoftyMetadataReader, MetadataReader, RawTags};
