//! Music library index (sorted artist/song tree, storage sync, directory import).

pub mod library_manager;
pub mod library_tree;

pub use library_manager::{ImportReport, LibraryManager};
pub use library_tree::{ArtistNode, LibraryTree, SongNode, TreePosition};
