use std::path::{Path, PathBuf};

use log::debug;

/// Extensions recognized as importable media. Matched case-sensitively.
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "ogg", "raw", "wav", "wma", "mpg"];

pub const PLAYLIST_EXTENSION: &str = "m3u";

fn has_extension_in(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|supported| ext == *supported))
        .unwrap_or(false)
}

pub fn is_supported_audio_file(path: &Path) -> bool {
    has_extension_in(path, &SUPPORTED_AUDIO_EXTENSIONS)
}

pub fn is_playlist_file(path: &Path) -> bool {
    has_extension_in(path, &[PLAYLIST_EXTENSION])
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Depth-first walk under `folder_path`, skipping hidden and unreadable
/// entries. Returns matching files sorted by path.
fn collect_files_from_folder<F>(folder_path: &Path, mut matches: F) -> Vec<PathBuf>
where
    F: FnMut(&Path) -> bool,
{
    let mut pending_directories = vec![folder_path.to_path_buf()];
    let mut files = Vec::new();

    while let Some(directory) = pending_directories.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Failed to read directory {}: {}", directory.display(), err);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(
                        "Failed to read a directory entry in {}: {}",
                        directory.display(),
                        err
                    );
                    continue;
                }
            };

            let path = entry.path();
            if is_hidden(&path) {
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    debug!("Failed to inspect {}: {}", path.display(), err);
                    continue;
                }
            };

            if file_type.is_dir() {
                pending_directories.push(path);
                continue;
            }

            if file_type.is_file() && matches(&path) {
                files.push(path);
            }
        }
    }

    files.sort_unstable();
    files
}

pub fn collect_audio_files_from_folder(folder_path: &Path) -> Vec<PathBuf> {
    collect_files_from_folder(folder_path, is_supported_audio_file)
}

pub fn collect_playlist_files_from_folder(folder_path: &Path) -> Vec<PathBuf> {
    collect_files_from_folder(folder_path, is_playlist_file)
}
