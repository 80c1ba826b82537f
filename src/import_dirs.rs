//! Line-delimited list of directories the importer rescans on refresh.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ImportDirList {
    file_path: PathBuf,
    dirs: Vec<PathBuf>,
}

impl ImportDirList {
    /// Reads the list, creating an empty file when none exists.
    pub fn load(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            if let Some(parent) = file_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|source| Error::io(parent, source))?;
                }
            }
            fs::write(file_path, "").map_err(|source| Error::io(file_path, source))?;
            info!("Created import directory list at {}", file_path.display());
        }

        let contents =
            fs::read_to_string(file_path).map_err(|source| Error::io(file_path, source))?;
        let mut dirs: Vec<PathBuf> = Vec::new();
        for line in contents.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let dir = PathBuf::from(line);
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }

        Ok(Self {
            file_path: file_path.to_path_buf(),
            dirs,
        })
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|known| known == dir)
    }

    /// Appends `dir` unless already listed. Returns whether a line was written.
    pub fn append(&mut self, dir: &Path) -> Result<bool> {
        if self.contains(dir) {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .map_err(|source| Error::io(&self.file_path, source))?;
        writeln!(file, "{}", dir.display()).map_err(|source| Error::io(&self.file_path, source))?;
        self.dirs.push(dir.to_path_buf());
        Ok(true)
    }

    /// Re-reads the backing file.
    pub fn reload(&mut self) -> Result<()> {
        *self = Self::load(&self.file_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list_path = dir.path().join("cfg").join("import_dirs.txt");
        let list = ImportDirList::load(&list_path).expect("list should load");
        assert!(list.dirs().is_empty());
        assert!(list_path.exists());
    }

    #[test]
    fn test_append_is_idempotent_and_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list_path = dir.path().join("import_dirs.txt");
        let mut list = ImportDirList::load(&list_path).expect("list should load");

        assert!(list.append(Path::new("/music/a")).expect("append"));
        assert!(!list.append(Path::new("/music/a")).expect("append"));
        assert!(list.append(Path::new("/music/b")).expect("append"));

        let reloaded = ImportDirList::load(&list_path).expect("reload");
        assert_eq!(
            reloaded.dirs(),
            &[PathBuf::from("/music/a"), PathBuf::from("/music/b")]
        );
        assert_eq!(
            fs::read_to_string(&list_path).expect("read"),
            "/music/a\n/music/b\n"
        );
    }
}
