//! Persistent application configuration model and defaults.

use std::path::PathBuf;

use crate::playlist::PlaybackMode;

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Database location.
    pub storage: StorageConfig,
    #[serde(default)]
    /// Library indexing preferences.
    pub library: LibraryConfig,
    #[serde(default)]
    /// Initial playback mode of the queue.
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quaver")
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("library.db3")
}

fn default_import_dirs_file() -> PathBuf {
    default_data_dir().join("import_dirs.txt")
}

fn default_true() -> bool {
    true
}

fn default_bus_capacity() -> usize {
    4096
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    /// Line-delimited list of directories rescanned on refresh.
    #[serde(default = "default_import_dirs_file")]
    pub import_dirs_file: PathBuf,
    #[serde(default = "default_true")]
    pub scan_on_startup: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            import_dirs_file: default_import_dirs_file(),
            scan_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub repeat_one: bool,
    #[serde(default)]
    pub repeat_all: bool,
    #[serde(default)]
    pub shuffle: bool,
}

impl PlaybackConfig {
    pub fn mode(&self) -> PlaybackMode {
        let mut mode = PlaybackMode::empty();
        mode.set(PlaybackMode::REPEAT_ONE, self.repeat_one);
        mode.set(PlaybackMode::REPEAT_ALL, self.repeat_all);
        mode.set(PlaybackMode::SHUFFLE, self.shuffle);
        mode
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RuntimeConfig {
    /// Capacity of the sync bus channel.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl RuntimeConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info)
    }
}
