use std::path::{Path, PathBuf};

use log::{info, warn};
use toml_edit::{DocumentMut, Item, Table};

use crate::config::Config;

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quaver")
        .join("config.toml")
}

fn set_table_value_preserving_decor(table: &mut Table, key: &str, item: Item) {
    let existing_value_decor = table
        .get(key)
        .and_then(|current| current.as_value().map(|value| value.decor().clone()));
    table[key] = item;
    if let Some(existing_value_decor) = existing_value_decor {
        if let Some(next_value) = table[key].as_value_mut() {
            *next_value.decor_mut() = existing_value_decor;
        }
    }
}

fn merge_table_with_targeted_updates(destination: &mut Table, source: &Table) {
    for (key, source_item) in source.iter() {
        match source_item {
            Item::Table(source_table) => {
                if !destination.get(key).is_some_and(Item::is_table) {
                    destination.insert(key, Item::Table(Table::new()));
                }
                if let Some(destination_table) = destination.get_mut(key).and_then(Item::as_table_mut)
                {
                    merge_table_with_targeted_updates(destination_table, source_table);
                }
            }
            _ => {
                let unchanged = destination
                    .get(key)
                    .and_then(Item::as_value)
                    .zip(source_item.as_value())
                    .is_some_and(|(current, next)| current.to_string().trim() == next.to_string().trim());
                if !unchanged {
                    set_table_value_preserving_decor(destination, key, source_item.clone());
                }
            }
        }
    }
}

/// Re-serializes `config` into the layout of `existing_text`, keeping its
/// comments and key order.
pub fn serialize_config_with_preserved_comments(
    existing_text: &str,
    config: &Config,
) -> Result<String, String> {
    let next_config_text = toml::to_string(config)
        .map_err(|err| format!("failed to serialize config to TOML: {}", err))?;
    let next_document = next_config_text
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse serialized config TOML document: {}", err))?;
    let mut existing_document = existing_text
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse existing config as TOML document: {}", err))?;

    merge_table_with_targeted_updates(existing_document.as_table_mut(), next_document.as_table());
    Ok(existing_document.to_string())
}

pub fn persist_config_file(config: &Config, path: &Path) {
    let existing_text = std::fs::read_to_string(path).ok();
    let config_text = if let Some(existing_text) = existing_text {
        match serialize_config_with_preserved_comments(&existing_text, config) {
            Ok(updated_text) => Some(updated_text),
            Err(err) => {
                warn!(
                    "Failed to preserve config comments for {} ({}). Falling back to plain serialization.",
                    path.display(),
                    err
                );
                toml::to_string(config).ok()
            }
        }
    } else {
        toml::to_string(config).ok()
    };

    let Some(config_text) = config_text else {
        log::error!("Failed to serialize config for {}", path.display());
        return;
    };

    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            log::error!("Failed to create config directory {}: {}", parent.display(), err);
            return;
        }
    }
    if let Err(err) = std::fs::write(path, config_text) {
        log::error!("Failed to persist config to {}: {}", path.display(), err);
    }
}

/// Reads the config, writing defaults first when the file does not exist.
/// Unparseable files fall back to defaults.
pub fn load_config_file(path: &Path) -> Config {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        persist_config_file(&Config::default(), path);
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    "Failed to parse config {} ({}). Using defaults.",
                    path.display(),
                    err
                );
                Config::default()
            }
        },
        Err(err) => {
            warn!("Failed to read config {}: {}", path.display(), err);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let config = load_config_file(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_load_garbage_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[[ not toml").expect("fixture");
        assert_eq!(load_config_file(&path), Config::default());
    }

    #[test]
    fn test_persist_preserves_comments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "# user notes\n[playback]\n# keep shuffling\nshuffle = false\n",
        )
        .expect("fixture");

        let mut config = load_config_file(&path);
        config.playback.shuffle = true;
        persist_config_file(&config, &path);

        let text = std::fs::read_to_string(&path).expect("read back");
        assert!(text.contains("# user notes"));
        assert!(text.contains("# keep shuffling"));
        assert!(text.contains("shuffle = true"));
        assert_eq!(load_config_file(&path), config);
    }
}
