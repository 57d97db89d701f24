//! Loading and saving of `config.toml` under the platform config directory.

use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::Config;

/// Directory holding all persisted configuration for this crate.
pub fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("songvault")
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_root().join("config.toml")
}

/// Loads the configuration from `path`, creating a default file on first
/// run. A malformed file is logged and replaced by defaults in memory
/// without overwriting the file on disk.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        let default_config = Config::default();
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Err(err) = save_config(path, &default_config) {
            warn!("Failed to write default config {}: {}", path.display(), err);
        }
        return default_config;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("Failed to read config {}: {}", path.display(), err);
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to parse config {}, using defaults: {}",
                path.display(),
                err
            );
            Config::default()
        }
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
pub fn save_config(path: &Path, config: &Config) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = toml::to_string(config)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
    std::fs::write(path, rendered)
}
