use crate::core::config::data::{path_display, ConnectorSettings};
use directories::ProjectDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Why a configuration file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {}: {source}", path_display(.path))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config at {}: {source}", path_display(.path))]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The file parsed but holds values the connector cannot use.
    #[error("Invalid config at {}: {message}", path_display(.path))]
    Invalid { path: PathBuf, message: String },
}

impl ConnectorSettings {
    /// Load and validate settings; a missing file yields the defaults.
    pub fn load_from_path(config_path: &Path) -> Result<ConnectorSettings, ConfigError> {
        let settings = if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
                path: config_path.to_path_buf(),
                source,
            })?;
            toml::from_str::<ConnectorSettings>(&contents).map_err(|source| {
                ConfigError::Parse {
                    path: config_path.to_path_buf(),
                    source,
                }
            })?
        } else {
            ConnectorSettings::default()
        };

        settings.validate().map_err(|message| ConfigError::Invalid {
            path: config_path.to_path_buf(),
            message,
        })
    }

    #[cfg(test)]
    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        write_atomically(config_path, &contents)?;
        Ok(())
    }

    /// Registry file to use with a configuration loaded from `config_path`.
    pub fn resolve_registry_path(&self, config_path: &Path) -> PathBuf {
        if let Some(path) = &self.registry_path {
            return path.clone();
        }
        config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(REGISTRY_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(REGISTRY_FILE_NAME))
    }
}

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const REGISTRY_FILE_NAME: &str = "servers.toml";

/// Platform configuration file location, or `./config.toml` when the
/// platform offers no home directory.
pub fn default_config_path() -> PathBuf {
    ProjectDirs::from("org", "mcp-connector", "mcp-connector")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Replace `path` with `contents` via a synced temporary file in the same directory.
pub fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());

    if let Some(dir) = parent {
        fs::create_dir_all(dir)?;
    }

    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new_in(".")?,
    };

    temp_file.write_all(contents.as_bytes())?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
