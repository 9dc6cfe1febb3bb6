//! Durable storage for the server registry.
//!
//! The registry itself is storage-agnostic; hosts that persist state their
//! own way implement [`RegistryStore`], everyone else uses the TOML file.

use crate::core::config::data::path_display;
use crate::core::config::io::write_atomically;
use crate::core::errors::ConnectorError;
use crate::core::registry::ServerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

pub trait RegistryStore: Send {
    /// Entries in insertion order.
    fn load(&self) -> Result<Vec<ServerConfig>, ConnectorError>;

    /// Replace the stored entries with `servers`.
    fn save(&self, servers: &[ServerConfig]) -> Result<(), ConnectorError>;
}

/// Keeps entries only for the lifetime of the process. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    servers: Arc<Mutex<Vec<ServerConfig>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryStore {
    fn load(&self) -> Result<Vec<ServerConfig>, ConnectorError> {
        let guard = self
            .servers
            .lock()
            .map_err(|_| ConnectorError::Storage("in-memory store is poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, servers: &[ServerConfig]) -> Result<(), ConnectorError> {
        let mut guard = self
            .servers
            .lock()
            .map_err(|_| ConnectorError::Storage("in-memory store is poisoned".to_string()))?;
        *guard = servers.to_vec();
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Default)]
struct RegistryFile {
    #[serde(default)]
    servers: Vec<ServerConfig>,
}

/// `[[servers]]` tables in a TOML file, rewritten atomically on every save.
pub struct TomlFileStore {
    path: PathBuf,
}

impl TomlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegistryStore for TomlFileStore {
    fn load(&self) -> Result<Vec<ServerConfig>, ConnectorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|err| {
            ConnectorError::Storage(format!(
                "failed to read {}: {err}",
                path_display(&self.path)
            ))
        })?;
        let file: RegistryFile = toml::from_str(&contents).map_err(|err| {
            ConnectorError::Storage(format!(
                "failed to parse {}: {err}",
                path_display(&self.path)
            ))
        })?;

        let mut seen = HashSet::new();
        let servers = file
            .servers
            .into_iter()
            .filter(|server| {
                let fresh = seen.insert(server.id.clone());
                if !fresh {
                    warn!(id = %server.id, "ignoring duplicate server entry in registry file");
                }
                fresh
            })
            .collect();
        Ok(servers)
    }

    fn save(&self, servers: &[ServerConfig]) -> Result<(), ConnectorError> {
        let file = RegistryFile {
            servers: servers.to_vec(),
        };
        let contents = toml::to_string_pretty(&file)
            .map_err(|err| ConnectorError::Storage(err.to_string()))?;
        write_atomically(&self.path, &contents).map_err(|err| {
            ConnectorError::Storage(format!(
                "failed to write {}: {err}",
                path_display(&self.path)
            ))
        })
    }
}
