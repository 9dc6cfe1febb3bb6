//! Server registry: named upstream configurations keyed by a stable id.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::builtin_servers::find_popular_server;
use crate::core::errors::ConnectorError;
use crate::core::store::{MemoryStore, RegistryStore};
use crate::utils::url::validate_base_url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Input for [`Registry::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewServer {
    pub name: String,
    pub url: String,
    pub api_key: Option<String>,
    pub default_model: Option<String>,
}

impl NewServer {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Mutable fields of a [`ServerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerField {
    Name,
    Url,
    ApiKey,
    DefaultModel,
}

impl ServerField {
    pub const ALL: [ServerField; 4] = [
        ServerField::Name,
        ServerField::Url,
        ServerField::ApiKey,
        ServerField::DefaultModel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServerField::Name => "name",
            ServerField::Url => "url",
            ServerField::ApiKey => "api_key",
            ServerField::DefaultModel => "default_model",
        }
    }
}

impl fmt::Display for ServerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerField {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "id" {
            return Err(ConnectorError::Validation(
                "The server ID cannot be changed.".to_string(),
            ));
        }
        ServerField::ALL
            .into_iter()
            .find(|field| field.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = ServerField::ALL.iter().map(|f| f.as_str()).collect();
                ConnectorError::Validation(format!(
                    "Invalid field '{}'. Valid fields: {}",
                    s.trim(),
                    valid.join(", ")
                ))
            })
    }
}

/// Ordered collection of [`ServerConfig`] entries backed by a [`RegistryStore`].
///
/// Every mutation is written to the store before it becomes visible; a failed
/// write leaves the registry unchanged.
pub struct Registry {
    servers: IndexMap<String, ServerConfig>,
    store: Box<dyn RegistryStore>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("servers", &self.servers.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn open(store: Box<dyn RegistryStore>) -> Result<Self, ConnectorError> {
        let servers = store
            .load()?
            .into_iter()
            .map(|server| (server.id.clone(), server))
            .collect::<IndexMap<_, _>>();
        debug!(count = servers.len(), "loaded server registry");
        Ok(Self { servers, store })
    }

    pub fn in_memory() -> Self {
        Self {
            servers: IndexMap::new(),
            store: Box::new(MemoryStore::new()),
        }
    }

    pub fn create(&mut self, new_server: NewServer) -> Result<ServerConfig, ConnectorError> {
        let name = new_server.name.trim();
        if name.is_empty() {
            return Err(ConnectorError::Validation(
                "Server name cannot be empty.".to_string(),
            ));
        }
        let url = new_server.url.trim();
        validate_base_url(url).map_err(ConnectorError::Validation)?;

        let id = self.fresh_id();
        let server = ServerConfig {
            id: id.clone(),
            name: name.to_string(),
            url: url.to_string(),
            api_key: non_empty(new_server.api_key),
            default_model: non_empty(new_server.default_model),
        };

        let mut next = self.servers.clone();
        next.insert(id, server.clone());
        self.commit(next)?;
        info!(id = %server.id, name = %server.name, "added server");
        Ok(server)
    }

    /// Register a copy of a popular-server template.
    pub fn create_from_popular(
        &mut self,
        template_id: &str,
        api_key: Option<String>,
        default_model: Option<String>,
    ) -> Result<ServerConfig, ConnectorError> {
        let template = find_popular_server(template_id)
            .ok_or_else(|| ConnectorError::template_not_found(template_id))?;
        let api_key = non_empty(api_key);
        if template.needs_api_key && api_key.is_none() {
            return Err(ConnectorError::Validation(format!(
                "{} requires an API key. Usage: `!mcp add_popular {} <api_key> [default_model]`",
                template.name, template.id
            )));
        }

        self.create(NewServer {
            name: template.name.clone(),
            url: template.url.clone(),
            api_key,
            default_model,
        })
    }

    pub fn get(&self, id: &str) -> Option<&ServerConfig> {
        self.servers.get(id)
    }

    pub fn lookup(&self, id: &str) -> Result<&ServerConfig, ConnectorError> {
        self.get(id)
            .ok_or_else(|| ConnectorError::server_not_found(id))
    }

    /// All entries in insertion order.
    pub fn list(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Set one field. An empty value clears `api_key` or `default_model`.
    pub fn update(
        &mut self,
        id: &str,
        field: ServerField,
        value: &str,
    ) -> Result<ServerConfig, ConnectorError> {
        let mut server = self.lookup(id)?.clone();
        let value = value.trim();

        match field {
            ServerField::Name => {
                if value.is_empty() {
                    return Err(ConnectorError::Validation(
                        "Server name cannot be empty.".to_string(),
                    ));
                }
                server.name = value.to_string();
            }
            ServerField::Url => {
                validate_base_url(value).map_err(ConnectorError::Validation)?;
                server.url = value.to_string();
            }
            ServerField::ApiKey => server.api_key = non_empty(Some(value.to_string())),
            ServerField::DefaultModel => {
                server.default_model = non_empty(Some(value.to_string()))
            }
        }

        let mut next = self.servers.clone();
        next.insert(server.id.clone(), server.clone());
        self.commit(next)?;
        info!(id = %server.id, field = %field, "updated server");
        Ok(server)
    }

    /// Remove an entry; `Ok(false)` if the id was unknown.
    pub fn delete(&mut self, id: &str) -> Result<bool, ConnectorError> {
        if !self.servers.contains_key(id) {
            return Ok(false);
        }
        let mut next = self.servers.clone();
        next.shift_remove(id);
        self.commit(next)?;
        info!(id, "deleted server");
        Ok(true)
    }

    /// Random UUID v4 not already in use.
    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.servers.contains_key(&id) {
                return id;
            }
        }
    }

    fn commit(&mut self, next: IndexMap<String, ServerConfig>) -> Result<(), ConnectorError> {
        let snapshot: Vec<ServerConfig> = next.values().cloned().collect();
        self.store.save(&snapshot)?;
        self.servers = next;
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
