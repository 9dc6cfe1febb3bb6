use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_TEST_TIMEOUT_SECONDS: u64 = 10;

/// Per-instance connector settings, read from `config.toml`.
///
/// Every field is optional in the file; missing fields take the defaults
/// documented on each field.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectorSettings {
    /// Upper bound for a chat forward, in seconds (default 30).
    pub timeout_seconds: u64,
    /// Stream replies unless the request says otherwise (default false).
    pub stream: bool,
    /// Model used when the request names none; takes precedence over the
    /// server's own default model.
    pub default_model: Option<String>,
    /// Server selected when a session starts.
    pub server_id: Option<String>,
    /// Upper bound for `test` and `models` lookups, in seconds (default 10).
    pub test_timeout_seconds: u64,
    /// How long a model listing is reused per server; 0 disables caching (default).
    pub models_cache_seconds: u64,
    /// Location of the server registry file; defaults to `servers.toml` next
    /// to the configuration file.
    pub registry_path: Option<PathBuf>,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            stream: false,
            default_model: None,
            server_id: None,
            test_timeout_seconds: DEFAULT_TEST_TIMEOUT_SECONDS,
            models_cache_seconds: 0,
            registry_path: None,
        }
    }
}

impl ConnectorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_seconds)
    }

    pub fn models_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.models_cache_seconds)
    }

    /// Check value ranges and fold blank strings into `None`.
    pub fn validate(mut self) -> Result<Self, String> {
        if self.timeout_seconds == 0 {
            return Err("timeout_seconds must be at least 1".to_string());
        }
        if self.test_timeout_seconds == 0 {
            return Err("test_timeout_seconds must be at least 1".to_string());
        }
        self.default_model = non_blank(self.default_model);
        self.server_id = non_blank(self.server_id);
        Ok(self)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
