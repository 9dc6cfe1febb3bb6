//! Built-in catalog of popular servers
//!
//! The catalog is embedded from `builtin_servers.toml` at build time and is
//! read-only; entries only ever serve as templates for new registry entries.

use serde::Deserialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PopularServerTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub needs_api_key: bool,
    /// What has to be running locally before the template works.
    #[serde(default)]
    pub setup_notes: Option<String>,
}

#[derive(Deserialize)]
struct BuiltinServersConfig {
    servers: Vec<PopularServerTemplate>,
}

static POPULAR_SERVERS: LazyLock<Vec<PopularServerTemplate>> = LazyLock::new(|| {
    const CONFIG_CONTENT: &str = include_str!("../builtin_servers.toml");

    let config: BuiltinServersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_servers.toml");
    config.servers
});

/// The popular-server catalog, in display order.
pub fn popular_servers() -> &'static [PopularServerTemplate] {
    &POPULAR_SERVERS
}

/// Find a template by ID (case-insensitive)
pub fn find_popular_server(id: &str) -> Option<&'static PopularServerTemplate> {
    popular_servers()
        .iter()
        .find(|template| template.id.eq_ignore_ascii_case(id))
}
