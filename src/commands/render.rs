//! Markdown replies for `!mcp` commands. API keys only ever appear masked.

use std::fmt::Write as _;
use std::time::Duration;

use crate::api::models::model_detail_lines;
use crate::api::ModelInfo;
use crate::core::builtin_servers::popular_servers;
use crate::core::registry::ServerConfig;
use crate::utils::auth::describe_secret;

use super::registry::all_commands;

pub fn help() -> String {
    let mut text = String::from("# MCP Connector Commands\n\nUse these commands to manage your MCP servers:\n\n");
    for command in all_commands() {
        let _ = write!(text, "- `{}`: {}", command.usage, command.help);
        if !command.aliases.is_empty() {
            let _ = write!(text, " (alias: `{}`)", command.aliases.join("`, `"));
        }
        text.push('\n');
    }
    text.push_str(
        "\nArguments can also be named, e.g. `!mcp add name=\"My Server\" url=http://localhost:8080`.\n\n",
    );
    text.push_str(
        "Example usage:\n```\n!mcp list_popular\n!mcp add_popular brave_search your-api-key\n!mcp use server-id-from-list\n```",
    );
    text
}

pub fn unknown_command(name: &str) -> String {
    format!("Error: Unknown command '{name}'.\n\n{}", help())
}

fn server_fields(text: &mut String, server: &ServerConfig) {
    let _ = writeln!(text, "- ID: `{}`", server.id);
    let _ = writeln!(text, "- URL: {}", server.url);
    let _ = writeln!(
        text,
        "- Default Model: {}",
        server.default_model.as_deref().unwrap_or("Not set")
    );
    let _ = writeln!(text, "- API Key: {}", describe_secret(server.api_key.as_deref()));
}

pub fn server_list<'a>(
    servers: impl Iterator<Item = &'a ServerConfig>,
    active: Option<&str>,
) -> String {
    let mut text = String::from("## Configured MCP Servers\n\n");
    let mut any = false;
    for server in servers {
        any = true;
        let marker = if active == Some(server.id.as_str()) {
            " (active)"
        } else {
            ""
        };
        let _ = writeln!(text, "### {}{marker}", server.name);
        server_fields(&mut text, server);
        text.push('\n');
    }

    if !any {
        return "No MCP servers configured. Use `!mcp add` to add one, or `!mcp list_popular` to see predefined options.".to_string();
    }
    text
}

pub fn popular_list() -> String {
    let mut text = String::from(
        "## Popular MCP Servers\n\nThese are popular MCP servers that you can add to your configuration. Use `!mcp add_popular` with the server ID.\n\n",
    );
    for template in popular_servers() {
        let _ = writeln!(text, "### {}", template.name);
        let _ = writeln!(text, "- ID: `{}`", template.id);
        let _ = writeln!(text, "- URL: {}", template.url);
        let _ = writeln!(text, "- Description: {}", template.description);
        let _ = writeln!(
            text,
            "- API Key Required: {}",
            if template.needs_api_key { "Yes" } else { "No" }
        );
        if let Some(notes) = &template.setup_notes {
            let _ = writeln!(text, "- Setup: {notes}");
        }
        text.push('\n');
    }
    text.push_str("To add one of these servers, use the command:\n```\n!mcp add_popular <template_id> [api_key] [default_model]\n```\n");
    text.push_str("For example:\n```\n!mcp add_popular brave_search your-api-key\n```\n");
    text
}

pub fn server_added(server: &ServerConfig) -> String {
    let mut text = format!("MCP server '{}' added successfully!\n\n", server.name);
    server_fields(&mut text, server);
    let _ = write!(
        text,
        "\nUse this ID to configure this session with: `!mcp use {}`",
        server.id
    );
    text
}

pub fn server_updated(server: &ServerConfig, field: &str) -> String {
    let mut text = format!(
        "MCP server '{}' updated successfully ({field}).\n\n",
        server.name
    );
    server_fields(&mut text, server);
    text
}

pub fn server_deleted(server: &ServerConfig, was_active: bool) -> String {
    let mut text = format!("MCP server '{}' deleted successfully!", server.name);
    if was_active {
        text.push_str("\n\nIt was the active server; no server is active now.");
    }
    text
}

pub fn now_using(server: &ServerConfig) -> String {
    format!(
        "Now using MCP server '{}' for this session.\n\nYou can now chat with this server!",
        server.name
    )
}

pub fn active(server: Option<&ServerConfig>, dangling_id: Option<&str>) -> String {
    match (server, dangling_id) {
        (Some(server), _) => {
            let mut text = format!("## Active MCP Server: {}\n\n", server.name);
            server_fields(&mut text, server);
            text
        }
        (None, Some(id)) => format!(
            "The selected server `{id}` no longer exists. Use `!mcp list` and `!mcp use <server_id>` to pick another."
        ),
        (None, None) => {
            "No active MCP server. Use `!mcp use <server_id>` to select one.".to_string()
        }
    }
}

pub fn cleared(previous: Option<&str>) -> String {
    match previous {
        Some(_) => "Active MCP server cleared.".to_string(),
        None => "No MCP server was active.".to_string(),
    }
}

pub fn test_success(server: &ServerConfig, elapsed: Duration, models: &[ModelInfo]) -> String {
    let mut text = format!(
        "## Connection to '{}' successful!\n\nResponded in {} ms with {} model{}.\n",
        server.name,
        elapsed.as_millis(),
        models.len(),
        if models.len() == 1 { "" } else { "s" }
    );
    if !models.is_empty() {
        text.push_str("\n### Available Models:\n");
        for model in models {
            let _ = writeln!(text, "- {}", model.id);
        }
    }
    text
}

pub fn test_failure(server: &ServerConfig, reply: &str) -> String {
    format!("Connection test for '{}' failed.\n\n{reply}", server.name)
}

pub fn model_list(server: &ServerConfig, models: &[ModelInfo]) -> String {
    if models.is_empty() {
        return format!("No models reported by '{}'.", server.name);
    }
    let mut text = format!("## Models available on '{}':\n\n", server.name);
    for model in models {
        for line in model_detail_lines(model) {
            text.push_str(&line);
            text.push('\n');
        }
    }
    text
}

pub fn model_detail(server: &ServerConfig, model: &ModelInfo) -> String {
    let mut text = format!("## Model on '{}':\n\n", server.name);
    for line in model_detail_lines(model) {
        text.push_str(&line);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_server() -> ServerConfig {
        ServerConfig {
            id: "abc".to_string(),
            name: "Keyed".to_string(),
            url: "https://example.com".to_string(),
            api_key: Some("sk-very-secret".to_string()),
            default_model: None,
        }
    }

    #[test]
    fn replies_never_contain_raw_keys() {
        let server = keyed_server();
        let replies = [
            server_added(&server),
            server_updated(&server, "api_key"),
            server_list(std::iter::once(&server), Some("abc")),
            active(Some(&server), None),
        ];
        for reply in replies {
            assert!(!reply.contains("sk-very-secret"), "{reply}");
            assert!(reply.contains("Configured (********)"), "{reply}");
        }
    }

    #[test]
    fn list_marks_active_server() {
        let server = keyed_server();
        let text = server_list(std::iter::once(&server), Some("abc"));
        assert!(text.contains("### Keyed (active)"));
        assert!(text.contains("- Default Model: Not set"));
    }

    #[test]
    fn empty_list_points_at_add_commands() {
        let text = server_list(std::iter::empty(), None);
        assert!(text.starts_with("No MCP servers configured."));
    }

    #[test]
    fn help_lists_every_command() {
        let text = help();
        for command in all_commands() {
            assert!(text.contains(command.usage), "{}", command.name);
        }
        assert!(text.contains("alias: `remove`"));
    }

    #[test]
    fn popular_list_covers_catalog() {
        let text = popular_list();
        for template in popular_servers() {
            assert!(text.contains(&format!("`{}`", template.id)));
        }
    }
}
