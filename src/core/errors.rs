//! Error taxonomy shared by the registry, the command layer and the forwarder.
//!
//! Nothing here is fatal to the host: every variant is turned into a chat
//! reply by [`ConnectorError::to_reply`] at the connector boundary.

use crate::core::chat_stream::format_api_error;
use std::time::Duration;
use thiserror::Error;

/// Longest upstream body excerpt kept on an [`ConnectorError::Upstream`].
pub const UPSTREAM_SNIPPET_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    /// Bad input to a mutating operation.
    #[error("{0}")]
    Validation(String),

    /// Unknown server id or popular-server template id.
    #[error("No {kind} found with ID '{id}'")]
    NotFound { kind: &'static str, id: String },

    /// Nothing to send to: no resolvable model or server.
    #[error("{0}")]
    Config(String),

    /// DNS, TLS or refused connection.
    #[error("could not connect to {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    /// Non-2xx reply, or a 2xx reply whose body could not be understood.
    #[error("upstream returned HTTP {status}: {snippet}")]
    Upstream { status: u16, snippet: String },

    #[error("could not persist the server registry: {0}")]
    Storage(String),
}

impl ConnectorError {
    pub fn server_not_found(id: impl Into<String>) -> Self {
        ConnectorError::NotFound {
            kind: "server",
            id: id.into(),
        }
    }

    pub fn template_not_found(id: impl Into<String>) -> Self {
        ConnectorError::NotFound {
            kind: "predefined server",
            id: id.into(),
        }
    }

    pub fn timeout(url: impl Into<String>, timeout: Duration) -> Self {
        ConnectorError::Timeout {
            url: url.into(),
            seconds: timeout.as_secs().max(1),
        }
    }

    pub fn upstream(status: u16, body: &str) -> Self {
        ConnectorError::Upstream {
            status,
            snippet: truncate_snippet(body, UPSTREAM_SNIPPET_LIMIT),
        }
    }

    /// Render the error as the chat reply shown to the user.
    pub fn to_reply(&self) -> String {
        match self {
            ConnectorError::Validation(message) | ConnectorError::Config(message) => {
                format!("Error: {message}")
            }
            ConnectorError::NotFound { kind, id } if *kind == "server" => format!(
                "Error: No server found with ID '{id}'. Use `!mcp list` to see configured servers."
            ),
            ConnectorError::NotFound { id, .. } => format!(
                "Error: No predefined server found with ID '{id}'. Use `!mcp list_popular` to see available options."
            ),
            ConnectorError::Connection { url, reason } => format!(
                "Error: Could not connect to the MCP server at {url}: {reason}\n\nCheck the server URL and your network connection."
            ),
            ConnectorError::Timeout { seconds, .. } => format!(
                "Error: The MCP server did not respond within {seconds} seconds.\n\nRaise `timeout_seconds` if this server needs more time."
            ),
            ConnectorError::Upstream { status, snippet } => format!(
                "Error: The MCP server returned HTTP {status}.\n\n{}",
                format_api_error(snippet)
            ),
            ConnectorError::Storage(message) => {
                format!("Error: Could not save the server registry: {message}")
            }
        }
    }
}

/// Cut `text` to at most `limit` characters, marking the cut.
pub fn truncate_snippet(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Innermost message of an error chain; for transport errors this names the
/// actual cause (DNS failure, refused connection, certificate problem).
pub fn root_cause_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
