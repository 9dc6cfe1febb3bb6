//! Diagnostic logging setup for the host binary.
//!
//! Library code only emits `tracing` events; the binary decides where they go.
//! Output goes to stderr so stdout stays reserved for the chat transcript.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "MCP_CONNECTOR_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Build the filter from `MCP_CONNECTOR_LOG`, then `RUST_LOG`, then the default.
pub fn env_filter(verbose: bool) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV_VAR) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(if verbose {
        "mcp_connector=debug"
    } else {
        DEFAULT_DIRECTIVE
    })
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
