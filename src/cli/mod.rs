//! Command-line host for the connector.
//!
//! Loads settings and the server registry, then feeds chat turns read from
//! the terminal through [`Connector`].

mod discover;
mod repl;

use std::error::Error;
use std::path::PathBuf;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::core::config::{default_config_path, ConnectorSettings};
use crate::core::connector::Connector;
use crate::core::registry::Registry;
use crate::core::store::TomlFileStore;
use crate::utils::logging::init_logging;

static LONG_VERSION: LazyLock<String> =
    LazyLock::new(|| match option_env!("VERGEN_GIT_DESCRIBE") {
        Some(describe) if describe != "unknown" => {
            format!("{} ({describe})", env!("CARGO_PKG_VERSION"))
        }
        _ => env!("CARGO_PKG_VERSION").to_string(),
    });

#[derive(Parser, Debug)]
#[command(name = "mcp-connector")]
#[command(version, long_version = LONG_VERSION.as_str())]
#[command(about = "Chat with OpenAI-compatible model servers through one connector")]
#[command(
    long_about = "mcp-connector keeps a registry of OpenAI-compatible model servers and \
forwards chat turns to the one selected for the session.\n\n\
Lines starting with `!mcp` manage the registry; type `!mcp help` for the list.\n\n\
Environment Variables:\n\
  MCP_CONNECTOR_LOG  Log filter directives (falls back to RUST_LOG)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log connector activity to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Read chat turns from stdin until end of input (default)
    Repl,
    /// Handle a single chat turn and print the reply
    Exec {
        /// Message text; `!mcp ...` runs a command
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// List the models offered by every configured server
    Discover {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let connector = build_connector(args.config)?;

    match args.command.unwrap_or(Commands::Repl) {
        Commands::Repl => repl::run(&connector).await,
        Commands::Exec { text } => repl::exec(&connector, &text.join(" ")).await,
        Commands::Discover { json } => discover::run(&connector, json).await,
    }
}

fn build_connector(config: Option<PathBuf>) -> Result<Connector, Box<dyn Error>> {
    let config_path = config.unwrap_or_else(default_config_path);
    let settings = ConnectorSettings::load_from_path(&config_path)?;
    let registry_path = settings.resolve_registry_path(&config_path);
    debug!(config = %config_path.display(), registry = %registry_path.display(), "loading connector");

    let registry = Registry::open(Box::new(TomlFileStore::new(registry_path)))?;
    Ok(Connector::with_http(settings, registry))
}
