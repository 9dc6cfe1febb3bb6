//! A chat connector for OpenAI-compatible model servers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the server registry, session selection, request
//!   forwarding and streamed replies, tied together by
//!   [`core::connector::Connector`].
//! - [`commands`] implements the `!mcp` chat commands that manage the
//!   registry from inside a conversation.
//! - [`api`] defines the chat-completion and model payloads exchanged with
//!   upstream servers.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which
//! loads settings and the registry and reads chat turns from the terminal.

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod utils;
