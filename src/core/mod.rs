pub mod builtin_servers;
pub mod chat_stream;
pub mod config;
pub mod connector;
pub mod errors;
pub mod forwarder;
pub mod model_cache;
pub mod registry;
pub mod session;
pub mod sse;
pub mod store;
