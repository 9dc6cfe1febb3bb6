pub mod data;
pub mod io;

pub use data::ConnectorSettings;
pub use io::{default_config_path, ConfigError};
