//! Configuration parsing and types.

pub mod env;
pub mod parser;
pub mod settings;
pub mod types;
pub mod validate;

use tracing::warn;

use crate::common::error::ConfigError;

pub use parser::{load_config, load_config_str};
pub use settings::{keys, Settings, SettingsMap};
pub use types::*;
pub use validate::validate_config;

/// Load the config file named by `RELAYGATE_CONFIG`, apply environment
/// overrides and validate it. Warnings are logged.
pub fn load_and_validate() -> Result<Config, ConfigError> {
    let path = env::get_config_path();
    let config = env::apply_env_overrides(load_config(&path)?);

    for warning in validate_config(&config)? {
        warn!(config = %path, "{}", warning);
    }

    Ok(config)
}
