//! Environment variable overrides for configuration.
//!
//! - `RELAYGATE_CONFIG` - path of the HOCON config file
//! - `RELAYGATE_MODIFY_MESSAGE_SCRIPT` - message scripting hook path

use std::env;

use serde_json::Value;

use crate::config::settings::keys;
use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "RELAYGATE";

const DEFAULT_CONFIG_PATH: &str = "relaygate.conf";

/// Apply environment variable overrides to a config.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(script) = env::var(format!("{}_MODIFY_MESSAGE_SCRIPT", ENV_PREFIX)) {
        config.general.insert(
            keys::MODIFY_MESSAGE_SCRIPT.to_string(),
            Value::String(script),
        );
    }

    config
}

/// Get the config file path from environment or use default.
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
