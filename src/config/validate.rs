//! Configuration validation.
//!
//! Structural problems are errors. Regex settings that fail to compile are
//! only warnings since the pipeline skips them at runtime.

use std::collections::HashSet;

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::config::settings::{keys, Settings};
use crate::config::types::Config;

/// Validate a configuration.
///
/// Returns the list of warnings on success, or every error found joined
/// into one `ValidationError`.
pub fn validate_config(config: &Config) -> Result<Vec<String>, ConfigError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    let gateways = config.enabled_gateways();
    if gateways.is_empty() {
        errors.push("no enabled gateways - no message routing configured".to_string());
    }

    for (i, gateway) in gateways.iter().enumerate() {
        if gateway.name.is_empty() {
            errors.push(format!("gateways[{}].name is required", i));
        } else if !seen.insert(gateway.name.as_str()) {
            errors.push(format!("gateway name '{}' is used more than once", gateway.name));
        }

        for entry in gateway.entries() {
            if !entry.account.contains('.') {
                errors.push(format!(
                    "gateway '{}': account '{}' must have the form protocol.name",
                    gateway.name, entry.account
                ));
            } else if !config.accounts.contains_key(&entry.account) {
                errors.push(format!(
                    "gateway '{}': account '{}' is not configured",
                    gateway.name, entry.account
                ));
            }
            if entry.channel.is_empty() && !entry.account.starts_with("api.") {
                errors.push(format!(
                    "gateway '{}': channel for account '{}' is required",
                    gateway.name, entry.account
                ));
            }
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        });
    }

    let mut warnings = regex_warnings("general", &config.general_settings());
    for account in config.accounts.keys() {
        warnings.extend(regex_warnings(account, &config.settings_for(account)));
    }
    Ok(warnings)
}

fn regex_warnings(section: &str, settings: &Settings) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut check = |key: &str, pattern: &str| {
        if Regex::new(pattern).is_err() {
            warnings.push(format!("{}.{} is not a valid regex: '{}'", section, key, pattern));
        }
    };

    for key in [keys::REPLACE_MESSAGES, keys::REPLACE_NICKS, keys::EXTRACT_NICKS] {
        for pair in settings.get_string_2d(key) {
            if let Some(pattern) = pair.first() {
                check(key, pattern);
            }
            if key == keys::EXTRACT_NICKS {
                if let Some(pattern) = pair.get(1) {
                    check(key, pattern);
                }
            }
        }
    }
    for key in [keys::IGNORE_NICKS, keys::IGNORE_MESSAGES] {
        for pattern in settings.get_string_list(key) {
            check(key, &pattern);
        }
    }

    warnings
}
