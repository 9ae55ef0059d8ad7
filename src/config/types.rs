//! Configuration type definitions.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use super::settings::{keys, Settings, SettingsMap};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Settings shared by every account unless overridden.
    #[serde(default)]
    pub general: SettingsMap,
    /// Per-account settings keyed by `protocol.name`.
    #[serde(default)]
    pub accounts: BTreeMap<String, SettingsMap>,
    #[serde(default)]
    pub gateways: Vec<GatewayConfig>,
    /// Shorthand for gateways mirroring identically named channels.
    #[serde(default)]
    pub same_channel_gateways: Vec<SameChannelGatewayConfig>,
}

/// One routing domain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Channels that only feed messages into the gateway.
    #[serde(default, rename = "in")]
    pub in_channels: Vec<ChannelEntry>,
    /// Channels that only receive messages.
    #[serde(default, rename = "out")]
    pub out_channels: Vec<ChannelEntry>,
    /// Bidirectional channels.
    #[serde(default, rename = "inout")]
    pub inout_channels: Vec<ChannelEntry>,
}

/// A channel of one account taking part in a gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelEntry {
    pub account: String,
    #[serde(default)]
    pub channel: String,
    /// Mirror this channel to identically named channels on other accounts.
    #[serde(default)]
    pub same_channel: bool,
    #[serde(default)]
    pub options: ChannelOptions,
}

/// Per-channel options handed through to protocol clients untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelOptions {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

/// Gateway mirroring `channels` across all `accounts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SameChannelGatewayConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl SameChannelGatewayConfig {
    /// Expand into a regular gateway with one same-channel `inout` entry per
    /// (account, channel) pair.
    pub fn to_gateway(&self) -> GatewayConfig {
        let inout_channels = self
            .accounts
            .iter()
            .flat_map(|account| {
                self.channels.iter().map(move |channel| ChannelEntry {
                    account: account.clone(),
                    channel: channel.clone(),
                    same_channel: true,
                    options: ChannelOptions::default(),
                })
            })
            .collect();

        GatewayConfig {
            name: self.name.clone(),
            enable: self.enable,
            in_channels: Vec::new(),
            out_channels: Vec::new(),
            inout_channels,
        }
    }
}

impl GatewayConfig {
    /// All channel entries, in bridge setup order (in, inout, out).
    pub fn entries(&self) -> impl Iterator<Item = &ChannelEntry> {
        self.in_channels
            .iter()
            .chain(self.inout_channels.iter())
            .chain(self.out_channels.iter())
    }
}

impl Config {
    /// Enabled gateways, including expanded same-channel gateways.
    pub fn enabled_gateways(&self) -> Vec<GatewayConfig> {
        self.gateways
            .iter()
            .cloned()
            .chain(self.same_channel_gateways.iter().map(|g| g.to_gateway()))
            .filter(|g| g.enable)
            .collect()
    }

    /// Settings for an account, layered over `general`.
    pub fn settings_for(&self, account: &str) -> Settings {
        let section = self.accounts.get(account).cloned().unwrap_or_default();
        Settings::new(section, Arc::new(self.general.clone()))
    }

    /// Settings of the `general` section alone.
    pub fn general_settings(&self) -> Settings {
        Settings::from_map(self.general.clone())
    }

    /// Path of the message scripting hook, if configured.
    pub fn script_path(&self) -> Option<String> {
        let path = self.general_settings().get_string(keys::MODIFY_MESSAGE_SCRIPT);
        (!path.is_empty()).then_some(path)
    }

    /// Interpreter used to run the scripting hook, if configured.
    pub fn script_interpreter(&self) -> Option<String> {
        let interpreter = self
            .general_settings()
            .get_string(keys::MODIFY_MESSAGE_INTERPRETER);
        (!interpreter.is_empty()).then_some(interpreter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_channel_gateway_expansion() {
        let config = Config {
            same_channel_gateways: vec![SameChannelGatewayConfig {
                name: "mirror".to_string(),
                enable: true,
                accounts: vec!["irc.a".to_string(), "irc.b".to_string()],
                channels: vec!["#one".to_string(), "#two".to_string()],
            }],
            ..Default::default()
        };

        let gateways = config.enabled_gateways();
        assert_eq!(gateways.len(), 1);
        assert_eq!(gateways[0].name, "mirror");
        assert_eq!(gateways[0].inout_channels.len(), 4);
        assert!(gateways[0].inout_channels.iter().all(|e| e.same_channel));
    }

    #[test]
    fn test_disabled_gateways_skipped() {
        let config = Config {
            gateways: vec![
                GatewayConfig {
                    name: "on".to_string(),
                    enable: true,
                    ..Default::default()
                },
                GatewayConfig {
                    name: "off".to_string(),
                    enable: false,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let names: Vec<String> = config.enabled_gateways().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["on"]);
    }

    #[test]
    fn test_entries_order() {
        let entry = |channel: &str| ChannelEntry {
            account: "irc.a".to_string(),
            channel: channel.to_string(),
            ..Default::default()
        };
        let gateway = GatewayConfig {
            name: "gw".to_string(),
            enable: true,
            in_channels: vec![entry("#in")],
            out_channels: vec![entry("#out")],
            inout_channels: vec![entry("#inout")],
        };

        let order: Vec<&str> = gateway.entries().map(|e| e.channel.as_str()).collect();
        assert_eq!(order, vec!["#in", "#inout", "#out"]);
    }
}
