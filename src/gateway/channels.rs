//! Channel map: the deduplicated table of channels taking part in a gateway.

use std::collections::HashMap;

use crate::common::error::{GatewayError, GatewayResult};
use crate::common::messages::API_PROTOCOL;
use crate::config::{ChannelEntry, ChannelOptions};

/// Direction of message flow for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Messages from this channel feed the gateway.
    In,
    /// Messages from the gateway are delivered to this channel.
    Out,
    /// Both.
    InOut,
}

impl Direction {
    /// Merge two directions configured for the same channel.
    ///
    /// Differing directions widen to `InOut`; a channel is never downgraded.
    pub fn merge(self, other: Direction) -> Direction {
        if self == other {
            self
        } else {
            Direction::InOut
        }
    }

    /// Whether messages from this channel enter the gateway.
    pub fn allows_in(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Whether this channel receives messages from the gateway.
    pub fn allows_out(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// A channel of one account as seen by the gateways.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDescriptor {
    /// `name + account`, unique per gateway.
    pub id: String,
    pub name: String,
    pub account: String,
    pub direction: Direction,
    /// Same-channel flag per gateway name.
    pub same_channel: HashMap<String, bool>,
    /// Handed to the protocol client when joining.
    pub options: ChannelOptions,
}

impl ChannelDescriptor {
    pub fn new(name: &str, account: &str, direction: Direction) -> Self {
        Self {
            id: channel_id(name, account),
            name: name.to_string(),
            account: account.to_string(),
            direction,
            same_channel: HashMap::new(),
            options: ChannelOptions::default(),
        }
    }

    /// Whether this channel mirrors identically named channels in `gateway`.
    pub fn is_same_channel(&self, gateway: &str) -> bool {
        self.same_channel.get(gateway).copied().unwrap_or(false)
    }
}

/// Descriptor ID for a channel of an account.
pub fn channel_id(channel: &str, account: &str) -> String {
    format!("{}{}", channel, account)
}

/// Channels of one gateway keyed by descriptor ID.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    channels: HashMap<String, ChannelDescriptor>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge configured entries of one direction into the map.
    ///
    /// Channel names are normalized per protocol. Misconfigured channels
    /// abort with an error.
    pub fn merge_entries(
        &mut self,
        gateway: &str,
        entries: &[ChannelEntry],
        direction: Direction,
    ) -> GatewayResult<()> {
        for entry in entries {
            let name = normalize_channel(entry)?;
            let id = channel_id(&name, &entry.account);

            let descriptor = self
                .channels
                .entry(id)
                .and_modify(|existing| existing.direction = existing.direction.merge(direction))
                .or_insert_with(|| {
                    let mut descriptor = ChannelDescriptor::new(&name, &entry.account, direction);
                    descriptor.options = entry.options.clone();
                    descriptor
                });
            descriptor
                .same_channel
                .insert(gateway.to_string(), entry.same_channel);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ChannelDescriptor> {
        self.channels.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.channels.values()
    }

    /// Channels belonging to one account.
    pub fn for_account<'a>(
        &'a self,
        account: &'a str,
    ) -> impl Iterator<Item = &'a ChannelDescriptor> + 'a {
        self.channels.values().filter(move |c| c.account == account)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

fn normalize_channel(entry: &ChannelEntry) -> GatewayResult<String> {
    let account = entry.account.as_str();

    if account.starts_with("api.") {
        return Ok(API_PROTOCOL.to_string());
    }
    if account.starts_with("irc.") {
        return Ok(entry.channel.to_lowercase());
    }
    if account.starts_with("mattermost.") && entry.channel.starts_with('#') {
        return Err(GatewayError::MattermostHashChannel {
            account: account.to_string(),
            channel: entry.channel.clone(),
        });
    }
    if account.starts_with("zulip.") && !entry.channel.contains("/topic:") {
        return Err(GatewayError::ZulipMissingTopic {
            account: account.to_string(),
            channel: entry.channel.clone(),
        });
    }
    Ok(entry.channel.clone())
}
