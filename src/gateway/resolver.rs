//! Destination resolution.
//!
//! Decides which channels of a candidate destination connection receive a
//! copy of an inbound message, based on channel direction, same-channel
//! mirroring and gateway ownership.

use tracing::trace;

use crate::common::messages::{EventKind, Message, API_PROTOCOL};
use crate::gateway::channels::{ChannelDescriptor, ChannelMap};

/// Protocols whose join/leave events concern the whole connection rather
/// than one channel.
const CONNECTION_SCOPED_JOIN_LEAVE: &[&str] = &["discord"];

/// Channels of `destination_account` that should receive `message` in the
/// gateway `gateway`.
pub fn resolve_destinations<'a>(
    channels: &'a ChannelMap,
    gateway: &str,
    message: &Message,
    destination_account: &str,
) -> Vec<&'a ChannelDescriptor> {
    // API messages name their gateway themselves.
    if message.protocol == API_PROTOCOL && message.gateway != gateway {
        return Vec::new();
    }

    let owned_by_gateway = message.gateway.is_empty() || message.gateway == gateway;

    if message.event == EventKind::JoinLeave
        && message.channel.is_empty()
        && CONNECTION_SCOPED_JOIN_LEAVE.contains(&message.account_protocol())
    {
        if !owned_by_gateway {
            return Vec::new();
        }
        return channels
            .iter()
            .filter(|c| c.account == destination_account && c.direction.allows_out())
            .collect();
    }

    match channels.get(&message.channel_id()) {
        Some(origin) if origin.direction.allows_in() => {}
        Some(_) => {
            trace!(channel = %message.channel, account = %message.account, "Origin channel is out-only");
            return Vec::new();
        }
        None => return Vec::new(),
    }

    channels
        .iter()
        .filter(|channel| {
            if channel.is_same_channel(&message.gateway) {
                return channel.name == message.channel && message.account != destination_account;
            }
            channel.direction.allows_out()
                && channel.account == destination_account
                && owned_by_gateway
        })
        .collect()
}
