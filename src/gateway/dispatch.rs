//! Delivery of rewritten messages to destination channels.

use anyhow::Result;
use tracing::{debug, error, trace};

use super::cache::DestinationId;
use super::channels::ChannelDescriptor;
use super::resolver::resolve_destinations;
use super::transform::{destination_avatar, destination_username};
use super::Gateway;
use crate::common::messages::{
    extra_keys, origin_key, EventKind, Message, API_PROTOCOL, PARENT_NOT_FOUND,
};
use crate::config::keys;
use crate::connection::Connection;

/// Account whose messages are also published on the relay stream for an
/// external server plugin.
pub const PLUGIN_RELAY_ACCOUNT: &str = "mattermost.plugin";

impl Gateway {
    /// Send a copy of `message` to one channel of `destination`.
    ///
    /// Returns the destination network's ID for the copy, empty when there
    /// is none or the channel was skipped. Send errors are returned as is.
    pub async fn send_message(
        &self,
        message: &Message,
        destination: &Connection,
        channel: &ChannelDescriptor,
        canonical_parent_id: &str,
    ) -> Result<String> {
        let origin_channel = message.channel_id();
        // Avatar downloads only go back to the channel they came from,
        // everything else never does.
        if message.event == EventKind::AvatarDownload {
            if channel.id != origin_channel {
                return Ok(String::new());
            }
        } else if channel.id == origin_channel {
            return Ok(String::new());
        }

        let Some(origin) = self.connection(&message.account) else {
            debug!(gateway = %self.name(), account = %message.account, "No origin connection, not sending");
            return Ok(String::new());
        };

        if message.event != EventKind::UserTyping {
            debug!(
                gateway = %self.name(),
                from = %message.account,
                from_channel = %message.channel,
                to = %destination.account(),
                to_channel = %channel.name,
                "Sending message"
            );
        }

        let mut copy = message.clone();
        copy.channel = if destination.protocol() == API_PROTOCOL {
            message.channel.clone()
        } else {
            channel.name.clone()
        };
        copy.avatar = destination_avatar(message, destination);
        copy.username = destination_username(message, origin, destination, self.name());

        let cache = self.cache();
        copy.id = cache
            .find_destination_id(
                &message.origin_key(),
                destination.protocol(),
                destination.name(),
                &channel.id,
            )
            .unwrap_or_default();

        copy.parent_id = if canonical_parent_id.is_empty() {
            String::new()
        } else {
            cache
                .find_destination_id(
                    &origin_key(&message.protocol, canonical_parent_id),
                    destination.protocol(),
                    destination.name(),
                    &channel.id,
                )
                .unwrap_or_else(|| canonical_parent_id.to_string())
        };
        if copy.parent_id.is_empty() && !message.parent_id.is_empty() {
            copy.parent_id = PARENT_NOT_FOUND.to_string();
        }

        if destination.account() == PLUGIN_RELAY_ACCOUNT {
            if let Some(relay_tx) = &self.relay_tx {
                if let Err(e) = relay_tx.send(copy.clone()) {
                    debug!("Relay stream closed: {}", e);
                }
            }
        }

        let id = destination.send(copy).await?;
        if !id.is_empty() {
            trace!(account = %destination.account(), id = %id, "Message delivered");
        }
        Ok(id)
    }

    /// Deliver `message` to every matching channel of one destination
    /// connection, applying the destination's event gating.
    ///
    /// Failed sends are logged; the remaining channels are still attempted.
    pub async fn handle_message(
        &self,
        message: &Message,
        destination: &Connection,
    ) -> Vec<DestinationId> {
        if !self.accepts(message, destination) {
            return Vec::new();
        }

        let settings = destination.settings();
        let canonical_parent_id =
            if !message.parent_id.is_empty() && settings.get_bool(keys::PRESERVE_THREADING) {
                self.find_canonical_origin_id(
                    &message.protocol,
                    &origin_key(&message.protocol, &message.parent_id),
                )
                .unwrap_or_default()
            } else {
                String::new()
            };

        let mut ids = Vec::new();
        for channel in resolve_destinations(self.channels(), self.name(), message, destination.account())
        {
            match self
                .send_message(message, destination, channel, &canonical_parent_id)
                .await
            {
                Ok(id) if !id.is_empty() => ids.push(DestinationId {
                    account: destination.account().to_string(),
                    protocol: destination.protocol().to_string(),
                    name: destination.name().to_string(),
                    id: origin_key(destination.protocol(), &id),
                    channel_id: channel.id.clone(),
                }),
                Ok(_) => {}
                Err(e) => error!(
                    gateway = %self.name(),
                    account = %destination.account(),
                    channel = %channel.name,
                    "Send failed: {:#}",
                    e
                ),
            }
        }
        ids
    }

    /// Whether `destination` takes this kind of message at all.
    fn accepts(&self, message: &Message, destination: &Connection) -> bool {
        let settings = destination.settings();
        let accepted = match message.event {
            EventKind::UserTyping => destination.supports_user_typing(),
            EventKind::AvatarDownload => destination.handles_avatar_downloads(),
            EventKind::JoinLeave => settings.get_bool(keys::SHOW_JOIN_PART),
            EventKind::TopicChange => {
                settings.get_bool(keys::SHOW_TOPIC_CHANGE) || settings.get_bool(keys::SYNC_TOPIC)
            }
            _ => true,
        };
        if !accepted {
            trace!(account = %destination.account(), event = ?message.event, "Event not wanted by destination");
            return false;
        }

        if message.extra_len(extra_keys::FILE_FAILURE_SIZE) > 0 && message.text.is_empty() {
            return false;
        }
        if message.channel.is_empty() && message.event != EventKind::JoinLeave {
            return false;
        }
        true
    }
}
