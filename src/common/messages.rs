//! Canonical message type routed between connections.
//!
//! Every chat network's client normalizes what it receives into a
//! [`Message`] and pushes it onto the shared inbound stream. The gateway
//! core copies and rewrites it once per destination.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel parent ID for replies whose parent was never relayed.
///
/// Distinguishes "no parent" (empty) from "parent lost downstream".
pub const PARENT_NOT_FOUND: &str = "msg-parent-not-found";

/// Protocol name of the HTTP API connector.
pub const API_PROTOCOL: &str = "api";

/// Kind of event a message carries.
///
/// Serialized with the wire names shared with protocol clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Ordinary text message.
    #[default]
    #[serde(rename = "")]
    Text,
    #[serde(rename = "join_leave")]
    JoinLeave,
    #[serde(rename = "topic_change")]
    TopicChange,
    /// The sending connection dropped and should be reconnected.
    #[serde(rename = "failure")]
    Failure,
    #[serde(rename = "file_failure_size")]
    FileFailureSize,
    #[serde(rename = "avatar_download")]
    AvatarDownload,
    #[serde(rename = "rejoin_channels")]
    RejoinChannels,
    #[serde(rename = "user_action")]
    UserAction,
    #[serde(rename = "msg_delete")]
    MsgDelete,
    #[serde(rename = "file_delete")]
    FileDelete,
    #[serde(rename = "api_connected")]
    ApiConnected,
    #[serde(rename = "user_typing")]
    UserTyping,
    #[serde(rename = "get_channel_members")]
    GetChannelMembers,
    #[serde(rename = "notice_irc")]
    NoticeIrc,
}

/// Extra payload keys inspected by the core.
pub mod extra_keys {
    pub const ATTACHMENTS: &str = "attachments";
    pub const FILE: &str = "file";
    pub const FILE_FAILURE_SIZE: &str = "file_failure_size";
}

/// A chat message travelling through the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Protocol of the originating connection (e.g. "irc").
    #[serde(default)]
    pub protocol: String,
    /// Full account identifier of the originating connection (e.g. "irc.libera").
    #[serde(default)]
    pub account: String,
    /// Channel name the message was seen in (or is destined for).
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_id: String,
    /// Avatar URL, empty when unknown.
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub text: String,
    /// Protocol-native message ID. Empty for messages without an identity.
    #[serde(default)]
    pub id: String,
    /// Protocol-native ID of the message this one replies to.
    #[serde(default)]
    pub parent_id: String,
    /// Gateway the message belongs to. API messages set this themselves.
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub event: EventKind,
    /// Opaque side-channel payload (attachments, file data, ...).
    #[serde(default)]
    pub extra: HashMap<String, Vec<serde_json::Value>>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Channel descriptor ID of the message's origin (`channel + account`).
    pub fn channel_id(&self) -> String {
        format!("{}{}", self.channel, self.account)
    }

    /// Protocol derived from the account prefix (`irc.libera` -> `irc`).
    pub fn account_protocol(&self) -> &str {
        self.account
            .split_once('.')
            .map(|(protocol, _)| protocol)
            .unwrap_or(&self.account)
    }

    /// Identity cache key for this message: `protocol + " " + id`.
    pub fn origin_key(&self) -> String {
        origin_key(&self.protocol, &self.id)
    }

    /// Whether the extra payload carries anything worth relaying on its own.
    pub fn has_file_payload(&self) -> bool {
        self.extra.contains_key(extra_keys::ATTACHMENTS)
            || self.extra_len(extra_keys::FILE) > 0
            || self.extra_len(extra_keys::FILE_FAILURE_SIZE) > 0
    }

    /// Number of items stored under an extra key.
    pub fn extra_len(&self, key: &str) -> usize {
        self.extra.get(key).map(Vec::len).unwrap_or(0)
    }
}

/// Build an identity cache key from a protocol and a raw message ID.
pub fn origin_key(protocol: &str, id: &str) -> String {
    format!("{} {}", protocol, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_concatenates_channel_and_account() {
        let msg = Message {
            channel: "#rust".to_string(),
            account: "irc.libera".to_string(),
            ..Default::default()
        };
        assert_eq!(msg.channel_id(), "#rustirc.libera");
        assert_eq!(msg.account_protocol(), "irc");
    }

    #[test]
    fn test_event_kind_wire_names() {
        assert_eq!(serde_json::to_string(&EventKind::Text).unwrap(), "\"\"");
        assert_eq!(
            serde_json::to_string(&EventKind::UserTyping).unwrap(),
            "\"user_typing\""
        );
        let kind: EventKind = serde_json::from_str("\"avatar_download\"").unwrap();
        assert_eq!(kind, EventKind::AvatarDownload);
    }

    #[test]
    fn test_file_payload_detection() {
        let mut msg = Message::default();
        assert!(!msg.has_file_payload());

        msg.extra.insert(extra_keys::FILE.to_string(), Vec::new());
        assert!(!msg.has_file_payload());

        msg.extra.insert(extra_keys::ATTACHMENTS.to_string(), Vec::new());
        assert!(msg.has_file_payload());
    }
}
