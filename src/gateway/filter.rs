//! Ignore filtering of inbound messages.
//!
//! A message is dropped before any rewriting when its origin connection is
//! not part of the gateway, when it carries nothing to relay, or when the
//! origin's `IgnoreNicks` / `IgnoreMessages` patterns match.

use fancy_regex::Regex;
use tracing::{debug, warn};

use crate::common::messages::{EventKind, Message};
use crate::config::{keys, Settings};
use crate::connection::Connection;

/// Ignore patterns of one origin connection.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    nick_patterns: Vec<CompiledPattern>,
    message_patterns: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl CompiledPattern {
    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text).unwrap_or_else(|e| {
            warn!("Regex match error for pattern '{}': {}", self.original, e);
            false
        })
    }
}

impl IgnoreFilter {
    /// Compile the whitespace-separated ignore patterns of a connection.
    ///
    /// Invalid patterns are logged and never match.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            nick_patterns: compile_patterns(settings.get_string_list(keys::IGNORE_NICKS)),
            message_patterns: compile_patterns(settings.get_string_list(keys::IGNORE_MESSAGES)),
        }
    }

    pub fn ignores_nick(&self, nick: &str) -> bool {
        self.nick_patterns.iter().any(|p| p.is_match(nick))
    }

    pub fn ignores_text(&self, text: &str) -> bool {
        self.message_patterns.iter().any(|p| p.is_match(text))
    }
}

fn compile_patterns(patterns: Vec<String>) -> Vec<CompiledPattern> {
    patterns
        .into_iter()
        .filter(|pattern| !pattern.is_empty())
        .filter_map(|pattern| match Regex::new(&pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern,
                regex,
            }),
            Err(e) => {
                warn!("Invalid ignore regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

/// Whether a message has no text and nothing else worth relaying.
pub fn is_empty_message(message: &Message) -> bool {
    message.text.is_empty()
        && message.event != EventKind::UserTyping
        && !message.has_file_payload()
}

/// Whether a message must not be relayed by a gateway.
///
/// `origin` is the gateway's connection for the message's account, if it
/// has one.
pub fn should_ignore(message: &Message, origin: Option<&Connection>) -> bool {
    let Some(origin) = origin else {
        debug!(account = %message.account, "Ignoring message from connection outside gateway");
        return true;
    };

    if is_empty_message(message) {
        debug!(account = %message.account, "Ignoring empty message");
        return true;
    }

    let filter = IgnoreFilter::from_settings(origin.settings());
    if filter.ignores_nick(&message.username) {
        debug!(account = %message.account, username = %message.username, "Ignoring message from ignored nick");
        return true;
    }
    if filter.ignores_text(&message.text) {
        debug!(account = %message.account, "Ignoring message matching IgnoreMessages");
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::messages::extra_keys;
    use crate::connection::mock::MockNetwork;
    use crate::config::SettingsMap;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> Settings {
        let map: SettingsMap = serde_json::from_value(value).unwrap();
        Settings::from_map(map)
    }

    fn text(username: &str, text: &str) -> Message {
        Message {
            account: "irc.libera".to_string(),
            username: username.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_message_detection() {
        let mut msg = text("alice", "");
        assert!(is_empty_message(&msg));

        msg.event = EventKind::UserTyping;
        assert!(!is_empty_message(&msg));

        msg.event = EventKind::Text;
        msg.extra
            .insert(extra_keys::FILE.to_string(), vec![json!({"name": "cat.png"})]);
        assert!(!is_empty_message(&msg));
    }

    #[test]
    fn test_ignore_patterns() {
        let filter = IgnoreFilter::from_settings(&settings(json!({
            "IgnoreNicks": "^bot ^spam",
            "IgnoreMessages": "^!",
        })));

        assert!(filter.ignores_nick("bot42"));
        assert!(filter.ignores_nick("spammer"));
        assert!(!filter.ignores_nick("alice"));
        assert!(filter.ignores_text("!help"));
        assert!(!filter.ignores_text("hello !"));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let filter = IgnoreFilter::from_settings(&settings(json!({ "IgnoreNicks": "[bad alice" })));
        assert!(filter.ignores_nick("alice"));
        assert!(!filter.ignores_nick("[bad"));
    }

    #[test]
    fn test_should_ignore() {
        let network = MockNetwork::new();
        let origin = network.connection_with("irc.libera", settings(json!({ "IgnoreNicks": "troll" })));

        assert!(should_ignore(&text("alice", "hi"), None));
        assert!(should_ignore(&text("alice", ""), Some(&*origin)));
        assert!(should_ignore(&text("trollface", "hi"), Some(&*origin)));
        assert!(!should_ignore(&text("alice", "hi"), Some(&*origin)));
    }
}
