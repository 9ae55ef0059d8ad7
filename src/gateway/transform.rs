//! Message rewriting.
//!
//! [`prepare_message`] runs once per gateway before dispatch. The
//! `destination_*` functions compute the per-destination username and
//! avatar on a destination copy.

use fancy_regex::Regex;
use tracing::{debug, error};

use crate::common::messages::{Message, API_PROTOCOL};
use crate::config::keys;
use crate::connection::Connection;
use crate::gateway::formatter::{
    apply_replacements, render_avatar, render_nick, strip_nick, NickContext,
};
use crate::gateway::script::{MessageScript, ScriptInput};

/// Rewrite a message for a gateway: scripting hook, emoji shortcodes,
/// `ReplaceMessages`, `ExtractNicks`, then protocol and gateway stamps.
pub async fn prepare_message(
    message: &mut Message,
    origin: &Connection,
    gateway: &str,
    script: Option<&dyn MessageScript>,
) {
    if let Some(script) = script {
        apply_script(script, message).await;
    }

    message.text = expand_emoji(&message.text);

    let settings = origin.settings();
    message.text = apply_replacements(
        &message.text,
        &settings.get_string_2d(keys::REPLACE_MESSAGES),
        origin.account(),
    );
    extract_nicks(
        message,
        &settings.get_string_2d(keys::EXTRACT_NICKS),
        origin.account(),
    );

    message.protocol = origin.protocol().to_string();
    // API messages carry the gateway they are meant for.
    if message.protocol != API_PROTOCOL {
        message.gateway = gateway.to_string();
    }
}

/// Run the scripting hook on a message. Failures leave it unchanged.
pub async fn apply_script(script: &dyn MessageScript, message: &mut Message) {
    let input = ScriptInput {
        text: message.text.clone(),
        username: message.username.clone(),
        account: message.account.clone(),
        channel: message.channel.clone(),
    };

    match script.transform(input).await {
        Ok(output) => {
            if let Some(text) = output.text {
                message.text = text;
            }
            if let Some(username) = output.username {
                message.username = username;
            }
        }
        Err(e) => error!(account = %message.account, "Message script failed: {}", e),
    }
}

fn is_shortcode_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')
}

/// Replace `:shortcode:` emoji with their characters. Unknown shortcodes
/// are left untouched.
pub fn expand_emoji(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(':') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let len = after
            .find(|c: char| !is_shortcode_char(c))
            .unwrap_or(after.len());

        if len > 0 && after[len..].starts_with(':') {
            if let Some(emoji) = emojis::get_by_shortcode(&after[..len].to_lowercase()) {
                result.push_str(emoji.as_str());
                rest = &after[len + 1..];
                continue;
            }
        }

        // Keep the colon; the closing one may open the next shortcode.
        result.push(':');
        rest = after;
    }

    result.push_str(rest);
    result
}

/// Apply `ExtractNicks` pairs of `[username regex, text regex]`.
///
/// When the username matches, the first match of the text regex, which must
/// have exactly one capture group, becomes the username and is removed from
/// the text. A pattern that fails to compile stops the remaining pairs.
pub fn extract_nicks(message: &mut Message, pairs: &[Vec<String>], account: &str) {
    for pair in pairs {
        let (Some(nick_pattern), Some(text_pattern)) = (pair.first(), pair.get(1)) else {
            continue;
        };

        let nick_re = match Regex::new(nick_pattern) {
            Ok(re) => re,
            Err(e) => {
                error!(account, pattern = %nick_pattern, "Invalid ExtractNicks regex: {}", e);
                break;
            }
        };
        if !nick_re.is_match(&message.username).unwrap_or(false) {
            continue;
        }

        let text_re = match Regex::new(text_pattern) {
            Ok(re) => re,
            Err(e) => {
                error!(account, pattern = %text_pattern, "Invalid ExtractNicks regex: {}", e);
                break;
            }
        };
        let found = match text_re.captures(&message.text) {
            Ok(Some(caps)) if caps.len() == 2 => caps
                .get(0)
                .zip(caps.get(1))
                .map(|(whole, nick)| (whole.start(), whole.end(), nick.as_str().to_string())),
            _ => None,
        };
        let Some((start, end, username)) = found else {
            continue;
        };

        debug!(account, from = %message.username, to = %username, "Extracted nick");
        let mut text = String::with_capacity(message.text.len());
        text.push_str(&message.text[..start]);
        text.push_str(&message.text[end..]);

        message.username = username;
        message.text = text;
    }
}

/// Username as shown on `destination`.
///
/// Applies the destination's `StripNick`, the origin's `ReplaceNicks` and
/// renders the destination's `RemoteNickFormat`.
pub fn destination_username(
    message: &Message,
    origin: &Connection,
    destination: &Connection,
    gateway: &str,
) -> String {
    let mut nick = message.username.clone();
    if destination.settings().get_bool(keys::STRIP_NICK) {
        nick = strip_nick(&nick);
    }
    nick = apply_replacements(
        &nick,
        &origin.settings().get_string_2d(keys::REPLACE_NICKS),
        origin.account(),
    );

    let ctx = NickContext::new(nick)
        .with_bridge(origin.name())
        .with_protocol(origin.protocol())
        .with_gateway(gateway)
        .with_label(origin.settings().get_string(keys::LABEL))
        .with_channel(message.channel.as_str());

    render_nick(
        &destination.settings().get_string(keys::REMOTE_NICK_FORMAT),
        &ctx,
    )
}

/// Avatar URL as sent to `destination`: the message's own avatar, else the
/// destination's `IconURL` template.
pub fn destination_avatar(message: &Message, destination: &Connection) -> String {
    if !message.avatar.is_empty() {
        return message.avatar.clone();
    }
    render_avatar(
        &destination.settings().get_string(keys::ICON_URL),
        &message.username,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ScriptError;
    use crate::config::{Settings, SettingsMap};
    use crate::connection::mock::MockNetwork;
    use crate::gateway::script::ScriptOutput;
    use async_trait::async_trait;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> Settings {
        let map: SettingsMap = serde_json::from_value(value).unwrap();
        Settings::from_map(map)
    }

    fn message(username: &str, text: &str) -> Message {
        Message {
            account: "irc.libera".to_string(),
            channel: "#rust".to_string(),
            username: username.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    struct Shout;

    #[async_trait]
    impl MessageScript for Shout {
        async fn transform(&self, input: ScriptInput) -> Result<ScriptOutput, ScriptError> {
            Ok(ScriptOutput {
                text: Some(input.text.to_uppercase()),
                username: None,
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl MessageScript for Broken {
        async fn transform(&self, _input: ScriptInput) -> Result<ScriptOutput, ScriptError> {
            Err(ScriptError::Io(std::io::Error::other("boom")))
        }
    }

    #[test]
    fn test_expand_emoji() {
        let smile = emojis::get_by_shortcode("smile").unwrap().as_str();
        assert_eq!(expand_emoji("hi :smile:"), format!("hi {}", smile));
        assert_eq!(expand_emoji("12:30:smile:"), format!("12:30{}", smile));
        assert_eq!(expand_emoji(":notanemoji: ::"), ":notanemoji: ::");
        assert_eq!(expand_emoji("no colons"), "no colons");
        assert_eq!(expand_emoji("hi :Smile:"), format!("hi {}", smile));
    }

    #[test]
    fn test_extract_nicks() {
        let pairs = vec![vec!["^relay$".to_string(), r"<(\w+)> ".to_string()]];

        let mut msg = message("relay", "<carol> hello there");
        extract_nicks(&mut msg, &pairs, "irc.libera");
        assert_eq!(msg.username, "carol");
        assert_eq!(msg.text, "hello there");

        let mut untouched = message("alice", "<carol> hello");
        extract_nicks(&mut untouched, &pairs, "irc.libera");
        assert_eq!(untouched.username, "alice");
        assert_eq!(untouched.text, "<carol> hello");
    }

    #[test]
    fn test_extract_nicks_requires_single_group() {
        let pairs = vec![vec!["relay".to_string(), r"<(\w+)(>) ".to_string()]];
        let mut msg = message("relay", "<carol> hi");
        extract_nicks(&mut msg, &pairs, "irc.libera");
        assert_eq!(msg.username, "relay");
    }

    #[test]
    fn test_extract_nicks_stops_at_invalid_pattern() {
        let pairs = vec![
            vec!["relay".to_string(), r"<(\w+".to_string()],
            vec!["relay".to_string(), r"<(\w+)> ".to_string()],
        ];
        let mut msg = message("relay", "<carol> hi");
        extract_nicks(&mut msg, &pairs, "irc.libera");
        assert_eq!(msg.username, "relay");
        assert_eq!(msg.text, "<carol> hi");
    }

    #[tokio::test]
    async fn test_prepare_message_pipeline() {
        let network = MockNetwork::new();
        let origin = network.connection_with(
            "irc.libera",
            settings(json!({ "ReplaceMessages": [["HELLO", "hey"]] })),
        );

        let mut msg = message("alice", "hello :smile:");
        prepare_message(&mut msg, &origin, "main", Some(&Shout)).await;

        // The script runs before emoji expansion and replacements.
        let smile = emojis::get_by_shortcode("smile").unwrap().as_str();
        assert_eq!(msg.text, format!("hey {}", smile));
        assert_eq!(msg.protocol, "irc");
        assert_eq!(msg.gateway, "main");
    }

    #[tokio::test]
    async fn test_prepare_message_keeps_api_gateway() {
        let network = MockNetwork::new();
        let origin = network.connection("api.local");

        let mut msg = message("alice", "hi");
        msg.account = "api.local".to_string();
        msg.gateway = "chosen".to_string();
        prepare_message(&mut msg, &origin, "main", None).await;

        assert_eq!(msg.protocol, "api");
        assert_eq!(msg.gateway, "chosen");
    }

    #[tokio::test]
    async fn test_script_failure_leaves_message() {
        let mut msg = message("alice", "hi");
        apply_script(&Broken, &mut msg).await;
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.username, "alice");
    }

    #[test]
    fn test_destination_username() {
        let network = MockNetwork::new();
        let origin = network.connection_with(
            "irc.libera",
            settings(json!({ "Label": "L", "ReplaceNicks": [["bob", "robert"]] })),
        );
        let destination = network.connection_with(
            "slack.work",
            settings(json!({ "RemoteNickFormat": "[{PROTOCOL}:{LABEL}] {NICK} ({BRIDGE} {CHANNEL} {GATEWAY})", "StripNick": true })),
        );

        let msg = message("bob_!", "hi");
        assert_eq!(
            destination_username(&msg, &origin, &destination, "main"),
            "[irc:L] robert (libera #rust main)"
        );
    }

    #[test]
    fn test_destination_avatar() {
        let network = MockNetwork::new();
        let destination = network.connection_with(
            "slack.work",
            settings(json!({ "IconURL": "https://robohash.org/{NICK}.png" })),
        );

        let mut msg = message("bob", "hi");
        assert_eq!(
            destination_avatar(&msg, &destination),
            "https://robohash.org/bob.png"
        );

        msg.avatar = "https://example.org/bob.jpg".to_string();
        assert_eq!(destination_avatar(&msg, &destination), "https://example.org/bob.jpg");
    }
}
