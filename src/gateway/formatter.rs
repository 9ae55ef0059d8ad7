//! Nickname and avatar templating.
//!
//! Supported placeholders in `RemoteNickFormat`, substituted in this order:
//! `{NOPINGNICK}`, `{BRIDGE}`, `{PROTOCOL}`, `{GATEWAY}`, `{LABEL}`, `{NICK}`,
//! `{CHANNEL}`. `IconURL` supports `{NICK}`.

use fancy_regex::Regex;
use tracing::error;

/// Zero-width space inserted by `{NOPINGNICK}`.
const ZERO_WIDTH_SPACE: char = '\u{200B}';

type Resolver = fn(&NickContext) -> String;

/// Placeholders of `RemoteNickFormat` with their values, in substitution order.
const NICK_PLACEHOLDERS: [(&str, Resolver); 7] = [
    ("{NOPINGNICK}", |ctx| no_ping_nick(&ctx.nick)),
    ("{BRIDGE}", |ctx| ctx.bridge.clone()),
    ("{PROTOCOL}", |ctx| ctx.protocol.clone()),
    ("{GATEWAY}", |ctx| ctx.gateway.clone()),
    ("{LABEL}", |ctx| ctx.label.clone()),
    ("{NICK}", |ctx| ctx.nick.clone()),
    ("{CHANNEL}", |ctx| ctx.channel.clone()),
];

/// Values available to a nick template.
#[derive(Debug, Clone, Default)]
pub struct NickContext {
    /// Sender's (already rewritten) username.
    pub nick: String,
    /// Origin connection name, e.g. `libera` for `irc.libera`.
    pub bridge: String,
    /// Origin connection protocol.
    pub protocol: String,
    pub gateway: String,
    /// Origin connection's `Label` setting.
    pub label: String,
    /// Origin channel.
    pub channel: String,
}

impl NickContext {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            ..Default::default()
        }
    }

    pub fn with_bridge(mut self, bridge: impl Into<String>) -> Self {
        self.bridge = bridge.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}

/// Render a `RemoteNickFormat` template.
pub fn render_nick(template: &str, ctx: &NickContext) -> String {
    NICK_PLACEHOLDERS
        .iter()
        .fold(template.to_string(), |acc, (placeholder, resolve)| {
            if acc.contains(placeholder) {
                acc.replace(placeholder, &resolve(ctx))
            } else {
                acc
            }
        })
}

/// Render an `IconURL` template for `nick`.
pub fn render_avatar(template: &str, nick: &str) -> String {
    template.replace("{NICK}", nick)
}

/// The nick with a zero-width space after its first character, so that
/// relaying it does not highlight the user on the origin network.
pub fn no_ping_nick(nick: &str) -> String {
    let mut chars = nick.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(nick.len() + ZERO_WIDTH_SPACE.len_utf8());
            out.push(first);
            out.push(ZERO_WIDTH_SPACE);
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}

/// Remove everything but ASCII letters and digits.
pub fn strip_nick(nick: &str) -> String {
    nick.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Apply ordered `[regex, replacement]` pairs to `text`.
///
/// A pattern that fails to compile is logged and stops the remaining pairs.
pub fn apply_replacements(text: &str, pairs: &[Vec<String>], account: &str) -> String {
    let mut text = text.to_string();
    for pair in pairs {
        let (Some(search), Some(replace)) = (pair.first(), pair.get(1)) else {
            continue;
        };
        let re = match Regex::new(search) {
            Ok(re) => re,
            Err(e) => {
                error!(account, pattern = %search, "Invalid replacement regex: {}", e);
                break;
            }
        };
        text = re.replace_all(&text, replace.as_str()).into_owned();
    }
    text
}
