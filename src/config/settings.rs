//! Per-connection settings with typed accessors.
//!
//! Account sections are kept as untyped key/value maps so protocol clients
//! can carry their own keys next to the ones the gateway core reads. Lookups
//! are case-insensitive and fall back to the `general` section.

use std::sync::Arc;

use serde_json::Value;

/// Raw key/value map of one settings section.
pub type SettingsMap = serde_json::Map<String, Value>;

/// Setting keys read by the gateway core.
pub mod keys {
    pub const REMOTE_NICK_FORMAT: &str = "RemoteNickFormat";
    pub const ICON_URL: &str = "IconURL";
    pub const STRIP_NICK: &str = "StripNick";
    pub const REPLACE_NICKS: &str = "ReplaceNicks";
    pub const REPLACE_MESSAGES: &str = "ReplaceMessages";
    pub const EXTRACT_NICKS: &str = "ExtractNicks";
    pub const IGNORE_NICKS: &str = "IgnoreNicks";
    pub const IGNORE_MESSAGES: &str = "IgnoreMessages";
    pub const LABEL: &str = "Label";
    pub const SHOW_JOIN_PART: &str = "ShowJoinPart";
    pub const SHOW_TOPIC_CHANGE: &str = "ShowTopicChange";
    pub const SYNC_TOPIC: &str = "SyncTopic";
    pub const PRESERVE_THREADING: &str = "PreserveThreading";
    pub const MODIFY_MESSAGE_SCRIPT: &str = "ModifyMessageScript";
    pub const MODIFY_MESSAGE_INTERPRETER: &str = "ModifyMessageInterpreter";
}

/// Settings of one connection, layered over the `general` section.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    account: SettingsMap,
    general: Arc<SettingsMap>,
}

impl Settings {
    pub fn new(account: SettingsMap, general: Arc<SettingsMap>) -> Self {
        Self { account, general }
    }

    /// Settings built from a single section with no `general` fallback.
    pub fn from_map(account: SettingsMap) -> Self {
        Self::new(account, Arc::new(SettingsMap::new()))
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        find_key(&self.account, key).or_else(|| find_key(&self.general, key))
    }

    /// String value, or empty when unset.
    pub fn get_string(&self, key: &str) -> String {
        match self.lookup(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// Boolean value, `false` when unset.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.lookup(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// List of strings. A plain string is split on whitespace.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.lookup(key) {
            Some(Value::Array(items)) => items.iter().filter_map(value_as_string).collect(),
            Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
            _ => Vec::new(),
        }
    }

    /// List of string lists, e.g. `[["search", "replace"], ...]`.
    pub fn get_string_2d(&self, key: &str) -> Vec<Vec<String>> {
        match self.lookup(key) {
            Some(Value::Array(rows)) => rows
                .iter()
                .filter_map(|row| match row {
                    Value::Array(cells) => {
                        Some(cells.iter().filter_map(value_as_string).collect())
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn find_key<'a>(map: &'a SettingsMap, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
