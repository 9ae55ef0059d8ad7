//! Error types for the gateway core.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors raised while building a gateway from its configuration.
///
/// Every variant is a startup-time misconfiguration; the host is expected to
/// abort when one of these reaches it.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Mattermost channels do not start with a #: remove the # in '{channel}' of {account}")]
    MattermostHashChannel { account: String, channel: String },

    #[error("Zulip channels need to specify the topic with channel/topic:mytopic in '{channel}' of {account}")]
    ZulipMissingTopic { account: String, channel: String },

    #[error("Incorrect protocol '{protocol}' specified in gateway configuration {account}")]
    UnknownProtocol { account: String, protocol: String },

    #[error("Account '{account}' is not of the form protocol.name")]
    MalformedAccount { account: String },
}

/// Failures of the message scripting hook.
///
/// These never abort message processing; they are logged and the message
/// continues unmodified.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to load script '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Script '{path}' exited with {status}: {stderr}")]
    Run {
        path: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Script '{path}' produced invalid output: {source}")]
    Output {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Script IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway construction.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
