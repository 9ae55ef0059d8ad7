//! Common utilities and types shared across the crate.

pub mod error;
pub mod logging;
pub mod messages;

pub use error::{ConfigError, GatewayError, GatewayResult, ScriptError};
pub use messages::{origin_key, EventKind, Message, API_PROTOCOL, PARENT_NOT_FOUND};
