//! Relaygate - routing core of a multi-protocol chat bridge.
//!
//! Connections to chat networks are grouped into named gateways. Messages
//! arriving on any connection are filtered, rewritten and delivered to every
//! other channel of the same gateway, while an identity cache keeps edits,
//! deletes and threaded replies pointing at the right downstream copies.
//!
//! Protocol clients are not part of this crate. A hosting process supplies a
//! [`TransportFactory`] per protocol, builds a [`Router`] from a [`Config`]
//! and drives it with [`Router::start`] and [`Router::run`].

pub mod common;
pub mod config;
pub mod connection;
pub mod gateway;
pub mod router;

pub use common::logging::init_tracing;
pub use common::{ConfigError, EventKind, GatewayError, GatewayResult, Message, ScriptError};
pub use config::{load_and_validate, load_config, Config};
pub use connection::{Connection, Transport, TransportContext, TransportFactories, TransportFactory};
pub use gateway::{Gateway, IdentityCache};
pub use router::{ChannelBundle, ReconnectPolicy, Router};
