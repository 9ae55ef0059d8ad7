//! Protocol transport interface implemented by chat network clients.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::common::messages::Message;
use crate::config::Settings;
use crate::gateway::channels::ChannelDescriptor;

/// Delivery capability for one chat network.
///
/// Implementations push what they receive onto the inbound sender handed to
/// their factory. A dropped connection is reported by sending a message with
/// the `failure` event.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn join_channel(&self, channel: &ChannelDescriptor) -> Result<()>;

    /// Send a message, returning the network's ID for it (empty if the
    /// network gives none).
    async fn send(&self, message: Message) -> Result<String>;

    /// Whether `user_typing` events can be delivered.
    fn supports_user_typing(&self) -> bool {
        false
    }

    /// Whether the client consumes `avatar_download` events.
    fn handles_avatar_downloads(&self) -> bool {
        false
    }
}

/// What a factory gets to build a transport for one account.
pub struct TransportContext {
    pub account: String,
    pub settings: Settings,
    /// Shared inbound stream consumed by the router.
    pub inbound_tx: mpsc::UnboundedSender<Message>,
}

/// Builds a transport for one account of a protocol.
pub type TransportFactory = Arc<dyn Fn(TransportContext) -> Box<dyn Transport> + Send + Sync>;

/// Factories keyed by protocol name.
pub type TransportFactories = HashMap<String, TransportFactory>;
