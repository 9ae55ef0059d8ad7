//! Gateways: named routing domains joining channels across connections.
//!
//! A [`Gateway`] owns the channel map built from its configuration and a
//! handle to every connection taking part in it. For each inbound message it
//! applies ignore filtering and rewriting, then dispatches a copy to each
//! destination channel.

pub mod cache;
pub mod channels;
pub mod dispatch;
pub mod filter;
pub mod formatter;
pub mod resolver;
pub mod script;
pub mod transform;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::common::error::GatewayResult;
use crate::common::messages::Message;
use crate::config::{ChannelEntry, GatewayConfig};
use crate::connection::{Connection, ConnectionRegistry};

pub use cache::{DestinationId, IdentityCache, CACHE_CAPACITY};
pub use channels::{ChannelDescriptor, ChannelMap, Direction};
pub use script::{MessageScript, ProcessScript};

pub struct Gateway {
    name: String,
    channels: ChannelMap,
    connections: HashMap<String, Arc<Connection>>,
    cache: Arc<IdentityCache>,
    script: Option<Arc<dyn MessageScript>>,
    /// Receives copies of messages sent to the plugin relay account.
    relay_tx: Option<mpsc::UnboundedSender<Message>>,
}

impl Gateway {
    pub fn new(name: impl Into<String>, cache: Arc<IdentityCache>) -> Self {
        Self {
            name: name.into(),
            channels: ChannelMap::new(),
            connections: HashMap::new(),
            cache,
            script: None,
            relay_tx: None,
        }
    }

    pub fn with_script(mut self, script: Arc<dyn MessageScript>) -> Self {
        self.script = Some(script);
        self
    }

    pub fn with_relay(mut self, relay_tx: mpsc::UnboundedSender<Message>) -> Self {
        self.relay_tx = Some(relay_tx);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn connection(&self, account: &str) -> Option<&Arc<Connection>> {
        self.connections.get(account)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.connections.values()
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    /// Build the channel map from a gateway configuration and attach every
    /// connection it names.
    pub fn add_config(
        &mut self,
        config: &GatewayConfig,
        registry: &mut ConnectionRegistry,
    ) -> GatewayResult<()> {
        self.name = config.name.clone();
        self.channels
            .merge_entries(&self.name, &config.in_channels, Direction::In)?;
        self.channels
            .merge_entries(&self.name, &config.out_channels, Direction::Out)?;
        self.channels
            .merge_entries(&self.name, &config.inout_channels, Direction::InOut)?;

        for entry in config.entries() {
            self.add_bridge(entry, registry)?;
        }

        info!(
            gateway = %self.name,
            channels = self.channels.len(),
            connections = self.connections.len(),
            "Gateway configured"
        );
        Ok(())
    }

    /// Attach the connection of a channel entry, creating it on first use,
    /// and hand it this gateway's channels for its account.
    pub fn add_bridge(
        &mut self,
        entry: &ChannelEntry,
        registry: &mut ConnectionRegistry,
    ) -> GatewayResult<()> {
        let connection = registry.get_or_create(&entry.account)?;
        for channel in self.channels.for_account(&entry.account) {
            connection.add_channel(channel.clone());
        }
        self.connections.insert(entry.account.clone(), connection);
        Ok(())
    }

    /// Raw origin ID under which the composite ID `id` is known, see
    /// [`IdentityCache::find_canonical_origin_id`].
    pub fn find_canonical_origin_id(&self, protocol: &str, id: &str) -> Option<String> {
        self.cache.find_canonical_origin_id(protocol, id)
    }

    /// Relay an inbound message to every destination of this gateway.
    ///
    /// Returns where the copies ended up, for the identity cache.
    pub async fn relay(&self, message: &Message) -> Vec<DestinationId> {
        let origin = self.connections.get(&message.account);
        if filter::should_ignore(message, origin.map(Arc::as_ref)) {
            return Vec::new();
        }
        let Some(origin) = origin else {
            return Vec::new();
        };

        let mut prepared = message.clone();
        transform::prepare_message(&mut prepared, origin, &self.name, self.script.as_deref())
            .await;
        debug!(gateway = %self.name, account = %prepared.account, event = ?prepared.event, "Relaying message");

        let deliveries = self
            .connections
            .values()
            .map(|destination| self.handle_message(&prepared, destination));
        join_all(deliveries).await.into_iter().flatten().collect()
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("name", &self.name)
            .field("channels", &self.channels.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}
