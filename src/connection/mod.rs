//! Connections to chat networks.
//!
//! A [`Connection`] wraps one protocol [`Transport`] with the account it
//! belongs to, its settings and the channels it should be in. Connections
//! are shared between every gateway that uses the account.

pub mod transport;

#[cfg(test)]
pub mod mock;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::common::error::{GatewayError, GatewayResult};
use crate::common::messages::Message;
use crate::config::{Config, Settings};
use crate::gateway::channels::ChannelDescriptor;

pub use transport::{Transport, TransportContext, TransportFactories, TransportFactory};

/// Live handle to one chat network account.
pub struct Connection {
    account: String,
    protocol: String,
    name: String,
    settings: Settings,
    channels: Mutex<BTreeMap<String, ChannelDescriptor>>,
    joined: Mutex<HashSet<String>>,
    transport: Box<dyn Transport>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Split a `protocol.name` account string.
pub fn split_account(account: &str) -> GatewayResult<(&str, &str)> {
    match account.split_once('.') {
        Some((protocol, name)) if !protocol.is_empty() && !name.is_empty() => {
            Ok((protocol, name))
        }
        _ => Err(GatewayError::MalformedAccount {
            account: account.to_string(),
        }),
    }
}

impl Connection {
    pub fn new(
        account: &str,
        settings: Settings,
        transport: Box<dyn Transport>,
    ) -> GatewayResult<Self> {
        let (protocol, name) = split_account(account)?;
        Ok(Self {
            account: account.to_string(),
            protocol: protocol.to_string(),
            name: name.to_string(),
            settings,
            channels: Mutex::new(BTreeMap::new()),
            joined: Mutex::new(HashSet::new()),
            transport,
        })
    }

    /// Full account identifier, e.g. `irc.libera`.
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register a channel this connection should be in.
    pub fn add_channel(&self, channel: ChannelDescriptor) {
        lock(&self.channels).insert(channel.id.clone(), channel);
    }

    /// Snapshot of the connection's channels.
    pub fn channels(&self) -> Vec<ChannelDescriptor> {
        lock(&self.channels).values().cloned().collect()
    }

    pub fn is_joined(&self, channel_id: &str) -> bool {
        lock(&self.joined).contains(channel_id)
    }

    /// Forget which channels were joined, e.g. after a reconnect.
    pub fn reset_joined(&self) {
        lock(&self.joined).clear();
    }

    pub async fn connect(&self) -> Result<()> {
        info!(account = %self.account, "Connecting");
        self.transport.connect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        info!(account = %self.account, "Disconnecting");
        self.transport.disconnect().await
    }

    /// Join every registered channel not joined yet.
    ///
    /// Stops at the first failure; channels joined so far stay marked.
    pub async fn join_channels(&self) -> Result<()> {
        for channel in self.channels() {
            if self.is_joined(&channel.id) {
                continue;
            }
            info!(account = %self.account, channel = %channel.name, "Joining channel");
            self.transport.join_channel(&channel).await?;
            lock(&self.joined).insert(channel.id);
        }
        Ok(())
    }

    /// Deliver a message. Returns the network's ID for it, empty if none.
    pub async fn send(&self, message: Message) -> Result<String> {
        debug!(account = %self.account, channel = %message.channel, "Sending message");
        self.transport.send(message).await
    }

    pub fn supports_user_typing(&self) -> bool {
        self.transport.supports_user_typing()
    }

    pub fn handles_avatar_downloads(&self) -> bool {
        self.transport.handles_avatar_downloads()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("account", &self.account)
            .field("channels", &lock(&self.channels).len())
            .finish()
    }
}

/// Creates connections on first use and hands out the shared instance.
pub struct ConnectionRegistry {
    factories: TransportFactories,
    config: Arc<Config>,
    inbound_tx: mpsc::UnboundedSender<Message>,
    connections: HashMap<String, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new(
        factories: TransportFactories,
        config: Arc<Config>,
        inbound_tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            factories,
            config,
            inbound_tx,
            connections: HashMap::new(),
        }
    }

    /// Connection for `account`, created through its protocol's factory if
    /// this is the first gateway using it.
    pub fn get_or_create(&mut self, account: &str) -> GatewayResult<Arc<Connection>> {
        if let Some(connection) = self.connections.get(account) {
            return Ok(Arc::clone(connection));
        }

        let (protocol, _) = split_account(account)?;
        let factory = self
            .factories
            .get(protocol)
            .ok_or_else(|| GatewayError::UnknownProtocol {
                account: account.to_string(),
                protocol: protocol.to_string(),
            })?;

        let settings = self.config.settings_for(account);
        let transport = (**factory)(TransportContext {
            account: account.to_string(),
            settings: settings.clone(),
            inbound_tx: self.inbound_tx.clone(),
        });
        let connection = Arc::new(Connection::new(account, settings, transport)?);

        debug!(account, protocol, "Created connection");
        self.connections
            .insert(account.to_string(), Arc::clone(&connection));
        Ok(connection)
    }

    pub fn get(&self, account: &str) -> Option<Arc<Connection>> {
        self.connections.get(account).cloned()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.connections.values()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockNetwork;
    use super::*;
    use crate::gateway::channels::Direction;

    #[test]
    fn test_split_account() {
        assert_eq!(split_account("irc.libera").unwrap(), ("irc", "libera"));
        assert_eq!(split_account("slack.my.team").unwrap(), ("slack", "my.team"));
        assert!(split_account("irc").is_err());
        assert!(split_account(".libera").is_err());
    }

    #[tokio::test]
    async fn test_join_channels_skips_joined() {
        let network = MockNetwork::new();
        let connection = network.connection("irc.libera");
        connection.add_channel(ChannelDescriptor::new("#a", "irc.libera", Direction::InOut));
        connection.add_channel(ChannelDescriptor::new("#b", "irc.libera", Direction::InOut));

        connection.join_channels().await.unwrap();
        connection.join_channels().await.unwrap();
        assert_eq!(network.state("irc.libera").joined().len(), 2);

        connection.reset_joined();
        assert!(!connection.is_joined("#airc.libera"));
        connection.join_channels().await.unwrap();
        assert_eq!(network.state("irc.libera").joined().len(), 4);
    }

    #[test]
    fn test_registry_shares_connections() {
        let network = MockNetwork::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry =
            ConnectionRegistry::new(network.factories(&["irc"]), Arc::new(Config::default()), tx);

        let first = registry.get_or_create("irc.libera").unwrap();
        let second = registry.get_or_create("irc.libera").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.protocol(), "irc");
        assert_eq!(first.name(), "libera");
    }

    #[test]
    fn test_registry_unknown_protocol() {
        let network = MockNetwork::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry =
            ConnectionRegistry::new(network.factories(&["irc"]), Arc::new(Config::default()), tx);

        let result = registry.get_or_create("telegram.bot");
        assert!(matches!(result, Err(GatewayError::UnknownProtocol { .. })));
        assert!(registry.get("telegram.bot").is_none());
    }
}
