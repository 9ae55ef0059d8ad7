//! The router: hosting loop of the gateway core.
//!
//! Owns the shared inbound stream, the connection registry, the identity
//! cache and every configured gateway. Each inbound message is fanned out
//! to all gateways; the IDs its copies receive are recorded in the cache.

pub mod channels;
pub mod reconnect;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::common::error::GatewayResult;
use crate::common::messages::{EventKind, Message};
use crate::config::Config;
use crate::connection::{ConnectionRegistry, TransportFactories};
use crate::gateway::{Gateway, IdentityCache, MessageScript, ProcessScript};

pub use channels::{ChannelBundle, ControlChannels, HostChannels, RouterChannels};
pub use reconnect::{supervise, ReconnectPolicy};

pub struct Router {
    shared: Arc<Shared>,
    inbound_rx: mpsc::UnboundedReceiver<Message>,
    shutdown_rx: watch::Receiver<bool>,
    policy: ReconnectPolicy,
}

/// State used by the router loop and the per-message tasks it spawns.
struct Shared {
    registry: ConnectionRegistry,
    gateways: Vec<Gateway>,
    cache: Arc<IdentityCache>,
}

impl Router {
    /// Build every enabled gateway of `config`.
    ///
    /// Connections are created through `factories`, one per account and
    /// shared between gateways. Misconfiguration is returned as an error.
    pub fn new(
        config: Config,
        factories: TransportFactories,
        channels: RouterChannels,
    ) -> GatewayResult<Self> {
        let config = Arc::new(config);
        let cache = Arc::new(IdentityCache::new());
        let mut registry =
            ConnectionRegistry::new(factories, Arc::clone(&config), channels.inbound_tx);

        let script: Option<Arc<dyn MessageScript>> = config.script_path().map(|path| {
            info!(script = %path, "Using message script");
            Arc::new(ProcessScript::new(path, config.script_interpreter())) as Arc<dyn MessageScript>
        });

        let mut gateways = Vec::new();
        for gateway_config in config.enabled_gateways() {
            let mut gateway = Gateway::new(gateway_config.name.as_str(), Arc::clone(&cache))
                .with_relay(channels.relay_tx.clone());
            if let Some(script) = &script {
                gateway = gateway.with_script(Arc::clone(script));
            }
            gateway.add_config(&gateway_config, &mut registry)?;
            gateways.push(gateway);
        }

        Ok(Self {
            shared: Arc::new(Shared {
                registry,
                gateways,
                cache,
            }),
            inbound_rx: channels.inbound_rx,
            shutdown_rx: channels.shutdown_rx,
            policy: ReconnectPolicy::default(),
        })
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn gateways(&self) -> &[Gateway] {
        &self.shared.gateways
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.shared.cache
    }

    /// Connect every connection, then join their channels.
    pub async fn start(&self) -> Result<()> {
        info!(gateways = self.shared.gateways.len(), "Starting router");
        for connection in self.shared.registry.all() {
            connection
                .connect()
                .await
                .with_context(|| format!("Bridge {} failed to start", connection.account()))?;
        }
        for connection in self.shared.registry.all() {
            connection
                .join_channels()
                .await
                .with_context(|| format!("Bridge {} failed to join channels", connection.account()))?;
        }
        Ok(())
    }

    /// Process inbound messages until the stream closes or shutdown is
    /// signalled.
    ///
    /// Each message is handled in its own task, so a stuck send or script
    /// only holds up that message.
    pub async fn run(&mut self) {
        let mut shutdown_open = true;
        loop {
            tokio::select! {
                received = self.inbound_rx.recv() => match received {
                    Some(message) => {
                        let shared = Arc::clone(&self.shared);
                        let policy = self.policy.clone();
                        let shutdown_rx = self.shutdown_rx.clone();
                        tokio::spawn(async move {
                            shared.receive(message, &policy, &shutdown_rx).await;
                        });
                    }
                    None => {
                        info!("Inbound stream closed, stopping router");
                        break;
                    }
                },
                changed = self.shutdown_rx.changed(), if shutdown_open => match changed {
                    Ok(()) if *self.shutdown_rx.borrow() => {
                        info!("Shutdown signal received, stopping router");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => shutdown_open = false,
                },
            }
        }
    }

    /// Handle one inbound message.
    pub async fn handle_receive(&self, message: Message) {
        self.shared
            .receive(message, &self.policy, &self.shutdown_rx)
            .await;
    }
}

impl Shared {
    async fn receive(
        &self,
        mut message: Message,
        policy: &ReconnectPolicy,
        shutdown_rx: &watch::Receiver<bool>,
    ) {
        message.timestamp = Some(Utc::now());

        let origin = self.registry.get(&message.account);
        if let Some(origin) = &origin {
            message.protocol = origin.protocol().to_string();
        }

        match message.event {
            EventKind::Failure => {
                match origin {
                    Some(connection) => {
                        info!(account = %message.account, "Connection lost, reconnecting");
                        tokio::spawn(reconnect::supervise(
                            connection,
                            policy.clone(),
                            shutdown_rx.clone(),
                        ));
                    }
                    None => debug!(account = %message.account, "Failure event for unknown connection"),
                }
                return;
            }
            EventKind::RejoinChannels => {
                if let Some(connection) = origin {
                    info!(account = %message.account, "Rejoining channels");
                    connection.reset_joined();
                    if let Err(e) = connection.join_channels().await {
                        error!(account = %message.account, "Rejoining channels failed: {:#}", e);
                    }
                }
                return;
            }
            _ => {}
        }

        let relays = self.gateways.iter().map(|gateway| {
            let message = &message;
            async move {
                let ids = gateway.relay(message).await;
                if !message.id.is_empty() && !ids.is_empty() {
                    debug!(gateway = %gateway.name(), key = %message.origin_key(), copies = ids.len(), "Recording message identity");
                    self.cache.append(&message.origin_key(), ids);
                }
            }
        });
        join_all(relays).await;
    }
}
