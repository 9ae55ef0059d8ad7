//! Router channel management.
//!
//! Groups the channels connecting the router with the hosting process and
//! with protocol transports.

use tokio::sync::{mpsc, watch};

use crate::common::messages::Message;

/// Channels owned by the router.
pub struct RouterChannels {
    /// Handed to every transport factory; transports push inbound messages here.
    pub inbound_tx: mpsc::UnboundedSender<Message>,
    /// Shared inbound stream consumed by the router loop.
    pub inbound_rx: mpsc::UnboundedReceiver<Message>,
    /// Copies of messages sent to the plugin relay account.
    pub relay_tx: mpsc::UnboundedSender<Message>,
    /// Receiver for shutdown signal (router loop and supervisors listen).
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels kept by the hosting process.
pub struct HostChannels {
    /// Inject messages into the router as if a transport received them.
    pub inbound_tx: mpsc::UnboundedSender<Message>,
    /// Relay stream for an external server plugin.
    pub relay_rx: mpsc::UnboundedReceiver<Message>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels created for a router.
pub struct ChannelBundle {
    pub router: RouterChannels,
    pub host: HostChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            router: RouterChannels {
                inbound_tx: inbound_tx.clone(),
                inbound_rx,
                relay_tx,
                shutdown_rx,
            },
            host: HostChannels {
                inbound_tx,
                relay_rx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
