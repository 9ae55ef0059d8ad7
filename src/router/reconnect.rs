//! Reconnection supervisor for a lost connection.
//!
//! Disconnects, waits a short grace period, then retries connecting at a
//! fixed interval without limit. Every wait ends early on shutdown.

use std::sync::Arc;
use std::time::Duration;

use backon::BackoffBuilder;
use tokio::sync::watch;
use tracing::{error, info};

use crate::connection::Connection;

/// Timing of the reconnection supervisor.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Wait between disconnecting and the first connect attempt.
    pub disconnect_grace: Duration,
    /// Wait between failed connect attempts.
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            disconnect_grace: Duration::from_secs(5),
            retry_delay: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// Fixed-delay, unlimited retry schedule.
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        backon::ExponentialBuilder::default()
            .with_min_delay(self.retry_delay)
            .with_max_delay(self.retry_delay)
            .with_factor(1.0)
            .without_max_times()
            .build()
    }
}

/// Reconnect `connection` and rejoin its channels.
///
/// Returns `false` when shutdown interrupted the attempt.
pub async fn supervise(
    connection: Arc<Connection>,
    policy: ReconnectPolicy,
    mut shutdown_rx: watch::Receiver<bool>,
) -> bool {
    let account = connection.account().to_string();

    if let Err(e) = connection.disconnect().await {
        error!(account = %account, "Disconnect failed: {:#}", e);
    }
    if !sleep_unless_shutdown(policy.disconnect_grace, &mut shutdown_rx).await {
        info!(account = %account, "Shutdown during reconnect, giving up");
        return false;
    }

    let mut backoff = policy.backoff();
    loop {
        info!(account = %account, "Reconnecting");
        match connection.connect().await {
            Ok(()) => break,
            Err(e) => {
                let delay = backoff.next().unwrap_or(policy.retry_delay);
                error!(
                    account = %account,
                    "Reconnection failed: {:#}. Trying again in {:.0} seconds",
                    e,
                    delay.as_secs_f64()
                );
                if !sleep_unless_shutdown(delay, &mut shutdown_rx).await {
                    info!(account = %account, "Shutdown during reconnect, giving up");
                    return false;
                }
            }
        }
    }

    connection.reset_joined();
    if let Err(e) = connection.join_channels().await {
        error!(account = %account, "Rejoining channels failed: {:#}", e);
    }
    info!(account = %account, "Reconnected");
    true
}

/// Sleep for `delay`. Returns `false` if shutdown was signalled first.
async fn sleep_unless_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        if *shutdown_rx.borrow() {
            return false;
        }
        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // No shutdown can arrive any more.
                    (&mut sleep).await;
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockNetwork;
    use crate::gateway::channels::{ChannelDescriptor, Direction};
    use tokio::time::Instant;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.disconnect_grace, Duration::from_secs(5));

        let delays: Vec<Duration> = policy.backoff().take(5).collect();
        assert_eq!(delays, vec![Duration::from_secs(60); 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_failures() {
        let network = MockNetwork::new();
        let connection = network.connection("irc.libera");
        connection.add_channel(ChannelDescriptor::new("#rust", "irc.libera", Direction::InOut));
        let state = network.state("irc.libera");
        state.fail_next_connects(2);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let start = Instant::now();
        let reconnected = supervise(connection, ReconnectPolicy::default(), shutdown_rx).await;

        assert!(reconnected);
        assert!(start.elapsed() >= Duration::from_secs(5 + 2 * 60));
        assert_eq!(state.disconnects(), 1);
        assert_eq!(state.connects(), 3);
        assert_eq!(state.joined(), vec!["#rust"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_after_grace() {
        let network = MockNetwork::new();
        let connection = network.connection("irc.libera");
        let state = network.state("irc.libera");

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(supervise(connection, ReconnectPolicy::default(), shutdown_rx));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(state.connects(), 0);

        assert!(handle.await.unwrap());
        assert_eq!(state.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_retrying() {
        let network = MockNetwork::new();
        let connection = network.connection("irc.libera");
        let state = network.state("irc.libera");
        state.fail_next_connects(usize::MAX);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(supervise(connection, ReconnectPolicy::default(), shutdown_rx));

        tokio::time::sleep(Duration::from_secs(200)).await;
        shutdown_tx.send(true).unwrap();

        assert!(!handle.await.unwrap());
        assert_eq!(state.connects(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_grace() {
        let network = MockNetwork::new();
        let connection = network.connection("irc.libera");
        let state = network.state("irc.libera");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(supervise(connection, ReconnectPolicy::default(), shutdown_rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();

        assert!(!handle.await.unwrap());
        assert_eq!(state.connects(), 0);
        assert_eq!(state.disconnects(), 1);
    }
}
