//! In-memory transport used by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{Connection, Transport, TransportContext, TransportFactories, TransportFactory};
use crate::common::messages::Message;
use crate::config::Settings;
use crate::gateway::channels::ChannelDescriptor;

/// Recorded activity and scripted behaviour of one mock account.
#[derive(Debug, Default)]
pub struct MockState {
    sent: Mutex<Vec<Message>>,
    joined: Mutex<Vec<String>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    /// Number of upcoming connect attempts that fail.
    failing_connects: AtomicUsize,
    fail_sends: AtomicBool,
    /// When set, sends never complete.
    hang_sends: AtomicBool,
    /// When set, sends succeed without returning an ID.
    anonymous_sends: AtomicBool,
    typing: AtomicBool,
    avatars: AtomicBool,
}

impl MockState {
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn joined(&self) -> Vec<String> {
        self.joined.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn hang_sends(&self, hang: bool) {
        self.hang_sends.store(hang, Ordering::SeqCst);
    }

    pub fn anonymous_sends(&self, anonymous: bool) {
        self.anonymous_sends.store(anonymous, Ordering::SeqCst);
    }

    pub fn support_typing(&self, typing: bool) {
        self.typing.store(typing, Ordering::SeqCst);
    }

    pub fn handle_avatars(&self, avatars: bool) {
        self.avatars.store(avatars, Ordering::SeqCst);
    }
}

pub struct MockTransport {
    account: String,
    state: Arc<MockState>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<()> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let failing = self.state.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(anyhow!("{} refused connection", self.account));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn join_channel(&self, channel: &ChannelDescriptor) -> Result<()> {
        self.state.joined.lock().unwrap().push(channel.name.clone());
        Ok(())
    }

    async fn send(&self, message: Message) -> Result<String> {
        if self.state.hang_sends.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.state.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("{} is unreachable", self.account));
        }
        let mut sent = self.state.sent.lock().unwrap();
        sent.push(message);
        if self.state.anonymous_sends.load(Ordering::SeqCst) {
            return Ok(String::new());
        }
        Ok(format!("{}-{}", self.account, sent.len()))
    }

    fn supports_user_typing(&self) -> bool {
        self.state.typing.load(Ordering::SeqCst)
    }

    fn handles_avatar_downloads(&self) -> bool {
        self.state.avatars.load(Ordering::SeqCst)
    }
}

/// Set of mock accounts whose state tests can inspect.
#[derive(Default)]
pub struct MockNetwork {
    states: Mutex<HashMap<String, Arc<MockState>>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// State of an account, created on first access.
    pub fn state(&self, account: &str) -> Arc<MockState> {
        Arc::clone(
            self.states
                .lock()
                .unwrap()
                .entry(account.to_string())
                .or_default(),
        )
    }

    pub fn transport(&self, account: &str) -> Box<dyn Transport> {
        Box::new(MockTransport {
            account: account.to_string(),
            state: self.state(account),
        })
    }

    pub fn connection(&self, account: &str) -> Arc<Connection> {
        self.connection_with(account, Settings::default())
    }

    pub fn connection_with(&self, account: &str, settings: Settings) -> Arc<Connection> {
        Arc::new(Connection::new(account, settings, self.transport(account)).unwrap())
    }

    /// Mock factories for the given protocols.
    pub fn factories(self: &Arc<Self>, protocols: &[&str]) -> TransportFactories {
        protocols
            .iter()
            .map(|protocol| {
                let network = Arc::clone(self);
                let factory: TransportFactory =
                    Arc::new(move |ctx: TransportContext| network.transport(&ctx.account));
                (protocol.to_string(), factory)
            })
            .collect()
    }
}
