//! Public multiplexer API
//!
//! [`ChannelMultiplexer`] is a cheap-to-clone handle over the event loop.
//! Construct it explicitly and pass it to consumers; there is no
//! process-wide instance.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::actor::{Command, MuxActor, SubscribeMode};
use crate::config::ChannelConfig;
use crate::connection::ConnectionInfo;
use crate::error::{Error, Result};
use crate::transport::Connector;

/// Multi-endpoint event-channel multiplexer
///
/// Holds several redundantly-connected transport channels, each with emit and
/// listen allow-lists, and exposes one logical channel per event name that
/// fails over between physical connections as they come and go.
#[derive(Clone)]
pub struct ChannelMultiplexer {
    cmd_tx: mpsc::UnboundedSender<Command>,
    info: Arc<DashMap<String, ConnectionInfo>>,
}

impl ChannelMultiplexer {
    /// Create the multiplexer and start connecting every configured endpoint
    ///
    /// Fails fast with [`Error::MissingConfiguration`] when `configs` is
    /// empty. Spawns the event loop, so a tokio runtime must be current.
    pub fn new<C: Connector>(configs: Vec<ChannelConfig>, connector: C) -> Result<Self> {
        if configs.is_empty() {
            return Err(Error::MissingConfiguration);
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let info = Arc::new(DashMap::new());
        let actor = MuxActor::new(configs, Box::new(connector), info.clone(), cmd_rx);
        tokio::spawn(actor.run());

        Ok(Self { cmd_tx, info })
    }

    /// Fire-and-forget send of `event` on the first connected connection
    /// whose emit allow-list covers it
    ///
    /// Never broadcasts. An unroutable emit is reported through logs and
    /// counters, not to the caller.
    pub fn emit(&self, event: impl Into<String>, payload: Value) {
        let _ = self.cmd_tx.send(Command::Emit {
            event: event.into(),
            payload,
        });
    }

    /// Subscribe to `event`, sourced only from the active connection
    ///
    /// Each call gets an independent unbounded sequence sharing the same
    /// selection state. With zero configured listeners the returned
    /// subscription terminates immediately.
    pub async fn subscribe(&self, event: impl Into<String>) -> Subscription {
        self.open_subscription(event.into(), SubscribeMode::Active)
            .await
    }

    /// Subscribe to `event` from every eligible connection
    ///
    /// No deduplication: redundant sources delivering the same logical event
    /// are all observed.
    pub async fn subscribe_all(&self, event: impl Into<String>) -> Subscription {
        self.open_subscription(event.into(), SubscribeMode::All)
            .await
    }

    async fn open_subscription(&self, event: String, mode: SubscribeMode) -> Subscription {
        let (sink, rx) = mpsc::unbounded_channel();
        let (ack, ack_rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Subscribe {
            event,
            mode,
            sink,
            ack,
        });
        // Once acknowledged, the subscriber is registered and no subsequent
        // delivery can be missed. A closed loop just yields a terminated
        // subscription.
        let _ = ack_rx.await;
        Subscription { rx }
    }

    /// Register a new endpoint, or re-initiate a disconnected one
    pub fn connect(&self, config: ChannelConfig) {
        let _ = self.cmd_tx.send(Command::Connect { config });
    }

    /// Tear down one endpoint's link; it stays registered for reconnection
    ///
    /// Idempotent: safe on an already-disconnected endpoint.
    pub fn disconnect(&self, endpoint: impl Into<String>) {
        let _ = self.cmd_tx.send(Command::Disconnect {
            endpoint: endpoint.into(),
        });
    }

    /// Tear down every link; registry entries remain
    pub fn disconnect_all(&self) {
        let _ = self.cmd_tx.send(Command::DisconnectAll);
    }

    /// Snapshot of every registered connection
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.info.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// One subscriber's delivery sequence
///
/// Dropping the subscription deregisters this subscriber without affecting
/// others or the per-event selection state.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Subscription {
    /// Receive the next payload; None when the sequence has terminated
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Non-blocking receive for callers polling from synchronous code
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}
