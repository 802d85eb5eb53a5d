//! Connection registry
//!
//! Owns the set of transport links, keyed by endpoint identity, and answers
//! membership and capability queries. Registration order is preserved: it is
//! the deterministic tie-break for emit routing and active election.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use super::state::{ConnectionId, ConnectionInfo, LinkState};
use crate::config::ChannelConfig;
use crate::metrics::METRICS;
use crate::transport::{Connector, LinkSender, TransportHandle};

/// One registered endpoint and its transport link
pub struct ConnectionEntry {
    /// Unique identifier, stable for the life of the entry
    pub id: ConnectionId,
    /// Immutable per-endpoint configuration
    pub config: ChannelConfig,
    /// Current link state
    pub state: LinkState,
    /// Messages delivered by this link
    pub messages_rx: u64,
    /// Frames sent on this link
    pub sends_tx: u64,
    handle: Box<dyn TransportHandle>,
}

impl ConnectionEntry {
    /// Snapshot for callers
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: format!("{}", self.id),
            endpoint: self.config.endpoint.clone(),
            state: self.state.to_string(),
            messages_rx: self.messages_rx,
            sends_tx: self.sends_tx,
        }
    }
}

/// Owns all connection entries; sole mutator of membership
pub struct ConnectionRegistry {
    /// Entries in registration order
    entries: Vec<ConnectionEntry>,
    /// Fast lookup by endpoint
    by_endpoint: HashMap<String, usize>,
    /// Link factory
    connector: Box<dyn Connector>,
    /// Notification queue shared by every opened link
    notify: LinkSender,
    /// ID generator
    next_id: u64,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new(connector: Box<dyn Connector>, notify: LinkSender) -> Self {
        Self {
            entries: Vec::new(),
            by_endpoint: HashMap::new(),
            connector,
            notify,
            next_id: 1,
        }
    }

    /// Register an endpoint and initiate its connection
    ///
    /// Idempotent: re-registering an existing endpoint is a no-op that does
    /// not reset its state. Returns true when a new entry was created.
    pub fn register(&mut self, config: ChannelConfig) -> bool {
        if self.by_endpoint.contains_key(&config.endpoint) {
            debug!(endpoint = %config.endpoint, "Endpoint already registered");
            return false;
        }

        let id = ConnectionId::from_raw(self.next_id);
        self.next_id += 1;

        let handle = self.connector.open(&config, self.notify.clone());
        handle.connect();

        info!(conn_id = %id, endpoint = %config.endpoint, "Endpoint registered");
        METRICS.connection_registered();

        self.by_endpoint
            .insert(config.endpoint.clone(), self.entries.len());
        self.entries.push(ConnectionEntry {
            id,
            config,
            state: LinkState::Connecting,
            messages_rx: 0,
            sends_tx: 0,
            handle,
        });
        true
    }

    /// Register, or re-initiate the connection of a registered endpoint
    ///
    /// An already-connected endpoint is left alone; no duplicate entry is
    /// ever created.
    pub fn connect(&mut self, config: ChannelConfig) {
        if self.register(config.clone()) {
            return;
        }
        if let Some(entry) = self.get_mut(&config.endpoint) {
            if entry.state == LinkState::Disconnected {
                debug!(endpoint = %config.endpoint, "Re-initiating connection");
                entry.state = LinkState::Connecting;
                entry.handle.connect();
            }
        }
    }

    /// Tear down one link; the entry remains so it can reconnect
    pub fn disconnect(&mut self, endpoint: &str) {
        if let Some(entry) = self.get(endpoint) {
            entry.handle.disconnect();
        }
    }

    /// Tear down every link; entries remain
    pub fn disconnect_all(&mut self) {
        for entry in &self.entries {
            entry.handle.disconnect();
        }
    }

    /// Entries whose emit allow-list contains `event`, registration order
    pub fn emitting<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a ConnectionEntry> {
        self.entries.iter().filter(move |e| e.config.emits(event))
    }

    /// Entries whose listen allow-list contains `event`, registration order
    pub fn listening<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a ConnectionEntry> {
        self.entries.iter().filter(move |e| e.config.listens(event))
    }

    /// First connected entry allowed to emit `event`
    pub fn first_connected_emitter(&self, event: &str) -> Option<ConnectionId> {
        self.emitting(event)
            .find(|e| e.state.is_connected())
            .map(|e| e.id)
    }

    /// First connected entry allowed to deliver `event`
    pub fn first_connected_listener(&self, event: &str) -> Option<ConnectionId> {
        self.listening(event)
            .find(|e| e.state.is_connected())
            .map(|e| e.id)
    }

    /// Whether any entry is configured to deliver `event`
    pub fn has_listener(&self, event: &str) -> bool {
        self.listening(event).next().is_some()
    }

    /// Whether any entry is configured to emit `event`
    pub fn has_emitter(&self, event: &str) -> bool {
        self.emitting(event).next().is_some()
    }

    /// Send a frame on the identified link, if present
    pub fn send(&mut self, id: ConnectionId, event: &str, payload: Value) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.handle.send(event, payload);
            entry.sends_tx += 1;
            true
        } else {
            false
        }
    }

    /// Apply a transport connect acknowledgment; returns the entry id
    pub fn mark_up(&mut self, endpoint: &str) -> Option<ConnectionId> {
        let entry = self.get_mut(endpoint)?;
        entry.state = LinkState::Connected;
        Some(entry.id)
    }

    /// Apply a transport disconnect; returns the entry id
    pub fn mark_down(&mut self, endpoint: &str) -> Option<ConnectionId> {
        let entry = self.get_mut(endpoint)?;
        entry.state = LinkState::Disconnected;
        Some(entry.id)
    }

    /// Count a delivered message against the entry
    pub fn record_rx(&mut self, endpoint: &str) -> Option<ConnectionId> {
        let entry = self.get_mut(endpoint)?;
        entry.messages_rx += 1;
        Some(entry.id)
    }

    /// Look up an entry by endpoint
    pub fn get(&self, endpoint: &str) -> Option<&ConnectionEntry> {
        self.by_endpoint
            .get(endpoint)
            .map(|&idx| &self.entries[idx])
    }

    fn get_mut(&mut self, endpoint: &str) -> Option<&mut ConnectionEntry> {
        let idx = *self.by_endpoint.get(endpoint)?;
        Some(&mut self.entries[idx])
    }

    /// All entries in registration order
    pub fn entries(&self) -> &[ConnectionEntry] {
        &self.entries
    }

    /// Number of registered endpoints
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no endpoint is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
