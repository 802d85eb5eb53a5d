//! In-memory transport
//!
//! A loopback [`Connector`] used by the integration tests and demos. The
//! [`MemoryHub`] plays the remote side of every link: tests script connect
//! refusals, forced drops and inbound deliveries on it, and inspect what the
//! multiplexer sent.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{Connector, LinkSender, TransportHandle};
use crate::config::ChannelConfig;

#[derive(Debug)]
struct Peer {
    notify: LinkSender,
    connected: bool,
    refusal: Option<String>,
    credential: Option<HashMap<String, String>>,
    sent: Vec<(String, Value)>,
}

/// Remote side of every in-memory link
#[derive(Debug, Default)]
pub struct MemoryHub {
    peers: DashMap<String, Peer>,
}

impl MemoryHub {
    /// Deliver an inbound event from `endpoint`
    ///
    /// Delivery is unconditional: a message can arrive before the connect
    /// notification has been observed, which is exactly the race the
    /// multiplexer's lazy binding covers.
    pub fn deliver(&self, endpoint: &str, event: &str, payload: Value) {
        if let Some(peer) = self.peers.get(endpoint) {
            let _ = peer.notify.send(super::LinkEvent::Message {
                endpoint: endpoint.to_string(),
                event: event.to_string(),
                payload,
            });
        }
    }

    /// Drop the link from the remote side
    pub fn drop_link(&self, endpoint: &str) {
        if let Some(mut peer) = self.peers.get_mut(endpoint) {
            if peer.connected {
                peer.connected = false;
                let _ = peer.notify.send(super::LinkEvent::Down {
                    endpoint: endpoint.to_string(),
                });
            }
        }
    }

    /// Make subsequent connect attempts to `endpoint` fail with `reason`
    pub fn refuse(&self, endpoint: &str, reason: &str) {
        if let Some(mut peer) = self.peers.get_mut(endpoint) {
            peer.refusal = Some(reason.to_string());
        }
    }

    /// Clear a connect refusal
    pub fn allow(&self, endpoint: &str) {
        if let Some(mut peer) = self.peers.get_mut(endpoint) {
            peer.refusal = None;
        }
    }

    /// Frames the multiplexer sent on this link, in order
    pub fn sent(&self, endpoint: &str) -> Vec<(String, Value)> {
        self.peers
            .get(endpoint)
            .map(|peer| peer.sent.clone())
            .unwrap_or_default()
    }

    /// Whether the link is currently up
    pub fn is_connected(&self, endpoint: &str) -> bool {
        self.peers
            .get(endpoint)
            .map(|peer| peer.connected)
            .unwrap_or(false)
    }

    /// Credential the multiplexer attached when opening this link
    pub fn credential(&self, endpoint: &str) -> Option<HashMap<String, String>> {
        self.peers.get(endpoint).and_then(|peer| peer.credential.clone())
    }
}

/// In-memory [`Connector`]
#[derive(Debug, Default, Clone)]
pub struct MemoryConnector {
    hub: Arc<MemoryHub>,
}

impl MemoryConnector {
    /// Create a connector with a fresh hub
    pub fn new() -> Self {
        Self::default()
    }

    /// The hub backing every link opened by this connector
    pub fn hub(&self) -> Arc<MemoryHub> {
        self.hub.clone()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, config: &ChannelConfig, notify: LinkSender) -> Box<dyn TransportHandle> {
        debug!(endpoint = %config.endpoint, "Opening in-memory link");
        self.hub.peers.insert(
            config.endpoint.clone(),
            Peer {
                notify,
                connected: false,
                refusal: None,
                credential: config.credential.clone(),
                sent: Vec::new(),
            },
        );
        Box::new(MemoryHandle {
            endpoint: config.endpoint.clone(),
            hub: self.hub.clone(),
        })
    }
}

struct MemoryHandle {
    endpoint: String,
    hub: Arc<MemoryHub>,
}

impl TransportHandle for MemoryHandle {
    fn connect(&self) {
        if let Some(mut peer) = self.hub.peers.get_mut(&self.endpoint) {
            if let Some(reason) = peer.refusal.clone() {
                let _ = peer.notify.send(super::LinkEvent::ConnectError {
                    endpoint: self.endpoint.clone(),
                    reason,
                });
            } else if !peer.connected {
                peer.connected = true;
                let _ = peer.notify.send(super::LinkEvent::Up {
                    endpoint: self.endpoint.clone(),
                });
            }
        }
    }

    fn disconnect(&self) {
        if let Some(mut peer) = self.hub.peers.get_mut(&self.endpoint) {
            if peer.connected {
                peer.connected = false;
                let _ = peer.notify.send(super::LinkEvent::Down {
                    endpoint: self.endpoint.clone(),
                });
            }
        }
    }

    fn send(&self, event: &str, payload: Value) {
        if let Some(mut peer) = self.hub.peers.get_mut(&self.endpoint) {
            if peer.connected {
                peer.sent.push((event.to_string(), payload));
            }
        }
    }
}
