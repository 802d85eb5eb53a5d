//! Connection state

use serde::Serialize;

/// Unique connection identifier, stable per live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Create from raw u64
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Transport link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Connect has been initiated, no acknowledgment yet
    Connecting,
    /// Transport acknowledged the connection
    Connected,
    /// Link is down; the entry persists so it can reconnect
    Disconnected,
}

impl LinkState {
    /// Whether the link is usable for emit routing and election
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Connected => write!(f, "connected"),
            LinkState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Serializable connection information for callers
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    /// Connection ID (hex string)
    pub id: String,
    /// Endpoint identity
    pub endpoint: String,
    /// Link state
    pub state: String,
    /// Messages delivered by this link
    pub messages_rx: u64,
    /// Frames sent on this link
    pub sends_tx: u64,
}
