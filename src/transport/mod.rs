//! Transport collaborator interface
//!
//! The multiplexer never implements a wire transport. It drives any compliant
//! real-time transport through a message-passing boundary: commands
//! (`connect`, `disconnect`, `send`) flow in through a [`TransportHandle`],
//! typed [`LinkEvent`] notifications flow back out through a single-consumer
//! queue. No transport object crosses the boundary.

mod memory;

pub use memory::{MemoryConnector, MemoryHub};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::ChannelConfig;

/// Notification from a transport link, tagged with its endpoint identity
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Transport acknowledged the connection
    Up {
        /// Endpoint that came up
        endpoint: String,
    },
    /// Transport-level disconnect (remote or explicit)
    Down {
        /// Endpoint that went down
        endpoint: String,
    },
    /// A named event arrived on the link
    Message {
        /// Delivering endpoint
        endpoint: String,
        /// Event name
        event: String,
        /// Opaque payload
        payload: Value,
    },
    /// A connect attempt failed; the link stays down
    ConnectError {
        /// Endpoint that failed to connect
        endpoint: String,
        /// Reason string from the transport
        reason: String,
    },
}

/// Sender half of the notification queue handed to each opened link
pub type LinkSender = mpsc::UnboundedSender<LinkEvent>;

/// Command surface of one opened transport link
///
/// All methods are fire-and-forget: the transport applies them on its own
/// schedule and reports outcomes as [`LinkEvent`]s. Calling `connect` on a
/// live link or `disconnect` on a dead one must be a no-op.
pub trait TransportHandle: Send {
    /// Initiate (or re-initiate) the transport connection
    fn connect(&self);

    /// Tear down the transport connection
    fn disconnect(&self);

    /// Send a named event with its payload over the link
    fn send(&self, event: &str, payload: Value);
}

/// Factory for transport links, one per registered endpoint
///
/// `open` is called once per endpoint; the returned handle is retained for
/// the life of the registry entry and reused across reconnects. The
/// credential and the `secure`/`reconnection` flags travel in the config.
pub trait Connector: Send + 'static {
    /// Open a link to `config.endpoint`, reporting notifications on `notify`
    fn open(&self, config: &ChannelConfig, notify: LinkSender) -> Box<dyn TransportHandle>;
}
