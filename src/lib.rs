//! Sockmux - multi-endpoint event-channel multiplexer
//!
//! This library holds several independent, redundantly-connected transport
//! channels (one per remote endpoint), each configured with emit and listen
//! allow-lists, and exposes a single logical channel per event name that
//! transparently fails over between physical connections as they connect and
//! disconnect.

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod mux;
pub mod selector;
pub mod transport;
pub mod util;

pub use config::{ChannelConfig, Config};
pub use error::{Error, Result};
pub use mux::{ChannelMultiplexer, Subscription};

/// Library version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
