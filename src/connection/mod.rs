//! Connection management
//!
//! Handles connection state, lifecycle, and the endpoint registry.

mod registry;
mod state;

pub use registry::{ConnectionEntry, ConnectionRegistry};
pub use state::{ConnectionId, ConnectionInfo, LinkState};
