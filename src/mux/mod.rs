//! Channel multiplexer
//!
//! The public-facing component: composes the connection registry and the
//! active-selector behind a single-writer event loop.

mod actor;
mod handle;

pub use handle::{ChannelMultiplexer, Subscription};
