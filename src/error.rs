//! Error taxonomy
//!
//! Construction-time misconfiguration is the only fatal condition; everything
//! that can go wrong at runtime degrades to "no data flowing" and is surfaced
//! through logs and counters instead of the caller.

use thiserror::Error;

/// Library result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Multiplexer errors
#[derive(Debug, Error)]
pub enum Error {
    /// No endpoint configuration was supplied at construction
    #[error("no channel configuration provided")]
    MissingConfiguration,

    /// No connection's allow-list covers the requested event
    #[error("no eligible connection for event `{event}`")]
    NoEligibleConnection {
        /// The event name that could not be routed
        event: String,
    },

    /// Transport-level connect failure, reported by the collaborator
    #[error("transport connect error on {endpoint}: {reason}")]
    TransportConnect {
        /// Endpoint that failed to connect
        endpoint: String,
        /// Reason string from the transport
        reason: String,
    },
}
