//! Metrics and observability
//!
//! Atomic counters for the delivery hot path, with a serializable snapshot.

mod counters;

pub use counters::{Metrics, MetricsSnapshot, METRICS};
