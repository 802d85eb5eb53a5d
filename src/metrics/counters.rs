//! Atomic counters for hot-path metrics
//!
//! Lock-free counters that can be safely updated from any thread.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics instance
pub static METRICS: Metrics = Metrics::new();

/// Atomic metrics counters
pub struct Metrics {
    // Connection metrics
    pub connections_registered: AtomicU64,
    pub links_up: AtomicU64,
    pub links_down: AtomicU64,
    pub connect_errors: AtomicU64,

    // Delivery metrics
    pub messages_received: AtomicU64,
    pub messages_delivered: AtomicU64,
    pub messages_standby_dropped: AtomicU64,

    // Selection metrics
    pub failovers: AtomicU64,
    pub lazy_binds: AtomicU64,

    // Emit metrics
    pub emits_routed: AtomicU64,
    pub emits_unroutable: AtomicU64,

    // Subscription metrics
    pub subscriptions_opened: AtomicU64,
    pub subscriptions_closed: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            connections_registered: AtomicU64::new(0),
            links_up: AtomicU64::new(0),
            links_down: AtomicU64::new(0),
            connect_errors: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            messages_standby_dropped: AtomicU64::new(0),
            failovers: AtomicU64::new(0),
            lazy_binds: AtomicU64::new(0),
            emits_routed: AtomicU64::new(0),
            emits_unroutable: AtomicU64::new(0),
            subscriptions_opened: AtomicU64::new(0),
            subscriptions_closed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn connection_registered(&self) {
        self.connections_registered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn link_up(&self) {
        self.links_up.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn link_down(&self) {
        self.links_down.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connect_error(&self) {
        self.connect_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn standby_dropped(&self) {
        self.messages_standby_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn failover(&self) {
        self.failovers.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn lazy_bind(&self) {
        self.lazy_binds.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn emit_routed(&self) {
        self.emits_routed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn emit_unroutable(&self) {
        self.emits_unroutable.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn subscription_opened(&self) {
        self.subscriptions_opened.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn subscription_closed(&self) {
        self.subscriptions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot for logging or export
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_registered: self.connections_registered.load(Ordering::Relaxed),
            links_up: self.links_up.load(Ordering::Relaxed),
            links_down: self.links_down.load(Ordering::Relaxed),
            connect_errors: self.connect_errors.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_standby_dropped: self.messages_standby_dropped.load(Ordering::Relaxed),
            failovers: self.failovers.load(Ordering::Relaxed),
            lazy_binds: self.lazy_binds.load(Ordering::Relaxed),
            emits_routed: self.emits_routed.load(Ordering::Relaxed),
            emits_unroutable: self.emits_unroutable.load(Ordering::Relaxed),
            subscriptions_opened: self.subscriptions_opened.load(Ordering::Relaxed),
            subscriptions_closed: self.subscriptions_closed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of all counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub connections_registered: u64,
    pub links_up: u64,
    pub links_down: u64,
    pub connect_errors: u64,
    pub messages_received: u64,
    pub messages_delivered: u64,
    pub messages_standby_dropped: u64,
    pub failovers: u64,
    pub lazy_binds: u64,
    pub emits_routed: u64,
    pub emits_unroutable: u64,
    pub subscriptions_opened: u64,
    pub subscriptions_closed: u64,
}
