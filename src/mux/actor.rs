//! Multiplexer event loop
//!
//! A single task owns the registry and the active-selector; handle commands
//! and transport link events are its only inputs. Funnelling every
//! state-affecting notification through this loop is what upholds the
//! at-most-one-active-per-event invariant, so nothing outside this module
//! mutates either structure.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::config::ChannelConfig;
use crate::connection::{ConnectionInfo, ConnectionRegistry};
use crate::error::Error;
use crate::metrics::METRICS;
use crate::selector::{ActiveSelector, Delivery};
use crate::transport::{Connector, LinkEvent};

/// Which delivery policy a subscription follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscribeMode {
    /// Only the active connection's messages
    Active,
    /// Every eligible connection's messages, duplicates included
    All,
}

/// Commands from multiplexer handles
pub(crate) enum Command {
    Emit {
        event: String,
        payload: Value,
    },
    Subscribe {
        event: String,
        mode: SubscribeMode,
        sink: mpsc::UnboundedSender<Value>,
        ack: oneshot::Sender<()>,
    },
    Connect {
        config: ChannelConfig,
    },
    Disconnect {
        endpoint: String,
    },
    DisconnectAll,
}

type SubscriberMap = HashMap<String, Vec<mpsc::UnboundedSender<Value>>>;

pub(crate) struct MuxActor {
    registry: ConnectionRegistry,
    selector: ActiveSelector,
    /// Single-active subscribers, per event
    active_subs: SubscriberMap,
    /// Listen-all subscribers, per event
    all_subs: SubscriberMap,
    /// Shared snapshot readable outside the loop
    info: Arc<DashMap<String, ConnectionInfo>>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl MuxActor {
    /// Build the actor and register (and start connecting) every endpoint
    pub(crate) fn new(
        configs: Vec<ChannelConfig>,
        connector: Box<dyn Connector>,
        info: Arc<DashMap<String, ConnectionInfo>>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let mut registry = ConnectionRegistry::new(connector, link_tx);
        for config in configs {
            let endpoint = config.endpoint.clone();
            registry.register(config);
            if let Some(entry) = registry.get(&endpoint) {
                info.insert(endpoint, entry.info());
            }
        }

        Self {
            registry,
            selector: ActiveSelector::new(),
            active_subs: HashMap::new(),
            all_subs: HashMap::new(),
            info,
            cmd_rx,
            link_rx,
        }
    }

    /// Run until every handle is dropped
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.apply_command(cmd),
                    None => {
                        debug!("All multiplexer handles dropped, disconnecting");
                        self.registry.disconnect_all();
                        break;
                    }
                },
                Some(event) = self.link_rx.recv() => self.apply_link_event(event),
            }
        }
    }

    fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::Emit { event, payload } => self.route_emit(&event, payload),
            Command::Subscribe {
                event,
                mode,
                sink,
                ack,
            } => {
                self.add_subscriber(&event, mode, sink);
                let _ = ack.send(());
            }
            Command::Connect { config } => {
                let endpoint = config.endpoint.clone();
                self.registry.connect(config);
                self.publish_info(&endpoint);
            }
            Command::Disconnect { endpoint } => self.registry.disconnect(&endpoint),
            Command::DisconnectAll => self.registry.disconnect_all(),
        }
    }

    /// Best-effort send: exactly one connected eligible link, or a report
    fn route_emit(&mut self, event: &str, payload: Value) {
        if event.is_empty() {
            warn!("Refusing to emit an unnamed event");
            METRICS.emit_unroutable();
            return;
        }
        match self.registry.first_connected_emitter(event) {
            Some(id) => {
                trace!(conn_id = %id, event, "Routing emit");
                self.registry.send(id, event, payload);
                METRICS.emit_routed();
                if let Some(endpoint) = self.endpoint_of(id) {
                    self.publish_info(&endpoint);
                }
            }
            None => {
                if self.registry.has_emitter(event) {
                    debug!(event, "No connected connection may emit this event, dropping");
                } else {
                    warn!(
                        error = %Error::NoEligibleConnection { event: event.to_string() },
                        "Emit dropped"
                    );
                }
                METRICS.emit_unroutable();
            }
        }
    }

    fn add_subscriber(&mut self, event: &str, mode: SubscribeMode, sink: mpsc::UnboundedSender<Value>) {
        if !self.registry.has_listener(event) {
            // Dropping the sink terminates the subscription immediately
            warn!(
                error = %Error::NoEligibleConnection { event: event.to_string() },
                "Subscription has no configured source"
            );
            return;
        }
        let subs = match mode {
            SubscribeMode::Active => &mut self.active_subs,
            SubscribeMode::All => &mut self.all_subs,
        };
        subs.entry(event.to_string()).or_default().push(sink);
        METRICS.subscription_opened();
        debug!(event, ?mode, "Subscriber added");
    }

    fn apply_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Up { endpoint } => self.on_link_up(&endpoint),
            LinkEvent::Down { endpoint } => self.on_link_down(&endpoint),
            LinkEvent::Message {
                endpoint,
                event,
                payload,
            } => self.on_message(&endpoint, &event, payload),
            LinkEvent::ConnectError { endpoint, reason } => {
                self.on_connect_error(&endpoint, &reason)
            }
        }
    }

    fn on_link_up(&mut self, endpoint: &str) {
        let Some(id) = self.registry.mark_up(endpoint) else {
            warn!(endpoint, "Connect acknowledgment for unknown endpoint");
            return;
        };
        METRICS.link_up();
        info!(conn_id = %id, endpoint, "Connected");

        let listen_list: Vec<String> = self
            .registry
            .get(endpoint)
            .map(|e| e.config.listen_list.clone())
            .unwrap_or_default();
        let bound = self
            .selector
            .on_link_up(id, listen_list.iter().map(String::as_str));
        for event in bound {
            debug!(conn_id = %id, event, "Elected active");
        }
        self.publish_info(endpoint);
    }

    fn on_link_down(&mut self, endpoint: &str) {
        let Some(id) = self.registry.mark_down(endpoint) else {
            warn!(endpoint, "Disconnect for unknown endpoint");
            return;
        };
        METRICS.link_down();
        info!(conn_id = %id, endpoint, "Disconnected");

        let registry = &self.registry;
        let changed = self
            .selector
            .on_link_down(id, |event| registry.first_connected_listener(event));
        for (event, successor) in changed {
            match successor {
                Some(next) => info!(event, from = %id, to = %next, "Failed over"),
                None => debug!(event, "No eligible connection up, binding cleared"),
            }
        }
        self.publish_info(endpoint);
    }

    fn on_message(&mut self, endpoint: &str, event: &str, payload: Value) {
        METRICS.message_received();
        let Some(id) = self.registry.record_rx(endpoint) else {
            warn!(endpoint, event, "Message from unknown endpoint");
            return;
        };

        let eligible = self
            .registry
            .get(endpoint)
            .map(|e| e.config.listens(event))
            .unwrap_or(false);
        if !eligible {
            trace!(endpoint, event, "Message outside listen allow-list, ignored");
            return;
        }

        // Listen-all subscribers see every eligible source, duplicates included
        fan_out(&mut self.all_subs, event, &payload);

        let was_bound = self.selector.active_for(event).is_some();
        match self.selector.on_message(id, event) {
            Delivery::Active => {
                if !was_bound {
                    debug!(conn_id = %id, event, "Lazily bound on first message");
                }
                let delivered = fan_out(&mut self.active_subs, event, &payload);
                for _ in 0..delivered {
                    METRICS.message_delivered();
                }
            }
            Delivery::Standby => {
                trace!(conn_id = %id, event, "Standby message dropped");
                METRICS.standby_dropped();
            }
        }
        self.publish_info(endpoint);
    }

    fn on_connect_error(&mut self, endpoint: &str, reason: &str) {
        METRICS.connect_error();
        warn!(
            error = %Error::TransportConnect {
                endpoint: endpoint.to_string(),
                reason: reason.to_string(),
            },
            "Connect attempt failed"
        );
        // The link never came up, so no binding can be held; retry policy
        // belongs to the transport collaborator.
        self.registry.mark_down(endpoint);
        self.publish_info(endpoint);
    }

    fn publish_info(&self, endpoint: &str) {
        if let Some(entry) = self.registry.get(endpoint) {
            self.info.insert(endpoint.to_string(), entry.info());
        }
    }

    fn endpoint_of(&self, id: crate::connection::ConnectionId) -> Option<String> {
        self.registry
            .entries()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.config.endpoint.clone())
    }
}

/// Deliver to every live subscriber of `event`, pruning dropped ones
fn fan_out(subs: &mut SubscriberMap, event: &str, payload: &Value) -> usize {
    let Some(list) = subs.get_mut(event) else {
        return 0;
    };
    let before = list.len();
    list.retain(|sink| sink.send(payload.clone()).is_ok());
    let closed = before - list.len();
    for _ in 0..closed {
        METRICS.subscription_closed();
    }
    if list.is_empty() {
        subs.remove(event);
        return 0;
    }
    list.len()
}
