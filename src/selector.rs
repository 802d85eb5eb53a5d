//! Active-connection selection
//!
//! For every event name, at most one connection is the authoritative delivery
//! source at any instant. The selector is the sole owner of that binding and
//! is only ever driven from the multiplexer's single event loop, so the
//! transitions below are serialized by construction.
//!
//! Transition rules, evaluated on every relevant link signal:
//! - connect of an eligible link: bind if the event is unbound, otherwise the
//!   link is a standby
//! - disconnect of the active link: clear the binding and immediately
//!   re-elect the first remaining connected eligible link, registration order
//! - message while unbound: the delivering link is lazily elected, covering
//!   connect notifications that race with message delivery
//! - message from a non-active link: standby, dropped for single-active
//!   subscribers

use std::collections::HashMap;

use crate::connection::ConnectionId;
use crate::metrics::METRICS;

/// Verdict for one delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The delivering link is (now) the active binding
    Active,
    /// Another link holds the binding; drop for single-active subscribers
    Standby,
}

/// Per-event active bindings
#[derive(Debug, Default)]
pub struct ActiveSelector {
    active: HashMap<String, ConnectionId>,
}

impl ActiveSelector {
    /// Create a selector with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// The active binding for `event`, if any
    pub fn active_for(&self, event: &str) -> Option<ConnectionId> {
        self.active.get(event).copied()
    }

    /// Apply a connect acknowledgment for the link eligible to deliver
    /// `listen_list`; returns the events it was newly bound to
    pub fn on_link_up<'a, I>(&mut self, id: ConnectionId, listen_list: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut bound = Vec::new();
        for event in listen_list {
            if !self.active.contains_key(event) {
                self.active.insert(event.to_string(), id);
                bound.push(event);
            }
        }
        bound
    }

    /// Apply a disconnect: clear every binding held by `id` and re-elect
    ///
    /// `reelect` must return the first remaining connected eligible link for
    /// the event, in registration order, or None when none is up. Returns the
    /// affected events with their new binding.
    pub fn on_link_down<F>(&mut self, id: ConnectionId, mut reelect: F) -> Vec<(String, Option<ConnectionId>)>
    where
        F: FnMut(&str) -> Option<ConnectionId>,
    {
        let held: Vec<String> = self
            .active
            .iter()
            .filter(|(_, &active)| active == id)
            .map(|(event, _)| event.clone())
            .collect();

        let mut changed = Vec::with_capacity(held.len());
        for event in held {
            self.active.remove(&event);
            let successor = reelect(&event);
            if let Some(next) = successor {
                self.active.insert(event.clone(), next);
                METRICS.failover();
            }
            changed.push((event, successor));
        }
        changed
    }

    /// Apply a message delivery from `id`, lazily binding an unbound event
    pub fn on_message(&mut self, id: ConnectionId, event: &str) -> Delivery {
        match self.active.get(event) {
            Some(&active) if active == id => Delivery::Active,
            Some(_) => Delivery::Standby,
            None => {
                self.active.insert(event.to_string(), id);
                METRICS.lazy_bind();
                Delivery::Active
            }
        }
    }

    /// Number of events currently bound
    pub fn bound_events(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ConnectionId {
        ConnectionId::from_raw(raw)
    }

    #[test]
    fn test_first_up_wins_and_later_is_standby() {
        let mut selector = ActiveSelector::new();

        let bound = selector.on_link_up(id(1), ["prices", "trades"]);
        assert_eq!(bound, vec!["prices", "trades"]);
        assert_eq!(selector.active_for("prices"), Some(id(1)));

        // Second eligible link does not steal the binding
        let bound = selector.on_link_up(id(2), ["prices"]);
        assert!(bound.is_empty());
        assert_eq!(selector.active_for("prices"), Some(id(1)));
    }

    #[test]
    fn test_down_of_active_reelects_in_order() {
        let mut selector = ActiveSelector::new();
        selector.on_link_up(id(1), ["prices"]);
        selector.on_link_up(id(2), ["prices"]);

        let changed = selector.on_link_down(id(1), |event| {
            assert_eq!(event, "prices");
            Some(id(2))
        });
        assert_eq!(changed, vec![("prices".to_string(), Some(id(2)))]);
        assert_eq!(selector.active_for("prices"), Some(id(2)));
    }

    #[test]
    fn test_down_with_no_candidate_clears_binding() {
        let mut selector = ActiveSelector::new();
        selector.on_link_up(id(1), ["prices"]);

        let changed = selector.on_link_down(id(1), |_| None);
        assert_eq!(changed, vec![("prices".to_string(), None)]);
        assert_eq!(selector.active_for("prices"), None);
        assert_eq!(selector.bound_events(), 0);
    }

    #[test]
    fn test_down_of_standby_changes_nothing() {
        let mut selector = ActiveSelector::new();
        selector.on_link_up(id(1), ["prices"]);
        selector.on_link_up(id(2), ["prices"]);

        let changed = selector.on_link_down(id(2), |_| panic!("no re-election expected"));
        assert!(changed.is_empty());
        assert_eq!(selector.active_for("prices"), Some(id(1)));
    }

    #[test]
    fn test_message_lazily_binds_unbound_event() {
        let mut selector = ActiveSelector::new();
        assert_eq!(selector.on_message(id(2), "prices"), Delivery::Active);
        assert_eq!(selector.active_for("prices"), Some(id(2)));
    }

    #[test]
    fn test_message_from_standby_is_dropped() {
        let mut selector = ActiveSelector::new();
        selector.on_link_up(id(1), ["prices"]);
        assert_eq!(selector.on_message(id(2), "prices"), Delivery::Standby);
        assert_eq!(selector.on_message(id(1), "prices"), Delivery::Active);
    }

    #[test]
    fn test_at_most_one_active_under_flapping() {
        // Storm of connects, disconnects and messages across three links;
        // after every step exactly zero or one link holds the binding.
        let mut selector = ActiveSelector::new();
        let links = [id(1), id(2), id(3)];

        for round in 0..100u64 {
            let a = links[(round % 3) as usize];
            let b = links[((round + 1) % 3) as usize];
            selector.on_link_up(a, ["prices"]);
            selector.on_message(b, "prices");
            selector.on_link_down(a, |_| Some(b));
            selector.on_link_down(b, |_| None);

            assert!(selector.bound_events() <= 1);
        }
    }

    #[test]
    fn test_bindings_are_per_event() {
        let mut selector = ActiveSelector::new();
        selector.on_link_up(id(1), ["prices"]);
        selector.on_link_up(id(2), ["trades"]);

        assert_eq!(selector.active_for("prices"), Some(id(1)));
        assert_eq!(selector.active_for("trades"), Some(id(2)));

        selector.on_link_down(id(1), |_| None);
        assert_eq!(selector.active_for("prices"), None);
        assert_eq!(selector.active_for("trades"), Some(id(2)));
    }
}
