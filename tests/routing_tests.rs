//! Emit routing and lifecycle integration tests

use serde_json::json;
use sockmux::transport::{MemoryConnector, MemoryHub};
use sockmux::{ChannelConfig, ChannelMultiplexer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const FEED_A: &str = "wss://feed-a";
const FEED_B: &str = "wss://feed-b";

fn emitter(endpoint: &str, events: &[&str]) -> ChannelConfig {
    ChannelConfig::new(
        endpoint,
        events.iter().map(|e| e.to_string()).collect(),
        vec![],
    )
}

/// Poll the connection snapshot until `endpoint` reports `state`
async fn wait_state(mux: &ChannelMultiplexer, endpoint: &str, state: &str) {
    for _ in 0..200 {
        let reached = mux
            .connections()
            .iter()
            .any(|c| c.endpoint == endpoint && c.state == state);
        if reached {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{} never reached state {}", endpoint, state);
}

/// Poll until the hub captured `count` frames on `endpoint`
async fn wait_sent(hub: &Arc<MemoryHub>, endpoint: &str, count: usize) {
    for _ in 0..200 {
        if hub.sent(endpoint).len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{} never captured {} sent frames", endpoint, count);
}

fn order_pair() -> (ChannelMultiplexer, Arc<MemoryHub>) {
    let connector = MemoryConnector::new();
    let hub = connector.hub();
    let mux = ChannelMultiplexer::new(
        vec![
            emitter(FEED_A, &["orders"]),
            emitter(FEED_B, &["orders"]),
        ],
        connector,
    )
    .unwrap();
    (mux, hub)
}

#[tokio::test]
async fn test_emit_routes_to_first_connected_in_registration_order() {
    let (mux, hub) = order_pair();
    wait_state(&mux, FEED_A, "connected").await;
    wait_state(&mux, FEED_B, "connected").await;

    mux.emit("orders", json!({"qty": 5}));
    wait_sent(&hub, FEED_A, 1).await;

    // Never broadcasts: only the first eligible connection is used
    assert_eq!(hub.sent(FEED_A).len(), 1);
    assert_eq!(hub.sent(FEED_A)[0], ("orders".to_string(), json!({"qty": 5})));
    assert!(hub.sent(FEED_B).is_empty());
}

#[tokio::test]
async fn test_emit_skips_disconnected_connections() {
    let (mux, hub) = order_pair();
    wait_state(&mux, FEED_A, "connected").await;
    wait_state(&mux, FEED_B, "connected").await;

    hub.drop_link(FEED_A);
    wait_state(&mux, FEED_A, "disconnected").await;

    mux.emit("orders", json!({"qty": 7}));
    wait_sent(&hub, FEED_B, 1).await;
    assert!(hub.sent(FEED_A).is_empty());
}

#[tokio::test]
async fn test_emit_respects_the_allow_list() {
    let connector = MemoryConnector::new();
    let hub = connector.hub();
    let mux = ChannelMultiplexer::new(
        vec![
            emitter(FEED_A, &["trades"]),
            emitter(FEED_B, &["orders"]),
        ],
        connector,
    )
    .unwrap();
    wait_state(&mux, FEED_A, "connected").await;
    wait_state(&mux, FEED_B, "connected").await;

    // feed-a is first but not permitted to emit orders
    mux.emit("orders", json!({"qty": 1}));
    wait_sent(&hub, FEED_B, 1).await;
    assert!(hub.sent(FEED_A).is_empty());
}

#[tokio::test]
async fn test_unroutable_emit_is_silent_to_the_caller() {
    let (mux, hub) = order_pair();
    wait_state(&mux, FEED_A, "connected").await;

    // No allow-list covers this event; nothing is sent, nothing panics
    mux.emit("uncovered", json!({}));
    mux.emit("", json!({}));

    // A routable emit afterwards still works, proving the loop survived
    mux.emit("orders", json!({"qty": 2}));
    wait_sent(&hub, FEED_A, 1).await;
    assert_eq!(hub.sent(FEED_A)[0].0, "orders");
}

#[tokio::test]
async fn test_connect_twice_does_not_duplicate_the_entry() {
    let (mux, _hub) = order_pair();
    wait_state(&mux, FEED_A, "connected").await;

    mux.connect(emitter(FEED_A, &["orders"]));
    mux.connect(emitter(FEED_A, &["orders"]));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(mux.connections().len(), 2);
    wait_state(&mux, FEED_A, "connected").await;
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (mux, hub) = order_pair();
    wait_state(&mux, FEED_A, "connected").await;

    mux.disconnect(FEED_A);
    wait_state(&mux, FEED_A, "disconnected").await;
    mux.disconnect(FEED_A);
    mux.disconnect("wss://never-registered");
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Entry persists for reconnection
    assert_eq!(mux.connections().len(), 2);
    assert!(!hub.is_connected(FEED_A));
}

#[tokio::test]
async fn test_disconnect_all_tears_down_every_link() {
    let (mux, hub) = order_pair();
    wait_state(&mux, FEED_A, "connected").await;
    wait_state(&mux, FEED_B, "connected").await;

    mux.disconnect_all();
    wait_state(&mux, FEED_A, "disconnected").await;
    wait_state(&mux, FEED_B, "disconnected").await;
    assert!(!hub.is_connected(FEED_A));
    assert!(!hub.is_connected(FEED_B));

    // Entries remain and can be reconnected
    mux.connect(emitter(FEED_A, &["orders"]));
    wait_state(&mux, FEED_A, "connected").await;
    assert_eq!(mux.connections().len(), 2);
}

#[tokio::test]
async fn test_credential_travels_with_the_connect_attempt() {
    let connector = MemoryConnector::new();
    let hub = connector.hub();

    let mut config = emitter(FEED_A, &["orders"]);
    config.credential = Some(HashMap::from([(
        "token".to_string(),
        "secret".to_string(),
    )]));

    let _mux = ChannelMultiplexer::new(vec![config], connector).unwrap();

    let credential = hub.credential(FEED_A).expect("credential recorded");
    assert_eq!(credential.get("token").unwrap(), "secret");
}

#[tokio::test]
async fn test_connect_error_leaves_the_entry_disconnected() {
    let (mux, hub) = order_pair();
    wait_state(&mux, FEED_A, "connected").await;

    hub.drop_link(FEED_A);
    wait_state(&mux, FEED_A, "disconnected").await;

    // Reconnect attempt is refused by the remote side
    hub.refuse(FEED_A, "handshake rejected");
    mux.connect(emitter(FEED_A, &["orders"]));
    tokio::time::sleep(Duration::from_millis(50)).await;
    wait_state(&mux, FEED_A, "disconnected").await;
    assert!(!hub.is_connected(FEED_A));

    // Once allowed again, the next attempt succeeds
    hub.allow(FEED_A);
    mux.connect(emitter(FEED_A, &["orders"]));
    wait_state(&mux, FEED_A, "connected").await;
}
