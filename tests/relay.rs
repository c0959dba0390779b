//! End-to-end tests: a real listener, real WebSocket clients, and the REST
//! endpoints over HTTP.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use topic_relay::api;
use topic_relay::app_state::AppState;
use topic_relay::config::ConnectionSettings;
use topic_relay::domain::{BroadcastRequest, Topic};
use topic_relay::hub::{Hub, TopicSwitchPolicy};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> (SocketAddr, Hub) {
    let (hub, _task) = Hub::spawn(TopicSwitchPolicy::Replace, 64);
    let app = api::build_router(AppState::new(hub.clone(), ConnectionSettings::default()));
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    (addr, hub)
}

async fn connect(addr: SocketAddr) -> Client {
    let Ok((client, _)) = connect_async(format!("ws://{addr}/ws")).await else {
        panic!("websocket handshake");
    };
    client
}

async fn send_request(client: &mut Client, event: &str, topic: &str) {
    let body = serde_json::json!({ "event": event, "topic": topic }).to_string();
    if client.send(Message::text(body)).await.is_err() {
        panic!("send request");
    }
}

/// Next text frame, skipping pings.
async fn next_text(client: &mut Client) -> String {
    loop {
        let Ok(Some(Ok(message))) =
            tokio::time::timeout(Duration::from_secs(5), client.next()).await
        else {
            panic!("expected a frame");
        };
        match message {
            Message::Text(text) => return text.as_str().to_string(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Waits until the hub reports `topic` with exactly `count` subscribers.
async fn wait_for_subscribers(hub: &Hub, topic: &str, count: usize) {
    for _ in 0..200 {
        let Ok(snapshot) = hub.snapshot().await else {
            panic!("hub stopped");
        };
        if snapshot.members(topic).len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("topic {topic} never reached {count} subscribers");
}

fn topic(name: &str) -> Topic {
    let Ok(t) = Topic::new(name) else {
        panic!("valid topic");
    };
    t
}

#[tokio::test]
async fn subscribed_clients_receive_topic_broadcasts() {
    let (addr, hub) = start().await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    let mut bystander = connect(addr).await;

    send_request(&mut first, "subscribe", "public/trades/XRPPHP").await;
    send_request(&mut second, "subscribe", "public/trades/xrpphp").await;
    send_request(&mut bystander, "subscribe", "private/orders").await;
    wait_for_subscribers(&hub, "trades", 2).await;
    wait_for_subscribers(&hub, "orders", 1).await;

    for payload in [r#"{"n":1}"#, r#"{"n":2}"#] {
        if hub.broadcast(BroadcastRequest::to_topic(topic("trades"), payload)).await.is_err() {
            panic!("hub stopped");
        }
    }

    for client in [&mut first, &mut second] {
        assert_eq!(next_text(client).await, r#"{"n":1}"#);
        assert_eq!(next_text(client).await, r#"{"n":2}"#);
    }
    if hub.broadcast(BroadcastRequest::to_topic(topic("orders"), "mine")).await.is_err() {
        panic!("hub stopped");
    }
    // Only the orders payload reaches the bystander.
    assert_eq!(next_text(&mut bystander).await, "mine");
}

#[tokio::test]
async fn unsupported_pair_is_rejected() {
    let (addr, hub) = start().await;
    let mut client = connect(addr).await;

    send_request(&mut client, "subscribe", "public/trades/BTCUSD").await;
    let Ok(reply) = serde_json::from_str::<serde_json::Value>(&next_text(&mut client).await) else {
        panic!("rejection is JSON");
    };
    assert_eq!(
        reply,
        serde_json::json!({
            "event": "trades",
            "success": false,
            "reason": "Currency pair is not supported",
        })
    );
    let Ok(snapshot) = hub.snapshot().await else {
        panic!("hub stopped");
    };
    assert!(snapshot.members("trades").is_empty());
}

#[tokio::test]
async fn closing_client_leaves_every_topic() {
    let (addr, hub) = start().await;
    let mut client = connect(addr).await;

    send_request(&mut client, "subscribe", "private/orders").await;
    wait_for_subscribers(&hub, "orders", 1).await;

    if client.close(None).await.is_err() {
        panic!("close");
    }
    wait_for_subscribers(&hub, "orders", 0).await;
}

#[tokio::test]
async fn rest_endpoints_report_state() {
    let (addr, hub) = start().await;
    let mut client = connect(addr).await;
    send_request(&mut client, "subscribe", "private/orders").await;
    wait_for_subscribers(&hub, "orders", 1).await;

    let Ok(health) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("health request");
    };
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    let Ok(response) = reqwest::get(format!("http://{addr}/topics")).await else {
        panic!("topics request");
    };
    let Ok(body) = response.json::<serde_json::Value>().await else {
        panic!("topics body");
    };
    assert_eq!(
        body.get("topics"),
        Some(&serde_json::json!([{ "topic": "orders", "subscribers": 1 }]))
    );
    assert_eq!(body.get("connections"), Some(&serde_json::json!(1)));
}
