//! End-to-end tests for the WebSocket event push.
//!
//! A real server is bound to an ephemeral port and observed through a
//! `tokio-tungstenite` client.

mod common;

use std::time::Duration;

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(addr: std::net::SocketAddr) -> Client {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws"))
        .await
        .unwrap();
    socket
}

/// Next text frame as JSON, skipping control frames.
async fn next_event(socket: &mut Client) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for an event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Wait until the hub has `n` observers.
async fn wait_for_observers(app: &common::TestApp, n: usize) {
    for _ in 0..100 {
        if app.state.hub.observer_count().await == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} observers");
}

// ---------------------------------------------------------------------------
// Test: observer receives jobCreated then jobResolved
// ---------------------------------------------------------------------------

#[tokio::test]
async fn observer_receives_created_then_resolved() {
    let app = common::build_test_app(0).await;
    let addr = common::serve(&app).await;
    let mut socket = connect(addr).await;
    wait_for_observers(&app, 1).await;

    let created = common::post(app.router.clone(), "/api/v1/jobs").await;
    let id = common::body_json(created).await["data"]["id"].clone();

    let first = next_event(&mut socket).await;
    assert_eq!(first["type"], "jobCreated");
    assert_eq!(first["job"]["id"], id);
    assert_eq!(first["job"]["status"], "pending");

    let second = next_event(&mut socket).await;
    assert_eq!(second["type"], "jobResolved");
    assert_eq!(second["job"]["id"], id);
    assert_eq!(second["job"]["result"], common::IMAGE_URL);
}

// ---------------------------------------------------------------------------
// Test: every connected observer gets the same events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_fan_out_to_all_observers() {
    let app = common::build_test_app(300).await;
    let addr = common::serve(&app).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_observers(&app, 2).await;

    common::post(app.router.clone(), "/api/v1/jobs").await;

    let from_a = next_event(&mut a).await;
    let from_b = next_event(&mut b).await;
    assert_eq!(from_a, from_b);
    assert_eq!(from_a["type"], "jobCreated");
}

// ---------------------------------------------------------------------------
// Test: a closed connection is detached and does not disturb publishing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closed_connection_is_detached() {
    let app = common::build_test_app(300).await;
    let addr = common::serve(&app).await;
    let mut staying = connect(addr).await;
    let mut leaving = connect(addr).await;
    wait_for_observers(&app, 2).await;

    leaving.close(None).await.unwrap();
    drop(leaving);
    wait_for_observers(&app, 1).await;

    common::post(app.router.clone(), "/api/v1/jobs").await;
    assert_eq!(next_event(&mut staying).await["type"], "jobCreated");
}

// ---------------------------------------------------------------------------
// Test: closing the hub ends the connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hub_close_all_ends_connections() {
    let app = common::build_test_app(300).await;
    let addr = common::serve(&app).await;
    let mut socket = connect(addr).await;
    wait_for_observers(&app, 1).await;

    app.state.hub.close_all().await;

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "connection should close after close_all");
}
