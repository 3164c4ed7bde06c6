use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use jobsim_events::{NotificationHub, ObserverReceiver};

use crate::state::AppState;

/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is attached to the hub and managed by a
/// sender task plus the inbound loop on the current task.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Attaches an observer to the hub.
///   2. Spawns a sender task that forwards hub events and heartbeat pings.
///   3. Processes inbound frames on the current task until close.
///   4. Detaches the observer.
async fn handle_socket(socket: WebSocket, hub: Arc<NotificationHub>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let rx = hub.attach(conn_id.clone()).await;
    let (sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(forward_events(conn_id.clone(), rx, sink));

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(conn_id = %conn_id, "Pong received");
                }
                Some(Ok(_)) => {
                    // Observers are receive-only; inbound frames are ignored.
                }
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
            // Sink failed or the hub closed this observer.
            _ = &mut send_task => break,
        }
    }

    hub.detach(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Forward hub events as JSON text frames, pinging on a fixed interval.
///
/// Returns when the sink fails or the observer channel closes.
async fn forward_events(
    conn_id: String,
    mut rx: ObserverReceiver,
    mut sink: SplitSink<WebSocket, Message>,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately.
    heartbeat.tick().await;

    loop {
        let message = tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    tracing::debug!(conn_id = %conn_id, "Observer closed by hub");
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                };
                match event.to_json() {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        tracing::error!(conn_id = %conn_id, error = %e, "Failed to encode job event");
                        continue;
                    }
                }
            }
            _ = heartbeat.tick() => Message::Ping(Default::default()),
        };

        if sink.send(message).await.is_err() {
            tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
            return;
        }
    }
}
