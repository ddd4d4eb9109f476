//! # Drone WebSocket Server
//!
//! Real-time WebSocket fan-out of drone and mission updates to dashboard
//! sessions. Supports:
//! - A global topic every client receives
//! - Per-user topics joined with `Subscribe`
//! - Best-effort delivery: a disconnected or lagging client misses events
//!
//! ## Protocol
//!
//! Messages are JSON-encoded using the types from `drone_core::events`:
//! - Server → Client: `ServerMessage`
//! - Client → Server: `ClientMessage`

pub mod error;
pub mod hub;

pub use error::{WsError, WsResult};
pub use hub::{ClientInfo, HubEvent, WebSocketHub};

use drone_core::{ClientMessage, ServerMessage};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSender = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Start the WebSocket server
pub async fn start_server(hub: Arc<WebSocketHub>, port: u16) -> WsResult<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| WsError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!("🔌 WebSocket server listening on ws://{}", addr);
    serve(hub, listener).await
}

/// Accept connections from an already bound listener
pub async fn serve(hub: Arc<WebSocketHub>, listener: TcpListener) -> WsResult<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = hub.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(hub, stream, addr).await {
                        error!("WebSocket connection error from {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept WebSocket connection: {}", e);
            }
        }
    }
}

async fn send(hub: &WebSocketHub, sender: &mut WsSender, msg: &ServerMessage) -> WsResult<()> {
    let json = serde_json::to_string(msg)?;
    sender.send(Message::Text(json.into())).await?;
    hub.record_sent();
    Ok(())
}

/// Handle a single WebSocket connection
async fn handle_connection(
    hub: Arc<WebSocketHub>,
    stream: TcpStream,
    addr: SocketAddr,
) -> WsResult<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Generate client ID
    let client_id = Uuid::new_v4();
    info!("🔗 WebSocket client {} connected from {}", client_id, addr);

    // Register client and get broadcast receiver
    let mut broadcast_rx = hub.register_client(client_id);

    let greeting = ServerMessage::Connected {
        client_id: client_id.to_string(),
    };
    if let Err(e) = send(&hub, &mut ws_sender, &greeting).await {
        hub.unregister_client(client_id);
        return Err(e);
    }

    // Spawn task to handle incoming messages from client
    let hub_clone = hub.clone();
    let mut incoming_handle = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    hub_clone.record_received();
                    if let Err(e) = handle_client_message(&hub_clone, client_id, &text) {
                        warn!("Error handling client message: {}", e);
                    }
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Received ping from {}", client_id);
                }
                Ok(Message::Close(_)) => {
                    info!("Client {} sent close frame", client_id);
                    break;
                }
                Ok(Message::Binary(_)) => {
                    warn!("Received unexpected binary message from {}", client_id);
                }
                Err(e) => {
                    error!("Error receiving message from {}: {}", client_id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Forward matching events to this client
    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                match result {
                    Ok(published) => {
                        if !hub.wants(client_id, &published.topic) {
                            continue;
                        }
                        let msg = ServerMessage::Event {
                            topic: published.topic.to_string(),
                            event: published.event,
                        };
                        if let Err(e) = send(&hub, &mut ws_sender, &msg).await {
                            error!("Failed to send to client {}: {}", client_id, e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} messages, dropping", client_id, n);
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcast channel closed");
                        break;
                    }
                }
            }
            // Client disconnected
            _ = &mut incoming_handle => break,
        }
    }

    // Cleanup
    incoming_handle.abort();
    hub.unregister_client(client_id);
    info!("🔌 WebSocket client {} disconnected", client_id);

    Ok(())
}

/// Handle a message from a client
fn handle_client_message(hub: &WebSocketHub, client_id: Uuid, text: &str) -> WsResult<()> {
    let msg: ClientMessage =
        serde_json::from_str(text).map_err(|e| WsError::InvalidMessage(e.to_string()))?;

    match msg {
        ClientMessage::Subscribe { user_id } => {
            debug!("Client {} subscribing to {}", client_id, user_id);
            hub.subscribe(client_id, user_id);
        }
        ClientMessage::Unsubscribe { user_id } => {
            debug!("Client {} unsubscribing from {}", client_id, user_id);
            hub.unsubscribe(client_id, &user_id);
        }
        ClientMessage::Pong { timestamp } => {
            debug!("Client {} pong: {}", client_id, timestamp);
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::{Drone, Event, EventKind, EventPublisher, Topic, UserId};
    use std::time::Duration;
    use tokio_tungstenite::connect_async;

    #[test]
    fn test_client_message_handling() {
        let hub = WebSocketHub::new();
        let id = Uuid::new_v4();
        let _rx = hub.register_client(id);

        handle_client_message(&hub, id, r#"{"type":"Subscribe","payload":{"user_id":"alice"}}"#)
            .unwrap();
        assert!(hub.is_subscribed(id, &UserId::new("alice")));

        handle_client_message(&hub, id, r#"{"type":"Unsubscribe","payload":{"user_id":"alice"}}"#)
            .unwrap();
        assert!(!hub.is_subscribed(id, &UserId::new("alice")));

        assert!(matches!(
            handle_client_message(&hub, id, "not json"),
            Err(WsError::InvalidMessage(_))
        ));
    }

    async fn next_server_message<S>(ws: &mut S) -> ServerMessage
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for server message")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_topic_scoped_delivery() {
        let hub = Arc::new(WebSocketHub::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve(hub.clone(), listener));

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{}", port))
            .await
            .unwrap();

        let client_id = match next_server_message(&mut ws).await {
            ServerMessage::Connected { client_id } => client_id.parse::<Uuid>().unwrap(),
            other => panic!("expected greeting, got {:?}", other),
        };

        let subscribe = r#"{"type":"Subscribe","payload":{"user_id":"alice"}}"#;
        ws.send(Message::Text(subscribe.to_string().into())).await.unwrap();
        for _ in 0..100 {
            if hub.is_subscribed(client_id, &UserId::new("alice")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(hub.is_subscribed(client_id, &UserId::new("alice")));

        // Another user's event is filtered out, alice's arrives
        hub.publish(
            &Topic::for_user("bob"),
            Event::drone_update(Drone::new("DRN-B", "bob", "Scout")),
        );
        hub.publish(
            &Topic::for_user("alice"),
            Event::drone_update(Drone::new("DRN-A", "alice", "Scout")),
        );

        match next_server_message(&mut ws).await {
            ServerMessage::Event { topic, event } => {
                assert_eq!(topic, "user_alice");
                assert_eq!(event.kind, EventKind::DroneUpdate);
                assert_eq!(event.owner().as_str(), "alice");
            }
            other => panic!("expected event, got {:?}", other),
        }

        ws.close(None).await.unwrap();
        for _ in 0..100 {
            if hub.client_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hub.client_count(), 0);
    }
}
