//! WebSocket connection hub
//!
//! Tracks connected clients and the user topics each one joined, and fans
//! published events out to them through a broadcast channel.

use drone_core::{Event, EventPublisher, Topic, UserId};
use drone_telemetry::MetricsCollector;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

/// Broadcast channel capacity
const BROADCAST_CAPACITY: usize = 1024;

/// An event on its way to the clients of a topic
#[derive(Debug, Clone)]
pub struct HubEvent {
    pub topic: Topic,
    pub event: Event,
}

/// WebSocket connection hub
pub struct WebSocketHub {
    /// Broadcast sender for events
    broadcast_tx: broadcast::Sender<HubEvent>,
    /// Connected clients
    clients: DashMap<Uuid, ClientState>,
    /// Total message count
    message_count: AtomicUsize,
    metrics: Option<Arc<MetricsCollector>>,
}

/// State for a connected client
#[derive(Debug)]
struct ClientState {
    /// Joined user topics; global events are always delivered
    topics: HashSet<UserId>,
    /// Connection timestamp
    connected_at: DateTime<Utc>,
}

/// Summary of a connected client
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClientInfo {
    pub client_id: Uuid,
    pub topics: Vec<String>,
    pub connected_at: DateTime<Utc>,
}

impl WebSocketHub {
    /// Create a new WebSocket hub
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            broadcast_tx,
            clients: DashMap::new(),
            message_count: AtomicUsize::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a new client and return a broadcast receiver
    pub fn register_client(&self, client_id: Uuid) -> broadcast::Receiver<HubEvent> {
        let state = ClientState {
            topics: HashSet::new(),
            connected_at: Utc::now(),
        };

        self.clients.insert(client_id, state);
        info!("Client {} registered ({} total)", client_id, self.clients.len());
        self.update_connection_gauge();

        self.broadcast_tx.subscribe()
    }

    /// Unregister a client
    pub fn unregister_client(&self, client_id: Uuid) {
        self.clients.remove(&client_id);
        info!("Client {} unregistered ({} remaining)", client_id, self.clients.len());
        self.update_connection_gauge();
    }

    /// Get number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Join the topic of `user_id`
    pub fn subscribe(&self, client_id: Uuid, user_id: UserId) {
        if let Some(mut client) = self.clients.get_mut(&client_id) {
            debug!("Client {} joined {}", client_id, Topic::User(user_id.clone()));
            client.topics.insert(user_id);
        }
    }

    /// Leave the topic of `user_id`
    pub fn unsubscribe(&self, client_id: Uuid, user_id: &UserId) {
        if let Some(mut client) = self.clients.get_mut(&client_id) {
            client.topics.remove(user_id);
            debug!("Client {} left user_{}", client_id, user_id);
        }
    }

    pub fn is_subscribed(&self, client_id: Uuid, user_id: &UserId) -> bool {
        self.clients
            .get(&client_id)
            .is_some_and(|client| client.topics.contains(user_id))
    }

    /// Whether `client_id` should receive events published on `topic`
    pub fn wants(&self, client_id: Uuid, topic: &Topic) -> bool {
        match topic {
            Topic::Global => self.clients.contains_key(&client_id),
            Topic::User(user_id) => self.is_subscribed(client_id, user_id),
        }
    }

    /// Get total messages broadcast
    pub fn message_count(&self) -> usize {
        self.message_count.load(Ordering::Relaxed)
    }

    /// Record a message written to a client socket
    pub fn record_sent(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_ws_sent();
        }
    }

    /// Record a message read from a client socket
    pub fn record_received(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_ws_received();
        }
    }

    /// Get all connected client IDs
    pub fn client_ids(&self) -> Vec<Uuid> {
        self.clients.iter().map(|r| *r.key()).collect()
    }

    /// Connected clients with their topics
    pub fn clients(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self
            .clients
            .iter()
            .map(|entry| {
                let mut topics: Vec<String> = entry
                    .topics
                    .iter()
                    .map(|u| Topic::User(u.clone()).to_string())
                    .collect();
                topics.sort();
                ClientInfo {
                    client_id: *entry.key(),
                    topics,
                    connected_at: entry.connected_at,
                }
            })
            .collect();
        clients.sort_by_key(|c| c.connected_at);
        clients
    }

    /// Check if a specific client is connected
    pub fn is_client_connected(&self, client_id: Uuid) -> bool {
        self.clients.contains_key(&client_id)
    }

    fn update_connection_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_ws_connections(self.clients.len());
        }
    }
}

impl EventPublisher for WebSocketHub {
    fn publish(&self, topic: &Topic, event: Event) {
        self.message_count.fetch_add(1, Ordering::Relaxed);

        // Send to broadcast channel (drops if no receivers)
        let _ = self.broadcast_tx.send(HubEvent {
            topic: topic.clone(),
            event,
        });
    }
}

impl Default for WebSocketHub {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::Drone;

    #[test]
    fn test_client_registration() {
        let hub = WebSocketHub::new();
        let id = Uuid::new_v4();

        let _rx = hub.register_client(id);
        assert_eq!(hub.client_count(), 1);
        assert!(hub.is_client_connected(id));

        hub.unregister_client(id);
        assert_eq!(hub.client_count(), 0);
        assert!(!hub.is_client_connected(id));
    }

    #[test]
    fn test_topic_subscriptions() {
        let hub = WebSocketHub::new();
        let id = Uuid::new_v4();
        let alice = UserId::new("alice");

        let _rx = hub.register_client(id);
        assert!(hub.wants(id, &Topic::Global));
        assert!(!hub.wants(id, &Topic::User(alice.clone())));

        hub.subscribe(id, alice.clone());
        assert!(hub.wants(id, &Topic::User(alice.clone())));
        assert!(!hub.wants(id, &Topic::for_user("bob")));
        assert_eq!(hub.clients()[0].topics, vec!["user_alice".to_string()]);

        hub.unsubscribe(id, &alice);
        assert!(!hub.wants(id, &Topic::User(alice)));
    }

    #[test]
    fn test_unknown_client_wants_nothing() {
        let hub = WebSocketHub::new();
        assert!(!hub.wants(Uuid::new_v4(), &Topic::Global));
    }

    #[tokio::test]
    async fn test_publish_message_count() {
        let hub = WebSocketHub::new();
        let mut rx = hub.register_client(Uuid::new_v4());

        assert_eq!(hub.message_count(), 0);

        let event = Event::drone_update(Drone::new("DRN-001", "alice", "Scout"));
        hub.publish(&Topic::for_user("alice"), event);

        assert_eq!(hub.message_count(), 1);
        let received = rx.try_recv().unwrap();
        assert_eq!(received.topic, Topic::for_user("alice"));
    }

    #[test]
    fn test_connection_metrics() {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let hub = WebSocketHub::new().with_metrics(metrics.clone());

        let _rx = hub.register_client(Uuid::new_v4());
        hub.record_sent();

        let export = metrics.export();
        assert!(export.contains("drone_fleet_ws_connections 1"));
        assert!(export.contains("drone_fleet_ws_messages_sent_total 1"));
    }
}
