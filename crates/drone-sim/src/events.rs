//! In-process event bus

use drone_core::{Event, EventPublisher, Topic};

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// An event together with the topic it was published on
#[derive(Debug, Clone)]
pub struct TopicEvent {
    pub topic: Topic,
    pub event: Event,
}

/// Event bus for distributing events inside one process
pub struct EventBus {
    /// Broadcast sender for events
    sender: broadcast::Sender<TopicEvent>,
    /// Event history (last N events)
    history: Arc<RwLock<Vec<TopicEvent>>>,
    /// Maximum history size
    max_history: usize,
    /// Event counter
    event_count: Arc<RwLock<u64>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            sender,
            history: Arc::new(RwLock::new(Vec::with_capacity(capacity))),
            max_history: capacity,
            event_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<TopicEvent> {
        self.sender.subscribe()
    }

    /// Get recent events, oldest first
    pub fn get_recent(&self, count: usize) -> Vec<TopicEvent> {
        let history = self.history.read();
        let start = history.len().saturating_sub(count);
        history[start..].to_vec()
    }

    /// Get event count
    pub fn get_event_count(&self) -> u64 {
        *self.event_count.read()
    }

    /// Clear history
    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    /// Get subscriber count (approximate)
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, topic: &Topic, event: Event) {
        let published = TopicEvent {
            topic: topic.clone(),
            event,
        };

        {
            let mut history = self.history.write();
            history.push(published.clone());
            if history.len() > self.max_history {
                history.remove(0);
            }
        }

        *self.event_count.write() += 1;

        // No subscribers is fine
        let _ = self.sender.send(published);

        debug!("Event published on {}, total: {}", topic, self.get_event_count());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            history: self.history.clone(),
            max_history: self.max_history,
            event_count: self.event_count.clone(),
        }
    }
}
