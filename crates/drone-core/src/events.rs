//! Event types for the drone fleet system
//!
//! These events carry drone and mission state changes from the simulation
//! engine (and the manual update path) to dashboard sessions over WebSocket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Drone, Mission, UserId};

/// Event envelope for all state-change notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn drone_update(drone: Drone) -> Self {
        Self::new(EventKind::DroneUpdate, EventPayload::Drone(drone))
    }

    pub fn mission_update(mission: Mission) -> Self {
        Self::new(EventKind::MissionUpdate, EventPayload::Mission(mission))
    }

    pub fn mission_progress(mission: Mission) -> Self {
        Self::new(EventKind::MissionProgress, EventPayload::Mission(mission))
    }

    pub fn mission_completed(mission: Mission) -> Self {
        Self::new(EventKind::MissionCompleted, EventPayload::Mission(mission))
    }

    /// Owner of the entity carried by this event
    pub fn owner(&self) -> &UserId {
        match &self.payload {
            EventPayload::Drone(drone) => &drone.owner_id,
            EventPayload::Mission(mission) => &mission.owner_id,
        }
    }
}

/// Kind of event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    DroneUpdate,
    MissionUpdate,
    MissionProgress,
    MissionCompleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DroneUpdate => "drone-update",
            EventKind::MissionUpdate => "mission-update",
            EventKind::MissionProgress => "mission-progress",
            EventKind::MissionCompleted => "mission-completed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payload: the full current representation of the entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    Drone(Drone),
    Mission(Mission),
}

// ============================================================================
// TOPICS & PUBLISHING
// ============================================================================

/// Channel an event is published on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every connected session
    Global,
    /// Sessions subscribed to one user's updates
    User(UserId),
}

impl Topic {
    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Topic::User(user_id.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Global => f.write_str("global"),
            Topic::User(user_id) => write!(f, "user_{}", user_id),
        }
    }
}

/// How the publishing side picks a topic for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishMode {
    /// Topic derived from the owner of the drone or mission
    #[default]
    PerOwner,
    /// Everything goes to the global topic
    Global,
}

impl PublishMode {
    pub fn topic_for(&self, event: &Event) -> Topic {
        match self {
            PublishMode::PerOwner => Topic::User(event.owner().clone()),
            PublishMode::Global => Topic::Global,
        }
    }
}

/// Fire-and-forget sink for state-change events.
///
/// Delivery is best-effort: publishing never fails from the caller's view and
/// a subscriber that is not connected simply misses the event.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &Topic, event: Event);
}

// ============================================================================
// WEBSOCKET MESSAGE TYPES
// ============================================================================

/// Message sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Greeting sent once on connection
    Connected { client_id: String },
    /// Event on a topic the client receives
    Event { topic: String, event: Event },
    /// Error message
    Error { code: String, message: String },
    /// Heartbeat/ping
    Ping { timestamp: i64 },
}

/// Message sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Join a user's topic
    Subscribe { user_id: UserId },
    /// Leave a user's topic
    Unsubscribe { user_id: UserId },
    /// Heartbeat/pong
    Pong { timestamp: i64 },
}

// ============================================================================
// TESTS
// ============================================================================
