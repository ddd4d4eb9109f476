//! # Drone Sim - Fleet Movement Simulation
//!
//! Moves drones along their mission flight paths on a fixed tick, drains
//! their batteries, sequences waypoints and completes missions. Every change
//! is persisted through `drone-db` and announced through an
//! [`EventPublisher`](drone_core::EventPublisher).
//!
//! ## Features
//! - Great-circle movement with a capped per-tick step
//! - Weight- and weather-dependent battery drain
//! - Manual-override pause window per drone
//! - Deterministic ticks for tests via [`SimulationEngine::tick`]

pub mod battery;
pub mod engine;
pub mod events;
pub mod gate;
pub mod rng;
pub mod state;

pub use battery::BatteryModel;
pub use engine::{
    ControlResponse, SimConfig, SimulationEngine, SimulationStatus, TickOutcome, TickReport,
};
pub use events::{EventBus, TopicEvent};
pub use gate::OverrideGate;
pub use rng::{FixedRandom, RandomSource, SeededRandom};
pub use state::{ShadowDrone, ShadowStore};
