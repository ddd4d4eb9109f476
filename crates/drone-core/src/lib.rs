//! # Drone Core
//!
//! Core domain models and types for the Drone Fleet Simulation service.
//! This crate provides shared types used across the store, the simulation
//! engine, the real-time fan-out and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod error;
pub mod events;
pub mod geo;

pub use error::{CoreError, CoreResult};
pub use events::*;
pub use geo::*;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Unique identifier for a drone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DroneId(pub String);

impl DroneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DroneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DroneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DroneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the user owning drones and missions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a mission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissionId(pub Uuid);

impl MissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// DRONE MODELS
// ============================================================================

/// Operational status of a drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DroneStatus {
    /// Ready for a mission, idling on standby power
    #[default]
    Available,
    /// Flying an assigned mission
    InMission,
    /// Grounded for maintenance
    Maintenance,
    /// Landed and charging (entered automatically on low battery)
    Charging,
    /// Lost contact
    Offline,
    /// Reported a fault
    Error,
}

impl DroneStatus {
    /// Statuses the simulation engine picks up on start
    pub const SIMULATED: [DroneStatus; 2] = [DroneStatus::Available, DroneStatus::InMission];

    /// Whether a drone in this status is driven by the simulation
    pub fn is_simulated(&self) -> bool {
        matches!(self, DroneStatus::Available | DroneStatus::InMission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DroneStatus::Available => "available",
            DroneStatus::InMission => "in-mission",
            DroneStatus::Maintenance => "maintenance",
            DroneStatus::Charging => "charging",
            DroneStatus::Offline => "offline",
            DroneStatus::Error => "error",
        }
    }
}

impl fmt::Display for DroneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight class derived from the drone model; heavy airframes drain faster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightClass {
    Standard,
    Heavy,
}

/// Weather resistance rating of an airframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeatherResistance {
    None,
    #[default]
    Light,
    Moderate,
    Heavy,
}

/// Static airframe capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneSpecifications {
    /// Maximum altitude in meters
    pub max_altitude: f64,
    /// Maximum speed in m/s
    pub max_speed: f64,
    pub battery_capacity_mah: u32,
    pub max_flight_time_min: u32,
    pub payload: String,
    pub weather_resistance: WeatherResistance,
}

impl Default for DroneSpecifications {
    fn default() -> Self {
        Self {
            max_altitude: 500.0,
            max_speed: 15.0,
            battery_capacity_mah: 5000,
            max_flight_time_min: 30,
            payload: "Camera".to_string(),
            weather_resistance: WeatherResistance::default(),
        }
    }
}

/// Informational telemetry, regenerated on every simulated update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Altitude in meters
    pub altitude: f64,
    /// Ground speed in m/s
    pub speed: f64,
    /// Heading in degrees (0-360)
    pub heading: f64,
    /// Internal temperature in Celsius
    pub temperature: f64,
    /// Signal strength percentage (0-100)
    pub signal_strength: f64,
    /// GPS accuracy in meters
    pub gps_accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            altitude: 0.0,
            speed: 0.0,
            heading: 0.0,
            temperature: 20.0,
            signal_strength: 100.0,
            gps_accuracy: 3.0,
            timestamp: Utc::now(),
        }
    }
}

/// A drone document as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    pub id: DroneId,
    pub owner_id: UserId,
    pub name: String,
    pub model: String,
    pub serial_number: String,
    pub status: DroneStatus,
    /// Battery percentage (0-100)
    pub battery: f64,
    pub location: Option<GeoPosition>,
    pub telemetry: Telemetry,
    #[serde(default)]
    pub specifications: DroneSpecifications,
    pub current_mission: Option<MissionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Drone {
    pub fn new(
        id: impl Into<DroneId>,
        owner_id: impl Into<UserId>,
        model: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            name: id.0.clone(),
            serial_number: id.0.clone(),
            id,
            owner_id: owner_id.into(),
            model: model.into(),
            status: DroneStatus::default(),
            battery: 100.0,
            location: None,
            telemetry: Telemetry::default(),
            specifications: DroneSpecifications::default(),
            current_mission: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_location(mut self, location: GeoPosition) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_battery(mut self, battery: f64) -> Self {
        self.battery = battery.clamp(0.0, 100.0);
        self
    }

    pub fn with_status(mut self, status: DroneStatus) -> Self {
        self.status = status;
        self
    }

    /// Heavy-lift models drain their battery faster
    pub fn weight_class(&self) -> WeightClass {
        if self.model.to_lowercase().contains("heavy") {
            WeightClass::Heavy
        } else {
            WeightClass::Standard
        }
    }

    /// Check if drone battery is at or below `threshold` percent
    pub fn is_battery_low(&self, threshold: f64) -> bool {
        self.battery <= threshold
    }
}

/// Partial update of a drone document. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DronePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<DroneStatus>,
    #[serde(default)]
    pub battery: Option<f64>,
    #[serde(default)]
    pub location: Option<GeoPosition>,
    #[serde(default)]
    pub telemetry: Option<Telemetry>,
}

impl DronePatch {
    pub fn status(status: DroneStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reject values a drone document may never hold
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(battery) = self.battery {
            if !(0.0..=100.0).contains(&battery) {
                return Err(CoreError::InvalidBattery(battery));
            }
        }
        if let Some(location) = &self.location {
            if !location.is_valid() {
                return Err(CoreError::invalid_position(location.latitude, location.longitude));
            }
        }
        Ok(())
    }

    /// Merge the patch into `drone`
    pub fn apply(&self, drone: &mut Drone) {
        if let Some(name) = &self.name {
            drone.name = name.clone();
        }
        if let Some(model) = &self.model {
            drone.model = model.clone();
        }
        if let Some(status) = self.status {
            drone.status = status;
        }
        if let Some(battery) = self.battery {
            drone.battery = battery.clamp(0.0, 100.0);
        }
        if let Some(location) = self.location {
            drone.location = Some(location);
        }
        if let Some(telemetry) = &self.telemetry {
            drone.telemetry = telemetry.clone();
        }
        drone.updated_at = Utc::now();
    }
}

// ============================================================================
// MISSION MODELS
// ============================================================================

/// A single target point of a flight path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in meters
    pub altitude: f64,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    pub fn position(&self) -> GeoPosition {
        GeoPosition::new(self.latitude, self.longitude, self.altitude)
    }
}

/// Mission status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissionStatus {
    #[default]
    Planned,
    InProgress,
    Paused,
    Completed,
    Aborted,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Planned => "planned",
            MissionStatus::InProgress => "in-progress",
            MissionStatus::Paused => "paused",
            MissionStatus::Completed => "completed",
            MissionStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a mission along its flight path
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MissionProgress {
    /// Index of the waypoint currently being flown to
    pub current_waypoint: usize,
    /// Derived from `current_waypoint` over the flight path length
    pub percent_complete: f64,
    pub distance_covered_m: f64,
}

impl MissionProgress {
    pub fn at_waypoint(current_waypoint: usize, waypoint_count: usize, distance_covered_m: f64) -> Self {
        let percent_complete = if waypoint_count == 0 {
            0.0
        } else {
            (current_waypoint as f64 / waypoint_count as f64 * 100.0).min(100.0)
        };
        Self {
            current_waypoint,
            percent_complete,
            distance_covered_m,
        }
    }
}

/// Mission-specific flight parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissionConfig {
    pub flight_altitude: f64,
    pub overlap_percentage: f64,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            flight_altitude: 50.0,
            overlap_percentage: 70.0,
        }
    }
}

/// A mission flown by at most one drone along an ordered flight path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub owner_id: UserId,
    pub drone_id: Option<DroneId>,
    pub name: String,
    pub description: Option<String>,
    pub status: MissionStatus,
    pub flight_path: Vec<Waypoint>,
    #[serde(default)]
    pub progress: MissionProgress,
    #[serde(default)]
    pub config: MissionConfig,
    pub start_time: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    pub fn new(name: impl Into<String>, owner_id: impl Into<UserId>) -> Self {
        let now = Utc::now();
        Self {
            id: MissionId::new(),
            owner_id: owner_id.into(),
            drone_id: None,
            name: name.into(),
            description: None,
            status: MissionStatus::default(),
            flight_path: Vec::new(),
            progress: MissionProgress::default(),
            config: MissionConfig::default(),
            start_time: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a waypoint to the flight path
    pub fn add_waypoint(&mut self, waypoint: Waypoint) {
        self.flight_path.push(waypoint);
        self.updated_at = Utc::now();
    }

    /// Assign the drone flying this mission
    pub fn assign_drone(&mut self, drone_id: DroneId) {
        self.drone_id = Some(drone_id);
        self.updated_at = Utc::now();
    }

    /// Start the mission
    pub fn start(&mut self) {
        let now = Utc::now();
        self.status = MissionStatus::InProgress;
        self.start_time = Some(now);
        self.updated_at = now;
    }

    /// Complete the mission
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = MissionStatus::Completed;
        self.completed_at = Some(at);
        self.progress.current_waypoint = self.flight_path.len();
        self.progress.percent_complete = 100.0;
        self.updated_at = at;
    }

    /// Operator status change. Completion is left to the simulation.
    pub fn transition(&mut self, to: MissionStatus) -> CoreResult<()> {
        use MissionStatus::*;
        match (self.status, to) {
            (Planned, InProgress) => self.start(),
            (InProgress, Paused) | (Paused, InProgress) | (Planned | InProgress | Paused, Aborted) => {
                self.status = to;
                self.updated_at = Utc::now();
            }
            (from, to) => {
                return Err(CoreError::InvalidStateTransition {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Check that the flight path is flyable
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(wp) = self.flight_path.iter().find(|wp| !wp.position().is_valid()) {
            return Err(CoreError::invalid_position(wp.latitude, wp.longitude));
        }
        Ok(())
    }

    pub fn is_active_for(&self, drone_id: &DroneId) -> bool {
        self.status == MissionStatus::InProgress && self.drone_id.as_ref() == Some(drone_id)
    }

    /// Total flight path length in meters
    pub fn total_distance_m(&self) -> f64 {
        self.flight_path
            .windows(2)
            .map(|w| w[0].position().distance_to(&w[1].position()))
            .sum()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drone_creation() {
        let drone = Drone::new("DRN-001", "user-1", "Falcon X");
        assert_eq!(drone.id.as_str(), "DRN-001");
        assert_eq!(drone.owner_id.as_str(), "user-1");
        assert_eq!(drone.status, DroneStatus::Available);
        assert_eq!(drone.battery, 100.0);
        assert!(drone.location.is_none());
    }

    #[test]
    fn test_weight_class_from_model() {
        assert_eq!(Drone::new("a", "u", "HeavyLift 9").weight_class(), WeightClass::Heavy);
        assert_eq!(Drone::new("b", "u", "cargo-HEAVY").weight_class(), WeightClass::Heavy);
        assert_eq!(Drone::new("c", "u", "Scout").weight_class(), WeightClass::Standard);
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&DroneStatus::InMission).unwrap();
        assert_eq!(json, "\"in-mission\"");
        let parsed: MissionStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(parsed, MissionStatus::InProgress);
        assert!(DroneStatus::Available.is_simulated());
        assert!(!DroneStatus::Charging.is_simulated());
    }

    #[test]
    fn test_patch_validation() {
        let bad_battery = DronePatch {
            battery: Some(120.0),
            ..Default::default()
        };
        assert!(matches!(bad_battery.validate(), Err(CoreError::InvalidBattery(_))));

        let bad_location = DronePatch {
            location: Some(GeoPosition::new(95.0, 0.0, 0.0)),
            ..Default::default()
        };
        assert!(bad_location.validate().is_err());
        assert!(DronePatch::status(DroneStatus::Maintenance).validate().is_ok());
    }

    #[test]
    fn test_patch_apply() {
        let mut drone = Drone::new("DRN-001", "user-1", "Scout");
        let patch = DronePatch {
            battery: Some(42.5),
            status: Some(DroneStatus::Maintenance),
            ..Default::default()
        };
        patch.apply(&mut drone);

        assert_eq!(drone.battery, 42.5);
        assert_eq!(drone.status, DroneStatus::Maintenance);
        assert_eq!(drone.model, "Scout");
        assert!(DronePatch::default().is_empty());
    }

    #[test]
    fn test_mission_lifecycle() {
        let drone_id = DroneId::new("DRN-001");
        let mut mission = Mission::new("Survey", "user-1");
        mission.add_waypoint(Waypoint::new(40.785091, -73.968285, 50.0));
        mission.add_waypoint(Waypoint::new(40.758895, -73.985131, 50.0));
        mission.assign_drone(drone_id.clone());

        assert!(!mission.is_active_for(&drone_id));
        mission.start();
        assert!(mission.is_active_for(&drone_id));
        assert!(mission.start_time.is_some());

        mission.complete(Utc::now());
        assert_eq!(mission.status, MissionStatus::Completed);
        assert_eq!(mission.progress.percent_complete, 100.0);
        assert!(mission.completed_at.is_some());
    }

    #[test]
    fn test_mission_transitions() {
        let mut mission = Mission::new("Survey", "user-1");
        assert!(mission.transition(MissionStatus::Paused).is_err());

        mission.transition(MissionStatus::InProgress).unwrap();
        assert!(mission.start_time.is_some());
        mission.transition(MissionStatus::Paused).unwrap();
        mission.transition(MissionStatus::InProgress).unwrap();
        mission.transition(MissionStatus::Aborted).unwrap();
        assert_eq!(mission.status, MissionStatus::Aborted);

        let err = mission.transition(MissionStatus::InProgress).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
        assert_eq!(err.to_string(), "Invalid state transition from aborted to in-progress");

        let mut done = Mission::new("Survey", "user-1");
        done.complete(Utc::now());
        assert!(done.transition(MissionStatus::Completed).is_err());
        assert!(done.transition(MissionStatus::Aborted).is_err());
    }

    #[test]
    fn test_mission_path_validation() {
        let mut mission = Mission::new("Survey", "user-1");
        mission.add_waypoint(Waypoint::new(40.785091, -73.968285, 50.0));
        assert!(mission.validate().is_ok());

        mission.add_waypoint(Waypoint::new(95.0, 0.0, 50.0));
        assert!(matches!(mission.validate(), Err(CoreError::InvalidPosition { .. })));
    }

    #[test]
    fn test_mission_distance() {
        let mut mission = Mission::new("Test Mission", "user-1");
        assert_eq!(mission.total_distance_m(), 0.0);

        mission.add_waypoint(Waypoint::new(40.785091, -73.968285, 50.0));
        mission.add_waypoint(Waypoint::new(40.758895, -73.985131, 50.0));
        assert!(mission.total_distance_m() > 3_000.0);
    }

    #[test]
    fn test_progress_percent() {
        let progress = MissionProgress::at_waypoint(2, 4, 150.0);
        assert_eq!(progress.percent_complete, 50.0);
        assert_eq!(MissionProgress::at_waypoint(0, 0, 0.0).percent_complete, 0.0);
    }
}
