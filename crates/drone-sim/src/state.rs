//! Shadow state kept by the simulation for every tracked drone

use dashmap::DashMap;
use drone_core::{Drone, DroneId, DroneStatus, Mission, MissionId, Waypoint};

/// Simulation-side copy of a drone plus fields only the engine knows about
#[derive(Debug, Clone)]
pub struct ShadowDrone {
    /// Last known drone document
    pub drone: Drone,
    /// Mission the waypoint index counts against
    pub mission_id: Option<MissionId>,
    /// Index of the flight path waypoint being flown to
    pub waypoint_index: usize,
    pub target_waypoint: Option<Waypoint>,
    pub is_moving: bool,
    /// Metres flown on the current mission
    pub distance_covered_m: f64,
    /// Status change that still has to reach the store
    pub pending_status: Option<DroneStatus>,
}

impl ShadowDrone {
    pub fn new(drone: Drone) -> Self {
        Self {
            drone,
            mission_id: None,
            waypoint_index: 0,
            target_waypoint: None,
            is_moving: false,
            distance_covered_m: 0.0,
            pending_status: None,
        }
    }

    pub fn id(&self) -> &DroneId {
        &self.drone.id
    }

    /// Whether the waypoint index belongs to `mission`
    pub fn is_flying(&self, mission: &Mission) -> bool {
        self.mission_id.as_ref() == Some(&mission.id)
    }

    /// Take over `mission`, resuming from its persisted progress
    pub fn adopt_mission(&mut self, mission: &Mission) {
        self.mission_id = Some(mission.id.clone());
        self.waypoint_index = mission.progress.current_waypoint;
        self.distance_covered_m = mission.progress.distance_covered_m;
        self.target_waypoint = None;
        self.is_moving = false;
        self.pending_status = None;
    }

    /// Back to idle after a mission ends
    pub fn reset_mission(&mut self) {
        self.mission_id = None;
        self.waypoint_index = 0;
        self.target_waypoint = None;
        self.is_moving = false;
        self.distance_covered_m = 0.0;
    }
}

/// Keyed store of shadow drones
#[derive(Debug, Default)]
pub struct ShadowStore {
    drones: DashMap<DroneId, ShadowDrone>,
}

impl ShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `drone`, replacing any previous entry
    pub fn track(&self, drone: Drone) {
        self.drones.insert(drone.id.clone(), ShadowDrone::new(drone));
    }

    pub fn put(&self, shadow: ShadowDrone) {
        self.drones.insert(shadow.drone.id.clone(), shadow);
    }

    /// Replace the drone document of a tracked drone, keeping mission fields.
    /// A pending status is dropped: the stored document wins.
    /// Returns false when the drone is not tracked.
    pub fn refresh(&self, drone: Drone) -> bool {
        match self.drones.get_mut(&drone.id) {
            Some(mut entry) => {
                entry.drone = drone;
                entry.pending_status = None;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &DroneId) -> Option<ShadowDrone> {
        self.drones.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &DroneId) -> bool {
        self.drones.contains_key(id)
    }

    /// Re-queue a status write that failed
    pub fn set_pending_status(&self, id: &DroneId, status: DroneStatus) {
        if let Some(mut entry) = self.drones.get_mut(id) {
            entry.pending_status = Some(status);
        }
    }

    /// Copies of every shadow drone, ordered by id
    pub fn snapshot(&self) -> Vec<ShadowDrone> {
        let mut all: Vec<ShadowDrone> = self
            .drones
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.drone.id.0.cmp(&b.drone.id.0));
        all
    }

    pub fn len(&self) -> usize {
        self.drones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drones.is_empty()
    }

    pub fn clear(&self) {
        self.drones.clear();
    }
}
