//! Persistence seam shared by the simulation engine and the API

use async_trait::async_trait;
use drone_core::{
    Drone, DroneId, DronePatch, DroneStatus, Mission, MissionId, MissionProgress, UserId,
};

use crate::DbResult;

/// Document store for drones and missions.
///
/// Implementations are keyed by document id and offer no multi-document
/// transactions: partial updates touch one document and concurrent writers
/// race with last-write-wins semantics.
#[async_trait]
pub trait DroneStore: Send + Sync {
    /// Cheap round trip used by readiness probes
    async fn ping(&self) -> DbResult<()>;

    /// Drones whose status is any of `statuses`
    async fn find_drones_by_status(&self, statuses: &[DroneStatus]) -> DbResult<Vec<Drone>>;

    async fn find_drone(&self, id: &DroneId) -> DbResult<Option<Drone>>;

    /// All drones, or only those owned by `owner`
    async fn list_drones(&self, owner: Option<UserId>) -> DbResult<Vec<Drone>>;

    async fn insert_drone(&self, drone: &Drone) -> DbResult<()>;

    /// Merge `patch` into the stored drone and return the updated document
    async fn update_drone(&self, id: &DroneId, patch: &DronePatch) -> DbResult<Drone>;

    async fn set_drone_status(&self, id: &DroneId, status: DroneStatus) -> DbResult<()>;

    /// The in-progress mission assigned to `drone_id`, if any
    async fn find_active_mission_for_drone(&self, drone_id: &DroneId)
    -> DbResult<Option<Mission>>;

    async fn find_mission(&self, id: &MissionId) -> DbResult<Option<Mission>>;

    /// All missions, or only those owned by `owner`, oldest first
    async fn list_missions(&self, owner: Option<UserId>) -> DbResult<Vec<Mission>>;

    async fn insert_mission(&self, mission: &Mission) -> DbResult<()>;

    /// Replace the stored mission document
    async fn save_mission(&self, mission: &Mission) -> DbResult<()>;

    async fn update_mission_progress(
        &self,
        id: &MissionId,
        progress: &MissionProgress,
    ) -> DbResult<Mission>;

    /// Mark the mission completed now and return the updated document
    async fn complete_mission(&self, id: &MissionId) -> DbResult<Mission>;
}
