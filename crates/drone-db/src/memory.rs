//! In-process document store backed by `DashMap`

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use drone_core::{
    Drone, DroneId, DronePatch, DroneStatus, Mission, MissionId, MissionProgress, UserId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::{DbError, DbResult, DroneStore};

/// Volatile store used for local runs, demos and tests.
///
/// `set_available(false)` makes every operation fail with
/// [`DbError::Unavailable`] until it is switched back on.
pub struct MemoryStore {
    drones: DashMap<DroneId, Drone>,
    missions: DashMap<MissionId, Mission>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            drones: DashMap::new(),
            missions: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        debug!("Memory store availability set to {}", available);
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn drone_count(&self) -> usize {
        self.drones.len()
    }

    pub fn mission_count(&self) -> usize {
        self.missions.len()
    }

    fn check(&self) -> DbResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::unavailable("memory store is offline"))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DroneStore for MemoryStore {
    async fn ping(&self) -> DbResult<()> {
        self.check()
    }

    async fn find_drones_by_status(&self, statuses: &[DroneStatus]) -> DbResult<Vec<Drone>> {
        self.check()?;
        let mut drones: Vec<Drone> = self
            .drones
            .iter()
            .filter(|entry| statuses.contains(&entry.status))
            .map(|entry| entry.value().clone())
            .collect();
        drones.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(drones)
    }

    async fn find_drone(&self, id: &DroneId) -> DbResult<Option<Drone>> {
        self.check()?;
        Ok(self.drones.get(id).map(|d| d.value().clone()))
    }

    async fn list_drones(&self, owner: Option<UserId>) -> DbResult<Vec<Drone>> {
        self.check()?;
        let mut drones: Vec<Drone> = self
            .drones
            .iter()
            .filter(|entry| owner.as_ref().is_none_or(|o| &entry.owner_id == o))
            .map(|entry| entry.value().clone())
            .collect();
        drones.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(drones)
    }

    async fn insert_drone(&self, drone: &Drone) -> DbResult<()> {
        self.check()?;
        if self.drones.contains_key(&drone.id) {
            return Err(DbError::Duplicate(format!("drone {}", drone.id)));
        }
        self.drones.insert(drone.id.clone(), drone.clone());
        Ok(())
    }

    async fn update_drone(&self, id: &DroneId, patch: &DronePatch) -> DbResult<Drone> {
        self.check()?;
        let mut entry = self
            .drones
            .get_mut(id)
            .ok_or_else(|| DbError::not_found(format!("drone {}", id)))?;
        patch.apply(entry.value_mut());
        Ok(entry.value().clone())
    }

    async fn set_drone_status(&self, id: &DroneId, status: DroneStatus) -> DbResult<()> {
        self.update_drone(id, &DronePatch::status(status)).await?;
        Ok(())
    }

    async fn find_active_mission_for_drone(
        &self,
        drone_id: &DroneId,
    ) -> DbResult<Option<Mission>> {
        self.check()?;
        Ok(self
            .missions
            .iter()
            .filter(|entry| entry.is_active_for(drone_id))
            .max_by_key(|entry| entry.start_time)
            .map(|entry| entry.value().clone()))
    }

    async fn find_mission(&self, id: &MissionId) -> DbResult<Option<Mission>> {
        self.check()?;
        Ok(self.missions.get(id).map(|m| m.value().clone()))
    }

    async fn list_missions(&self, owner: Option<UserId>) -> DbResult<Vec<Mission>> {
        self.check()?;
        let mut missions: Vec<Mission> = self
            .missions
            .iter()
            .filter(|entry| owner.as_ref().is_none_or(|o| &entry.owner_id == o))
            .map(|entry| entry.value().clone())
            .collect();
        missions.sort_by_key(|m| m.created_at);
        Ok(missions)
    }

    async fn insert_mission(&self, mission: &Mission) -> DbResult<()> {
        self.check()?;
        if self.missions.contains_key(&mission.id) {
            return Err(DbError::Duplicate(format!("mission {}", mission.id)));
        }
        self.missions.insert(mission.id.clone(), mission.clone());
        Ok(())
    }

    async fn save_mission(&self, mission: &Mission) -> DbResult<()> {
        self.check()?;
        self.missions.insert(mission.id.clone(), mission.clone());
        Ok(())
    }

    async fn update_mission_progress(
        &self,
        id: &MissionId,
        progress: &MissionProgress,
    ) -> DbResult<Mission> {
        self.check()?;
        let mut entry = self
            .missions
            .get_mut(id)
            .ok_or_else(|| DbError::not_found(format!("mission {}", id)))?;
        entry.progress = *progress;
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    async fn complete_mission(&self, id: &MissionId) -> DbResult<Mission> {
        self.check()?;
        let mut entry = self
            .missions
            .get_mut(id)
            .ok_or_else(|| DbError::not_found(format!("mission {}", id)))?;
        entry.complete(Utc::now());
        Ok(entry.value().clone())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::{MissionStatus, Waypoint};

    fn mission_for(drone: &str) -> Mission {
        let mut mission = Mission::new("Survey", "user-1");
        mission.add_waypoint(Waypoint::new(40.785091, -73.968285, 50.0));
        mission.add_waypoint(Waypoint::new(40.758895, -73.985131, 50.0));
        mission.assign_drone(DroneId::new(drone));
        mission
    }

    #[tokio::test]
    async fn test_drone_crud() {
        let store = MemoryStore::new();
        let drone = Drone::new("DRN-001", "user-1", "Scout");
        store.insert_drone(&drone).await.unwrap();

        assert!(matches!(
            store.insert_drone(&drone).await,
            Err(DbError::Duplicate(_))
        ));

        let patch = DronePatch {
            battery: Some(55.0),
            ..Default::default()
        };
        let updated = store.update_drone(&drone.id, &patch).await.unwrap();
        assert_eq!(updated.battery, 55.0);

        store
            .set_drone_status(&drone.id, DroneStatus::Charging)
            .await
            .unwrap();
        let found = store.find_drone(&drone.id).await.unwrap().unwrap();
        assert_eq!(found.status, DroneStatus::Charging);
        assert_eq!(found.battery, 55.0);
    }

    #[tokio::test]
    async fn test_update_missing_drone() {
        let store = MemoryStore::new();
        let result = store
            .update_drone(&DroneId::new("ghost"), &DronePatch::default())
            .await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_status_and_owner() {
        let store = MemoryStore::new();
        store
            .insert_drone(&Drone::new("A", "user-1", "Scout"))
            .await
            .unwrap();
        store
            .insert_drone(&Drone::new("B", "user-2", "Scout").with_status(DroneStatus::InMission))
            .await
            .unwrap();
        store
            .insert_drone(&Drone::new("C", "user-1", "Scout").with_status(DroneStatus::Maintenance))
            .await
            .unwrap();

        let simulated = store
            .find_drones_by_status(&DroneStatus::SIMULATED)
            .await
            .unwrap();
        let ids: Vec<_> = simulated.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);

        let owned = store
            .list_drones(Some(UserId::new("user-1")))
            .await
            .unwrap();
        assert_eq!(owned.len(), 2);
        assert_eq!(store.list_drones(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_active_mission_lookup() {
        let store = MemoryStore::new();
        let drone_id = DroneId::new("DRN-001");
        let mut mission = mission_for("DRN-001");
        store.insert_mission(&mission).await.unwrap();

        assert!(store
            .find_active_mission_for_drone(&drone_id)
            .await
            .unwrap()
            .is_none());

        mission.start();
        store.save_mission(&mission).await.unwrap();
        let active = store
            .find_active_mission_for_drone(&drone_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, mission.id);
    }

    #[tokio::test]
    async fn test_progress_and_completion() {
        let store = MemoryStore::new();
        let mut mission = mission_for("DRN-001");
        mission.start();
        store.insert_mission(&mission).await.unwrap();

        let progress = MissionProgress::at_waypoint(1, 2, 3_200.0);
        let updated = store
            .update_mission_progress(&mission.id, &progress)
            .await
            .unwrap();
        assert_eq!(updated.progress.current_waypoint, 1);

        let completed = store.complete_mission(&mission.id).await.unwrap();
        assert_eq!(completed.status, MissionStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert!(store
            .find_active_mission_for_drone(&DroneId::new("DRN-001"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = MemoryStore::new();
        store.set_available(false);

        let err = store.ping().await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(store.list_drones(None).await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
