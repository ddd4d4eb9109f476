//! Demo fleet and the Manhattan test mission

use drone_core::{Drone, DronePatch, DroneStatus, Mission, MissionStatus, UserId, Waypoint};
use drone_db::{DbError, DroneStore};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};

/// Owner of the seeded demo fleet
pub const DEMO_USER: &str = "demo-user";

/// Flight altitude of the test mission in meters
pub const TEST_MISSION_ALTITUDE: f64 = 50.0;

/// Closed circuit over Manhattan: Central Park, Times Square, Financial
/// District, Statue of Liberty, Greenwich Village, Empire State, Central Park
pub const TEST_MISSION_ROUTE: [(f64, f64); 7] = [
    (40.785091, -73.968285),
    (40.758895, -73.985131),
    (40.706086, -73.996864),
    (40.689247, -74.044502),
    (40.729030, -74.005333),
    (40.748817, -73.985428),
    (40.785091, -73.968285),
];

/// Insert the demo fleet, skipping drones that already exist
pub async fn seed_fleet(store: &dyn DroneStore) -> Result<usize, DbError> {
    let fleet = [
        Drone::new("DRN-001", DEMO_USER, "Scout X1").with_battery(92.0),
        Drone::new("DRN-002", DEMO_USER, "Heavy Lifter H4").with_battery(78.0),
        Drone::new("DRN-003", DEMO_USER, "Scout X1")
            .with_battery(64.0)
            .with_status(DroneStatus::Charging),
    ];

    let mut inserted = 0;
    for drone in &fleet {
        match store.insert_drone(drone).await {
            Ok(()) => inserted += 1,
            Err(DbError::Duplicate(_)) => debug!("Demo drone {} already present", drone.id),
            Err(e) => return Err(e),
        }
    }

    info!("Seeded {} demo drones for {}", inserted, DEMO_USER);
    Ok(inserted)
}

/// Create the Manhattan test mission for `owner`.
///
/// Picks the owner's first available or charging drone, resets it to
/// available at the first waypoint and assigns it to a new planned mission.
pub async fn create_test_mission(
    store: &dyn DroneStore,
    owner: &UserId,
) -> ApiResult<(Mission, Drone)> {
    let drone = store
        .list_drones(Some(owner.clone()))
        .await?
        .into_iter()
        .find(|d| matches!(d.status, DroneStatus::Available | DroneStatus::Charging))
        .ok_or_else(|| ApiError::bad_request(format!("No available drone for user {}", owner)))?;

    let mut mission = Mission::new("Manhattan Test Mission", owner.clone());
    mission.description = Some("Circuit over Manhattan landmarks".into());
    mission.config.flight_altitude = TEST_MISSION_ALTITUDE;
    for (lat, lng) in TEST_MISSION_ROUTE {
        mission.add_waypoint(Waypoint::new(lat, lng, TEST_MISSION_ALTITUDE));
    }
    mission.assign_drone(drone.id.clone());

    let patch = DronePatch {
        status: Some(DroneStatus::Available),
        location: Some(mission.flight_path[0].position()),
        ..Default::default()
    };
    let drone = store.update_drone(&drone.id, &patch).await?;
    store.insert_mission(&mission).await?;

    info!(
        "Created test mission {} for {} with drone {}",
        mission.id, owner, drone.id
    );
    Ok((mission, drone))
}

/// Start the most recently created planned mission of `owner`
pub async fn start_test_mission(store: &dyn DroneStore, owner: &UserId) -> ApiResult<Mission> {
    let mut mission = store
        .list_missions(Some(owner.clone()))
        .await?
        .into_iter()
        .rev()
        .find(|m| m.status == MissionStatus::Planned)
        .ok_or_else(|| ApiError::not_found(format!("No planned mission for user {}", owner)))?;

    let drone_id = mission
        .drone_id
        .clone()
        .ok_or_else(|| ApiError::bad_request(format!("Mission {} has no drone", mission.id)))?;

    mission.start();
    store.save_mission(&mission).await?;
    store
        .set_drone_status(&drone_id, DroneStatus::InMission)
        .await?;

    info!("Started mission {} with drone {}", mission.id, drone_id);
    Ok(mission)
}

// ============================================================================
// TESTS
// ============================================================================
