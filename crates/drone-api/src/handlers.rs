//! API request handlers

use crate::demo;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use drone_core::{
    Drone, DroneId, DronePatch, DroneStatus, Event, GeoPosition, Mission, MissionId,
    MissionStatus, UserId, Waypoint,
};
use drone_sim::{ControlResponse, SimulationStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// REQUEST & RESPONSE TYPES
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct DroneListResponse {
    pub drones: Vec<Drone>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct MissionListResponse {
    pub missions: Vec<Mission>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct TestMissionResponse {
    pub mission: Mission,
    pub drone: Drone,
}

#[derive(Serialize)]
pub struct WebSocketInfoResponse {
    pub url: String,
    pub connected_clients: usize,
    pub supported_events: Vec<String>,
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub owner: Option<String>,
}

#[derive(Deserialize)]
pub struct UserRequest {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct CreateDroneRequest {
    pub id: String,
    pub owner_id: String,
    pub model: String,
    pub name: Option<String>,
    pub battery: Option<f64>,
    pub status: Option<DroneStatus>,
    pub location: Option<GeoPosition>,
}

#[derive(Deserialize)]
pub struct CreateMissionRequest {
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub drone_id: Option<String>,
    pub flight_path: Vec<Waypoint>,
}

#[derive(Deserialize)]
pub struct MissionStatusRequest {
    pub status: MissionStatus,
}

// ============================================================================
// HEALTH & METRICS HANDLERS
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check: the store answers a ping
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"ready": true, "store": state.store_backend})),
        ),
        Err(e) => {
            debug!("Readiness probe failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"ready": false, "store": state.store_backend})),
            )
        }
    }
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}

// ============================================================================
// SIMULATION HANDLERS
// ============================================================================

pub async fn start_simulation(State(state): State<AppState>) -> Json<ControlResponse> {
    Json(state.engine.start().await)
}

pub async fn stop_simulation(State(state): State<AppState>) -> Json<ControlResponse> {
    Json(state.engine.stop().await)
}

pub async fn simulation_status(State(state): State<AppState>) -> Json<SimulationStatus> {
    Json(state.engine.status())
}

/// Create the Manhattan test mission for a user
pub async fn create_test_mission(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> ApiResult<impl IntoResponse> {
    let owner = UserId::new(req.user_id);
    let (mission, drone) = demo::create_test_mission(state.store.as_ref(), &owner).await?;

    state.publish(Event::drone_update(drone.clone()));
    state.publish(Event::mission_update(mission.clone()));
    state.engine.notify_manual_update(&drone.id).await;

    Ok((
        StatusCode::CREATED,
        Json(TestMissionResponse { mission, drone }),
    ))
}

/// Start the user's latest planned mission
pub async fn start_test_mission(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> ApiResult<Json<Mission>> {
    let owner = UserId::new(req.user_id);
    let mission = demo::start_test_mission(state.store.as_ref(), &owner).await?;

    state.publish(Event::mission_update(mission.clone()));
    Ok(Json(mission))
}

// ============================================================================
// DRONE HANDLERS
// ============================================================================

/// List drones, optionally for one owner
pub async fn list_drones(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<DroneListResponse>> {
    let drones = state.store.list_drones(query.owner.map(UserId::new)).await?;
    let total = drones.len();
    Ok(Json(DroneListResponse { drones, total }))
}

/// Get single drone by ID
pub async fn get_drone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Drone>> {
    state
        .store
        .find_drone(&DroneId::new(&id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Drone {} not found", id)))
}

/// Register a new drone
pub async fn create_drone(
    State(state): State<AppState>,
    Json(req): Json<CreateDroneRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.id.trim().is_empty() || req.owner_id.trim().is_empty() {
        return Err(ApiError::bad_request("id and owner_id are required"));
    }

    let patch = DronePatch {
        name: req.name,
        status: req.status,
        battery: req.battery,
        location: req.location,
        ..Default::default()
    };
    patch.validate()?;

    let mut drone = Drone::new(req.id, req.owner_id, req.model);
    patch.apply(&mut drone);
    state.store.insert_drone(&drone).await?;

    info!("Registered drone {} for {}", drone.id, drone.owner_id);
    state.publish(Event::drone_update(drone.clone()));
    Ok((StatusCode::CREATED, Json(drone)))
}

/// Manual drone update: persist, announce, pause the simulation for it
pub async fn update_drone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<DronePatch>,
) -> ApiResult<Json<Drone>> {
    if patch.is_empty() {
        return Err(ApiError::bad_request("empty update"));
    }
    patch.validate()?;

    let drone_id = DroneId::new(&id);
    let drone = state.store.update_drone(&drone_id, &patch).await?;
    info!("Manual update of drone {}", drone_id);

    state.publish(Event::drone_update(drone.clone()));
    state.engine.notify_manual_update(&drone_id).await;
    Ok(Json(drone))
}

// ============================================================================
// MISSION HANDLERS
// ============================================================================

pub async fn list_missions(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<MissionListResponse>> {
    let missions = state
        .store
        .list_missions(query.owner.map(UserId::new))
        .await?;
    let total = missions.len();
    Ok(Json(MissionListResponse { missions, total }))
}

pub async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Mission>> {
    let mission_id = parse_mission_id(&id)?;
    state
        .store
        .find_mission(&mission_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Mission {} not found", id)))
}

/// Plan a mission; it is stored as planned and flown once started
pub async fn create_mission(
    State(state): State<AppState>,
    Json(req): Json<CreateMissionRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.owner_id.trim().is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::bad_request("owner_id and name are required"));
    }
    if req.flight_path.is_empty() {
        return Err(ApiError::bad_request("flight_path must not be empty"));
    }

    let mut mission = Mission::new(req.name, req.owner_id);
    mission.description = req.description;
    mission.flight_path = req.flight_path;
    mission.validate()?;

    if let Some(drone_id) = req.drone_id {
        let drone_id = DroneId::new(drone_id);
        let drone = state
            .store
            .find_drone(&drone_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Drone {} not found", drone_id)))?;
        if drone.owner_id != mission.owner_id {
            return Err(ApiError::bad_request(format!(
                "Drone {} does not belong to {}",
                drone_id, mission.owner_id
            )));
        }
        mission.assign_drone(drone_id);
    }

    state.store.insert_mission(&mission).await?;
    info!("Planned mission {} for {}", mission.name, mission.owner_id);

    state.publish(Event::mission_update(mission.clone()));
    Ok((StatusCode::CREATED, Json(mission)))
}

/// Operator status change: start, pause, resume or abort a mission
pub async fn update_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MissionStatusRequest>,
) -> ApiResult<Json<Mission>> {
    let mission_id = parse_mission_id(&id)?;
    let mut mission = state
        .store
        .find_mission(&mission_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Mission {} not found", id)))?;

    if req.status == MissionStatus::InProgress && mission.drone_id.is_none() {
        return Err(ApiError::bad_request(format!(
            "Mission {} has no drone assigned",
            id
        )));
    }
    let from = mission.status;
    mission.transition(req.status)?;
    state.store.save_mission(&mission).await?;
    info!("Mission {} {} -> {}", mission.id, from, mission.status);

    if let Some(drone_id) = mission.drone_id.clone() {
        let drone_status = match mission.status {
            MissionStatus::InProgress if from == MissionStatus::Planned => {
                Some(DroneStatus::InMission)
            }
            MissionStatus::Aborted => Some(DroneStatus::Available),
            _ => None,
        };
        if let Some(status) = drone_status {
            if let Some(drone) = state.store.find_drone(&drone_id).await? {
                if status == DroneStatus::InMission || drone.status == DroneStatus::InMission {
                    state.store.set_drone_status(&drone_id, status).await?;
                    state.publish(Event::drone_update(drone.with_status(status)));
                }
            }
        }
        state.engine.notify_manual_update(&drone_id).await;
    }

    state.publish(Event::mission_update(mission.clone()));
    Ok(Json(mission))
}

fn parse_mission_id(id: &str) -> ApiResult<MissionId> {
    Uuid::parse_str(id)
        .map(MissionId::from_uuid)
        .map_err(|_| ApiError::bad_request(format!("Invalid mission id: {}", id)))
}

// ============================================================================
// WEBSOCKET INFO
// ============================================================================

pub async fn websocket_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(WebSocketInfoResponse {
        url: format!("ws://localhost:{}", state.config.ws_port),
        connected_clients: state.ws_client_count(),
        supported_events: vec![
            "drone-update".into(),
            "mission-update".into(),
            "mission-progress".into(),
            "mission-completed".into(),
        ],
    })
}
