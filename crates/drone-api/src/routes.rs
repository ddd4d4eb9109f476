//! API route definitions

use crate::handlers;
use crate::state::AppState;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = if state.config.cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:8080"))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        // Metrics (Prometheus format)
        .route("/metrics", get(handlers::metrics))
        // Simulation control
        .route("/api/v1/simulation/start", post(handlers::start_simulation))
        .route("/api/v1/simulation/stop", post(handlers::stop_simulation))
        .route("/api/v1/simulation/status", get(handlers::simulation_status))
        .route(
            "/api/v1/simulation/test-mission",
            post(handlers::create_test_mission),
        )
        .route(
            "/api/v1/simulation/test-mission/start",
            post(handlers::start_test_mission),
        )
        // Drones API
        .route(
            "/api/v1/drones",
            get(handlers::list_drones).post(handlers::create_drone),
        )
        .route(
            "/api/v1/drones/{id}",
            get(handlers::get_drone).patch(handlers::update_drone),
        )
        // Missions API
        .route(
            "/api/v1/missions",
            get(handlers::list_missions).post(handlers::create_mission),
        )
        .route(
            "/api/v1/missions/{id}",
            get(handlers::get_mission).patch(handlers::update_mission),
        )
        // WebSocket info
        .route("/api/v1/ws/info", get(handlers::websocket_info))
        // Apply middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use drone_core::{Drone, DroneId, DroneStatus, Mission, MissionStatus};
    use drone_db::{DroneStore, MemoryStore};
    use drone_sim::ControlResponse;
    use drone_telemetry::MetricsCollector;
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state() -> (AppState, Arc<MemoryStore>) {
        let config = ApiConfig {
            seed_demo_fleet: false,
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let state = AppState::with_store(config, store.clone(), "memory", metrics)
            .await
            .unwrap();
        (state, store)
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn json(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let (state, store) = test_state().await;
        assert_eq!(send(&state, get("/health")).await.0, StatusCode::OK);
        assert_eq!(send(&state, get("/ready")).await.0, StatusCode::OK);

        store.set_available(false);
        assert_eq!(
            send(&state, get("/ready")).await.0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_simulation_control() {
        let (state, _store) = test_state().await;

        let (status, body) = send(&state, json("POST", "/api/v1/simulation/start", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let started: ControlResponse = serde_json::from_slice(&body).unwrap();
        assert!(started.success);
        assert_eq!(started.message, "Simulation started successfully");

        let (_, body) = send(&state, json("POST", "/api/v1/simulation/start", serde_json::json!({}))).await;
        let again: ControlResponse = serde_json::from_slice(&body).unwrap();
        assert!(!again.success);
        assert_eq!(again.message, "Simulation is already running");

        let (_, body) = send(&state, get("/api/v1/simulation/status")).await;
        let status: serde_json::Value = parse(&body);
        assert_eq!(status["is_running"], true);
        assert_eq!(status["tick_interval_ms"], 2000);

        let (_, body) = send(&state, json("POST", "/api/v1/simulation/stop", serde_json::json!({}))).await;
        let stopped: ControlResponse = serde_json::from_slice(&body).unwrap();
        assert!(stopped.success);
        assert!(!state.engine.is_running());
    }

    #[tokio::test]
    async fn test_drone_crud_and_manual_update() {
        let (state, store) = test_state().await;

        let (status, _) = send(
            &state,
            json(
                "POST",
                "/api/v1/drones",
                serde_json::json!({"id": "DRN-9", "owner_id": "alice", "model": "Scout", "battery": 80.0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &state,
            json(
                "POST",
                "/api/v1/drones",
                serde_json::json!({"id": "DRN-9", "owner_id": "alice", "model": "Scout"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        state.engine.start().await;
        assert!(state.engine.shadow(&DroneId::new("DRN-9")).is_some());

        let (status, body) = send(
            &state,
            json("PATCH", "/api/v1/drones/DRN-9", serde_json::json!({"battery": 42.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let drone: Drone = parse(&body);
        assert_eq!(drone.battery, 42.0);
        assert_eq!(state.engine.status().paused_drone_count, 1);
        assert_eq!(
            state.engine.shadow(&DroneId::new("DRN-9")).unwrap().drone.battery,
            42.0
        );
        state.engine.stop().await;

        let (status, _) = send(
            &state,
            json("PATCH", "/api/v1/drones/DRN-9", serde_json::json!({"battery": 140.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            json("PATCH", "/api/v1/drones/ghost", serde_json::json!({"battery": 10.0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&state, get("/api/v1/drones?owner=alice")).await;
        let list: serde_json::Value = parse(&body);
        assert_eq!(list["total"], 1);

        store.set_available(false);
        let (status, _) = send(&state, get("/api/v1/drones/DRN-9")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_test_mission_flow() {
        let (state, store) = test_state().await;
        store
            .insert_drone(&Drone::new("DRN-1", "bob", "Scout"))
            .await
            .unwrap();

        let (status, _) = send(
            &state,
            json("POST", "/api/v1/simulation/test-mission", serde_json::json!({"user_id": "bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &state,
            json(
                "POST",
                "/api/v1/simulation/test-mission/start",
                serde_json::json!({"user_id": "bob"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let mission: Mission = parse(&body);
        assert_eq!(mission.status, MissionStatus::InProgress);

        let drone = store.find_drone(&DroneId::new("DRN-1")).await.unwrap().unwrap();
        assert_eq!(drone.status, DroneStatus::InMission);

        let (status, body) = send(&state, get(&format!("/api/v1/missions/{}", mission.id))).await;
        assert_eq!(status, StatusCode::OK);
        let fetched: Mission = parse(&body);
        assert_eq!(fetched.flight_path.len(), 7);

        let (status, _) = send(&state, get("/api/v1/missions/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            json(
                "POST",
                "/api/v1/simulation/test-mission/start",
                serde_json::json!({"user_id": "bob"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mission_create_and_lifecycle() {
        let (state, store) = test_state().await;
        store
            .insert_drone(&Drone::new("DRN-1", "carol", "Scout"))
            .await
            .unwrap();
        let path = serde_json::json!([
            {"latitude": 40.785091, "longitude": -73.968285, "altitude": 50.0},
            {"latitude": 40.758895, "longitude": -73.985131, "altitude": 50.0},
        ]);

        let (status, body) = send(
            &state,
            json(
                "POST",
                "/api/v1/missions",
                serde_json::json!({"owner_id": "carol", "name": "Loop", "drone_id": "DRN-1", "flight_path": path}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let mission: Mission = parse(&body);
        assert_eq!(mission.status, MissionStatus::Planned);
        assert_eq!(mission.drone_id, Some(DroneId::new("DRN-1")));
        let uri = format!("/api/v1/missions/{}", mission.id);

        let (status, body) = send(&state, json("PATCH", &uri, serde_json::json!({"status": "in-progress"}))).await;
        assert_eq!(status, StatusCode::OK);
        let started: Mission = parse(&body);
        assert_eq!(started.status, MissionStatus::InProgress);
        assert!(started.start_time.is_some());
        let drone = store.find_drone(&DroneId::new("DRN-1")).await.unwrap().unwrap();
        assert_eq!(drone.status, DroneStatus::InMission);

        let (status, _) = send(&state, json("PATCH", &uri, serde_json::json!({"status": "paused"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&state, json("PATCH", &uri, serde_json::json!({"status": "completed"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&state, json("PATCH", &uri, serde_json::json!({"status": "aborted"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Mission>(&body).status, MissionStatus::Aborted);
        let drone = store.find_drone(&DroneId::new("DRN-1")).await.unwrap().unwrap();
        assert_eq!(drone.status, DroneStatus::Available);
        assert!(
            store
                .find_active_mission_for_drone(&DroneId::new("DRN-1"))
                .await
                .unwrap()
                .is_none()
        );

        let (status, _) = send(&state, json("PATCH", &uri, serde_json::json!({"status": "in-progress"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mission_create_rejects_bad_input() {
        let (state, store) = test_state().await;
        store
            .insert_drone(&Drone::new("DRN-1", "carol", "Scout"))
            .await
            .unwrap();
        let path = serde_json::json!([{"latitude": 40.78, "longitude": -73.96, "altitude": 50.0}]);

        let cases = [
            (serde_json::json!({"owner_id": "carol", "name": "Empty", "flight_path": []}), StatusCode::BAD_REQUEST),
            (serde_json::json!({"owner_id": "carol", "name": " ", "flight_path": path}), StatusCode::BAD_REQUEST),
            (
                serde_json::json!({"owner_id": "carol", "name": "Pole",
                    "flight_path": [{"latitude": 91.0, "longitude": 0.0, "altitude": 50.0}]}),
                StatusCode::BAD_REQUEST,
            ),
            (
                serde_json::json!({"owner_id": "carol", "name": "Ghost", "drone_id": "ghost", "flight_path": path}),
                StatusCode::NOT_FOUND,
            ),
            (
                serde_json::json!({"owner_id": "dave", "name": "Borrowed", "drone_id": "DRN-1", "flight_path": path}),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (body, expected) in cases {
            let (status, _) = send(&state, json("POST", "/api/v1/missions", body)).await;
            assert_eq!(status, expected);
        }
        assert!(store.list_missions(None).await.unwrap().is_empty());

        // Without a drone it can be planned but not started
        let (status, body) = send(
            &state,
            json(
                "POST",
                "/api/v1/missions",
                serde_json::json!({"owner_id": "carol", "name": "Later", "flight_path": path}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let mission: Mission = parse(&body);
        let (status, _) = send(
            &state,
            json(
                "PATCH",
                &format!("/api/v1/missions/{}", mission.id),
                serde_json::json!({"status": "in-progress"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            json("PATCH", "/api/v1/missions/not-a-uuid", serde_json::json!({"status": "paused"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metrics_export() {
        let (state, _store) = test_state().await;
        state.engine.tick().await;
        let (status, body) = send(&state, get("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("drone_fleet_simulation_ticks_total"));
    }
}
