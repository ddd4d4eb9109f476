//! Simulation engine
//!
//! Drives every tracked drone one step per tick: idle drain when there is no
//! active mission, otherwise great-circle movement towards the current
//! waypoint, waypoint sequencing and mission completion. Each drone write is
//! persisted through the [`DroneStore`] before the matching event goes out.

use chrono::{DateTime, Utc};
use drone_core::{
    DroneId, DronePatch, DroneStatus, Event, EventPublisher, Mission, MissionProgress,
    PublishMode, Telemetry,
};
use drone_db::{DbError, DbResult, DroneStore};
use drone_telemetry::MetricsCollector;
use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::battery::BatteryModel;
use crate::gate::OverrideGate;
use crate::rng::{RandomSource, SeededRandom};
use crate::state::{ShadowDrone, ShadowStore};

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub tick_interval: Duration,
    /// Cooldown after a manual update
    pub pause_duration: Duration,
    /// Maximum distance flown per tick
    pub step_distance_m: f64,
    /// Distance under which a waypoint counts as reached
    pub arrival_threshold_m: f64,
    /// Upper bound for every store call
    pub persist_timeout: Duration,
    pub publish_mode: PublishMode,
    pub battery: BatteryModel,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(2000),
            pause_duration: Duration::from_millis(10_000),
            step_distance_m: 200.0,
            arrival_threshold_m: 10.0,
            persist_timeout: Duration::from_secs(3),
            publish_mode: PublishMode::PerOwner,
            battery: BatteryModel::default(),
        }
    }
}

/// Result of a start/stop request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
}

impl ControlResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatus {
    pub is_running: bool,
    pub tracked_drone_count: usize,
    pub paused_drone_count: usize,
    pub tick_interval_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// What happened to one drone during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Inside a manual-override cooldown; nothing written
    Paused,
    /// A store call failed; the drone is retried next tick
    StoreFailed,
    /// No active mission; idle drain applied
    Idle,
    MissionCompleted,
    /// Waypoint `index` of the flight path was reached
    WaypointReached { index: usize },
    Moved { distance_m: f64 },
}

/// Per-drone outcomes of one tick, ordered by drone id
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub outcomes: Vec<(DroneId, TickOutcome)>,
}

impl TickReport {
    pub fn outcome_for(&self, id: &DroneId) -> Option<&TickOutcome> {
        self.outcomes
            .iter()
            .find(|(drone_id, _)| drone_id == id)
            .map(|(_, outcome)| outcome)
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Drone movement simulation.
///
/// Several engines can live in one process; each owns its shadow state,
/// override gate and tick loop.
pub struct SimulationEngine {
    config: SimConfig,
    store: Arc<dyn DroneStore>,
    publisher: Arc<dyn EventPublisher>,
    rng: SyncMutex<Box<dyn RandomSource>>,
    metrics: Option<Arc<MetricsCollector>>,
    shadows: ShadowStore,
    gate: OverrideGate,
    /// Serialises ticks, loading and manual-update refreshes
    tick_lock: Mutex<()>,
    /// Serialises start/stop
    control: Mutex<Option<LoopHandle>>,
    running: AtomicBool,
}

impl SimulationEngine {
    pub fn new(
        config: SimConfig,
        store: Arc<dyn DroneStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let gate = OverrideGate::new(config.pause_duration);
        Self {
            config,
            store,
            publisher,
            rng: SyncMutex::new(Box::new(SeededRandom::from_entropy())),
            metrics: None,
            shadows: ShadowStore::new(),
            gate,
            tick_lock: Mutex::new(()),
            control: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_random(self, rng: Box<dyn RandomSource>) -> Self {
        *self.rng.lock() = rng;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // ========================================================================
    // CONTROL SURFACE
    // ========================================================================

    /// Load every available or in-mission drone and start the tick loop
    pub async fn start(self: &Arc<Self>) -> ControlResponse {
        let mut control = self.control.lock().await;
        if control.is_some() {
            return ControlResponse::failure("Simulation is already running");
        }

        let count = match self.load_drones().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to load drones for simulation: {}", e);
                return ControlResponse::failure(format!("Failed to start simulation: {}", e));
            }
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).run_loop(cancel.clone()));
        *control = Some(LoopHandle { cancel, task });
        self.running.store(true, Ordering::SeqCst);

        if let Some(metrics) = &self.metrics {
            metrics.set_simulation_running(true);
            metrics.set_tracked_drones(count);
        }

        info!(
            "🚀 Simulation started: {} drones, tick every {:?}",
            count, self.config.tick_interval
        );
        ControlResponse::success("Simulation started successfully")
    }

    /// Stop the tick loop, wait for an in-flight tick, drop all shadow state
    pub async fn stop(&self) -> ControlResponse {
        let mut control = self.control.lock().await;

        if let Some(handle) = control.take() {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await {
                warn!("Simulation loop ended abnormally: {}", e);
            }
        }

        {
            let _tick = self.tick_lock.lock().await;
            self.shadows.clear();
            self.gate.clear();
        }
        self.running.store(false, Ordering::SeqCst);

        if let Some(metrics) = &self.metrics {
            metrics.set_simulation_running(false);
            metrics.set_tracked_drones(0);
            metrics.set_paused_drones(0);
            metrics.clear_drone_series();
        }

        info!("🛑 Simulation stopped");
        ControlResponse::success("Simulation stopped successfully")
    }

    pub fn status(&self) -> SimulationStatus {
        SimulationStatus {
            is_running: self.is_running(),
            tracked_drone_count: self.shadows.len(),
            paused_drone_count: self.gate.active_count(),
            tick_interval_ms: self.config.tick_interval.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current shadow state of a tracked drone
    pub fn shadow(&self, id: &DroneId) -> Option<ShadowDrone> {
        self.shadows.get(id)
    }

    /// A drone was changed from outside the simulation: pause it for the
    /// cooldown and pick up the stored document. Untracked ids are ignored.
    pub async fn notify_manual_update(&self, id: &DroneId) {
        if !self.shadows.contains(id) {
            debug!("Manual update for untracked drone {} ignored", id);
            return;
        }

        self.gate.pause(id);
        if let Some(metrics) = &self.metrics {
            metrics.record_manual_override();
            metrics.set_paused_drones(self.gate.active_count());
        }
        info!(
            "⏸️ Drone {} paused for {:?} after manual update",
            id,
            self.gate.cooldown()
        );

        let _tick = self.tick_lock.lock().await;
        match self.guarded("find_drone", self.store.find_drone(id)).await {
            Ok(Some(drone)) => {
                self.shadows.refresh(drone);
            }
            Ok(None) => debug!("Drone {} no longer in store, shadow kept", id),
            Err(_) => {}
        }
    }

    // ========================================================================
    // TICK LOOP
    // ========================================================================

    async fn load_drones(&self) -> DbResult<usize> {
        let _tick = self.tick_lock.lock().await;
        let drones = self
            .guarded(
                "find_drones_by_status",
                self.store.find_drones_by_status(&DroneStatus::SIMULATED),
            )
            .await?;

        let count = drones.len();
        for drone in drones {
            if self.shadows.contains(&drone.id) {
                self.shadows.refresh(drone);
            } else {
                debug!("Tracking drone {}", drone.id);
                self.shadows.track(drone);
            }
        }
        Ok(count)
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.tick().await;
        }

        debug!("Simulation loop exited");
    }

    /// Advance every tracked drone by one step
    pub async fn tick(&self) -> TickReport {
        let _tick = self.tick_lock.lock().await;
        let started = std::time::Instant::now();

        let mut report = TickReport::default();
        for shadow in self.shadows.snapshot() {
            let id = shadow.id().clone();
            let outcome = self.tick_drone(shadow).await;
            debug!(drone_id = %id, ?outcome, "tick");
            report.outcomes.push((id, outcome));
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_tick(started.elapsed().as_secs_f64());
            metrics.set_tracked_drones(self.shadows.len());
            metrics.set_paused_drones(self.gate.active_count());
        }
        report
    }

    async fn tick_drone(&self, mut shadow: ShadowDrone) -> TickOutcome {
        if self.gate.is_paused(shadow.id()) {
            return TickOutcome::Paused;
        }

        let mission = match self
            .guarded(
                "find_active_mission_for_drone",
                self.store.find_active_mission_for_drone(shadow.id()),
            )
            .await
        {
            Ok(mission) => mission,
            Err(_) => return TickOutcome::StoreFailed,
        };

        let mission = mission.filter(|m| !m.flight_path.is_empty());
        if let Some(mission) = &mission {
            if !shadow.is_flying(mission) {
                debug!(
                    "Drone {} takes over mission {} at waypoint {}",
                    shadow.id(),
                    mission.id,
                    mission.progress.current_waypoint
                );
                shadow.adopt_mission(mission);
            }
        }

        match mission {
            None => self.idle_step(shadow).await,
            Some(mission) if shadow.waypoint_index >= mission.flight_path.len() => {
                self.complete_step(shadow, mission).await
            }
            Some(mission) => self.mission_step(shadow, mission).await,
        }
    }

    async fn idle_step(&self, mut shadow: ShadowDrone) -> TickOutcome {
        shadow.is_moving = false;
        shadow.target_waypoint = None;

        let patch = {
            let mut rng = self.rng.lock();
            let drain = self.config.battery.drain(
                shadow.drone.weight_class(),
                0.0,
                true,
                rng.as_mut(),
            );
            self.drone_patch(&shadow, drain, None, rng.as_mut())
        };

        if self.persist_drone(shadow, patch).await {
            TickOutcome::Idle
        } else {
            TickOutcome::StoreFailed
        }
    }

    async fn complete_step(&self, mut shadow: ShadowDrone, mission: Mission) -> TickOutcome {
        let id = shadow.id().clone();

        let completed = match self
            .guarded("complete_mission", self.store.complete_mission(&mission.id))
            .await
        {
            Ok(completed) => completed,
            Err(_) => return TickOutcome::StoreFailed,
        };

        let status_written = self
            .guarded(
                "set_drone_status",
                self.store.set_drone_status(&id, DroneStatus::Available),
            )
            .await
            .is_ok();

        shadow.reset_mission();
        if !status_written {
            // Carried by the next drone write
            shadow.pending_status = Some(DroneStatus::Available);
        }
        shadow.drone.status = DroneStatus::Available;
        shadow.drone.updated_at = Utc::now();
        let drone = shadow.drone.clone();
        self.shadows.put(shadow);

        info!("✅ Drone {} completed mission {}", id, completed.name);
        if let Some(metrics) = &self.metrics {
            metrics.record_mission_completed();
        }

        self.publish(Event::mission_completed(completed));
        if status_written {
            self.publish(Event::drone_update(drone));
        }
        TickOutcome::MissionCompleted
    }

    async fn mission_step(&self, mut shadow: ShadowDrone, mission: Mission) -> TickOutcome {
        let path = &mission.flight_path;
        let index = shadow.waypoint_index;
        let target = path[index];
        let target_pos = target.position();

        let position = match shadow.drone.location {
            Some(location) => location,
            None => {
                debug!("Drone {} has no location, placing at mission start", shadow.id());
                path[0].position()
            }
        };
        let remaining = position.distance_to(&target_pos);

        if remaining < self.config.arrival_threshold_m {
            let next = index + 1;
            shadow.waypoint_index = next;
            shadow.target_waypoint = path.get(next).copied();
            shadow.is_moving = false;
            shadow.drone.location = Some(position);

            let patch = {
                let mut rng = self.rng.lock();
                self.drone_patch(&shadow, self.config.battery.waypoint_cost, None, rng.as_mut())
            };
            let progress = MissionProgress::at_waypoint(next, path.len(), shadow.distance_covered_m);
            let id = shadow.id().clone();

            info!("📍 Drone {} reached waypoint {}/{}", id, next, path.len());
            if let Some(metrics) = &self.metrics {
                metrics.record_waypoint_reached(&id);
            }

            if !self.persist_drone(shadow, patch).await {
                return TickOutcome::StoreFailed;
            }
            return match self
                .guarded(
                    "update_mission_progress",
                    self.store.update_mission_progress(&mission.id, &progress),
                )
                .await
            {
                Ok(updated) => {
                    self.publish(Event::mission_progress(updated));
                    TickOutcome::WaypointReached { index }
                }
                Err(_) => TickOutcome::StoreFailed,
            };
        }

        let step = self.config.step_distance_m.min(remaining);
        let next_position = position.destination(position.bearing_to(&target_pos), step);
        let heading = position.heading_to(&target_pos);

        shadow.drone.location = Some(next_position);
        shadow.target_waypoint = Some(target);
        shadow.is_moving = true;
        shadow.distance_covered_m += step;

        let patch = {
            let mut rng = self.rng.lock();
            let drain = self.config.battery.drain(
                shadow.drone.weight_class(),
                step,
                false,
                rng.as_mut(),
            );
            self.drone_patch(&shadow, drain, Some(heading), rng.as_mut())
        };

        if self.persist_drone(shadow, patch).await {
            TickOutcome::Moved { distance_m: step }
        } else {
            TickOutcome::StoreFailed
        }
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Patch for one simulated drone write: battery after `drain`, current
    /// location, fresh telemetry, and a switch to charging on low battery.
    fn drone_patch(
        &self,
        shadow: &ShadowDrone,
        drain: f64,
        heading: Option<f64>,
        rng: &mut dyn RandomSource,
    ) -> DronePatch {
        let drone = &shadow.drone;
        let battery = self.config.battery.apply(drone.battery, drain);

        let status = (self.config.battery.is_low(battery) && drone.status != DroneStatus::Charging)
            .then_some(DroneStatus::Charging)
            .or(shadow.pending_status);

        let telemetry = Telemetry {
            altitude: rng.range(50.0, 150.0),
            speed: if shadow.is_moving {
                rng.range(10.0, 25.0)
            } else {
                0.0
            },
            heading: heading.unwrap_or(drone.telemetry.heading),
            temperature: rng.range(20.0, 40.0),
            signal_strength: drone.telemetry.signal_strength,
            gps_accuracy: drone.telemetry.gps_accuracy,
            timestamp: Utc::now(),
        };

        DronePatch {
            status,
            battery: Some(battery),
            location: drone.location,
            telemetry: Some(telemetry),
            ..Default::default()
        }
    }

    /// Advance the shadow, then write the drone and publish on success
    async fn persist_drone(&self, mut shadow: ShadowDrone, patch: DronePatch) -> bool {
        patch.apply(&mut shadow.drone);
        let id = shadow.id().clone();
        let carried = shadow.pending_status.take().filter(|_| patch.status.is_some());
        if let Some(metrics) = &self.metrics {
            metrics.set_drone_battery(&id, shadow.drone.battery);
        }
        if patch.status == Some(DroneStatus::Charging) {
            info!("🔋 Drone {} low on battery ({:.1}%), charging", id, shadow.drone.battery);
        }
        self.shadows.put(shadow);

        match self
            .guarded("update_drone", self.store.update_drone(&id, &patch))
            .await
        {
            Ok(drone) => {
                self.publish(Event::drone_update(drone));
                true
            }
            Err(_) => {
                if let Some(status) = carried {
                    self.shadows.set_pending_status(&id, status);
                }
                false
            }
        }
    }

    /// Run a store call under the persist timeout; failures are logged and counted
    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = DbResult<T>>,
    ) -> DbResult<T> {
        let result = match timeout(self.config.persist_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DbError::Timeout(format!(
                "{} exceeded {:?}",
                operation, self.config.persist_timeout
            ))),
        };

        if let Err(e) = &result {
            warn!(operation, error = %e, "Store operation failed during simulation");
            if let Some(metrics) = &self.metrics {
                metrics.record_store_failure(operation, e.kind());
            }
        }
        result
    }

    fn publish(&self, event: Event) {
        let topic = self.config.publish_mode.topic_for(&event);
        if let Some(metrics) = &self.metrics {
            metrics.record_event_published(event.kind);
        }
        self.publisher.publish(&topic, event);
    }
}

// ============================================================================
// TESTS
// ============================================================================
