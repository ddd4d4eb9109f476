//! # Drone Telemetry - Metrics & Observability
//!
//! Prometheus metrics for the drone fleet simulation service.
//! Provides metrics for:
//! - Simulation ticks and their duration
//! - Tracked and paused drones, per-drone battery
//! - Waypoints reached and missions completed
//! - Store failures swallowed by the engine
//! - Event fan-out and WebSocket sessions

use drone_core::{DroneId, EventKind};
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use tracing::{info, warn};

/// Metrics collector for the drone fleet service
pub struct MetricsCollector {
    registry: Registry,

    // Simulation metrics
    simulation_running: IntGauge,
    ticks_total: IntCounter,
    tick_duration: Histogram,
    tracked_drones: IntGauge,
    paused_drones: IntGauge,
    manual_overrides: IntCounter,

    // Drone & mission metrics
    drone_battery: GaugeVec,
    waypoints_reached: IntCounterVec,
    missions_completed: IntCounter,

    // Store metrics
    store_failures: IntCounterVec,

    // Fan-out metrics
    events_published: IntCounterVec,
    ws_connections: IntGauge,
    ws_messages_sent: IntCounter,
    ws_messages_received: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        // Simulation metrics
        let simulation_running = IntGauge::new(
            "drone_fleet_simulation_running",
            "Whether the simulation loop is running",
        )?;
        registry.register(Box::new(simulation_running.clone()))?;

        let ticks_total = IntCounter::new(
            "drone_fleet_simulation_ticks_total",
            "Simulation ticks processed",
        )?;
        registry.register(Box::new(ticks_total.clone()))?;

        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "drone_fleet_simulation_tick_seconds",
                "Time spent processing one simulation tick",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        let tracked_drones = IntGauge::new(
            "drone_fleet_tracked_drones",
            "Drones currently driven by the simulation",
        )?;
        registry.register(Box::new(tracked_drones.clone()))?;

        let paused_drones = IntGauge::new(
            "drone_fleet_paused_drones",
            "Drones paused after a manual update",
        )?;
        registry.register(Box::new(paused_drones.clone()))?;

        let manual_overrides = IntCounter::new(
            "drone_fleet_manual_overrides_total",
            "Manual drone updates that paused the simulation for a drone",
        )?;
        registry.register(Box::new(manual_overrides.clone()))?;

        // Drone & mission metrics
        let drone_battery = GaugeVec::new(
            Opts::new("drone_fleet_drone_battery_percent", "Drone battery level"),
            &["drone_id"],
        )?;
        registry.register(Box::new(drone_battery.clone()))?;

        let waypoints_reached = IntCounterVec::new(
            Opts::new(
                "drone_fleet_waypoints_reached_total",
                "Waypoints reached by drones",
            ),
            &["drone_id"],
        )?;
        registry.register(Box::new(waypoints_reached.clone()))?;

        let missions_completed = IntCounter::new(
            "drone_fleet_missions_completed_total",
            "Missions completed by the simulation",
        )?;
        registry.register(Box::new(missions_completed.clone()))?;

        // Store metrics
        let store_failures = IntCounterVec::new(
            Opts::new(
                "drone_fleet_store_failures_total",
                "Store operations that failed during simulation",
            ),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(store_failures.clone()))?;

        // Fan-out metrics
        let events_published = IntCounterVec::new(
            Opts::new("drone_fleet_events_published_total", "Events published"),
            &["kind"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let ws_connections = IntGauge::new(
            "drone_fleet_ws_connections",
            "Active WebSocket connections",
        )?;
        registry.register(Box::new(ws_connections.clone()))?;

        let ws_messages_sent = IntCounter::new(
            "drone_fleet_ws_messages_sent_total",
            "Total WebSocket messages sent",
        )?;
        registry.register(Box::new(ws_messages_sent.clone()))?;

        let ws_messages_received = IntCounter::new(
            "drone_fleet_ws_messages_received_total",
            "Total WebSocket messages received",
        )?;
        registry.register(Box::new(ws_messages_received.clone()))?;

        info!("📊 Metrics collector initialized");

        Ok(Self {
            registry,
            simulation_running,
            ticks_total,
            tick_duration,
            tracked_drones,
            paused_drones,
            manual_overrides,
            drone_battery,
            waypoints_reached,
            missions_completed,
            store_failures,
            events_published,
            ws_connections,
            ws_messages_sent,
            ws_messages_received,
        })
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    // ========================================================================
    // SIMULATION METRICS
    // ========================================================================

    pub fn set_simulation_running(&self, running: bool) {
        self.simulation_running.set(if running { 1 } else { 0 });
    }

    /// Record one processed tick
    pub fn record_tick(&self, duration_secs: f64) {
        self.ticks_total.inc();
        self.tick_duration.observe(duration_secs);
    }

    pub fn set_tracked_drones(&self, count: usize) {
        self.tracked_drones.set(count as i64);
    }

    pub fn set_paused_drones(&self, count: usize) {
        self.paused_drones.set(count as i64);
    }

    pub fn record_manual_override(&self) {
        self.manual_overrides.inc();
    }

    // ========================================================================
    // DRONE & MISSION METRICS
    // ========================================================================

    pub fn set_drone_battery(&self, drone_id: &DroneId, battery: f64) {
        self.drone_battery
            .with_label_values(&[drone_id.as_str()])
            .set(battery);
    }

    /// Drop per-drone series, e.g. when the simulation stops
    pub fn clear_drone_series(&self) {
        self.drone_battery.reset();
    }

    pub fn record_waypoint_reached(&self, drone_id: &DroneId) {
        self.waypoints_reached
            .with_label_values(&[drone_id.as_str()])
            .inc();
    }

    pub fn record_mission_completed(&self) {
        self.missions_completed.inc();
    }

    // ========================================================================
    // STORE METRICS
    // ========================================================================

    /// Record a store failure swallowed by the simulation
    pub fn record_store_failure(&self, operation: &str, kind: &str) {
        self.store_failures
            .with_label_values(&[operation, kind])
            .inc();
    }

    // ========================================================================
    // FAN-OUT METRICS
    // ========================================================================

    pub fn record_event_published(&self, kind: EventKind) {
        self.events_published
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Set WebSocket connection count
    pub fn set_ws_connections(&self, count: usize) {
        self.ws_connections.set(count as i64);
    }

    /// Record WebSocket message sent
    pub fn record_ws_sent(&self) {
        self.ws_messages_sent.inc();
    }

    /// Record WebSocket message received
    pub fn record_ws_received(&self) {
        self.ws_messages_received.inc();
    }
}

// ============================================================================
// TESTS
// ============================================================================
