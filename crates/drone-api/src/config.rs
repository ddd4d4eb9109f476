//! API server configuration
//!
//! Layered with the `config` crate: built-in defaults, an optional
//! `drone-fleet.toml`, then `DRONE_*` environment variables where `__`
//! separates nested keys (`DRONE_SIMULATION__TICK_INTERVAL_MS=500`).

use config::{Config, ConfigError, Environment, File};
use drone_core::PublishMode;
use drone_db::DbConfig;
use drone_sim::{BatteryModel, SimConfig};
use serde::Deserialize;
use std::time::Duration;

/// Which document store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Scylla,
}

/// Simulation tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub tick_interval_ms: u64,
    /// Cooldown after a manual drone update
    pub pause_ms: u64,
    pub step_distance_m: f64,
    pub arrival_threshold_m: f64,
    pub persist_timeout_ms: u64,
    pub publish_mode: PublishMode,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
    /// Start the tick loop on boot
    pub autostart: bool,
    pub battery: BatteryModel,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        let sim = SimConfig::default();
        Self {
            tick_interval_ms: sim.tick_interval.as_millis() as u64,
            pause_ms: sim.pause_duration.as_millis() as u64,
            step_distance_m: sim.step_distance_m,
            arrival_threshold_m: sim.arrival_threshold_m,
            persist_timeout_ms: sim.persist_timeout.as_millis() as u64,
            publish_mode: sim.publish_mode,
            seed: None,
            autostart: false,
            battery: sim.battery,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API port
    pub api_port: u16,
    /// WebSocket port
    pub ws_port: u16,
    /// Enable CORS for all origins (development)
    pub cors_permissive: bool,
    pub store: StoreKind,
    /// Database configuration, used when `store = "scylla"`
    pub db: DbConfig,
    pub simulation: SimulationSettings,
    /// Insert a small demo fleet on boot
    pub seed_demo_fleet: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_port: 3000,
            ws_port: 9090,
            cors_permissive: true,
            store: StoreKind::default(),
            db: DbConfig::default(),
            simulation: SimulationSettings::default(),
            seed_demo_fleet: true,
        }
    }
}

impl ApiConfig {
    /// Load configuration from `.env`, `drone-fleet.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_sources(Environment::with_prefix("DRONE"))
    }

    fn from_sources(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("drone-fleet").required(false))
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("db.hosts")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Engine configuration derived from the `simulation` section
    pub fn to_sim_config(&self) -> SimConfig {
        let sim = &self.simulation;
        SimConfig {
            tick_interval: Duration::from_millis(sim.tick_interval_ms.max(1)),
            pause_duration: Duration::from_millis(sim.pause_ms),
            step_distance_m: sim.step_distance_m,
            arrival_threshold_m: sim.arrival_threshold_m,
            persist_timeout: Duration::from_millis(sim.persist_timeout_ms),
            publish_mode: sim.publish_mode,
            battery: sim.battery,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("DRONE").source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_sources(env(&[])).unwrap();
        assert_eq!(config.api_port, 3000);
        assert_eq!(config.ws_port, 9090);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.simulation.tick_interval_ms, 2000);
        assert_eq!(config.simulation.pause_ms, 10_000);
        assert!(!config.simulation.autostart);
    }

    #[test]
    fn test_environment_overrides() {
        let config = ApiConfig::from_sources(env(&[
            ("DRONE_API_PORT", "8088"),
            ("DRONE_STORE", "scylla"),
            ("DRONE_DB__HOSTS", "scylla-1:9042,scylla-2:9042"),
            ("DRONE_SIMULATION__TICK_INTERVAL_MS", "500"),
            ("DRONE_SIMULATION__PUBLISH_MODE", "global"),
            ("DRONE_SIMULATION__SEED", "42"),
        ]))
        .unwrap();

        assert_eq!(config.api_port, 8088);
        assert_eq!(config.store, StoreKind::Scylla);
        assert_eq!(config.db.hosts, vec!["scylla-1:9042", "scylla-2:9042"]);
        assert_eq!(config.simulation.seed, Some(42));

        let sim = config.to_sim_config();
        assert_eq!(sim.tick_interval, Duration::from_millis(500));
        assert_eq!(sim.publish_mode, PublishMode::Global);
        assert_eq!(sim.pause_duration, Duration::from_secs(10));
    }
}
