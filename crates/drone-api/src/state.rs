//! Application state management

use crate::config::{ApiConfig, StoreKind};
use crate::demo;
use drone_core::{Event, EventPublisher};
use drone_db::{DroneStore, MemoryStore, ScyllaStore};
use drone_sim::{SeededRandom, SimulationEngine};
use drone_telemetry::MetricsCollector;
use drone_websocket::WebSocketHub;

use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: ApiConfig,
    /// Document store shared with the engine
    pub store: Arc<dyn DroneStore>,
    /// Backend actually in use, `memory` after a failed Scylla connect
    pub store_backend: &'static str,
    /// Simulation engine
    pub engine: Arc<SimulationEngine>,
    /// WebSocket hub for real-time updates
    pub ws_hub: Arc<WebSocketHub>,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Create new application state with all components
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let (store, backend): (Arc<dyn DroneStore>, &'static str) = match config.store {
            StoreKind::Memory => (Arc::new(MemoryStore::new()), "memory"),
            StoreKind::Scylla => {
                let connected = match config.db.validate() {
                    Ok(()) => ScyllaStore::connect(&config.db).await,
                    Err(e) => Err(e),
                };
                match connected {
                    Ok(store) => {
                        info!("Database connected");
                        (Arc::new(store), "scylla")
                    }
                    Err(e) => {
                        warn!("Database connection failed: {}", e);
                        warn!("Running in degraded mode (in-memory store)");
                        (Arc::new(MemoryStore::new()), "memory")
                    }
                }
            }
        };

        let metrics = Arc::new(MetricsCollector::new()?);
        Self::with_store(config, store, backend, metrics).await
    }

    /// Wire the engine and hub around an existing store
    pub async fn with_store(
        config: ApiConfig,
        store: Arc<dyn DroneStore>,
        store_backend: &'static str,
        metrics: Arc<MetricsCollector>,
    ) -> anyhow::Result<Self> {
        let ws_hub = Arc::new(WebSocketHub::new().with_metrics(metrics.clone()));
        info!("WebSocket hub initialized");

        let mut engine = SimulationEngine::new(config.to_sim_config(), store.clone(), ws_hub.clone())
            .with_metrics(metrics.clone());
        if let Some(seed) = config.simulation.seed {
            info!("Simulation RNG seeded with {}", seed);
            engine = engine.with_random(Box::new(SeededRandom::from_seed(seed)));
        }

        if config.seed_demo_fleet {
            demo::seed_fleet(store.as_ref()).await?;
        }

        Ok(Self {
            config,
            store,
            store_backend,
            engine: Arc::new(engine),
            ws_hub,
            metrics,
        })
    }

    /// Publish an event on the topic the configured mode picks
    pub fn publish(&self, event: Event) {
        let topic = self.config.simulation.publish_mode.topic_for(&event);
        self.metrics.record_event_published(event.kind);
        self.ws_hub.publish(&topic, event);
    }

    /// Get connected WebSocket client count
    pub fn ws_client_count(&self) -> usize {
        self.ws_hub.client_count()
    }
}
