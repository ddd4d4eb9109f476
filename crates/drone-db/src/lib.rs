//! # Drone DB - Persistence
//!
//! The document store behind the simulation engine and the API: the
//! [`DroneStore`] trait, a volatile [`MemoryStore`] and a ScyllaDB-backed
//! [`ScyllaStore`].

pub mod error;
pub mod memory;
pub mod migrations;
pub mod scylla_store;
pub mod store;

pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use scylla_store::ScyllaStore;
pub use store::DroneStore;

use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub connection_timeout_secs: u64,
    pub replication_factor: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["127.0.0.1:9042".to_string()],
            keyspace: "drone_fleet".to_string(),
            connection_timeout_secs: 10,
            replication_factor: 1,
        }
    }
}

impl DbConfig {
    /// Reject configurations the driver would only fail on later
    pub fn validate(&self) -> DbResult<()> {
        if self.hosts.is_empty() {
            return Err(DbError::Configuration("no database hosts configured".into()));
        }
        let valid_keyspace = !self.keyspace.is_empty()
            && self
                .keyspace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_keyspace {
            return Err(DbError::Configuration(format!(
                "invalid keyspace name: {:?}",
                self.keyspace
            )));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
