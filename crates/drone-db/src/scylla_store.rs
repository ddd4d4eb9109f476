//! ScyllaDB-backed document store
//!
//! Drones and missions are stored as JSON documents next to the handful of
//! columns that need secondary indexes (status, owner and assigned drone).
//! Partial updates are read-modify-write.

use async_trait::async_trait;
use chrono::Utc;
use drone_core::{
    Drone, DroneId, DronePatch, DroneStatus, Mission, MissionId, MissionProgress, UserId,
};
use scylla::serialize::row::SerializeRow;
use scylla::{Session, SessionBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::{DbConfig, DbError, DbResult, DroneStore, migrations};

/// Store backed by a ScyllaDB cluster
#[derive(Clone)]
pub struct ScyllaStore {
    session: Arc<Session>,
}

impl ScyllaStore {
    /// Connect to the cluster, run migrations and switch to the keyspace
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        info!("Connecting to ScyllaDB cluster: {:?}", config.hosts);

        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build()
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        migrations::run_all(&session, config).await?;

        session
            .use_keyspace(&config.keyspace, false)
            .await
            .map_err(|e| DbError::Configuration(e.to_string()))?;

        info!("Connected to ScyllaDB keyspace {}", config.keyspace);
        Ok(Self {
            session: Arc::new(session),
        })
    }

    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    async fn execute(&self, query: &str, values: impl SerializeRow) -> DbResult<()> {
        self.session
            .query_unpaged(query, values)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    /// Run a `SELECT doc ...` query and decode every row
    async fn docs<T: DeserializeOwned>(
        &self,
        query: &str,
        values: impl SerializeRow,
    ) -> DbResult<Vec<T>> {
        let rows = self
            .session
            .query_unpaged(query, values)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?
            .into_rows_result()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let mut docs = Vec::with_capacity(rows.rows_num());
        for row in rows
            .rows::<(String,)>()
            .map_err(|e| DbError::Serialization(e.to_string()))?
        {
            let (doc,) = row.map_err(|e| DbError::Serialization(e.to_string()))?;
            docs.push(serde_json::from_str(&doc)?);
        }
        Ok(docs)
    }

    async fn write_drone(&self, drone: &Drone) -> DbResult<()> {
        debug!("Writing drone {}", drone.id);
        self.execute(
            "INSERT INTO drones (id, owner_id, status, doc) VALUES (?, ?, ?, ?)",
            (
                drone.id.as_str(),
                drone.owner_id.as_str(),
                drone.status.as_str(),
                to_doc(drone)?,
            ),
        )
        .await
    }

    async fn write_mission(&self, mission: &Mission) -> DbResult<()> {
        debug!("Writing mission {}", mission.id);
        self.execute(
            "INSERT INTO missions (id, owner_id, drone_id, status, doc) VALUES (?, ?, ?, ?, ?)",
            (
                mission.id.0,
                mission.owner_id.as_str(),
                mission.drone_id.as_ref().map(|d| d.as_str()),
                mission.status.as_str(),
                to_doc(mission)?,
            ),
        )
        .await
    }

    async fn require_mission(&self, id: &MissionId) -> DbResult<Mission> {
        self.find_mission(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("mission {}", id)))
    }
}

fn to_doc<T: Serialize>(value: &T) -> DbResult<String> {
    Ok(serde_json::to_string(value)?)
}

#[async_trait]
impl DroneStore for ScyllaStore {
    async fn ping(&self) -> DbResult<()> {
        self.execute("SELECT now() FROM system.local", ()).await
    }

    async fn find_drones_by_status(&self, statuses: &[DroneStatus]) -> DbResult<Vec<Drone>> {
        let mut drones = Vec::new();
        for status in statuses {
            let mut batch: Vec<Drone> = self
                .docs("SELECT doc FROM drones WHERE status = ?", (status.as_str(),))
                .await?;
            drones.append(&mut batch);
        }
        drones.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(drones)
    }

    async fn find_drone(&self, id: &DroneId) -> DbResult<Option<Drone>> {
        let docs: Vec<Drone> = self
            .docs("SELECT doc FROM drones WHERE id = ?", (id.as_str(),))
            .await?;
        Ok(docs.into_iter().next())
    }

    async fn list_drones(&self, owner: Option<UserId>) -> DbResult<Vec<Drone>> {
        let mut drones: Vec<Drone> = match owner {
            Some(owner) => {
                self.docs("SELECT doc FROM drones WHERE owner_id = ?", (owner.as_str(),))
                    .await?
            }
            None => self.docs("SELECT doc FROM drones", ()).await?,
        };
        drones.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(drones)
    }

    async fn insert_drone(&self, drone: &Drone) -> DbResult<()> {
        if self.find_drone(&drone.id).await?.is_some() {
            return Err(DbError::Duplicate(format!("drone {}", drone.id)));
        }
        self.write_drone(drone).await
    }

    async fn update_drone(&self, id: &DroneId, patch: &DronePatch) -> DbResult<Drone> {
        let mut drone = self
            .find_drone(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("drone {}", id)))?;
        patch.apply(&mut drone);
        self.write_drone(&drone).await?;
        Ok(drone)
    }

    async fn set_drone_status(&self, id: &DroneId, status: DroneStatus) -> DbResult<()> {
        self.update_drone(id, &DronePatch::status(status)).await?;
        Ok(())
    }

    async fn find_active_mission_for_drone(
        &self,
        drone_id: &DroneId,
    ) -> DbResult<Option<Mission>> {
        let missions: Vec<Mission> = self
            .docs(
                "SELECT doc FROM missions WHERE drone_id = ?",
                (drone_id.as_str(),),
            )
            .await?;
        Ok(missions
            .into_iter()
            .filter(|m| m.is_active_for(drone_id))
            .max_by_key(|m| m.start_time))
    }

    async fn find_mission(&self, id: &MissionId) -> DbResult<Option<Mission>> {
        let docs: Vec<Mission> = self
            .docs("SELECT doc FROM missions WHERE id = ?", (id.0,))
            .await?;
        Ok(docs.into_iter().next())
    }

    async fn list_missions(&self, owner: Option<UserId>) -> DbResult<Vec<Mission>> {
        let mut missions: Vec<Mission> = match owner {
            Some(owner) => {
                self.docs(
                    "SELECT doc FROM missions WHERE owner_id = ?",
                    (owner.as_str(),),
                )
                .await?
            }
            None => self.docs("SELECT doc FROM missions", ()).await?,
        };
        missions.sort_by_key(|m| m.created_at);
        Ok(missions)
    }

    async fn insert_mission(&self, mission: &Mission) -> DbResult<()> {
        if self.find_mission(&mission.id).await?.is_some() {
            return Err(DbError::Duplicate(format!("mission {}", mission.id)));
        }
        self.write_mission(mission).await
    }

    async fn save_mission(&self, mission: &Mission) -> DbResult<()> {
        self.write_mission(mission).await
    }

    async fn update_mission_progress(
        &self,
        id: &MissionId,
        progress: &MissionProgress,
    ) -> DbResult<Mission> {
        let mut mission = self.require_mission(id).await?;
        mission.progress = *progress;
        mission.updated_at = Utc::now();
        self.write_mission(&mission).await?;
        Ok(mission)
    }

    async fn complete_mission(&self, id: &MissionId) -> DbResult<Mission> {
        let mut mission = self.require_mission(id).await?;
        mission.complete(Utc::now());
        self.write_mission(&mission).await?;
        Ok(mission)
    }
}
