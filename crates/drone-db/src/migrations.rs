//! Database migrations

use crate::{DbConfig, DbError, DbResult};
use scylla::Session;
use tracing::{debug, info};

/// Current schema version written to `schema_version`
pub const SCHEMA_VERSION: i32 = 1;

fn statements(config: &DbConfig) -> Vec<String> {
    let ks = &config.keyspace;
    vec![
        format!(
            "CREATE KEYSPACE IF NOT EXISTS {ks} WITH replication = \
             {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
            config.replication_factor
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {ks}.schema_version (id int PRIMARY KEY, version int)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {ks}.drones (\
             id text PRIMARY KEY, owner_id text, status text, doc text)"
        ),
        format!("CREATE INDEX IF NOT EXISTS ON {ks}.drones (status)"),
        format!("CREATE INDEX IF NOT EXISTS ON {ks}.drones (owner_id)"),
        format!(
            "CREATE TABLE IF NOT EXISTS {ks}.missions (\
             id uuid PRIMARY KEY, owner_id text, drone_id text, status text, doc text)"
        ),
        format!("CREATE INDEX IF NOT EXISTS ON {ks}.missions (drone_id)"),
        format!("CREATE INDEX IF NOT EXISTS ON {ks}.missions (owner_id)"),
        format!("CREATE INDEX IF NOT EXISTS ON {ks}.missions (status)"),
    ]
}

/// Run all migrations. Idempotent: every statement is `IF NOT EXISTS`.
pub async fn run_all(session: &Session, config: &DbConfig) -> DbResult<()> {
    info!("Running database migrations...");

    for statement in statements(config) {
        debug!("Applying: {}", statement);
        session
            .query_unpaged(statement, ())
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
    }

    let version = get_schema_version(session, &config.keyspace).await?;
    info!("Current schema version: {}", version);

    if version < SCHEMA_VERSION {
        session
            .query_unpaged(
                format!(
                    "INSERT INTO {}.schema_version (id, version) VALUES (1, ?)",
                    config.keyspace
                ),
                (SCHEMA_VERSION,),
            )
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
    }

    info!("Migrations complete");
    Ok(())
}

/// Get current schema version, 0 when none has been recorded
async fn get_schema_version(session: &Session, keyspace: &str) -> DbResult<i32> {
    let query = format!("SELECT version FROM {keyspace}.schema_version WHERE id = 1");

    let rows = session
        .query_unpaged(query, ())
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?
        .into_rows_result()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let version = rows
        .maybe_first_row::<(Option<i32>,)>()
        .map_err(|e| DbError::Migration(e.to_string()))?
        .and_then(|(v,)| v)
        .unwrap_or(0);

    Ok(version)
}
