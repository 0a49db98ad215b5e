//! Wiring of the SQLite adapters into the services for one CLI invocation.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::adapters::sqlite::{
    initialize_database, PoolConfig, SqliteCircuitRepository, SqliteDocumentRepository,
};
use crate::domain::models::{Actor, Config};
use crate::services::{CircuitCatalog, TransitionEngine};

pub struct AppContext {
    pub catalog: CircuitCatalog<SqliteCircuitRepository>,
    pub engine: TransitionEngine<SqliteCircuitRepository, SqliteDocumentRepository>,
    pub actor: Actor,
}

impl AppContext {
    /// Open (and migrate) the configured database.
    pub async fn open(config: &Config, actor: Actor) -> Result<Self> {
        let pool = initialize_database(
            &config.database.url(),
            Some(PoolConfig::from(&config.database)),
        )
        .await
        .context("Failed to initialize database. Run 'circuitflow init' first.")?;

        Ok(Self::from_pool(pool, config, actor))
    }

    pub fn from_pool(pool: SqlitePool, config: &Config, actor: Actor) -> Self {
        let circuits = Arc::new(SqliteCircuitRepository::new(pool.clone()));
        let documents = Arc::new(SqliteDocumentRepository::new(pool));

        Self {
            catalog: CircuitCatalog::new(circuits.clone(), config.workflow.clone()),
            engine: TransitionEngine::new(circuits, documents, config.workflow.clone()),
            actor,
        }
    }
}
