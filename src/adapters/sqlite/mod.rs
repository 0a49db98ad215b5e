//! SQLite database adapters for the circuit engine.

pub mod circuit_repository;
pub mod connection;
pub mod document_repository;
pub mod migrations;

pub use circuit_repository::SqliteCircuitRepository;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use document_repository::SqliteDocumentRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Role;

/// Format a timestamp for storage. Fixed-width UTC so text ordering matches
/// time ordering.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse an optional role name from a SQLite row field.
pub fn parse_optional_role(s: Option<String>) -> DomainResult<Option<Role>> {
    s.map(|s| {
        Role::from_str(&s)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid role: {s}")))
    })
    .transpose()
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

pub async fn initialize_database(database_url: &str, config: Option<PoolConfig>) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(database_url, config).await?;
    let migrator = Migrator::new(pool.clone());
    let applied = migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    tracing::debug!(database_url, applied, "database initialized");
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_round_trip_and_ordering() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(1500);
        let a = format_datetime(&earlier);
        let b = format_datetime(&later);
        assert!(a < b);
        assert_eq!(parse_datetime(&a).unwrap().timestamp_micros(), earlier.timestamp_micros());
    }

    #[test]
    fn test_parse_optional_role() {
        assert_eq!(parse_optional_role(None).unwrap(), None);
        assert_eq!(parse_optional_role(Some("admin".into())).unwrap(), Some(Role::Admin));
        assert!(parse_optional_role(Some("nobody".into())).is_err());
    }
}
