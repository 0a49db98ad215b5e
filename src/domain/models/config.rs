use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::LogConfig;

/// Main configuration structure for circuitflow
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LogConfig,

    /// Workflow engine behaviour
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".circuitflow/circuitflow.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// sqlx connection URL for the configured path.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Workflow engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowConfig {
    /// Prefix of generated circuit keys
    #[serde(default = "default_circuit_key_prefix")]
    pub circuit_key_prefix: String,

    /// Zero-padded width of the counter in circuit keys
    #[serde(default = "default_circuit_key_width")]
    pub circuit_key_width: usize,

    /// Refuse forward moves out of an incomplete required status
    #[serde(default = "default_true")]
    pub enforce_required_statuses: bool,

    /// Comment recorded when an action advances a document on its own
    #[serde(default = "default_auto_advance_comment")]
    pub auto_advance_comment: String,
}

fn default_circuit_key_prefix() -> String {
    "CR".to_string()
}

const fn default_circuit_key_width() -> usize {
    4
}

const fn default_true() -> bool {
    true
}

fn default_auto_advance_comment() -> String {
    "Automatically advanced by action".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            circuit_key_prefix: default_circuit_key_prefix(),
            circuit_key_width: default_circuit_key_width(),
            enforce_required_statuses: true,
            auto_advance_comment: default_auto_advance_comment(),
        }
    }
}

impl WorkflowConfig {
    /// Circuit key for the given counter value, e.g. `CR0007`.
    pub fn circuit_key(&self, counter: i64) -> String {
        format!(
            "{}{:0width$}",
            self.circuit_key_prefix,
            counter,
            width = self.circuit_key_width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_key_padding() {
        let cfg = WorkflowConfig::default();
        assert_eq!(cfg.circuit_key(7), "CR0007");
        assert_eq!(cfg.circuit_key(12345), "CR12345");
    }

    #[test]
    fn test_database_url() {
        let mut db = DatabaseConfig::default();
        assert_eq!(db.url(), "sqlite:.circuitflow/circuitflow.db");
        db.path = "sqlite::memory:".to_string();
        assert_eq!(db.url(), "sqlite::memory:");
    }
}
