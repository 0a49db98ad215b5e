//! circuitflow - document approval circuits
//!
//! A circuit is a named workflow made of statuses (the states a document can
//! occupy) and steps (ordered waypoints that may declare a forward edge between
//! two statuses). The transition engine moves documents through that graph,
//! tracks per-status completion and keeps an append-only history.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, pure graph logic, errors and repository ports
//! - **Adapters** (`adapters`): SQLite implementations of the ports (sqlx)
//! - **Service Layer** (`services`): Circuit catalog, step linker, transition engine
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use circuitflow::adapters::sqlite::{initialize_database, SqliteCircuitRepository, SqliteDocumentRepository};
//! use circuitflow::domain::models::{Actor, Role, WorkflowConfig};
//! use circuitflow::services::TransitionEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = initialize_database("sqlite:flow.db", None).await?;
//!     let engine = TransitionEngine::new(
//!         Arc::new(SqliteCircuitRepository::new(pool.clone())),
//!         Arc::new(SqliteDocumentRepository::new(pool)),
//!         WorkflowConfig::default(),
//!     );
//!     let admin = Actor::new(1, Role::Admin);
//!     let doc = engine.create_document(&admin, "INV-2024-001").await?;
//!     engine.assign_document_to_circuit(&admin, doc.id, 1).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, ErrorKind};
pub use domain::models::{
    Action, Actor, Capability, Circuit, Config, Document, DocumentLifecycle, Role, Status,
    StatusGraph, Step, WorkflowConfig,
};
pub use domain::ports::{CircuitRepository, DocumentRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CircuitCatalog, StepLinker, TransitionEngine};
